//! The dynamic value tree carried by RPC messages.
//!
//! A small variant type: null, bool, integer, float, string, an ordered
//! string-keyed map, an array, and a byte buffer. The map preserves
//! insertion order (via [`IndexMap`]) because the wire format is JSON and
//! two peers comparing envelopes field-by-field expect field order to
//! round-trip.

use indexmap::IndexMap;

/// One node of the RPC value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<RpcValue>),
    Map(IndexMap<String, RpcValue>),
    /// An out-of-band byte buffer leaf. Only ever present before encoding
    /// or after decoding; never appears inside a JSON envelope itself (see
    /// [`crate::codec`]).
    Buf(Vec<u8>),
}

impl RpcValue {
    pub fn map() -> Self {
        RpcValue::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, RpcValue>> {
        match self {
            RpcValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, RpcValue>> {
        match self {
            RpcValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RpcValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RpcValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RpcValue]> {
        match self {
            RpcValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_buf(&self) -> Option<&[u8]> {
        match self {
            RpcValue::Buf(b) => Some(b),
            _ => None,
        }
    }

    /// Looks up a key in a map value. Returns `None` if this isn't a map or
    /// the key is absent.
    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Inserts a key into a map value. Panics if called on a non-map — this
    /// mirrors the protocol's own invariant that a response envelope's
    /// inner value handed to a bound function is always a map.
    pub fn insert(&mut self, key: impl Into<String>, value: RpcValue) {
        self.as_map_mut()
            .expect("RpcValue::insert called on a non-map value")
            .insert(key.into(), value);
    }

    pub fn is_empty_map(&self) -> bool {
        matches!(self, RpcValue::Map(m) if m.is_empty())
    }
}

impl From<&str> for RpcValue {
    fn from(s: &str) -> Self {
        RpcValue::Str(s.to_owned())
    }
}

impl From<String> for RpcValue {
    fn from(s: String) -> Self {
        RpcValue::Str(s)
    }
}

impl From<i64> for RpcValue {
    fn from(n: i64) -> Self {
        RpcValue::Int(n)
    }
}

impl From<bool> for RpcValue {
    fn from(b: bool) -> Self {
        RpcValue::Bool(b)
    }
}

impl From<Vec<u8>> for RpcValue {
    fn from(b: Vec<u8>) -> Self {
        RpcValue::Buf(b)
    }
}

/// Converts a value tree containing no [`RpcValue::Buf`] leaves into a
/// `serde_json::Value`. Encoding calls this only after buffer substitution
/// has replaced every `Buf` leaf with a sentinel string, so a `Buf` reaching
/// here is a bug in the caller, not user input — hence the panic.
pub(crate) fn to_json(value: &RpcValue) -> serde_json::Value {
    match value {
        RpcValue::Null => serde_json::Value::Null,
        RpcValue::Bool(b) => serde_json::Value::Bool(*b),
        RpcValue::Int(n) => serde_json::Value::from(*n),
        RpcValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        RpcValue::Str(s) => serde_json::Value::String(s.clone()),
        RpcValue::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        RpcValue::Map(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                obj.insert(k.clone(), to_json(v));
            }
            serde_json::Value::Object(obj)
        }
        RpcValue::Buf(_) => {
            unreachable!("buffer leaf survived substitution before JSON encode")
        }
    }
}

/// Converts a parsed `serde_json::Value` into an `RpcValue` tree. Never
/// produces a `Buf` leaf — buffer resolution is a separate pass performed
/// by the decoder once the out-of-band chunks are available.
pub(crate) fn from_json(value: &serde_json::Value) -> RpcValue {
    match value {
        serde_json::Value::Null => RpcValue::Null,
        serde_json::Value::Bool(b) => RpcValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                RpcValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                RpcValue::Int(u as i64)
            } else {
                RpcValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => RpcValue::Str(s.clone()),
        serde_json::Value::Array(items) => RpcValue::Array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            let mut map = IndexMap::with_capacity(obj.len());
            for (k, v) in obj {
                map.insert(k.clone(), from_json(v));
            }
            RpcValue::Map(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_through_json() {
        for v in [
            RpcValue::Null,
            RpcValue::Bool(true),
            RpcValue::Int(-42),
            RpcValue::Str("hi".into()),
        ] {
            let back = from_json(&to_json(&v));
            assert_eq!(v, back);
        }
    }

    #[test]
    fn preserves_map_key_order() {
        let mut m = IndexMap::new();
        m.insert("z".to_owned(), RpcValue::Int(1));
        m.insert("a".to_owned(), RpcValue::Int(2));
        m.insert("m".to_owned(), RpcValue::Int(3));
        let v = RpcValue::Map(m);
        let json = to_json(&v);
        let back = from_json(&json);
        let RpcValue::Map(back_map) = back else {
            panic!("expected map");
        };
        let keys: Vec<&str> = back_map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn insert_panics_on_non_map() {
        let mut v = RpcValue::Null;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            v.insert("x", RpcValue::Int(1));
        }));
        assert!(result.is_err());
    }
}
