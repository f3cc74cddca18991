//! The owner context that maps URLs to endpoints and serializes endpoint
//! lifecycle against the transport's callback threads.
//!
//! Holds the one coarse lock the whole core runs under: the URL→endpoint
//! map, every endpoint's connection count, slot vector, and bind map all
//! live behind this single [`std::sync::Mutex`]. Critical sections are
//! index lookups and small map operations — brief enough that a single
//! lock is the right tradeoff over a lock per endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::endpoint::{Endpoint, EndpointState, EventFn};
use crate::error::RpcError;

/// Configuration snapshot a registry is created with. `rpc-core` itself
/// only needs a label; listening port, document root, and browser launch
/// are transport concerns and live in the host application's own config
/// type (see `services/gateway`), which typically embeds this one.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub label: String,
}

struct RegistryInner {
    #[allow(dead_code)]
    config: RegistryConfig,
    endpoints: HashMap<String, EndpointState>,
    userdata: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

/// The registry handle. Cheap to clone; clones share the same lock and
/// endpoint map.
#[derive(Clone)]
pub struct Registry(Arc<Mutex<RegistryInner>>);

impl Registry {
    /// Creates a fresh registry, empty of endpoints. Never fails in
    /// `rpc-core` itself — `RpcError::ServerStart`/`NoMem` exist for the
    /// host application's transport startup, which this core doesn't
    /// perform.
    pub fn create(config: RegistryConfig) -> Self {
        Registry(Arc::new(Mutex::new(RegistryInner {
            config,
            endpoints: HashMap::new(),
            userdata: None,
        })))
    }

    pub fn set_userdata<T: Send + Sync + 'static>(&self, value: T) {
        self.0.lock().unwrap().userdata = Some(Arc::new(value));
    }

    pub fn get_userdata<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0
            .lock()
            .unwrap()
            .userdata
            .clone()
            .and_then(|ud| ud.downcast::<T>().ok())
    }

    /// Registers a new endpoint at `url`, accepting at most `max_conns`
    /// simultaneous connections. Returns `RpcError::EndpointExists` if the
    /// URL is already registered.
    pub fn open_endpoint(
        &self,
        url: impl Into<String>,
        max_conns: usize,
        event_cb: Option<EventFn>,
    ) -> Result<Endpoint, RpcError> {
        let url = url.into();
        let mut inner = self.0.lock().unwrap();
        if inner.endpoints.contains_key(&url) {
            return Err(RpcError::EndpointExists);
        }
        inner
            .endpoints
            .insert(url.clone(), EndpointState::new(max_conns, event_cb));
        drop(inner);
        Ok(Endpoint {
            url: Arc::from(url.as_str()),
            registry: self.clone(),
        })
    }

    /// Removes `url`'s endpoint from the registry and closes every still-
    /// active slot's live connection via the transport, per spec §4.6.
    ///
    /// The removal itself happens under the coarse lock in one step, same
    /// as every other structural change; the actual `Connection::close`
    /// calls happen afterwards, without the lock held, for the same reason
    /// outbound writes do — they are transport I/O, not registry
    /// bookkeeping. Any callback for this URL still in flight on another
    /// thread (e.g. a transport read loop mid-iteration) will find the
    /// endpoint gone on its next lookup and fold that into its own return
    /// value (refuse, keep-open-turned-close, or a no-op) rather than
    /// panicking — see [`Self::with_endpoint`]/[`Self::with_endpoint_mut`].
    pub async fn close_endpoint(&self, url: &str) -> Result<(), RpcError> {
        let state = {
            let mut inner = self.0.lock().unwrap();
            inner
                .endpoints
                .remove(url)
                .ok_or(RpcError::EndpointMissing)?
        };
        for slot in &state.slots {
            if let Some(conn) = slot.connection() {
                conn.close().await;
            }
        }
        Ok(())
    }

    pub fn urls(&self) -> Vec<String> {
        self.0.lock().unwrap().endpoints.keys().cloned().collect()
    }

    /// Runs `f` with shared access to `url`'s endpoint state, inside the
    /// single coarse lock.
    ///
    /// Returns `None` if `url` has no registered endpoint — this is the
    /// expected outcome of a callback racing a concurrent
    /// [`Self::close_endpoint`], not a bug, so callers fold it into their
    /// own return value instead of treating it as fatal.
    pub(crate) fn with_endpoint<R>(
        &self,
        url: &str,
        f: impl FnOnce(&EndpointState) -> R,
    ) -> Option<R> {
        let inner = self.0.lock().unwrap();
        inner.endpoints.get(url).map(f)
    }

    pub(crate) fn with_endpoint_mut<R>(
        &self,
        url: &str,
        f: impl FnOnce(&mut EndpointState) -> R,
    ) -> Option<R> {
        let mut inner = self.0.lock().unwrap();
        inner.endpoints.get_mut(url).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_endpoint_rejects_duplicate_url() {
        let reg = Registry::create(RegistryConfig::default());
        reg.open_endpoint("/rpc", 4, None).unwrap();
        let err = reg.open_endpoint("/rpc", 4, None).unwrap_err();
        assert!(matches!(err, RpcError::EndpointExists));
    }

    #[tokio::test]
    async fn close_endpoint_is_a_no_op_on_the_registry_map() {
        let reg = Registry::create(RegistryConfig::default());
        reg.open_endpoint("/rpc", 4, None).unwrap();
        assert_eq!(reg.urls(), vec!["/rpc".to_owned()]);
        reg.close_endpoint("/rpc").await.unwrap();
        assert!(reg.urls().is_empty());
        // Re-opening the same URL after close succeeds — the map is back
        // to its pre-open state.
        reg.open_endpoint("/rpc", 4, None).unwrap();
        assert_eq!(reg.urls(), vec!["/rpc".to_owned()]);
    }

    #[tokio::test]
    async fn close_endpoint_missing_url_is_an_error() {
        let reg = Registry::create(RegistryConfig::default());
        let err = reg.close_endpoint("/nope").await.unwrap_err();
        assert!(matches!(err, RpcError::EndpointMissing));
    }

    #[test]
    fn registry_userdata_round_trips() {
        let reg = Registry::create(RegistryConfig::default());
        reg.set_userdata(42u32);
        assert_eq!(*reg.get_userdata::<u32>().unwrap(), 42);
        assert!(reg.get_userdata::<String>().is_none());
    }
}
