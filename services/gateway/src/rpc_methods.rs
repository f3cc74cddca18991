//! Demo remote-callable methods bound on the sample endpoint: an echo and
//! a binary buffer transform, matching the worked examples in the design
//! (text echo and the `incr_u32` out-of-band buffer round trip).

use std::sync::Arc;

use rpc_core::{Endpoint, RpcError, RpcOutcome, RpcValue};

/// Binds `echo` (returns `params` verbatim as `resp.data`) and `incr_u32`
/// (adds one to every little-endian `u32` in a buffer leaf) on `endpoint`.
pub fn bind_demo_methods(endpoint: &Endpoint) -> Result<(), RpcError> {
    endpoint.bind(
        "echo",
        Arc::new(|_ep: &Endpoint, _connid, params: &RpcValue, resp: &mut RpcValue| {
            resp.insert("data", params.clone());
            RpcOutcome::Send
        }),
    )?;

    endpoint.bind(
        "incr_u32",
        Arc::new(|_ep: &Endpoint, _connid, params: &RpcValue, resp: &mut RpcValue| {
            let Some(buf) = params.get("buf").and_then(RpcValue::as_buf) else {
                return RpcOutcome::Suppress;
            };
            if buf.len() % 4 != 0 {
                return RpcOutcome::Suppress;
            }
            let incremented: Vec<u8> = buf
                .chunks_exact(4)
                .flat_map(|chunk| {
                    let n = u32::from_le_bytes(chunk.try_into().expect("chunks_exact(4)"));
                    n.wrapping_add(1).to_le_bytes()
                })
                .collect();
            let mut data = RpcValue::map();
            data.insert("buf", RpcValue::Buf(incremented));
            resp.insert("data", data);
            RpcOutcome::Send
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_core::{ConnectOutcome, Connection, Frame, RegistryConfig, Registry, TransportError};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeConnection {
        sent: Mutex<Vec<Frame>>,
    }

    impl Connection for FakeConnection {
        fn send<'a>(
            &'a self,
            frame: Frame,
        ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
            self.sent.lock().unwrap().push(frame);
            Box::pin(async { Ok(()) })
        }

        fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn incr_u32_rejects_misaligned_buffer_by_suppressing() {
        let registry = Registry::create(RegistryConfig::default());
        let endpoint = registry.open_endpoint("/rpc", 4, None).unwrap();
        bind_demo_methods(&endpoint).unwrap();
        let conn = Arc::new(FakeConnection::default());
        let connid = match endpoint.on_connect(conn.clone()) {
            ConnectOutcome::Accepted(id) => id,
            ConnectOutcome::Refused => panic!("admitted"),
        };

        let mut params = RpcValue::map();
        params.insert("buf", RpcValue::Buf(vec![1, 2, 3]));
        let mut call = RpcValue::map();
        call.insert("cid", RpcValue::Int(1));
        call.insert("call", "incr_u32".into());
        call.insert("params", params);
        let frame = rpc_core::encode(call).unwrap();

        endpoint
            .on_data(connid, rpc_core::FrameOpcode::Binary, true, &frame.bytes)
            .await;
        assert!(conn.sent.lock().unwrap().is_empty());
    }
}
