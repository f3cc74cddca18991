//! End-to-end coverage for the gateway's bound demo methods, driven over a
//! real TCP socket via `rpc-testkit` rather than through `Endpoint`
//! directly — this is the network path a browser client actually takes.

use gateway::rpc_methods::bind_demo_methods;
use rpc_core::{Registry, RegistryConfig};
use rpc_testkit::{MockFrame, MockWsClient, TestServer};

async fn start_server(max_conns: usize) -> TestServer {
    let registry = Registry::create(RegistryConfig::default());
    let endpoint = registry.open_endpoint("/ws", max_conns, None).unwrap();
    bind_demo_methods(&endpoint).unwrap();
    TestServer::start(endpoint).await.unwrap()
}

#[tokio::test]
async fn echo_round_trips_over_a_real_socket() {
    let server = start_server(4).await;
    let mut client = MockWsClient::connect(&server.ws_url()).await.unwrap();

    client
        .send_text(r#"{"cid":1,"call":"echo","params":"hi"}"#)
        .await
        .unwrap();

    match client.recv().await.unwrap() {
        MockFrame::Text(text) => {
            assert_eq!(text, r#"{"rid":1,"resp":{"data":"hi"}}"#);
        }
        MockFrame::Binary(_) => panic!("echo reply must be a text frame"),
    }
}

#[tokio::test]
async fn incr_u32_round_trips_a_binary_buffer_over_a_real_socket() {
    let server = start_server(4).await;
    let mut client = MockWsClient::connect(&server.ws_url()).await.unwrap();

    let mut params = rpc_core::RpcValue::map();
    params.insert(
        "buf",
        rpc_core::RpcValue::Buf(vec![0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]),
    );
    let mut call = rpc_core::RpcValue::map();
    call.insert("cid", rpc_core::RpcValue::Int(2));
    call.insert("call", "incr_u32".into());
    call.insert("params", params);
    let frame = rpc_core::encode(call).unwrap();
    assert!(!frame.is_text);

    client.send_binary(frame.bytes).await.unwrap();

    match client.recv().await.unwrap() {
        MockFrame::Binary(bytes) => {
            let reply = rpc_core::decode(false, &bytes).unwrap();
            let buf = reply
                .get("resp")
                .and_then(|r| r.get("data"))
                .and_then(|d| d.get("buf"))
                .and_then(rpc_core::RpcValue::as_buf)
                .unwrap();
            assert_eq!(buf, &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0]);
        }
        MockFrame::Text(_) => panic!("binary buffer reply must be a binary frame"),
    }
}

#[tokio::test]
async fn second_connection_is_refused_beyond_max_conns() {
    let server = start_server(1).await;
    let _first = MockWsClient::connect(&server.ws_url()).await.unwrap();
    let mut second = MockWsClient::connect(&server.ws_url()).await.unwrap();

    // The endpoint refuses admission before any RPC traffic flows; the
    // peer observes the socket close rather than any application data.
    let err = second.recv().await.unwrap_err();
    assert!(err.to_string().contains("closed") || err.to_string().contains("ended"));
}
