//! End-to-end tests: real TCP listener, real WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use teleop_core::{Router, RouterStats};
use teleop_server::{CredentialStore, RelayServer, Site};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn start(site: Site) -> (SocketAddr, Arc<Router>) {
    let router = Arc::new(Router::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let server = RelayServer::new(Arc::clone(&router)).with_site(site);
    tokio::spawn(server.serve(listener, std::future::pending()));
    (addr, router)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.expect("ws connect");
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    let next = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(next.is_err(), "expected no frame, got {next:?}");
}

async fn wait_for(router: &Router, pred: impl Fn(RouterStats) -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !pred(router.stats()) {
        assert!(tokio::time::Instant::now() < deadline, "router never reached expected state");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn empty_site() -> Site {
    let root = std::env::temp_dir().join("teleop-relay-no-pages");
    Site::new(root, CredentialStore::new())
}

#[tokio::test]
async fn operator_and_vehicle_scenario_over_websocket() {
    let (addr, router) = start(empty_site()).await;

    let mut car1 = connect(addr).await;
    send(&mut car1, json!({"type": "register_car", "carId": "car1", "streamUrl": "rtsp://x"})).await;
    assert_eq!(recv(&mut car1).await, json!({"type": "registered", "carId": "car1"}));

    let mut u1 = connect(addr).await;
    send(&mut u1, json!({"type": "register_user", "userId": "u1"})).await;
    assert_eq!(
        recv(&mut u1).await,
        json!({
            "type": "registered",
            "userId": "u1",
            "cars": [{"carId": "car1", "streamUrl": "rtsp://x"}]
        })
    );

    let mut u2 = connect(addr).await;
    send(&mut u2, json!({"type": "register_user", "userId": "u2"})).await;
    recv(&mut u2).await;

    send(&mut u1, json!({"type": "select_car", "userId": "u1", "carId": "car1"})).await;
    assert_eq!(recv(&mut u1).await, json!({"type": "car_selected", "carId": "car1"}));

    send(&mut u2, json!({"type": "select_car", "userId": "u2", "carId": "car1"})).await;
    assert_eq!(
        recv(&mut u2).await,
        json!({"type": "error", "message": "car already in use"})
    );

    send(&mut u1, json!({"type": "command", "userId": "u1", "command": "forward"})).await;
    assert_eq!(recv(&mut car1).await, json!({"type": "command", "command": "forward"}));

    send(&mut u1, json!({"type": "analog_command", "userId": "u1", "x": 0.25, "y": -1.0})).await;
    assert_eq!(
        recv(&mut car1).await,
        json!({"type": "analog_command", "x": 0.25, "y": -1.0})
    );

    send(&mut car1, json!({"type": "status", "carId": "car1", "status": {"battery": 64}})).await;
    assert_eq!(
        recv(&mut u1).await,
        json!({"type": "status", "carId": "car1", "status": {"battery": 64}})
    );

    car1.close(None).await.expect("close");
    wait_for(&router, |s| s.vehicles == 0).await;
    assert_silent(&mut u1).await;

    send(&mut u1, json!({"type": "command", "userId": "u1", "command": "stop"})).await;
    assert_eq!(
        recv(&mut u1).await,
        json!({"type": "error", "message": "vehicle disconnected"})
    );
}

#[tokio::test]
async fn malformed_frames_do_not_close_the_connection() {
    let (addr, router) = start(empty_site()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("definitely not json".to_string().into())).await.unwrap();
    send(&mut ws, json!({"type": "self_destruct"})).await;
    send(&mut ws, json!({"type": "select_car", "userId": "u1"})).await;
    assert_silent(&mut ws).await;

    ws.send(Message::Binary(
        br#"{"type":"register_car","carId":"esp32","streamUrl":"http://10.0.0.7:81/stream"}"#
            .to_vec()
            .into(),
    ))
    .await
    .unwrap();
    assert_eq!(recv(&mut ws).await, json!({"type": "registered", "carId": "esp32"}));
    assert_eq!(router.stats().vehicles, 1);
}

#[tokio::test]
async fn unknown_car_selection_is_rejected() {
    let (addr, _router) = start(empty_site()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"type": "register_user", "userId": "u1"})).await;
    assert_eq!(recv(&mut ws).await["cars"], json!([]));

    send(&mut ws, json!({"type": "select_car", "userId": "u1", "carId": "car1"})).await;
    assert_eq!(
        recv(&mut ws).await,
        json!({"type": "error", "message": "car unavailable"})
    );
}

#[tokio::test]
async fn operator_disconnect_frees_the_vehicle() {
    let (addr, router) = start(empty_site()).await;

    let mut car = connect(addr).await;
    send(&mut car, json!({"type": "register_car", "carId": "car1", "streamUrl": "rtsp://x"})).await;
    recv(&mut car).await;

    let mut u1 = connect(addr).await;
    send(&mut u1, json!({"type": "register_user", "userId": "u1"})).await;
    recv(&mut u1).await;
    send(&mut u1, json!({"type": "select_car", "userId": "u1", "carId": "car1"})).await;
    recv(&mut u1).await;

    drop(u1);
    wait_for(&router, |s| s.operators == 0).await;

    let mut u2 = connect(addr).await;
    send(&mut u2, json!({"type": "register_user", "userId": "u2"})).await;
    recv(&mut u2).await;
    send(&mut u2, json!({"type": "select_car", "userId": "u2", "carId": "car1"})).await;
    assert_eq!(recv(&mut u2).await, json!({"type": "car_selected", "carId": "car1"}));
}

#[tokio::test]
async fn same_port_serves_pages_and_login() {
    let dir = tempfile::tempdir().expect("tmp dir");
    std::fs::write(dir.path().join("index.html"), "<h1>teleop</h1>").unwrap();
    let site = Site::new(dir.path(), CredentialStore::from_pairs([("pilot", "secret")]));
    let (addr, _router) = start(site).await;

    let page = http_roundtrip(addr, "GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    assert!(page.starts_with("HTTP/1.1 200 OK"));
    assert!(page.ends_with("<h1>teleop</h1>"));

    let body = r#"{"username":"pilot","password":"secret"}"#;
    let login = http_roundtrip(
        addr,
        &format!(
            "POST /login HTTP/1.1\r\nHost: x\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ),
    )
    .await;
    assert!(login.starts_with("HTTP/1.1 200 OK"));
    assert!(login.contains(r#""success":true"#));

    let missing = http_roundtrip(addr, "GET /controle.html HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found"));
}

async fn http_roundtrip(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("tcp connect");
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut response = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut response))
        .await
        .expect("timed out")
        .expect("read");
    String::from_utf8(response).expect("utf-8 response")
}

// ── Raw handshakes ──────────────────────────────────────────────────────────

const HANDSHAKE_TAIL: &str = "Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\r\n";

/// Read the response head byte by byte so no frame bytes are consumed.
async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let byte = tokio::time::timeout(TIMEOUT, stream.read_u8())
            .await
            .expect("timed out reading response head")
            .expect("read");
        head.push(byte);
    }
    String::from_utf8(head).expect("utf-8 head")
}

async fn register_over_raw_socket(stream: TcpStream, router: &Router, car_id: &str) {
    let mut ws = WebSocketStream::from_raw_socket(stream, Role::Client, None).await;
    ws.send(Message::Text(
        json!({"type": "register_car", "carId": car_id, "streamUrl": "rtsp://x"})
            .to_string()
            .into(),
    ))
    .await
    .expect("ws send");
    wait_for(router, |s| s.vehicles == 1).await;
}

#[tokio::test]
async fn handshake_after_large_cookie_reaches_the_relay() {
    let (addr, router) = start(empty_site()).await;
    let mut stream = TcpStream::connect(addr).await.expect("tcp connect");

    let request = format!(
        "GET / HTTP/1.1\r\nHost: x\r\nCookie: session={}\r\n{HANDSHAKE_TAIL}",
        "c".repeat(1500)
    );
    stream.write_all(request.as_bytes()).await.expect("write");

    let head = read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
    register_over_raw_socket(stream, &router, "cookie-car").await;
}

#[tokio::test]
async fn handshake_split_across_writes_reaches_the_relay() {
    let (addr, router) = start(empty_site()).await;
    let mut stream = TcpStream::connect(addr).await.expect("tcp connect");

    stream
        .write_all(b"GET /ws HTTP/1.1\r\nHost: x\r\n")
        .await
        .expect("write first half");
    stream.flush().await.expect("flush");
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream
        .write_all(HANDSHAKE_TAIL.as_bytes())
        .await
        .expect("write second half");

    let head = read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
    register_over_raw_socket(stream, &router, "split-car").await;
}
