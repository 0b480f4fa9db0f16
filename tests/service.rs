//! End-to-end tests over real sockets, using only the crate's public
//! surface: configuration, the `start` entry point, its handle, and the
//! `Store` trait for harness-side injection.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use echoserv::config::{HostMode, ServiceConfig, StoreProvider};
use echoserv::service::{self, LifecycleState};
use echoserv::{Error, Store, StoreError};

/// Issue a raw HTTP/1.1 request and read the full response.
async fn http_request(addr: SocketAddr, method: &str, target: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("{method} {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buffer = BytesMut::with_capacity(4096);
    loop {
        let n = stream.read_buf(&mut buffer).await.unwrap();
        if n == 0 {
            break;
        }
    }
    buffer.to_vec()
}

async fn http_get(addr: SocketAddr, target: &str) -> Vec<u8> {
    http_request(addr, "GET", target).await
}

fn status_code(response: &[u8]) -> u16 {
    let text = std::str::from_utf8(response).unwrap();
    let status_line = text.lines().next().unwrap();
    status_line.split_whitespace().nth(1).unwrap().parse().unwrap()
}

fn body_of(response: &[u8]) -> &[u8] {
    let separator = response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .unwrap();
    &response[separator + 4..]
}

/// Drop the Date header before comparing responses: its value depends on
/// the instant, not on the hosting mode.
fn without_date_header(response: &[u8]) -> Vec<u8> {
    let separator = response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .unwrap();
    let head = std::str::from_utf8(&response[..separator]).unwrap();

    let kept: Vec<&str> = head
        .split("\r\n")
        .filter(|line| !line.to_ascii_lowercase().starts_with("date:"))
        .collect();
    let mut normalized = kept.join("\r\n").into_bytes();
    normalized.extend_from_slice(b"\r\n\r\n");
    normalized.extend_from_slice(&response[separator + 4..]);
    normalized
}

/// Store that sleeps on every write, to keep requests in flight.
struct SlowStore {
    delay: Duration,
}

#[async_trait]
impl Store for SlowStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Store that records every write, for injection assertions.
#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl Store for RecordingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push((key.to_string(), value));
        Ok(())
    }
}

#[tokio::test]
async fn embedded_echo_roundtrip() {
    let handle = service::start(ServiceConfig::embedded()).await.unwrap();
    assert_eq!(handle.state(), LifecycleState::Serving);
    let addr = handle.local_addr();

    let response = http_get(addr, "/echo/foo").await;
    assert_eq!(status_code(&response), 200);
    assert_eq!(body_of(&response), b"foo");

    let response = http_get(addr, "/unknown").await;
    assert_eq!(status_code(&response), 404);

    handle.shutdown();
    handle.run().await.unwrap();
}

#[tokio::test]
async fn echo_is_identity_for_valid_inputs() {
    let handle = service::start(ServiceConfig::embedded()).await.unwrap();
    let addr = handle.local_addr();

    for message in ["a", "foo", "hello-world", "with.dots_and-dashes"] {
        let response = http_get(addr, &format!("/echo/{message}")).await;
        assert_eq!(status_code(&response), 200);
        assert_eq!(body_of(&response), message.as_bytes(), "message {message}");
    }

    handle.shutdown();
    handle.run().await.unwrap();
}

#[tokio::test]
async fn unknown_routes_not_found_for_any_method() {
    let handle = service::start(ServiceConfig::embedded()).await.unwrap();
    let addr = handle.local_addr();

    for method in ["GET", "POST", "PUT", "DELETE"] {
        let response = http_request(addr, method, "/nope").await;
        assert_eq!(status_code(&response), 404, "method {method}");
    }

    handle.shutdown();
    handle.run().await.unwrap();
}

#[tokio::test]
async fn domain_error_has_documented_shape() {
    let handle = service::start(ServiceConfig::embedded()).await.unwrap();
    let addr = handle.local_addr();

    let long = "x".repeat(600);
    let response = http_get(addr, &format!("/echo/{long}")).await;
    assert_eq!(status_code(&response), 422);

    let body: serde_json::Value = serde_json::from_slice(body_of(&response)).unwrap();
    assert_eq!(body["code"], "MESSAGE_TOO_LONG");
    assert!(body["message"].as_str().unwrap().contains("limit"));

    handle.shutdown();
    handle.run().await.unwrap();
}

#[tokio::test]
async fn hosting_modes_produce_identical_responses() {
    // Standalone-style hosting: the handle's run() is awaited on a separate
    // task while the test drives requests, exactly as a binary would block.
    let mut standalone_config = ServiceConfig::embedded();
    standalone_config.mode = HostMode::Standalone;
    let standalone = service::start(standalone_config).await.unwrap();
    let standalone_addr = standalone.local_addr();
    let standalone_cancel = standalone.cancel_token();
    let standalone_task = tokio::spawn(standalone.run());

    let embedded = service::start(ServiceConfig::embedded()).await.unwrap();
    let embedded_addr = embedded.local_addr();

    let long = "x".repeat(600);
    let targets = [
        "/echo/foo".to_string(),
        "/echo/bar".to_string(),
        "/unknown".to_string(),
        format!("/echo/{long}"),
    ];

    for target in &targets {
        let from_standalone = http_get(standalone_addr, target).await;
        let from_embedded = http_get(embedded_addr, target).await;
        assert_eq!(
            without_date_header(&from_standalone),
            without_date_header(&from_embedded),
            "target {target}"
        );
    }

    standalone_cancel.cancel();
    standalone_task.await.unwrap().unwrap();

    embedded.shutdown();
    embedded.run().await.unwrap();
}

#[tokio::test]
async fn construction_failure_leaves_no_listener_bound() {
    // Reserve a concrete port, then release it for the service to fail on.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let config = ServiceConfig::embedded()
        .with_listen(addr)
        .with_store_provider(StoreProvider::Memory { capacity: 0 });

    let err = service::start(config).await.unwrap_err();
    assert!(matches!(err, Error::Construction(_)));

    // The wiring failure happened before the bind; nothing is listening.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn bind_failure_surfaces_synchronously() {
    let occupant = service::start(ServiceConfig::embedded()).await.unwrap();
    let addr = occupant.local_addr();

    let config = ServiceConfig::embedded().with_listen(addr);
    let err = service::start(config).await.unwrap_err();
    assert!(matches!(err, Error::Construction(_)));

    // The occupant is unaffected.
    let response = http_get(addr, "/echo/still-up").await;
    assert_eq!(status_code(&response), 200);

    occupant.shutdown();
    occupant.run().await.unwrap();
}

#[tokio::test]
async fn shutdown_drains_in_flight_requests() {
    let config = ServiceConfig::embedded()
        .with_store(Arc::new(SlowStore {
            delay: Duration::from_millis(200),
        }))
        .with_drain_deadline(Duration::from_secs(5));
    let handle = service::start(config).await.unwrap();
    let addr = handle.local_addr();

    let in_flight = tokio::spawn(async move { http_get(addr, "/echo/slow").await });

    // Let the request reach the handler before signalling shutdown.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown();

    let response = in_flight.await.unwrap();
    assert_eq!(status_code(&response), 200);
    assert_eq!(body_of(&response), b"slow");

    handle.run().await.unwrap();
}

#[tokio::test]
async fn drain_deadline_abandons_stuck_requests() {
    let config = ServiceConfig::embedded()
        .with_store(Arc::new(SlowStore {
            delay: Duration::from_secs(30),
        }))
        .with_drain_deadline(Duration::from_millis(300));
    let handle = service::start(config).await.unwrap();
    let addr = handle.local_addr();

    let _stuck = tokio::spawn(async move { http_get(addr, "/echo/stuck").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    handle.shutdown();
    let result = handle.run().await;

    // The lifecycle reached Stopped by the deadline instead of hanging.
    assert!(started.elapsed() < Duration::from_secs(5));
    match result {
        Err(Error::ShutdownTimeout { abandoned }) => assert!(abandoned >= 1),
        other => panic!("expected shutdown timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn injected_store_observes_echoed_messages() {
    let store = Arc::new(RecordingStore::default());
    let config = ServiceConfig::embedded().with_store(store.clone());
    let handle = service::start(config).await.unwrap();
    let addr = handle.local_addr();

    let response = http_get(addr, "/echo/observed").await;
    assert_eq!(status_code(&response), 200);

    let writes = store.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1, b"observed");

    handle.shutdown();
    handle.run().await.unwrap();
}

#[tokio::test]
async fn lifecycle_states_are_observable() {
    let mut handle = service::start(ServiceConfig::embedded()).await.unwrap();
    assert_eq!(handle.state(), LifecycleState::Serving);

    handle.shutdown();
    handle.stopped().await;
    assert_eq!(handle.state(), LifecycleState::Stopped);
}
