//! Session lifecycle and wire behavior of the control-plane backend,
//! exercised against a minimal local HTTP stub. The stub hands out a
//! second listener's address during the handshake so tests can prove the
//! backend really switches to the discovered base.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use spectra_client::{
    Backend, DeviceRegistry, Error, GenericCatalog, RestBackend, RestConfig, SessionHealth,
};
use spectra_protocol::effect::{EffectId, KeyboardEffect};
use spectra_protocol::{AppInfo, Color, EffectPayload};

// Matches RestConfig::for_testing.
const HEARTBEAT: Duration = Duration::from_millis(100);

const CANNED_EFFECT_ID: &str = "11111111-1111-1111-1111-111111111111";

#[derive(Default)]
struct Counters {
    handshakes: AtomicUsize,
    heartbeats: AtomicUsize,
    teardowns: AtomicUsize,
    creates: AtomicUsize,
    applies: AtomicUsize,
}

#[derive(Default)]
struct Behavior {
    handshake_http_500: AtomicBool,
    heartbeat_http_500: AtomicBool,
    create_result_false: AtomicBool,
    create_http_500: AtomicBool,
}

struct Stub {
    addr: String,
    counters: Arc<Counters>,
    behavior: Arc<Behavior>,
}

/// Starts a stub control plane. `session_uri` is what the handshake
/// hands back as the new base address; `None` means this stub's own
/// address.
async fn spawn_stub(session_uri: Option<String>) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let counters = Arc::new(Counters::default());
    let behavior = Arc::new(Behavior::default());
    let uri = session_uri.unwrap_or_else(|| addr.clone());

    let (c, b) = (counters.clone(), behavior.clone());
    tokio::spawn(async move {
        loop {
            let Ok((sock, _)) = listener.accept().await else { break };
            tokio::spawn(serve(sock, c.clone(), b.clone(), uri.clone()));
        }
    });

    Stub { addr, counters, behavior }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn serve(
    mut sock: TcpStream,
    counters: Arc<Counters>,
    behavior: Arc<Behavior>,
    session_uri: String,
) {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let headers_end = loop {
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos;
            }
            let mut tmp = [0u8; 1024];
            match sock.read(&mut tmp).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        };
        let head = String::from_utf8_lossy(&buf[..headers_end]).into_owned();
        let content_length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let total = headers_end + 4 + content_length;
        while buf.len() < total {
            let mut tmp = [0u8; 1024];
            match sock.read(&mut tmp).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
        buf.drain(..total);

        let mut parts = head.split_whitespace();
        let method = parts.next().unwrap_or("").to_owned();
        let path = parts.next().unwrap_or("").to_owned();
        let (status, body) = respond(&method, &path, &counters, &behavior, &session_uri);
        let resp = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        );
        if sock.write_all(resp.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn respond(
    method: &str,
    path: &str,
    counters: &Counters,
    behavior: &Behavior,
    session_uri: &str,
) -> (&'static str, String) {
    match (method, path) {
        ("POST", "/spectra") => {
            counters.handshakes.fetch_add(1, Ordering::SeqCst);
            if behavior.handshake_http_500.load(Ordering::SeqCst) {
                ("500 Internal Server Error", r#"{"result":false}"#.to_owned())
            } else {
                ("200 OK", format!(r#"{{"session":5,"uri":"{session_uri}"}}"#))
            }
        }
        ("PUT", "/heartbeat") => {
            let n = counters.heartbeats.fetch_add(1, Ordering::SeqCst) + 1;
            if behavior.heartbeat_http_500.load(Ordering::SeqCst) {
                ("500 Internal Server Error", r#"{"result":false}"#.to_owned())
            } else {
                ("200 OK", format!(r#"{{"tick":{n}}}"#))
            }
        }
        ("DELETE", "/") => {
            counters.teardowns.fetch_add(1, Ordering::SeqCst);
            ("200 OK", r#"{"result":true}"#.to_owned())
        }
        ("PUT", "/effect") => {
            counters.applies.fetch_add(1, Ordering::SeqCst);
            ("200 OK", r#"{"result":true}"#.to_owned())
        }
        ("DELETE", "/effect") => ("200 OK", r#"{"result":true}"#.to_owned()),
        ("POST", _) => {
            counters.creates.fetch_add(1, Ordering::SeqCst);
            if behavior.create_http_500.load(Ordering::SeqCst) {
                ("500 Internal Server Error", r#"{"result":false}"#.to_owned())
            } else if behavior.create_result_false.load(Ordering::SeqCst) {
                ("200 OK", r#"{"result":false}"#.to_owned())
            } else {
                ("200 OK", format!(r#"{{"result":true,"effect_id":"{CANNED_EFFECT_ID}"}}"#))
            }
        }
        _ => ("404 Not Found", "{}".to_owned()),
    }
}

fn static_keyboard(color: Color) -> EffectPayload {
    EffectPayload::Keyboard(KeyboardEffect::Static { color })
}

#[tokio::test]
async fn handshake_switches_base_and_arms_heartbeat() {
    let session = spawn_stub(None).await;
    let discovery = spawn_stub(Some(session.addr.clone())).await;

    let backend = RestBackend::new(RestConfig::for_testing(discovery.addr.clone()));
    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();

    assert_eq!(discovery.counters.handshakes.load(Ordering::SeqCst), 1);
    let s = backend.session().unwrap();
    assert_eq!(s.id, 5);
    assert_eq!(s.base, session.addr);

    // The first beat lands one full period after activation, never
    // immediately.
    sleep(HEARTBEAT / 2).await;
    assert_eq!(session.counters.heartbeats.load(Ordering::SeqCst), 0);
    sleep(HEARTBEAT * 3).await;
    assert!(session.counters.heartbeats.load(Ordering::SeqCst) >= 2);

    // Effect traffic targets the discovered base, not the discovery
    // endpoint.
    backend.create_effect(&static_keyboard(Color::RED)).await.unwrap();
    assert_eq!(session.counters.creates.load(Ordering::SeqCst), 1);
    assert_eq!(discovery.counters.creates.load(Ordering::SeqCst), 0);

    backend.shutdown().await;
}

#[tokio::test]
async fn uninitialize_is_idempotent() {
    let stub = spawn_stub(None).await;
    let backend = RestBackend::new(RestConfig::for_testing(stub.addr.clone()));
    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();

    backend.uninitialize().await.unwrap();
    assert_eq!(stub.counters.teardowns.load(Ordering::SeqCst), 1);

    // Second teardown: no error, no second network call.
    backend.uninitialize().await.unwrap();
    assert_eq!(stub.counters.teardowns.load(Ordering::SeqCst), 1);

    let err = backend.create_effect(&static_keyboard(Color::RED)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
}

#[tokio::test]
async fn create_effect_success_updates_the_device() {
    let stub = spawn_stub(None).await;
    let backend = Arc::new(RestBackend::new(RestConfig::for_testing(stub.addr.clone())));
    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();

    let registry = DeviceRegistry::new(backend.clone(), GenericCatalog::builtin());
    let keyboard = registry.keyboard();
    let id = keyboard.set_static(Color::BLUE).await.unwrap();

    assert_eq!(id, EffectId::from_u128(0x11111111_1111_1111_1111_111111111111));
    assert_eq!(keyboard.current_effect(), id);
    assert_eq!(stub.counters.applies.load(Ordering::SeqCst), 1);

    backend.shutdown().await;
}

#[tokio::test]
async fn logical_failure_is_distinct_from_transport_failure() {
    let stub = spawn_stub(None).await;
    let backend = RestBackend::new(RestConfig::for_testing(stub.addr.clone()));
    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();

    // HTTP 200 with a false result flag: a logical failure.
    stub.behavior.create_result_false.store(true, Ordering::SeqCst);
    let err = backend.create_effect(&static_keyboard(Color::RED)).await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(err, Error::Logical { .. }), "got {err:?}");

    // HTTP 500: a transport-level failure carrying the status.
    stub.behavior.create_result_false.store(false, Ordering::SeqCst);
    stub.behavior.create_http_500.store(true, Ordering::SeqCst);
    let err = backend.create_effect(&static_keyboard(Color::RED)).await.unwrap_err();
    assert!(err.is_retryable());
    match err {
        Error::Call { status, .. } => assert_eq!(status, Some(500)),
        other => panic!("expected Call with status, got {other:?}"),
    }

    backend.shutdown().await;
}

#[tokio::test]
async fn unsupported_operations_never_touch_the_network() {
    let stub = spawn_stub(None).await;
    let backend = RestBackend::new(RestConfig::for_testing(stub.addr.clone()));

    // The capability gap is permanent: it answers the same way whether or
    // not a session exists, and no request is ever issued.
    let err = backend.query_device(spectra_protocol::DeviceUid::from_u128(1)).await.unwrap_err();
    assert!(matches!(err, Error::Unsupported { .. }));
    assert!(matches!(
        backend.register_notifications(0).await.unwrap_err(),
        Error::Unsupported { .. }
    ));
    assert!(matches!(
        backend.unregister_notifications().await.unwrap_err(),
        Error::Unsupported { .. }
    ));
    assert_eq!(stub.counters.handshakes.load(Ordering::SeqCst), 0);

    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();
    assert!(matches!(
        backend.query_device(spectra_protocol::DeviceUid::from_u128(1)).await.unwrap_err(),
        Error::Unsupported { .. }
    ));
    assert_eq!(stub.counters.handshakes.load(Ordering::SeqCst), 1);
    assert_eq!(stub.counters.creates.load(Ordering::SeqCst), 0);

    backend.shutdown().await;
}

#[tokio::test]
async fn heartbeat_failure_is_surfaced_and_stops_the_timer() {
    let stub = spawn_stub(None).await;
    let backend = RestBackend::new(RestConfig::for_testing(stub.addr.clone()));
    let mut health = backend.health();

    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();
    stub.behavior.heartbeat_http_500.store(true, Ordering::SeqCst);

    let reported = timeout(Duration::from_secs(2), async {
        loop {
            health.changed().await.unwrap();
            if matches!(*health.borrow(), SessionHealth::Unhealthy { .. }) {
                break;
            }
        }
    })
    .await;
    assert!(reported.is_ok(), "heartbeat failure was never surfaced");

    // The loop exited without re-arming.
    let n = stub.counters.heartbeats.load(Ordering::SeqCst);
    sleep(HEARTBEAT * 3).await;
    assert_eq!(stub.counters.heartbeats.load(Ordering::SeqCst), n);

    backend.shutdown().await;
}

#[tokio::test]
async fn failed_handshake_leaves_the_backend_reusable() {
    let stub = spawn_stub(None).await;
    let backend = RestBackend::new(RestConfig::for_testing(stub.addr.clone()));

    stub.behavior.handshake_http_500.store(true, Ordering::SeqCst);
    let err = backend.initialize(&AppInfo::new("t", "t")).await.unwrap_err();
    assert!(matches!(err, Error::Init { .. }));
    assert!(backend.session().is_none());

    // The timer was never armed.
    sleep(HEARTBEAT * 2).await;
    assert_eq!(stub.counters.heartbeats.load(Ordering::SeqCst), 0);

    stub.behavior.handshake_http_500.store(false, Ordering::SeqCst);
    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();
    backend.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_ticks_without_a_teardown_request() {
    let stub = spawn_stub(None).await;
    let backend = RestBackend::new(RestConfig::for_testing(stub.addr.clone()));
    backend.initialize(&AppInfo::new("t", "t")).await.unwrap();

    sleep(HEARTBEAT * 3 / 2).await;
    assert!(stub.counters.heartbeats.load(Ordering::SeqCst) >= 1);

    backend.shutdown().await;
    let n = stub.counters.heartbeats.load(Ordering::SeqCst);
    sleep(HEARTBEAT * 3).await;
    assert_eq!(stub.counters.heartbeats.load(Ordering::SeqCst), n);
    assert_eq!(stub.counters.teardowns.load(Ordering::SeqCst), 0);

    backend.shutdown().await;
    let err = backend.create_effect(&static_keyboard(Color::RED)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
}
