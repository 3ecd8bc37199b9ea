use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use kaldra_http::{
    mock, ClientOptions, KaldraClient, KaldraError, RemoteBackend, RequestDescriptor,
    ResilientClient, SignalFilters, TwRegime,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self::raw(status, body.to_string())
    }

    fn raw(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

async fn route_handler(State(state): State<MockState>, uri: Uri, body: String) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .requests
        .lock()
        .expect("request log mutex must not be poisoned")
        .push((uri.to_string(), body));

    let response = {
        let mut routes = state
            .routes
            .lock()
            .expect("route table mutex must not be poisoned");
        routes
            .get_mut(uri.path())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                MockResponse::json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"detail": "no mock response available"}),
                )
            })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (
        response.status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn requests(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    fn remote(&self, options: ClientOptions) -> RemoteBackend {
        RemoteBackend::new(&self.base_url, ResilientClient::new().with_options(options))
            .expect("test server url must be valid")
    }
}

async fn spawn_server(routes: Vec<(&str, Vec<MockResponse>)>) -> TestServer {
    let state = MockState::default();
    {
        let mut table = state.routes.lock().expect("fresh mutex");
        for (path, responses) in routes {
            table.insert(path.to_owned(), responses.into());
        }
    }

    let app = Router::new()
        .fallback(route_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        requests: state.requests,
        task,
    }
}

fn fast_options(max_retries: usize) -> ClientOptions {
    ClientOptions {
        timeout_ms: 1_000,
        max_retries,
        retry_backoff_ms: 1,
    }
}

fn engine_signal_body() -> JsonValue {
    json!({
        "archetype": "A07_RULER",
        "delta_state": "A07_05",
        "tw_regime": "STABLE",
        "kindra_distribution": [
            { "state_index": 4, "prob": 0.5 },
            { "state_index": 9, "prob": 0.3 }
        ],
        "bias_score": 0.12,
        "bias_label": "neutral",
        "narrative_risk": 0.08,
        "confidence": 0.91,
        "explanation": "Master Engine V2: OK",
        "meta_modifiers": {}
    })
}

fn signal_record(id: &str, domain: &str) -> JsonValue {
    json!({
        "id": id,
        "domain": domain,
        "title": format!("signal {id}"),
        "summary": "summary",
        "tw_regime": "CRITICAL",
        "confidence": 0.83,
        "created_at": "2025-01-15T10:00:00Z"
    })
}

const ENGINE: &str = "/engine/kaldra/signal";

#[tokio::test]
async fn generate_signal_succeeds_on_first_attempt() {
    let server = spawn_server(vec![(
        ENGINE,
        vec![MockResponse::json(StatusCode::OK, engine_signal_body())],
    )])
    .await;
    let remote = server.remote(fast_options(3));

    let signal = remote
        .generate_signal("  Central bank signals a pause  ")
        .await
        .expect("signal must succeed");

    assert_eq!(signal.archetype, "A07_RULER");
    assert_eq!(signal.tw_regime, TwRegime::Stable);
    assert_eq!(server.hits(), 1);

    let requests = server.requests();
    let sent: JsonValue = serde_json::from_str(&requests[0].1).expect("body must be json");
    assert_eq!(sent, json!({ "text": "Central bank signals a pause" }));
}

#[tokio::test]
async fn null_narrative_risk_is_accepted_without_retry() {
    let mut body = engine_signal_body();
    body["narrative_risk"] = JsonValue::Null;
    body["bias_label"] = JsonValue::Null;
    let server = spawn_server(vec![(
        ENGINE,
        vec![MockResponse::json(StatusCode::OK, body)],
    )])
    .await;
    let remote = server.remote(fast_options(3));

    let signal = remote
        .generate_signal("quiet session")
        .await
        .expect("null risk must decode");

    assert_eq!(signal.narrative_risk, None);
    assert_eq!(signal.bias_label, None);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn retries_failed_attempts_then_returns_later_payload() {
    let server = spawn_server(vec![(
        ENGINE,
        vec![
            MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"detail": "down"})),
            MockResponse::json(StatusCode::BAD_GATEWAY, json!({"detail": "gateway"})),
            MockResponse::json(StatusCode::OK, engine_signal_body()),
        ],
    )])
    .await;
    let remote = server.remote(fast_options(3));

    let signal = remote
        .generate_signal("text")
        .await
        .expect("third attempt must succeed");

    assert_eq!(signal.confidence, 0.91);
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn exhausting_retries_makes_exactly_max_retries_plus_one_attempts() {
    let server = spawn_server(vec![]).await;
    let remote = server.remote(fast_options(2));

    let err = remote
        .generate_signal("text")
        .await
        .expect_err("every attempt fails");

    match err {
        KaldraError::MaxRetriesExceeded { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, KaldraError::Http { status: 500, .. }));
        }
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn slow_attempts_are_cancelled_as_timeouts() {
    let slow = MockResponse::json(StatusCode::OK, engine_signal_body())
        .with_delay(Duration::from_millis(300));
    let server = spawn_server(vec![(ENGINE, vec![slow.clone(), slow])]).await;
    let remote = server.remote(ClientOptions {
        timeout_ms: 30,
        max_retries: 1,
        retry_backoff_ms: 1,
    });

    let err = remote
        .generate_signal("text")
        .await
        .expect_err("both attempts must time out");

    match err {
        KaldraError::MaxRetriesExceeded { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, KaldraError::Timeout { timeout_ms: 30 }));
        }
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn blank_text_fails_fast_without_network_attempts() {
    let server = spawn_server(vec![]).await;
    let remote = server
        .remote(fast_options(3))
        .with_signal_fallback(mock::kaldra_signal);

    let err = remote
        .generate_signal(" \t\n ")
        .await
        .expect_err("blank text must be rejected");

    assert!(matches!(err, KaldraError::InvalidInput(_)));
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn malformed_success_body_is_retried_as_decode_failure() {
    let server = spawn_server(vec![(
        ENGINE,
        vec![
            MockResponse::raw(StatusCode::OK, "{not json"),
            MockResponse::json(StatusCode::OK, engine_signal_body()),
        ],
    )])
    .await;
    let remote = server.remote(fast_options(1));

    remote
        .generate_signal("text")
        .await
        .expect("second attempt must decode");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn fallback_substitutes_only_after_exhaustion() {
    let server = spawn_server(vec![]).await;
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let remote = server
        .remote(fast_options(1))
        .with_signal_fallback(move |text| {
            counter.fetch_add(1, Ordering::SeqCst);
            mock::kaldra_signal(text)
        });

    let signal = remote
        .generate_signal("fallback please")
        .await
        .expect("fallback must recover");

    assert_eq!(signal.archetype, "UNSPECIFIED");
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn signals_sends_filters_as_query_string() {
    let server = spawn_server(vec![(
        "/signals",
        vec![MockResponse::json(
            StatusCode::OK,
            json!([signal_record("s1", "geo"), signal_record("s2", "geo")]),
        )],
    )])
    .await;
    let remote = server.remote(fast_options(0));

    let signals = remote
        .signals(&SignalFilters::default().domain("geo").limit(5))
        .await
        .expect("signals must load");

    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].regime(), Some(TwRegime::Critical));
    assert_eq!(server.requests()[0].0, "/signals?domain=geo&limit=5");
}

#[tokio::test]
async fn signals_without_filters_has_no_query_string() {
    let server = spawn_server(vec![(
        "/signals",
        vec![MockResponse::json(StatusCode::OK, json!([]))],
    )])
    .await;
    let remote = server.remote(fast_options(0));

    let signals = remote
        .signals(&SignalFilters::default())
        .await
        .expect("signals must load");

    assert!(signals.is_empty());
    assert_eq!(server.requests()[0].0, "/signals");
}

#[tokio::test]
async fn zero_limit_is_not_sent() {
    let server = spawn_server(vec![(
        "/signals",
        vec![
            MockResponse::json(StatusCode::OK, json!([])),
            MockResponse::json(StatusCode::OK, json!([])),
        ],
    )])
    .await;
    let remote = server.remote(fast_options(0));

    remote
        .signals(&SignalFilters::default().limit(0))
        .await
        .expect("signals must load");
    remote
        .signals(&SignalFilters::default().domain("alpha").limit(0))
        .await
        .expect("signals must load");

    let requests = server.requests();
    assert_eq!(requests[0].0, "/signals");
    assert_eq!(requests[1].0, "/signals?domain=alpha");
}

#[tokio::test]
async fn service_unavailable_is_retried_and_reported_as_unavailable() {
    let unavailable = || MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"detail": "down"}));
    let server = spawn_server(vec![("/signals", vec![unavailable(), unavailable()])]).await;
    let remote = server.remote(fast_options(1));

    let err = remote
        .signals(&SignalFilters::default())
        .await
        .expect_err("503 must fail");

    assert!(err.is_unavailable());
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn missing_signal_is_none_without_retry() {
    let server = spawn_server(vec![(
        "/signals/ghost",
        vec![MockResponse::json(StatusCode::NOT_FOUND, json!({"detail": "not found"}))],
    )])
    .await;
    let remote = server.remote(fast_options(3));

    let signal = remote
        .signal_by_id("ghost")
        .await
        .expect("404 is not an error");

    assert_eq!(signal, None);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn signal_with_events_loads_both_resources() {
    let server = spawn_server(vec![
        (
            "/signals/s1",
            vec![MockResponse::json(StatusCode::OK, signal_record("s1", "alpha"))],
        ),
        (
            "/story-events/by-signal/s1",
            vec![MockResponse::json(
                StatusCode::OK,
                json!([
                    {
                        "id": "e1",
                        "signal_id": "s1",
                        "text": "first beat",
                        "polarities": { "order": 0.4 },
                        "created_at": "2025-01-15T10:05:00Z"
                    }
                ]),
            )],
        ),
    ])
    .await;
    let remote = server.remote(fast_options(0));

    let details = remote
        .signal_with_events("s1")
        .await
        .expect("details must load");

    assert_eq!(details.signal.map(|s| s.id), Some("s1".to_owned()));
    assert_eq!(details.events.len(), 1);
    assert_eq!(details.events[0].text.as_deref(), Some("first beat"));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn health_passes_through_error_status_body() {
    let server = spawn_server(vec![(
        "/health/supabase",
        vec![MockResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "degraded", "supabase_connected": false, "message": "pool exhausted" }),
        )],
    )])
    .await;
    let remote = server.remote(fast_options(3));

    let health = remote.supabase_health().await;

    assert_eq!(health.status, "degraded");
    assert_eq!(health.message.as_deref(), Some("pool exhausted"));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn health_degrades_when_server_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind throwaway listener");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let client = KaldraClient::remote(format!("http://{address}"), fast_options(2))
        .expect("url must be valid");

    let health = client.supabase_health().await;

    assert_eq!(health.status, "error");
    assert!(!health.supabase_connected);
    assert_eq!(health.error.as_deref(), Some("Connection failed"));
}

#[tokio::test]
async fn call_accepts_custom_descriptor_and_headers() {
    let server = spawn_server(vec![(
        "/custom",
        vec![MockResponse::json(StatusCode::OK, json!({ "ok": true }))],
    )])
    .await;
    let client = ResilientClient::new().with_options(fast_options(0));
    let url = kaldra_http::endpoint_url(&server.base_url, ["custom"]).expect("url");
    let request = RequestDescriptor::post(url)
        .header("x-trace-id", "abc")
        .json(json!({ "k": 1 }));

    let body: JsonValue = client.call(&request, 0, 500).await.expect("call must succeed");

    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(server.requests()[0].1, r#"{"k":1}"#);
}
