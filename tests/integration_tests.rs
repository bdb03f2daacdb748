use congestion_data::analysis::{DEFAULT_ALPHA, DEFAULT_CUTOFF, compare_column, summarize};
use congestion_data::fetch::{self, BasicClient, DatasetRequest, auth::{ApiKey, UrlParam}, blocking};
use congestion_data::parser::parse_table;
use congestion_data::stats::TableStats;
use congestion_data::table::Value;
use serde_json::json;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATASET_PATH: &str = "/resource/7ym2-wayt.json";

fn request_for(server: &MockServer) -> DatasetRequest {
    DatasetRequest::new(&format!("{}{}", server.uri(), DATASET_PATH)).unwrap()
}

/// Collects formatted log output so tests can count diagnostics.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn subscriber_for(
    logs: &CapturedLogs,
    level: tracing::Level,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(level)
        .finish()
}

fn capture_errors() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing::subscriber::set_default(subscriber_for(&logs, tracing::Level::ERROR));
    (logs, guard)
}

#[tokio::test]
async fn test_sparse_records_become_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"a": "1", "b": "2"},
            {"a": "3"}
        ])))
        .mount(&server)
        .await;

    let table = fetch::fetch_dataset(&BasicClient::new(), &request_for(&server))
        .await
        .expect("fetch should succeed");

    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1, "a"), Some(&Value::Text("3".to_string())));
    assert!(table.get(1, "b").is_none());
}

#[tokio::test]
async fn test_limit_is_sent_as_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASET_PATH))
        .and(query_param("$limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": "1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let req = request_for(&server).with_limit(NonZeroUsize::new(25).unwrap());
    let table = fetch::fetch_dataset(&BasicClient::new(), &req).await;

    assert_eq!(table.map(|t| t.len()), Some(1));
}

#[tokio::test]
async fn test_default_limit_is_1000() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("$limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let table = fetch::fetch_dataset(&BasicClient::new(), &request_for(&server)).await;

    // an empty dataset is still a successful fetch
    assert!(table.is_some_and(|t| t.is_empty()));
}

#[tokio::test]
async fn test_row_count_matches_response() {
    let server = MockServer::start().await;
    let rows: Vec<_> = (0..40).map(|i| json!({"id": i.to_string()})).collect();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(&server)
        .await;

    let req = request_for(&server).with_limit(NonZeroUsize::new(50).unwrap());
    let table = fetch::fetch_dataset(&BasicClient::new(), &req).await.unwrap();

    assert_eq!(table.len(), 40);
}

#[tokio::test]
async fn test_http_error_returns_none_with_one_diagnostic() {
    let (logs, _guard) = capture_errors();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let table = fetch::fetch_dataset(&BasicClient::new(), &request_for(&server)).await;

    assert!(table.is_none());
    let output = logs.contents();
    assert_eq!(output.matches("Dataset fetch failed").count(), 1);
    assert!(output.contains("503"));
    assert!(output.contains("limit=1000"));
    assert!(output.contains(&format!("endpoint={}{}", server.uri(), DATASET_PATH)));
    assert!(output.contains("kind=\"http_status\""));
}

#[tokio::test]
async fn test_client_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("dataset.missing"))
        .mount(&server)
        .await;

    let result = fetch::try_fetch_dataset(&BasicClient::new(), &request_for(&server)).await;

    match result {
        Err(fetch::FetchError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(body, "dataset.missing");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_returns_none() {
    let (logs, _guard) = capture_errors();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[{\"a\": \"1\",,]"))
        .mount(&server)
        .await;

    let table = fetch::fetch_dataset(&BasicClient::new(), &request_for(&server)).await;

    assert!(table.is_none());
    assert_eq!(logs.contents().matches("Dataset fetch failed").count(), 1);
}

#[tokio::test]
async fn test_wrong_json_shape_is_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": true, "message": "bad query"})),
        )
        .mount(&server)
        .await;

    let result = fetch::try_fetch_dataset(&BasicClient::new(), &request_for(&server)).await;

    assert!(matches!(result, Err(fetch::FetchError::MalformedBody(_))));
}

#[tokio::test]
async fn test_connection_refused_returns_none() {
    // nothing listens on port 1
    let req = DatasetRequest::new("http://127.0.0.1:1/resource/7ym2-wayt.json").unwrap();

    let result = fetch::try_fetch_dataset(&BasicClient::new(), &req).await;
    assert!(matches!(result, Err(fetch::FetchError::Network(_))));

    assert!(fetch::fetch_dataset(&BasicClient::new(), &req).await.is_none());
}

#[tokio::test]
async fn test_repeated_fetch_is_row_count_stable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"a": "1"}, {"a": "2"}, {"a": "3"}
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let client = BasicClient::new();
    let req = request_for(&server);
    let first = fetch::fetch_dataset(&client, &req).await.unwrap();
    let second = fetch::fetch_dataset(&client, &req).await.unwrap();

    assert_eq!(first.len(), second.len());
}

#[tokio::test]
async fn test_app_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-App-Token", "secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": "1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiKey::app_token(BasicClient::new(), "secret-token").unwrap();
    let table = fetch::fetch_dataset(&client, &request_for(&server)).await;

    assert!(table.is_some());
}

#[tokio::test]
async fn test_app_token_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("$$app_token", "secret-token"))
        .and(query_param("$limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": "1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = UrlParam::app_token(BasicClient::new(), "secret-token".to_string());
    let table = fetch::fetch_dataset(&client, &request_for(&server)).await;

    assert_eq!(table.map(|t| t.len()), Some(1));
}

#[tokio::test]
async fn test_boxed_client_from_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-App-Token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = fetch::client_with_token(Some("abc")).unwrap();
    assert!(fetch::fetch_dataset(&client, &request_for(&server)).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("$limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"a": "1", "b": "2"},
            {"a": "3"}
        ])))
        .mount(&server)
        .await;

    let req = request_for(&server).with_limit(NonZeroUsize::new(2).unwrap());
    let table = std::thread::spawn(move || blocking::fetch_dataset(&req))
        .join()
        .unwrap()
        .expect("blocking fetch should succeed");

    assert_eq!(table.len(), 2);
    assert!(table.get(1, "b").is_none());
}

#[test]
fn test_full_pipeline() {
    let bytes = include_bytes!("fixtures/traffic_volume.json");
    let table = parse_table(bytes).expect("Failed to parse fixture");
    let stats = TableStats::from_table(&table);

    assert_eq!(stats.total_rows, 8);
    assert!(stats.sparse_columns().any(|c| c.name == "speed"));

    let volume = compare_column(&table, "date", "vol", DEFAULT_CUTOFF, DEFAULT_ALPHA).unwrap();
    assert_eq!(volume.before_count, 4);
    assert_eq!(volume.after_count, 4);
    assert!(volume.change_pct() < 0.0);
    assert!(volume.result.significant);

    let speed = compare_column(&table, "date", "speed", DEFAULT_CUTOFF, DEFAULT_ALPHA).unwrap();
    assert_eq!(speed.before_count, 3);
    assert_eq!(speed.after_count, 3);

    let summary = summarize(&[volume, speed]);
    assert_eq!(summary.positive_changes, 1);
    assert_eq!(summary.negative_changes, 1);
    assert_eq!(summary.top_improvements[0].0, "speed");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_fetch_logs_parse_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": "1"}])))
        .mount(&server)
        .await;

    let req = request_for(&server);
    let logs = CapturedLogs::default();
    let subscriber = subscriber_for(&logs, tracing::Level::DEBUG);
    let table = std::thread::spawn(move || {
        tracing::subscriber::with_default(subscriber, || blocking::fetch_dataset(&req))
    })
    .join()
    .unwrap();

    assert_eq!(table.map(|t| t.len()), Some(1));
    let output = logs.contents();
    assert!(output.contains("Response received, parsing"));
    assert!(output.contains("Dataset parsed"));
    assert!(output.contains("limit=1000"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_fetch_status_error() {
    let server = MockServer::start().await;
    let body = "x".repeat(500);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .mount(&server)
        .await;

    let req = request_for(&server);
    let logs = CapturedLogs::default();
    let subscriber = subscriber_for(&logs, tracing::Level::ERROR);
    let (typed, soft) = std::thread::spawn(move || {
        tracing::subscriber::with_default(subscriber, || {
            (blocking::try_fetch_dataset(&req), blocking::fetch_dataset(&req))
        })
    })
    .join()
    .unwrap();

    match typed {
        Err(fetch::FetchError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body.len(), 200);
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(soft.is_none());
    assert_eq!(logs.contents().matches("Dataset fetch failed").count(), 1);
}
