//! End-to-end flow tests for the metric sidecar.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use metric_sidecar::{AgentConfig, InstrumentRegistry, SidecarServer};

/// Mock model server: echoes `value` from the request body as a prediction,
/// after an optional `delay_ms`.
async fn start_mock_model_server() -> SocketAddr {
    let app = Router::new()
        .route(
            "/v1/predict",
            post(|Json(body): Json<serde_json::Value>| async move {
                let value = body.get("value").cloned().unwrap_or(json!(0.495));
                let delay = body.get("delay_ms").and_then(|d| d.as_u64()).unwrap_or(0);
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Json(json!({ "predictions": [[value]] }))
            }),
        )
        .route(
            "/v1/fail",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "predictions": [[1.0]] })),
                )
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn start_sidecar(upstream: SocketAddr, rules: &str) -> (SocketAddr, Arc<InstrumentRegistry>) {
    let mut config: AgentConfig = toml::from_str(rules).unwrap();
    config.upstream.address = upstream.to_string();

    let instruments = Arc::new(InstrumentRegistry::from_config(&config.rules));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = SidecarServer::new(config, instruments.clone());
    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });
    (addr, instruments)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Value of a `<name>_sum{<labels>}` sample in the exposition text.
fn sample_value(exposition: &str, sample: &str) -> Option<f64> {
    exposition
        .lines()
        .find(|line| line.starts_with(sample))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

const RULES: &str = r#"
[[input_metrics]]
name = "request_count"
simple_counter = {}

[[context_labels_from_input]]
label_key = { static_value = "Model" }
label_value = { parsed_value = { field_path = ".model", parsed_type = "string" } }

[[output_metrics]]
name = "output_values"
value = { value = { parsed_value = { field_path = ".predictions[0][0]", parsed_type = "float" } } }
"#;

#[tokio::test]
async fn test_predict_flow_records_request_and_response_metrics() {
    let upstream = start_mock_model_server().await;
    let (proxy, instruments) = start_sidecar(upstream, RULES).await;

    let response = client()
        .post(format!("http://{proxy}/v1/predict"))
        .json(&json!({ "model": "toxicity_v3", "value": 0.495 }))
        .send()
        .await
        .expect("sidecar unreachable");

    // The proxied response is unchanged.
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "predictions": [[0.495]] }));

    // Context label keys are part of every instrument's identity, so the
    // request counter carries the Model label too.
    let text = instruments.encode_text();
    assert!(
        text.contains(r#"request_count{Model="toxicity_v3"} 1"#),
        "missing request counter in: {text}"
    );
    assert_eq!(
        sample_value(&text, r#"output_values_sum{Model="toxicity_v3"}"#),
        Some(0.495),
        "missing correlated output sample in: {text}"
    );
}

#[tokio::test]
async fn test_concurrent_requests_keep_context_labels_apart() {
    let upstream = start_mock_model_server().await;
    let (proxy, instruments) = start_sidecar(upstream, RULES).await;

    // The slow request's response completes after the fast one's, so a
    // shared-stack correlator would hand each response the other's labels.
    let slow = client()
        .post(format!("http://{proxy}/v1/predict"))
        .json(&json!({ "model": "slow_model", "value": 0.1, "delay_ms": 300 }));
    let fast = client()
        .post(format!("http://{proxy}/v1/predict"))
        .json(&json!({ "model": "fast_model", "value": 0.9 }));

    let slow_task = tokio::spawn(slow.send());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let fast_task = tokio::spawn(fast.send());

    assert_eq!(fast_task.await.unwrap().unwrap().status(), 200);
    assert_eq!(slow_task.await.unwrap().unwrap().status(), 200);

    let text = instruments.encode_text();
    assert_eq!(
        sample_value(&text, r#"output_values_sum{Model="slow_model"}"#),
        Some(0.1),
        "slow request lost its own context labels: {text}"
    );
    assert_eq!(
        sample_value(&text, r#"output_values_sum{Model="fast_model"}"#),
        Some(0.9),
        "fast request lost its own context labels: {text}"
    );
}

#[tokio::test]
async fn test_malformed_request_body_is_forwarded_without_metrics() {
    let upstream = start_mock_model_server().await;
    let (proxy, instruments) = start_sidecar(upstream, RULES).await;

    let response = client()
        .post(format!("http://{proxy}/v1/predict"))
        .header("content-type", "application/json")
        .body("{\"truncated")
        .send()
        .await
        .unwrap();

    // The upstream rejects the malformed JSON; the sidecar records nothing
    // and stays out of the way.
    assert_ne!(response.status(), 502);
    let text = instruments.encode_text();
    assert!(
        !text.contains("request_count{"),
        "malformed body must not count: {text}"
    );
}

#[tokio::test]
async fn test_failed_response_records_no_output_metrics() {
    let upstream = start_mock_model_server().await;
    let (proxy, instruments) = start_sidecar(upstream, RULES).await;

    let response = client()
        .post(format!("http://{proxy}/v1/fail"))
        .json(&json!({ "model": "toxicity_v3" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let text = instruments.encode_text();
    assert!(
        text.contains(r#"request_count{Model="toxicity_v3"} 1"#),
        "request still counts: {text}"
    );
    assert!(
        sample_value(&text, r#"output_values_sum{Model="toxicity_v3"}"#).is_none(),
        "5xx response must not record output metrics: {text}"
    );
}

#[tokio::test]
async fn test_scrape_endpoint_serves_exposition_format() {
    let upstream = start_mock_model_server().await;
    let (proxy, instruments) = start_sidecar(upstream, RULES).await;

    let metrics_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_addr = metrics_listener.local_addr().unwrap();
    let exposition_instruments = instruments.clone();
    tokio::spawn(async move {
        metric_sidecar::observability::exposition::serve(metrics_listener, exposition_instruments)
            .await
            .unwrap();
    });

    client()
        .post(format!("http://{proxy}/v1/predict"))
        .json(&json!({ "model": "m", "value": 0.5 }))
        .send()
        .await
        .unwrap();

    let scrape = client()
        .get(format!("http://{metrics_addr}/metrics"))
        .send()
        .await
        .expect("metrics endpoint unreachable");

    assert_eq!(scrape.status(), 200);
    let content_type = scrape
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let text = scrape.text().await.unwrap();
    assert!(text.contains("# TYPE request_count counter"), "bad exposition: {text}");
    assert!(text.contains("# TYPE output_values histogram"), "bad exposition: {text}");
}
