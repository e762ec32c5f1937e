use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use casebrief::llm::fake::FakeGenerativeClient;
use casebrief::pipeline::LegacyRecord;
use casebrief::test_utils::init_test_logging;
use casebrief::AppState;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "casebrief-test-boundary";

/// Create a test app backed by a scripted fake client
fn app(client: Arc<FakeGenerativeClient>) -> Router {
    let app_state = Arc::new(AppState::new_for_testing(client));
    casebrief::app::routes(app_state)
}

fn multipart_request(field_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field_name}\"; filename=\"cases.csv\"\r\n\
         Content-Type: text/csv\r\n\
         \r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    init_test_logging();
    let router = app(Arc::new(FakeGenerativeClient::new()));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_upload_returns_legacy_records() {
    init_test_logging();
    let client = Arc::new(FakeGenerativeClient::new().with_texts(vec![
        "Burglary at a residence on 5th Ave.",
        "Priority Level: Medium\nReasoning: No injuries reported.",
        "Armed robbery at a gas station.",
        "Priority Level: High\nReasoning: Weapon involved.",
    ]));
    let router = app(client.clone());

    let csv = "Case ID,Description\n\
               1,Burglary at 5th Ave\n\
               ,\n\
               3,Armed robbery";
    let response = router
        .oneshot(multipart_request("file", csv))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let records: Vec<LegacyRecord> =
        serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(
        records,
        vec![
            LegacyRecord {
                case_no: 1,
                summary: "Burglary at a residence on 5th Ave.".to_string(),
                priority:
                    "Priority Level: Medium\nReasoning: No injuries reported."
                        .to_string(),
            },
            LegacyRecord {
                case_no: 3,
                summary: "Armed robbery at a gas station.".to_string(),
                priority: "Priority Level: High\nReasoning: Weapon involved."
                    .to_string(),
            },
        ]
    );
    assert_eq!(client.prompts().len(), 4);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    init_test_logging();
    let client = Arc::new(FakeGenerativeClient::new());
    let router = app(client.clone());

    let response = router
        .oneshot(multipart_request("attachment", "a,b\n1,2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "No file uploaded"})
    );
    assert!(client.prompts().is_empty());
}

#[tokio::test]
async fn test_upload_malformed_csv() {
    init_test_logging();
    let client = Arc::new(FakeGenerativeClient::new());
    let router = app(client.clone());

    let response = router
        .oneshot(multipart_request("file", "a,b\n1,2,3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Malformed CSV row 1"));
    assert!(client.prompts().is_empty());
}

#[tokio::test]
async fn test_not_found() {
    init_test_logging();
    let router = app(Arc::new(FakeGenerativeClient::new()));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// Upload through a real socket with a reqwest multipart form
#[tokio::test]
async fn test_upload_with_real_server() {
    init_test_logging();
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = Arc::new(
        FakeGenerativeClient::new()
            .with_error("rate limit exceeded (HTTP 429 Too Many Requests)")
            .with_text("Priority Level: Low"),
    );
    let router = app(client);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let part = reqwest::multipart::Part::bytes(
        b"Description,Location\nShoplifting,Main St\n".to_vec(),
    )
    .file_name("cases.csv")
    .mime_str("text/csv")
    .unwrap();
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = reqwest::Client::new()
        .post(format!("http://{}/upload", addr))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let records: Vec<LegacyRecord> = response.json().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].summary,
        "Error generating summary: rate limit exceeded (HTTP 429 Too Many Requests)"
    );
    assert_eq!(records[0].priority, "Priority Level: Low");
}
