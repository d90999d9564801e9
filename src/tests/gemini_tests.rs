use crate::gemini::{AnalysisError, GeminiClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/test-model:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(server.uri(), "test-key", "test-model")
}

fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

#[tokio::test]
async fn test_analyze_text_parses_structured_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(text_response(
            r#"{"summary": "Mild anemia", "diagnosis": "Iron deficiency", "key_findings": ["Low ferritin"]}"#,
        ))
        .mount(&server)
        .await;

    let result = client(&server)
        .analyze_text("Ferritin 8 ng/mL, haemoglobin 10.1 g/dL")
        .await
        .unwrap();

    assert_eq!(result.summary.as_deref(), Some("Mild anemia"));
    assert_eq!(result.diagnosis.as_deref(), Some("Iron deficiency"));
    assert_eq!(result.key_findings, Some(vec!["Low ferritin".to_string()]));
    assert!(result.urgent_concerns.is_none());
}

#[tokio::test]
async fn test_analyze_text_tolerates_fenced_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(text_response(
            "Here is the analysis:\n```json\n{\"summary\": \"Normal scan\"}\n```",
        ))
        .mount(&server)
        .await;

    let result = client(&server).analyze_text("CT scan unremarkable").await.unwrap();
    assert_eq!(result.summary.as_deref(), Some("Normal scan"));
}

#[tokio::test]
async fn test_analyze_text_preserves_unknown_keys() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(text_response(
            r#"{"summary": "ok", "follow_up_interval": "6 months"}"#,
        ))
        .mount(&server)
        .await;

    let result = client(&server).analyze_text("some report").await.unwrap();
    assert_eq!(
        result.extra.get("follow_up_interval").and_then(|v| v.as_str()),
        Some("6 months")
    );
}

#[tokio::test]
async fn test_analyze_text_rejects_empty_input() {
    let server = MockServer::start().await;
    let err = client(&server).analyze_text("   \n  ").await.unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyInput));
}

#[tokio::test]
async fn test_blocked_prompt_surfaces_reason_and_ratings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "safetyRatings": [{"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "probability": "HIGH"}]
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server).analyze_text("some report").await.unwrap_err();
    match &err {
        AnalysisError::Blocked { reason, .. } => assert_eq!(reason, "SAFETY"),
        other => panic!("expected Blocked, got {:?}", other),
    }
    assert!(err.safety_ratings().is_some());
    assert!(err.details()["safety_ratings"].is_array());
}

#[tokio::test]
async fn test_stopped_generation_reports_finish_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).analyze_text("some report").await.unwrap_err();
    match err {
        AnalysisError::Stopped { reason, .. } => assert_eq!(reason, "MAX_TOKENS"),
        other => panic!("expected Stopped, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unparseable_reply_carries_raw_snippet() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(text_response("I cannot analyze this document, sorry."))
        .mount(&server)
        .await;

    let err = client(&server).analyze_text("some report").await.unwrap_err();
    match err {
        AnalysisError::Parse(failure) => {
            assert!(failure.raw_text_snippet.contains("cannot analyze"));
        }
        other => panic!("expected Parse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = client(&server).analyze_text("some report").await.unwrap_err();
    match err {
        AnalysisError::Api(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("expected Api, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_returns_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(text_response("MRI stands for magnetic resonance imaging."))
        .mount(&server)
        .await;

    let reply = client(&server).chat("What does MRI stand for?").await.unwrap();
    assert_eq!(reply, "MRI stands for magnetic resonance imaging.");
}

#[tokio::test]
async fn test_chat_concatenates_multiple_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "First half. "}, {"text": "Second half."}]},
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let reply = client(&server).chat("hello").await.unwrap();
    assert_eq!(reply, "First half. Second half.");
}
