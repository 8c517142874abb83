use std::sync::Arc;
use std::time::Duration;

use centseek_core::schema::{SentimentLabel, SentimentSource};
use centseek_core::sentiment::{
    GatewayState, GeminiClient, HfClassifier, PolarityClassifier, SentimentError,
    SentimentGateway, TextGenerator,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";
const HF_PATH: &str = "/models/distilbert-base-uncased-finetuned-sst-2-english";
const GEMINI_KEY: &str = "gm-test-key-4411";
const HF_TOKEN: &str = "hf-test-token-9932";

fn gemini(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        server.uri(),
        "gemini-2.0-flash",
        GEMINI_KEY,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn hf(server: &MockServer) -> HfClassifier {
    HfClassifier::new(
        server.uri(),
        "distilbert-base-uncased-finetuned-sst-2-english",
        HF_TOKEN,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn gateway(server: &MockServer, timeout: Duration) -> SentimentGateway {
    SentimentGateway::new(
        Some(Arc::new(gemini(server))),
        Some(Arc::new(hf(server))),
        timeout,
    )
}

fn candidate(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

async fn mount_hf_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(HF_PATH))
        .and(header("authorization", format!("Bearer {HF_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[
            {"label": "POSITIVE", "score": 0.93},
            {"label": "NEGATIVE", "score": 0.07}
        ]])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_gemini_sends_key_in_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", GEMINI_KEY))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "How is the economy?" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
            "  Growth is steady and consumers are optimistic.  ",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let text = gemini(&server).generate("How is the economy?").await.unwrap();
    assert_eq!(text, "Growth is steady and consumers are optimistic.");
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = gemini(&server).generate("q").await.unwrap_err();
    assert!(matches!(err, SentimentError::Parse(_)));
}

#[tokio::test]
async fn test_hf_picks_highest_score() {
    let server = MockServer::start().await;
    mount_hf_ok(&server).await;

    let p = hf(&server).classify("Growth is steady.").await.unwrap();
    assert_eq!(p.label, SentimentLabel::Positive);
    assert_eq!(p.score, 0.93);
}

#[tokio::test]
async fn test_primary_path_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate("Growth is steady and hiring is strong.")),
        )
        .mount(&server)
        .await;
    mount_hf_ok(&server).await;

    let (r, trail) = gateway(&server, Duration::from_secs(5))
        .get_sentiment_traced("Summarize the economy.")
        .await;
    assert_eq!(r.source, SentimentSource::Primary);
    assert_eq!(r.label, SentimentLabel::Positive);
    assert_eq!(r.score, 0.93);
    assert_eq!(r.raw_text, "Growth is steady and hiring is strong.");
    assert_eq!(
        trail,
        vec![
            GatewayState::Idle,
            GatewayState::RequestingPrimary,
            GatewayState::Succeeded
        ]
    );
}

#[tokio::test]
async fn test_http_failures_fall_back_without_leaking_key() {
    for (status, expected) in [
        (401, SentimentError::Auth(401)),
        (429, SentimentError::Quota),
        (500, SentimentError::Status(500)),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(format!(
                "{{\"error\": \"rejected key {GEMINI_KEY}\"}}"
            )))
            .mount(&server)
            .await;
        mount_hf_ok(&server).await;

        let r = gateway(&server, Duration::from_secs(5))
            .get_sentiment("recession and layoffs")
            .await;
        assert_eq!(r.source, SentimentSource::Fallback, "status {status}");
        assert_eq!(r.label, SentimentLabel::Negative);
        assert_eq!(r.raw_text, "recession and layoffs");

        let reason = r.fallback_reason.unwrap();
        assert_eq!(reason, expected.to_string());
        assert!(!reason.contains(GEMINI_KEY));
        assert!(!reason.contains(HF_TOKEN));
    }
}

#[tokio::test]
async fn test_classifier_outage_classifies_generated_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate("Inflation fears and weak demand persist.")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HF_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let r = gateway(&server, Duration::from_secs(5))
        .get_sentiment("q")
        .await;
    assert_eq!(r.source, SentimentSource::Fallback);
    assert_eq!(r.label, SentimentLabel::Negative);
    assert_eq!(r.raw_text, "Inflation fears and weak demand persist.");
    assert_eq!(r.fallback_reason.as_deref(), Some("unexpected HTTP status 503"));
}

#[tokio::test]
async fn test_slow_primary_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_hf_ok(&server).await;

    let r = gateway(&server, Duration::from_millis(200))
        .get_sentiment("Summarize the economy.")
        .await;
    assert_eq!(r.source, SentimentSource::Fallback);
    assert_eq!(r.raw_text, "Summarize the economy.");
    assert!(r.fallback_reason.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_unreachable_host_falls_back() {
    let gen = GeminiClient::new(
        "http://127.0.0.1:1",
        "gemini-2.0-flash",
        GEMINI_KEY,
        Duration::from_secs(2),
    )
    .unwrap();
    let gw = SentimentGateway::new(Some(Arc::new(gen)), None, Duration::from_secs(3));

    let r = gw.get_sentiment("stable outlook").await;
    assert_eq!(r.source, SentimentSource::Fallback);
    let reason = r.fallback_reason.unwrap();
    assert!(reason.starts_with("network error"), "{reason}");
    assert!(!reason.contains(GEMINI_KEY));
}
