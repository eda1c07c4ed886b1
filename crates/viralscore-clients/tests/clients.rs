//! Integration tests for the collaborator clients using wiremock HTTP mocks.

use viralscore_clients::{ClientError, GraderClient, LedgerClient, MediaClient};
use viralscore_core::SubScores;
use viralscore_engine::{
    CollaboratorError, CreditLedger, DurationProbe, FrameExtractor, FrameScorer, FrameVerdict,
};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn media(base_url: &str) -> MediaClient {
    MediaClient::new(base_url, 5).expect("client construction should not fail")
}

fn grader(base_url: &str) -> GraderClient {
    GraderClient::new(base_url, 5).expect("client construction should not fail")
}

fn ledger(base_url: &str) -> LedgerClient {
    LedgerClient::new(base_url, 5).expect("client construction should not fail")
}

// ---------------------------------------------------------------------------
// media
// ---------------------------------------------------------------------------

#[tokio::test]
async fn probe_returns_duration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/probe"))
        .and(query_param("video_url", "https://cdn.example/v/1.mp4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "duration_seconds": 183.4 })),
        )
        .mount(&server)
        .await;

    let duration = media(&server.uri())
        .probe("https://cdn.example/v/1.mp4")
        .await
        .expect("probe should succeed");

    assert!((duration - 183.4).abs() < f64::EPSILON);
}

#[tokio::test]
async fn probe_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/probe"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = media(&server.uri())
        .probe("https://cdn.example/v/1.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, CollaboratorError::Transient { service: "media", .. }));
}

#[tokio::test]
async fn extract_posts_timestamps_and_parses_frames() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/frames"))
        .and(body_json(serde_json::json!({
            "video_url": "https://cdn.example/v/1.mp4",
            "timestamps": [0.5, 5.0]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "frames": [
                { "frame_index": 0, "timestamp": 0.5, "image_ref": "s3://frames/1/0.jpg" },
                { "frame_index": 1, "timestamp": 5.0, "image_ref": "s3://frames/1/1.jpg" }
            ]
        })))
        .mount(&server)
        .await;

    let frames = media(&server.uri())
        .extract("https://cdn.example/v/1.mp4", &[0.5, 5.0])
        .await
        .expect("extract should succeed");

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].frame_index, 1);
    assert_eq!(frames[1].image_ref, "s3://frames/1/1.jpg");
}

#[tokio::test]
async fn extract_bad_request_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/frames"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported codec"))
        .mount(&server)
        .await;

    let err = media(&server.uri())
        .extract("https://cdn.example/v/1.mp4", &[1.0])
        .await
        .unwrap_err();

    match err {
        CollaboratorError::Rejected { service, message } => {
            assert_eq!(service, "media");
            assert!(message.contains("unsupported codec"), "{message}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_probe_body_is_a_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/probe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"seconds\": 3}"))
        .mount(&server)
        .await;

    let err = media(&server.uri())
        .probe_duration("https://cdn.example/v/1.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Deserialize { .. }));
}

// ---------------------------------------------------------------------------
// grader
// ---------------------------------------------------------------------------

#[tokio::test]
async fn grade_returns_clamped_sub_scores() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/grade"))
        .and(body_json(serde_json::json!({ "image_ref": "s3://frames/1/0.jpg" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "composition": 88,
            "color_grading": 120,
            "lighting": 70,
            "emotional_impact": -3,
            "technical_quality": 90,
            "narrative_value": 65
        })))
        .mount(&server)
        .await;

    let verdict = grader(&server.uri()).score("s3://frames/1/0.jpg").await;

    assert_eq!(
        verdict,
        FrameVerdict::Scored(SubScores {
            composition: 88,
            color_grading: 100,
            lighting: 70,
            emotional_impact: 0,
            technical_quality: 90,
            narrative_value: 65,
        })
    );
}

#[tokio::test]
async fn low_confidence_grade_needs_review() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/grade"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "composition": 50,
            "color_grading": 50,
            "lighting": 50,
            "emotional_impact": 50,
            "technical_quality": 50,
            "narrative_value": 50,
            "low_confidence": true,
            "reason": "frame is mostly black"
        })))
        .mount(&server)
        .await;

    let verdict = grader(&server.uri()).score("img").await;

    assert_eq!(
        verdict,
        FrameVerdict::NeedsReview {
            reason: "frame is mostly black".to_string()
        }
    );
}

#[tokio::test]
async fn grader_errors_carry_retriability() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/grade"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let verdict = grader(&server.uri()).score("img").await;
    assert!(matches!(verdict, FrameVerdict::Failed { retriable: true, .. }));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/grade"))
        .respond_with(ResponseTemplate::new(422).set_body_string("image not found"))
        .mount(&server)
        .await;
    let verdict = grader(&server.uri()).score("img").await;
    assert!(matches!(verdict, FrameVerdict::Failed { retriable: false, .. }));
}

// ---------------------------------------------------------------------------
// ledger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apply_delta_posts_signed_delta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users/42/deltas"))
        .and(body_json(serde_json::json!({ "delta": -80 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "balance": 20 })))
        .expect(1)
        .mount(&server)
        .await;

    let balance = ledger(&server.uri())
        .apply_delta(42, -80)
        .await
        .expect("delta should apply");

    assert_eq!(balance, 20);
}

#[tokio::test]
async fn balance_reads_current_balance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/7/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "balance": 110 })))
        .mount(&server)
        .await;

    assert_eq!(ledger(&server.uri()).balance(7).await.unwrap(), 110);
}

#[tokio::test]
async fn unknown_user_is_rejected_by_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users/9/deltas"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
        .mount(&server)
        .await;

    let err = ledger(&server.uri()).apply_delta(9, 30).await.unwrap_err();

    assert!(matches!(err, CollaboratorError::Rejected { service: "ledger", .. }));
}

#[tokio::test]
async fn base_url_with_path_prefix_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ledger/v1/users/1/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "balance": 5 })))
        .mount(&server)
        .await;

    let client = ledger(&format!("{}/ledger/", server.uri()));
    assert_eq!(client.get_balance(1).await.unwrap(), 5);
}
