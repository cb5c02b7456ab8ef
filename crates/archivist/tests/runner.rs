//! Story runner tests against a mock service.

use std::time::{Duration, Instant};

use archivist::{ArchivistClient, Error, Runner, Story};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_client(server: &MockServer) -> ArchivistClient {
    ArchivistClient::builder(format!("http://127.0.0.1:{}", server.address().port()))
        .with_bearer_token("test-token")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_story_binds_asset_labels_across_steps() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets"))
        .and(body_json(json!({
            "behaviours": ["RecordEvidence"],
            "attributes": {"arc_display_name": "Front door"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identity": "assets/a1",
            "confirmation_status": "PENDING"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The event step addresses the asset created under the label.
    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets/a1/events"))
        .and(body_json(json!({
            "operation": "Record",
            "behaviour": "RecordEvidence",
            "event_attributes": {"arc_description": "Door opened"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identity": "assets/a1/events/e1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/archivist/v2/assets"))
        .and(header("x-request-total-count", "true"))
        .and(query_param("attributes.arc_display_name", "Front door"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total-count", "1")
                .set_body_json(json!({"assets": [{"identity": "assets/a1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let story = Story::from_yaml(
        r#"
steps:
  - step:
      action: ASSETS_CREATE
      description: Create the door asset
      asset_label: front door
    behaviours:
      - RecordEvidence
    attributes:
      arc_display_name: Front door
  - step:
      action: EVENTS_CREATE
      description: Record an opening
      asset_label: front door
    operation: Record
    behaviour: RecordEvidence
    event_attributes:
      arc_description: Door opened
  - step:
      action: ASSETS_COUNT
      description: Count the doors
    attributes:
      arc_display_name: Front door
"#,
    )
    .unwrap();

    let mut runner = Runner::new(mock_client(&server));
    runner.run(&story).await.unwrap();
}

#[tokio::test]
async fn test_story_with_an_unknown_action_fails_without_requests() {
    let server = MockServer::start().await;

    let story = Story::from_yaml(
        r#"
steps:
  - step:
      action: ASSETS_TELEPORT
"#,
    )
    .unwrap();

    let mut runner = Runner::new(mock_client(&server));
    let err = runner.run(&story).await.unwrap_err();

    match err {
        Error::InvalidOperation { action } => assert_eq!(action, "ASSETS_TELEPORT"),
        other => panic!("expected InvalidOperation, got {other:?}"),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_event_step_without_a_bound_label_fails() {
    let server = MockServer::start().await;

    let story = Story::from_yaml(
        r#"
steps:
  - step:
      action: EVENTS_CREATE
      asset_label: never created
    operation: Record
"#,
    )
    .unwrap();

    let mut runner = Runner::new(mock_client(&server));
    let err = runner.run(&story).await.unwrap_err();

    match err {
        Error::IllegalArgument { message } => assert!(message.contains("never created")),
        other => panic!("expected IllegalArgument, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_time_delays_the_step() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/archivist/v2/locations"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total-count", "0")
                .set_body_json(json!({"locations": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let story = Story::from_yaml(
        r#"
steps:
  - step:
      action: LOCATIONS_COUNT
      wait_time: 0.05
"#,
    )
    .unwrap();

    let started = Instant::now();
    let mut runner = Runner::new(mock_client(&server));
    runner.run(&story).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_execution_stops_at_the_first_failing_step() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "quota",
            "message": "tenancy over limit"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let story = Story::from_yaml(
        r#"
steps:
  - step:
      action: ASSETS_CREATE
    attributes:
      arc_display_name: Front door
  - step:
      action: ASSETS_COUNT
"#,
    )
    .unwrap();

    let mut runner = Runner::new(mock_client(&server));
    let err = runner.run(&story).await.unwrap_err();

    assert!(matches!(err, Error::Forbidden { .. }));
    // Only the failing create reached the service.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
