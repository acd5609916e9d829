use std::time::Duration;

use leadflow::{ApiError, ApiSettings, Config, HttpLeadApi, LeadApi, LeadStatus};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let _ = env_logger::builder().is_test(true).try_init();
    Config {
        api_url: server.uri(),
        auth_token: Some("test-token".to_string()),
        undo_window_secs: 60,
    }
}

#[tokio::test]
async fn my_pending_parses_the_lead_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/my-pending"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "leads": [
                {
                    "_id": "665f1a2b3c4d5e6f70818283",
                    "status": "pending",
                    "assignedTo": "664a0b1c2d3e4f5061728394",
                    "fileName": "may-batch.xlsx",
                    "data": {
                        "full name": "Dana Cohen",
                        "phone number": "p:054-1234567",
                        "city": "Haifa"
                    }
                }
            ]
        })))
        .mount(&server)
        .await;

    let api = HttpLeadApi::from_config(&config_for(&server)).expect("client");
    let leads = api.fetch_my_pending().await.expect("fetch ok");

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id, "665f1a2b3c4d5e6f70818283");
    assert_eq!(leads[0].status, LeadStatus::Pending);
    assert_eq!(leads[0].display_name(), Some("Dana Cohen"));
    assert_eq!(leads[0].display_phone().as_deref(), Some("054-1234567"));
}

#[tokio::test]
async fn my_pending_without_leads_field_reads_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/my-pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let api = HttpLeadApi::from_config(&config_for(&server)).expect("client");
    let leads = api.fetch_my_pending().await.expect("fetch ok");

    assert!(leads.is_empty());
}

#[tokio::test]
async fn update_status_patches_the_lead() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/files/status/lead-1"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_json(json!({ "status": "done" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpLeadApi::from_config(&config_for(&server)).expect("client");
    api.update_status("lead-1", LeadStatus::Done)
        .await
        .expect("patch ok");
}

#[tokio::test]
async fn forward_sends_one_batched_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/archive/forward-to-admin"))
        .and(body_json(json!({ "leadIds": ["a", "b", "c"] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpLeadApi::from_config(&config_for(&server)).expect("client");
    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    api.forward_to_admin(&ids).await.expect("forward ok");
}

#[tokio::test]
async fn server_rejection_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/my-pending"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mongo is down"))
        .mount(&server)
        .await;

    let api = HttpLeadApi::from_config(&config_for(&server)).expect("client");
    let err = api.fetch_my_pending().await.unwrap_err();

    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("mongo is down"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_server_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/my-pending"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({ "leads": [] })),
        )
        .mount(&server)
        .await;

    let settings = ApiSettings {
        request_timeout: Duration::from_millis(50),
        ..ApiSettings::default()
    };
    let api = HttpLeadApi::new(&config_for(&server), settings).expect("client");
    let err = api.fetch_my_pending().await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(ref e) if e.is_timeout()));
}

#[tokio::test]
async fn bad_base_url_is_rejected_up_front() {
    let config = Config {
        api_url: "not a url".to_string(),
        auth_token: None,
        undo_window_secs: 60,
    };

    assert!(matches!(
        HttpLeadApi::from_config(&config),
        Err(ApiError::Url(_))
    ));
}
