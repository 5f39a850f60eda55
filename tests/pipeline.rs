//! End-to-end pipeline runs against mock provider and webhook servers.

use boltwatch::agent::{Provider, SummaryRouter};
use boltwatch::notify::Notifier;
use boltwatch::providers::AnthropicAdapter;
use boltwatch::{NotificationStatus, Pipeline, Settings, Snapshot, Trigger};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOK_PATH: &str = "/api/webhooks/123/token";

fn pipeline_with_anthropic(server: &MockServer) -> Pipeline {
    let anthropic = AnthropicAdapter::with_base_url(server.uri()).unwrap();
    let router = SummaryRouter::new()
        .unwrap()
        .with_adapter(Provider::Anthropic, Arc::new(anthropic));
    Pipeline::new(router, Notifier::new().unwrap())
}

fn settings_for(server: &MockServer) -> Settings {
    Settings {
        discord_webhook_url: format!("{}{}", server.uri(), WEBHOOK_PATH),
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_notification_without_keys_forwards_raw_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(body_json(json!({ "content": "### Task Completed\nTest Bolt response" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline_with_anthropic(&server);
    let status = pipeline
        .handle(Trigger::TestNotification, &settings_for(&server))
        .await;

    assert_eq!(status, NotificationStatus::sent());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn completed_task_is_summarized_then_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_string_contains("Dark mode added."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Dark mode shipped, waiting for review." }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(body_json(json!({
            "content": "### Task Completed\nDark mode shipped, waiting for review."
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let settings = Settings {
        anthropic_api_key: "sk-ant-test".to_string(),
        ..settings_for(&server)
    };
    let snapshot = Snapshot {
        last_user_message: "Add dark mode".to_string(),
        last_bolt_message: "Dark mode added.".to_string(),
        ..Snapshot::default()
    };

    let status = pipeline_with_anthropic(&server)
        .handle(Trigger::TaskCompleted(snapshot), &settings)
        .await;
    assert_eq!(status, NotificationStatus::sent());
}

#[tokio::test]
async fn provider_failure_is_reported_and_nothing_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let settings = Settings {
        anthropic_api_key: "sk-ant-test".to_string(),
        ..settings_for(&server)
    };

    let status = pipeline_with_anthropic(&server)
        .handle(Trigger::TestNotification, &settings)
        .await;
    assert_eq!(
        status,
        NotificationStatus::failed("Anthropic API error: 529 overloaded")
    );
}

#[tokio::test]
async fn key_for_other_provider_falls_back_to_raw_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(body_json(json!({ "content": "### Task Completed\nTest Bolt response" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let settings = Settings {
        api_provider: "openai".to_string(),
        anthropic_api_key: "sk-ant-test".to_string(),
        ..settings_for(&server)
    };

    let status = pipeline_with_anthropic(&server)
        .handle(Trigger::TestNotification, &settings)
        .await;
    assert_eq!(status, NotificationStatus::sent());
}

#[tokio::test]
async fn rejected_webhook_is_a_failed_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
        .expect(1)
        .mount(&server)
        .await;

    let status = pipeline_with_anthropic(&server)
        .handle(Trigger::TestNotification, &settings_for(&server))
        .await;
    assert_eq!(
        status,
        NotificationStatus::failed("Discord webhook error: 400 bad payload")
    );
}
