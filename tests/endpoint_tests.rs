//! End-to-end endpoint tests: the real router bound to an ephemeral port,
//! with both upstream APIs mocked by wiremock.

use release_valet::server::auth::signature_for;
use release_valet::{router, AppState, ValetConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRIGGER_SECRET: &str = "trigger-secret";
const WEBHOOK_SECRET: &str = "hook-secret";

struct TestApp {
    base_url: String,
    github: MockServer,
    telegram: MockServer,
    client: reqwest::Client,
}

impl TestApp {
    async fn start() -> Self {
        let github = MockServer::start().await;
        let telegram = MockServer::start().await;

        let mut config = ValetConfig::default();
        config.github.token = "test-token".to_string();
        config.github.owner = "acme".to_string();
        config.github.repo = "app".to_string();
        config.github.api_base = Some(github.uri());
        config.telegram.bot_token = "bot-token".to_string();
        config.telegram.api_base = Some(telegram.uri());
        config.telegram.allowed_chat_ids = "1000,2000".to_string();
        config.auth.trigger_secret = TRIGGER_SECRET.to_string();
        config.auth.webhook_secret = WEBHOOK_SECRET.to_string();

        let state = AppState::from_config(Arc::new(config)).expect("state builds");
        let app = router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server runs");
        });

        Self {
            base_url: format!("http://{addr}"),
            github,
            telegram,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn mock_send_message_ok(&self) {
        Mock::given(method("POST"))
            .and(path("/botbot-token/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })),
            )
            .mount(&self.telegram)
            .await;
    }

    async fn sent_messages(&self) -> usize {
        self.telegram
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path().ends_with("/sendMessage"))
            .count()
    }
}

#[tokio::test]
async fn trigger_rejects_a_missing_or_wrong_secret() {
    let app = TestApp::start().await;

    let response = app
        .client
        .post(app.url("/api/trigger"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .post(app.url("/api/trigger"))
        .header("x-trigger-secret", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    assert_eq!(app.sent_messages().await, 0);
}

#[tokio::test]
async fn trigger_sends_the_selection_menu_to_every_allow_listed_chat() {
    let app = TestApp::start().await;
    app.mock_send_message_ok().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "number": 42,
            "title": "Fix login bug",
            "head": { "ref": "fix/login" },
            "base": { "ref": "main" },
        }])))
        .mount(&app.github)
        .await;

    let response = app
        .client
        .post(app.url("/api/trigger"))
        .header("x-trigger-secret", TRIGGER_SECRET)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["pr_count"], json!(1));
    assert_eq!(app.sent_messages().await, 2, "one menu per allow-listed chat");
}

#[tokio::test]
async fn prs_listing_answers_get_with_the_secret_in_the_query() {
    let app = TestApp::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "number": 42,
            "title": "Fix login bug",
            "head": { "ref": "fix/login" },
            "base": { "ref": "main" },
        }])))
        .mount(&app.github)
        .await;

    let response = app
        .client
        .get(app.url("/api/prs"))
        .query(&[("secret", TRIGGER_SECRET)])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!(["42 | #42 Fix login bug (fix/login → main)"])
    );
}

#[tokio::test]
async fn unlisted_methods_answer_405() {
    let app = TestApp::start().await;

    let response = app
        .client
        .delete(app.url("/api/prs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    let response = app.client.get(app.url("/api/notify")).send().await.unwrap();
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn deploy_requires_a_pull_request_identifier() {
    let app = TestApp::start().await;

    let response = app
        .client
        .post(app.url("/api/deploy"))
        .header("x-trigger-secret", TRIGGER_SECRET)
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn deploy_runs_both_merges_and_reports_success() {
    let app = TestApp::start().await;

    Mock::given(method("PUT"))
        .and(path("/repos/acme/app/pulls/42/merge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "merged": true,
            "message": "Pull Request successfully merged",
        })))
        .expect(1)
        .mount(&app.github)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/app/merges"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "sha": "def456", "merged": true })),
        )
        .expect(1)
        .mount(&app.github)
        .await;

    let response = app
        .client
        .post(app.url("/api/deploy"))
        .header("x-trigger-secret", TRIGGER_SECRET)
        .json(&json!({ "pr_label": "42 | #42 Fix login bug (fix/login → main)" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("PR #42"));
}

#[tokio::test]
async fn deploy_conflict_answers_500_with_the_upstream_message() {
    let app = TestApp::start().await;

    Mock::given(method("PUT"))
        .and(path("/repos/acme/app/pulls/42/merge"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "Head branch was modified",
            "documentation_url": "https://docs.github.com",
        })))
        .mount(&app.github)
        .await;

    let response = app
        .client
        .post(app.url("/api/deploy"))
        .header("x-trigger-secret", TRIGGER_SECRET)
        .json(&json!({ "pr_number": 42 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], json!(false));
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("conflict"));
    assert!(message.contains("Head branch was modified"));
}

#[tokio::test]
async fn chat_deploy_command_from_a_stranger_is_forbidden() {
    let app = TestApp::start().await;
    app.mock_send_message_ok().await;

    let response = app
        .client
        .post(app.url("/api/telegram"))
        .json(&json!({
            "message": { "text": "/deploy", "chat": { "id": 555 }, "from": { "id": 555 } }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert_eq!(app.sent_messages().await, 1, "only the no-permission reply");
}

#[tokio::test]
async fn chat_deploy_command_offers_the_branch_menu() {
    let app = TestApp::start().await;
    app.mock_send_message_ok().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "dev" },
            { "name": "feature/x" },
        ])))
        .mount(&app.github)
        .await;

    let response = app
        .client
        .post(app.url("/api/telegram"))
        .json(&json!({
            "message": { "text": "/deploy", "chat": { "id": 1000 }, "from": { "id": 1000 } }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(app.sent_messages().await, 1);
}

#[tokio::test]
async fn notify_rejects_a_bad_signature() {
    let app = TestApp::start().await;

    let payload = serde_json::to_vec(&json!({ "action": "completed" })).unwrap();
    let response = app
        .client
        .post(app.url("/api/notify"))
        .header("x-hub-signature-256", "sha256=deadbeef")
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn notify_ignores_runs_on_other_branches() {
    let app = TestApp::start().await;
    app.mock_send_message_ok().await;

    let payload = serde_json::to_vec(&json!({
        "action": "completed",
        "workflow_run": {
            "name": "Deploy",
            "head_branch": "dev",
            "conclusion": "success",
            "html_url": "https://github.com/acme/app/actions/runs/1",
        }
    }))
    .unwrap();
    let signature = signature_for(WEBHOOK_SECRET, &payload).unwrap();

    let response = app
        .client
        .post(app.url("/api/notify"))
        .header("x-hub-signature-256", signature)
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(app.sent_messages().await, 0, "nothing is broadcast");
}

#[tokio::test]
async fn notify_broadcasts_release_runs_to_the_allow_list() {
    let app = TestApp::start().await;
    app.mock_send_message_ok().await;

    let payload = serde_json::to_vec(&json!({
        "action": "completed",
        "workflow_run": {
            "name": "Deploy",
            "head_branch": "release",
            "conclusion": "success",
            "html_url": "https://github.com/acme/app/actions/runs/1",
        }
    }))
    .unwrap();
    let signature = signature_for(WEBHOOK_SECRET, &payload).unwrap();

    let response = app
        .client
        .post(app.url("/api/notify"))
        .header("x-hub-signature-256", signature)
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(app.sent_messages().await, 2, "one message per allow-listed chat");
}

#[tokio::test]
async fn notify_ignores_non_completed_actions() {
    let app = TestApp::start().await;
    app.mock_send_message_ok().await;

    let payload = serde_json::to_vec(&json!({
        "action": "requested",
        "workflow_run": { "head_branch": "release" }
    }))
    .unwrap();
    let signature = signature_for(WEBHOOK_SECRET, &payload).unwrap();

    let response = app
        .client
        .post(app.url("/api/notify"))
        .header("x-hub-signature-256", signature)
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(app.sent_messages().await, 0);
}
