use super::auth;
use super::error::ApiError;
use super::AppState;
use crate::deploy::UpdateDisposition;
use crate::github::SourceControlOps;
use crate::notify::{format_run_message, WorkflowRunEvent};
use crate::telegram::{parse_update, ChatOps, Update};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, error, warn};

const FETCH_PRS_FAILED_REPLY: &str = "❌ Failed to fetch the pull request list.";

#[derive(Debug, Default, Deserialize)]
struct TriggerRequest {
    secret: Option<String>,
    chat_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SecretOnly {
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeployRequest {
    secret: Option<String>,
    pr_number: Option<u64>,
    pr_label: Option<String>,
}

/// Parse an optional JSON body; an empty body is the default value.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError::Validation(format!("invalid JSON body: {err}")))
}

/// The shared secret can arrive as a header, a query parameter, or a body
/// field, checked in that order.
fn require_trigger_secret(
    state: &AppState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    body_secret: Option<&str>,
) -> Result<(), ApiError> {
    let provided = headers
        .get("x-trigger-secret")
        .and_then(|value| value.to_str().ok())
        .or_else(|| query.get("secret").map(String::as_str))
        .or(body_secret);

    if auth::verify_shared_secret(&state.config.auth.trigger_secret, provided) {
        Ok(())
    } else {
        warn!("rejected request with bad or missing trigger secret");
        Err(ApiError::Unauthorized)
    }
}

/// `POST /api/trigger`: send the open-PR selection menu to the target
/// chats (an explicit `chat_id`, or the whole allow-list).
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: TriggerRequest = parse_body(&body)?;
    require_trigger_secret(&state, &headers, &query, request.secret.as_deref())?;

    let targets = match request.chat_id {
        Some(chat_id) => vec![chat_id],
        None => state.config.telegram.allowed_chat_ids(),
    };
    if targets.is_empty() {
        return Err(ApiError::Validation("no target chat ids".to_string()));
    }

    match state.orchestrator.offer_pull_requests(&targets).await {
        Ok(count) => Ok(Json(json!({ "ok": true, "pr_count": count }))),
        Err(err) => {
            error!(error = %err, "failed to fetch open pull requests");
            state.chat.broadcast(&targets, FETCH_PRS_FAILED_REPLY).await;
            Err(ApiError::Upstream(err.to_string()))
        }
    }
}

/// `GET|POST /api/prs`: list the open pull requests as labels. GET
/// doubles as the health probe.
pub async fn list_prs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: SecretOnly = parse_body(&body)?;
    require_trigger_secret(&state, &headers, &query, request.secret.as_deref())?;

    let prs = state
        .github
        .list_open_pull_requests()
        .await
        .map_err(|err| {
            error!(error = %err, "failed to fetch open pull requests");
            ApiError::Upstream(err.to_string())
        })?;

    if prs.is_empty() {
        return Ok(Json(json!({ "prs": [], "message": "No open pull requests." })));
    }
    let labels: Vec<String> = prs.iter().map(|pr| pr.label()).collect();
    Ok(Json(json!(labels)))
}

/// `POST /api/deploy`: run the two-step PR flow for an explicit pull
/// request, given by number or by a `"<number> | <title>"` label.
pub async fn deploy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: DeployRequest = parse_body(&body)?;
    require_trigger_secret(&state, &headers, &query, request.secret.as_deref())?;

    let (number, title) = parse_deploy_target(&request)?;
    let report = state
        .orchestrator
        .run_pull_request_flow(None, number, &title)
        .await;

    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(json!({ "ok": report.ok, "message": report.message }))))
}

fn parse_deploy_target(request: &DeployRequest) -> Result<(u64, String), ApiError> {
    let label_parts = request.pr_label.as_deref().map(|label| {
        let mut parts = label.splitn(2, '|');
        (
            parts.next().map(str::trim).map(str::to_string),
            parts.next().map(str::trim).map(str::to_string),
        )
    });

    let number = request
        .pr_number
        .or_else(|| {
            label_parts
                .as_ref()
                .and_then(|(number, _)| number.as_deref()?.parse().ok())
        })
        .ok_or_else(|| ApiError::Validation("pr_number or pr_label is required".to_string()))?;

    let title = label_parts
        .and_then(|(_, title)| title)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| format!("PR #{number}"));

    Ok((number, title))
}

/// `POST /api/telegram`: the chat-update webhook.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let update: Update = serde_json::from_slice(&body)
        .map_err(|err| ApiError::Validation(format!("invalid JSON body: {err}")))?;

    match state.orchestrator.handle_update(parse_update(&update)).await {
        UpdateDisposition::Forbidden => Ok(StatusCode::FORBIDDEN),
        UpdateDisposition::Handled | UpdateDisposition::Ignored => Ok(StatusCode::OK),
    }
}

/// `POST /api/notify`: the signed build-completion webhook. Filters to
/// completed runs on the release branch and broadcasts to the allow-list.
pub async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|value| value.to_str().ok());
    if !auth::verify_webhook_signature(&state.config.auth.webhook_secret, &body, signature) {
        warn!("rejected webhook with bad or missing signature");
        return Err(ApiError::Unauthorized);
    }

    let event: WorkflowRunEvent = serde_json::from_slice(&body)
        .map_err(|err| ApiError::Validation(format!("invalid JSON body: {err}")))?;

    if !event.is_completed() {
        debug!(action = ?event.action, "ignoring non-completed workflow event");
        return Ok(Json(json!({ "ok": true, "message": "Not a completed event" })));
    }
    if event.head_branch() != Some(state.config.branches.release.as_str()) {
        debug!(branch = ?event.head_branch(), "ignoring run for non-release branch");
        return Ok(Json(json!({ "ok": true, "message": "Not release branch" })));
    }

    let Some(run) = &event.workflow_run else {
        return Ok(Json(json!({ "ok": true, "message": "Not release branch" })));
    };
    let text = format_run_message(run);
    let targets = state.config.telegram.allowed_chat_ids();
    state.chat.broadcast_html(&targets, &text).await;

    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_target_from_number() {
        let request = DeployRequest {
            pr_number: Some(7),
            ..DeployRequest::default()
        };
        assert_eq!(
            parse_deploy_target(&request).unwrap(),
            (7, "PR #7".to_string())
        );
    }

    #[test]
    fn deploy_target_from_label() {
        let request = DeployRequest {
            pr_label: Some("42 | #42 Fix login bug (fix/login → main)".to_string()),
            ..DeployRequest::default()
        };
        assert_eq!(
            parse_deploy_target(&request).unwrap(),
            (42, "#42 Fix login bug (fix/login → main)".to_string())
        );
    }

    #[test]
    fn deploy_target_number_wins_but_label_title_is_kept() {
        let request = DeployRequest {
            pr_number: Some(7),
            pr_label: Some("42 | custom title".to_string()),
            ..DeployRequest::default()
        };
        assert_eq!(
            parse_deploy_target(&request).unwrap(),
            (7, "custom title".to_string())
        );
    }

    #[test]
    fn deploy_target_requires_some_identifier() {
        let request = DeployRequest::default();
        assert!(matches!(
            parse_deploy_target(&request),
            Err(ApiError::Validation(_))
        ));

        let request = DeployRequest {
            pr_label: Some("not-a-number | title".to_string()),
            ..DeployRequest::default()
        };
        assert!(matches!(
            parse_deploy_target(&request),
            Err(ApiError::Validation(_))
        ));
    }
}
