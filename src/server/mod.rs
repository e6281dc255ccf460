pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::config::ValetConfig;
use crate::deploy::DeployOrchestrator;
use crate::github::GitHubClient;
use crate::telegram::TelegramClient;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared state behind every handler: the immutable configuration, the two
/// gateways, and the orchestrator wired over them.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ValetConfig>,
    pub github: GitHubClient,
    pub chat: TelegramClient,
    pub orchestrator: Arc<DeployOrchestrator<GitHubClient, TelegramClient>>,
}

impl AppState {
    pub fn from_config(config: Arc<ValetConfig>) -> anyhow::Result<Self> {
        let github = GitHubClient::new(&config.github)?;
        let chat = TelegramClient::new(&config.telegram)?;
        let orchestrator = Arc::new(DeployOrchestrator::new(
            github.clone(),
            chat.clone(),
            &config,
        ));
        Ok(Self {
            config,
            github,
            chat,
            orchestrator,
        })
    }
}

/// Build the webhook router. Unlisted methods answer 405 via axum's
/// method routing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/trigger", post(handlers::trigger))
        .route("/api/prs", get(handlers::list_prs).post(handlers::list_prs))
        .route("/api/deploy", post(handlers::deploy))
        .route("/api/telegram", post(handlers::telegram_webhook))
        .route("/api/notify", post(handlers::notify))
        .with_state(state)
}
