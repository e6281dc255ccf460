// release-valet - chat-triggered two-stage branch-merge deployments
// This exposes the core components for testing and integration

pub mod config;
pub mod deploy;
pub mod github;
pub mod notify;
pub mod server;
pub mod telegram;
pub mod telemetry;

// Re-export key types for easy access
pub use config::ValetConfig;
pub use deploy::{DeployOrchestrator, DeployReport, SelectionStore, UpdateDisposition};
pub use github::{Branch, GitHubClient, GitHubError, MergeOutcome, PullRequest, SourceControlOps};
pub use server::{router, ApiError, AppState};
pub use telegram::{parse_update, ChatOps, ParsedUpdate, TelegramClient};
pub use telemetry::init_telemetry;
