use thiserror::Error;

/// Errors from the source-control gateway.
///
/// Merge operations do not use this type: every merge failure is folded
/// into a [`super::MergeOutcome`] because conflicts and rejections are
/// data the orchestrator reports, not errors it propagates.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from GitHub: {0}")]
    UnexpectedResponse(String),
}
