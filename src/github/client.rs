use super::errors::GitHubError;
use super::types::{Branch, MergeOutcome, PullRequest};
use crate::config::GitHubConfig;
use async_trait::async_trait;
use octocrab::params::pulls::MergeMethod;
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Trait for source-control operations to enable testing with mocks.
///
/// Listing failures are errors; merge failures are outcomes. A conflict or
/// a rejected merge is something the operator is told about verbatim, so
/// the merge operations fold every upstream response into a
/// [`MergeOutcome`] instead of returning `Err`.
#[async_trait]
pub trait SourceControlOps: Send + Sync {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, GitHubError>;
    async fn list_branches(&self, excluding: &[String]) -> Result<Vec<Branch>, GitHubError>;
    async fn merge_pull_request(&self, number: u64, title: &str) -> MergeOutcome;
    async fn merge_branches(&self, head: &str, base: &str, commit_message: &str) -> MergeOutcome;
}

/// GitHub gateway.
///
/// Uses octocrab for the pull-request merge it types well, and a raw HTTP
/// client for the listing and repository-merge endpoints where we only
/// read a handful of fields.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    http: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    api_base: String,
    page_size: u8,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Deserialize)]
struct MergeCommit {
    sha: String,
}

#[derive(Deserialize)]
struct BranchRef {
    name: String,
}

#[derive(Deserialize)]
struct PullSummary {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    head: GitRef,
    base: GitRef,
}

#[derive(Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    ref_field: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut builder = Octocrab::builder().personal_token(config.token.clone());
        if config.api_base.is_some() {
            builder = builder.base_uri(&api_base)?;
        }
        let octocrab = builder.build()?;

        let http = reqwest::Client::builder()
            .user_agent("release-valet")
            .build()?;

        Ok(Self {
            octocrab,
            http,
            token: config.token.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            api_base,
            page_size: config.page_size,
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{tail}",
            self.api_base, self.owner, self.repo
        )
    }

    /// Map an upstream merge failure to an outcome.
    ///
    /// 409 is a merge conflict, except that on the repository-merges
    /// endpoint a 409 whose message says the base is already up to date is
    /// the idempotent nothing-to-merge case. 405/422 mean the merge was not
    /// permitted; the upstream message is surfaced verbatim either way.
    fn outcome_from_status(status: u16, message: String, up_to_date_exemption: bool) -> MergeOutcome {
        match status {
            409 if up_to_date_exemption && is_already_up_to_date(&message) => {
                MergeOutcome::already_up_to_date()
            }
            409 => MergeOutcome::conflict(message),
            405 | 422 => MergeOutcome::failure(message),
            _ => MergeOutcome::failure(message),
        }
    }

    fn outcome_from_api_error(err: octocrab::Error, up_to_date_exemption: bool) -> MergeOutcome {
        match err {
            octocrab::Error::GitHub { ref source, .. } => Self::outcome_from_status(
                source.status_code.as_u16(),
                source.message.clone(),
                up_to_date_exemption,
            ),
            other => MergeOutcome::failure(other.to_string()),
        }
    }

    /// Pull the `message` field out of a GitHub error body, falling back to
    /// the raw text when the shape is unexpected.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<ApiMessage>(&body)
            .map(|m| m.message)
            .unwrap_or_else(|_| format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl SourceControlOps for GitHubClient {
    /// Fetch all open pull requests, page by page, until a short page
    /// signals the end of the list.
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, GitHubError> {
        let mut all = Vec::new();
        let mut page: u32 = 1;

        loop {
            let response = self
                .http
                .get(self.repo_url("pulls"))
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", API_VERSION)
                .query(&[
                    ("state", "open".to_string()),
                    ("per_page", self.page_size.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(GitHubError::UnexpectedResponse(format!(
                    "pull request listing returned {}",
                    response.status()
                )));
            }

            let pulls: Vec<PullSummary> = response.json().await?;
            let fetched = pulls.len();
            all.extend(pulls.into_iter().map(|pr| PullRequest {
                number: pr.number,
                title: pr.title.unwrap_or_default(),
                head_branch: pr.head.ref_field,
                base_branch: pr.base.ref_field,
            }));

            if fetched < self.page_size as usize {
                break;
            }
            page += 1;
        }

        debug!(count = all.len(), "listed open pull requests");
        Ok(all)
    }

    async fn list_branches(&self, excluding: &[String]) -> Result<Vec<Branch>, GitHubError> {
        let response = self
            .http
            .get(self.repo_url("branches"))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GitHubError::UnexpectedResponse(format!(
                "branch listing returned {}",
                response.status()
            )));
        }

        let refs: Vec<BranchRef> = response.json().await?;
        let branches: Vec<Branch> = refs
            .into_iter()
            .filter(|b| !excluding.iter().any(|name| name == &b.name))
            .map(|b| Branch { name: b.name })
            .collect();

        debug!(count = branches.len(), "listed deployable branches");
        Ok(branches)
    }

    async fn merge_pull_request(&self, number: u64, title: &str) -> MergeOutcome {
        debug!(number, title, "merging pull request");

        let result = self
            .octocrab
            .pulls(&self.owner, &self.repo)
            .merge(number)
            .title(format!("Merge pull request #{number}: {title}"))
            .method(MergeMethod::Merge)
            .send()
            .await;

        match result {
            Ok(merge) if merge.merged => MergeOutcome::merged(merge.sha),
            Ok(merge) => MergeOutcome::failure(
                merge
                    .message
                    .unwrap_or_else(|| format!("PR #{number} was not merged")),
            ),
            Err(err) => {
                warn!(number, error = %err, "pull request merge failed");
                Self::outcome_from_api_error(err, false)
            }
        }
    }

    async fn merge_branches(&self, head: &str, base: &str, commit_message: &str) -> MergeOutcome {
        debug!(head, base, "merging branches");

        let response = match self
            .http
            .post(self.repo_url("merges"))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&serde_json::json!({
                "base": base,
                "head": head,
                "commit_message": commit_message,
            }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(head, base, error = %err, "branch merge request failed");
                return MergeOutcome::failure(err.to_string());
            }
        };

        let status = response.status();
        // 204: base already contains head, nothing to merge
        if status == reqwest::StatusCode::NO_CONTENT {
            return MergeOutcome::already_up_to_date();
        }
        if status.is_success() {
            return match response.json::<MergeCommit>().await {
                Ok(commit) => MergeOutcome::merged(Some(commit.sha)),
                Err(_) => MergeOutcome::merged(None),
            };
        }

        let message = Self::error_message(response).await;
        warn!(head, base, status = status.as_u16(), upstream = %message, "branch merge rejected");
        Self::outcome_from_status(status.as_u16(), message, true)
    }
}

/// Matches "already up to date" in any case/hyphenation variant.
fn is_already_up_to_date(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .replace('-', " ")
        .contains("already up to date")
}
