use crate::github::PullRequest;
use moka::future::Cache;
use std::time::Duration;

const PR_TOKEN_PREFIX: &str = "pr_";
const BRANCH_TOKEN_PREFIX: &str = "deploy_";

/// How long an offered selection menu stays answerable. An expired token is
/// indistinguishable from a stale one and is silently ignored.
const SELECTION_TTL: Duration = Duration::from_secs(15 * 60);
const SELECTION_CAPACITY: u64 = 1024;

/// Full record behind a `pr_<number>` callback token.
///
/// The callback payload has a strict size limit, so the title and branch
/// names ride server-side while only the short token round-trips through
/// the chat platform. Branch tokens carry the branch name directly and
/// need no cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSelection {
    pub number: u64,
    pub title: String,
    pub head_branch: String,
    pub base_branch: String,
}

/// Decoded callback token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    PullRequest(u64),
    Branch(String),
}

impl SelectionToken {
    /// Decode a callback token. Anything unrecognized resolves to `None`
    /// and is ignored upstream.
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(rest) = data.strip_prefix(PR_TOKEN_PREFIX) {
            return rest.parse().ok().map(SelectionToken::PullRequest);
        }
        if let Some(rest) = data.strip_prefix(BRANCH_TOKEN_PREFIX) {
            if !rest.is_empty() {
                return Some(SelectionToken::Branch(rest.to_string()));
            }
        }
        None
    }
}

pub fn pr_token(number: u64) -> String {
    format!("{PR_TOKEN_PREFIX}{number}")
}

pub fn branch_token(name: &str) -> String {
    format!("{BRANCH_TOKEN_PREFIX}{name}")
}

/// Time- and capacity-bounded store for offered pull-request selections.
///
/// Entries are created when a selection menu is sent and read once when
/// the matching callback arrives; eviction after that point is free.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    cache: Cache<String, PrSelection>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStore {
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(SELECTION_CAPACITY)
            .time_to_live(SELECTION_TTL)
            .build();
        Self { cache }
    }

    /// Record an offered pull request and return its callback token.
    pub async fn offer(&self, pr: &PullRequest) -> String {
        let token = pr_token(pr.number);
        self.cache
            .insert(
                token.clone(),
                PrSelection {
                    number: pr.number,
                    title: pr.title.clone(),
                    head_branch: pr.head_branch.clone(),
                    base_branch: pr.base_branch.clone(),
                },
            )
            .await;
        token
    }

    /// Resolve a token, consuming the entry so a button fires at most once
    /// per offered menu.
    pub async fn take(&self, token: &str) -> Option<PrSelection> {
        let selection = self.cache.get(token).await?;
        self.cache.invalidate(token).await;
        Some(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pr() -> PullRequest {
        PullRequest {
            number: 42,
            title: "Fix login bug".to_string(),
            head_branch: "fix/login".to_string(),
            base_branch: "main".to_string(),
        }
    }

    #[test]
    fn tokens_round_trip() {
        assert_eq!(
            SelectionToken::parse("pr_42"),
            Some(SelectionToken::PullRequest(42))
        );
        assert_eq!(
            SelectionToken::parse(&branch_token("feature/x")),
            Some(SelectionToken::Branch("feature/x".to_string()))
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for data in ["pr_", "pr_abc", "deploy_", "noise", ""] {
            assert_eq!(SelectionToken::parse(data), None, "data: {data}");
        }
    }

    #[tokio::test]
    async fn offered_selection_is_taken_exactly_once() {
        let store = SelectionStore::new();
        let pr = sample_pr();
        let token = store.offer(&pr).await;
        assert_eq!(token, "pr_42");

        let selection = store.take(&token).await.expect("first read hits");
        assert_eq!(selection.title, "Fix login bug");
        assert_eq!(selection.head_branch, "fix/login");

        assert!(store.take(&token).await.is_none(), "second read misses");
    }

    #[tokio::test]
    async fn unknown_token_misses() {
        let store = SelectionStore::new();
        assert!(store.take("pr_99").await.is_none());
    }
}
