use serde::Serialize;

/// Snapshot of an open pull request, as offered in the selection menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head_branch: String,
    pub base_branch: String,
}

impl PullRequest {
    /// Human-readable label, also used by the `/api/prs` listing.
    ///
    /// The number before the `|` is what `/api/deploy` parses back out of a
    /// `pr_label` field.
    pub fn label(&self) -> String {
        format!(
            "{} | #{} {} ({} → {})",
            self.number, self.number, self.title, self.head_branch, self.base_branch
        )
    }
}

/// Snapshot of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
}

/// Result of a single merge operation, consumed immediately by the
/// orchestrator to choose the next message or step. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub success: bool,
    pub conflict: bool,
    pub already_up_to_date: bool,
    pub sha: Option<String>,
    pub message: Option<String>,
}

impl MergeOutcome {
    pub fn merged(sha: Option<String>) -> Self {
        Self {
            success: true,
            sha,
            ..Self::default()
        }
    }

    /// Nothing to merge. An expected idempotent outcome, not an error.
    pub fn already_up_to_date() -> Self {
        Self {
            success: true,
            already_up_to_date: true,
            ..Self::default()
        }
    }

    pub fn conflict(message: String) -> Self {
        Self {
            conflict: true,
            message: Some(message),
            ..Self::default()
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("unknown upstream error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_keeps_the_number_parseable_before_the_pipe() {
        let pr = PullRequest {
            number: 42,
            title: "Fix login bug".to_string(),
            head_branch: "fix/login".to_string(),
            base_branch: "main".to_string(),
        };
        assert_eq!(pr.label(), "42 | #42 Fix login bug (fix/login → main)");
    }

    #[test]
    fn constructors_keep_the_flags_mutually_consistent() {
        let merged = MergeOutcome::merged(Some("abc123".to_string()));
        assert!(merged.success && !merged.conflict && !merged.already_up_to_date);

        let noop = MergeOutcome::already_up_to_date();
        assert!(noop.success && noop.already_up_to_date && !noop.conflict);

        let conflict = MergeOutcome::conflict("Merge conflict".to_string());
        assert!(!conflict.success && conflict.conflict);
        assert_eq!(conflict.message(), "Merge conflict");

        let failure = MergeOutcome::failure("boom".to_string());
        assert!(!failure.success && !failure.conflict);
    }
}
