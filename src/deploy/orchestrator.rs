use super::selection::{branch_token, SelectionStore, SelectionToken};
use crate::config::{BranchConfig, ValetConfig};
use crate::github::{GitHubError, MergeOutcome, SourceControlOps};
use crate::telegram::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use crate::telegram::{ChatOps, ParsedUpdate};
use futures::future::join_all;
use tracing::{info, warn};

/// Fixed reply for chat identities outside the allow-list.
pub const NO_PERMISSION_REPLY: &str = "⚠️ You are not allowed to trigger deploys.";

const NO_OPEN_PRS_REPLY: &str = "ℹ️ There are no open pull requests right now.";
const NO_BRANCHES_REPLY: &str = "ℹ️ There are no branches available to deploy.";
const CHOOSE_PR_PROMPT: &str = "🔽 Select a pull request to merge:";
const CHOOSE_BRANCH_PROMPT: &str = "🔽 Select a branch to deploy:";
const FETCH_BRANCHES_FAILED_REPLY: &str = "❌ Failed to fetch the branch list.";

/// Final outcome of one deploy session, shaped for both the chat reply and
/// the HTTP response.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub ok: bool,
    pub conflict: bool,
    pub message: String,
}

impl DeployReport {
    fn success(message: String) -> Self {
        Self {
            ok: true,
            conflict: false,
            message,
        }
    }

    fn from_failed_step(outcome: &MergeOutcome) -> Self {
        let message = if outcome.conflict {
            format!(
                "❌ Merge conflict — manual resolution required\n{}",
                outcome.message()
            )
        } else {
            format!("❌ Deploy failed: {}", outcome.message())
        };
        Self {
            ok: false,
            conflict: outcome.conflict,
            message,
        }
    }
}

/// What the chat-update endpoint should answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDisposition {
    Handled,
    Forbidden,
    Ignored,
}

/// Drives the selection → merge → merge → report state machine, given the
/// two gateways.
///
/// The orchestrator itself is stateless between requests apart from the
/// selection store: phase one of an interaction records the offered
/// choices, phase two resolves one by token. Nothing prevents two
/// overlapping sessions; each invocation is independent.
pub struct DeployOrchestrator<S, C> {
    scm: S,
    chat: C,
    selections: SelectionStore,
    branches: BranchConfig,
    allowed_chat_ids: Vec<i64>,
    ci_log_url: Option<String>,
}

impl<S: SourceControlOps, C: ChatOps> DeployOrchestrator<S, C> {
    pub fn new(scm: S, chat: C, config: &ValetConfig) -> Self {
        Self {
            scm,
            chat,
            selections: SelectionStore::new(),
            branches: config.branches.clone(),
            allowed_chat_ids: config.telegram.allowed_chat_ids(),
            ci_log_url: config.ci_log_url.clone(),
        }
    }

    fn is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chat_ids.contains(&chat_id)
    }

    fn ci_log_suffix(&self) -> String {
        match &self.ci_log_url {
            Some(url) => format!("\n🔗 CI logs: {url}"),
            None => String::new(),
        }
    }

    /// Phase one of the PR-merge flow: offer every open pull request as an
    /// inline button to the given chats. Returns how many were offered.
    pub async fn offer_pull_requests(&self, chat_ids: &[i64]) -> Result<usize, GitHubError> {
        let prs = self.scm.list_open_pull_requests().await?;

        if prs.is_empty() {
            self.chat.broadcast(chat_ids, NO_OPEN_PRS_REPLY).await;
            return Ok(0);
        }

        let mut buttons = Vec::with_capacity(prs.len());
        for pr in &prs {
            let token = self.selections.offer(pr).await;
            buttons.push(InlineKeyboardButton {
                text: format!(
                    "#{} {} ({} → {})",
                    pr.number, pr.title, pr.head_branch, pr.base_branch
                ),
                callback_data: token,
            });
        }
        let keyboard = InlineKeyboardMarkup::single_column(buttons);

        let sends = chat_ids.iter().map(|&chat_id| {
            let keyboard = keyboard.clone();
            async move {
                let delivery = self.chat.send_menu(chat_id, CHOOSE_PR_PROMPT, keyboard).await;
                if !delivery.ok {
                    warn!(chat_id, error = ?delivery.error, "selection menu delivery failed");
                }
            }
        });
        join_all(sends).await;

        info!(count = prs.len(), "pull request selection menu sent");
        Ok(prs.len())
    }

    /// Phase one of the direct-branch flow: offer the deployable branches.
    pub async fn offer_branches(&self, chat_id: i64) -> Result<(), GitHubError> {
        let branches = self.scm.list_branches(&self.branches.excluded).await?;

        if branches.is_empty() {
            self.chat.send_message(chat_id, NO_BRANCHES_REPLY).await;
            return Ok(());
        }

        let buttons = branches
            .iter()
            .map(|branch| InlineKeyboardButton {
                text: branch.name.clone(),
                callback_data: branch_token(&branch.name),
            })
            .collect();
        let delivery = self
            .chat
            .send_menu(
                chat_id,
                CHOOSE_BRANCH_PROMPT,
                InlineKeyboardMarkup::single_column(buttons),
            )
            .await;
        if !delivery.ok {
            warn!(chat_id, error = ?delivery.error, "branch menu delivery failed");
        }
        Ok(())
    }

    /// Route one classified chat update through the state machine.
    pub async fn handle_update(&self, update: ParsedUpdate) -> UpdateDisposition {
        match update {
            ParsedUpdate::Command { name, chat_id, .. } if name == "deploy" => {
                if !self.is_allowed(chat_id) {
                    warn!(chat_id, "deploy command from chat outside the allow-list");
                    self.chat.send_message(chat_id, NO_PERMISSION_REPLY).await;
                    return UpdateDisposition::Forbidden;
                }
                if let Err(err) = self.offer_branches(chat_id).await {
                    warn!(error = %err, "failed to fetch the branch list");
                    self.chat
                        .send_message(chat_id, FETCH_BRANCHES_FAILED_REPLY)
                        .await;
                }
                UpdateDisposition::Handled
            }
            ParsedUpdate::Command { .. } => UpdateDisposition::Ignored,
            ParsedUpdate::Callback { token, chat_id, .. } => {
                if !self.is_allowed(chat_id) {
                    return UpdateDisposition::Forbidden;
                }
                self.handle_callback(chat_id, &token).await
            }
            ParsedUpdate::Unrecognized => UpdateDisposition::Ignored,
        }
    }

    async fn handle_callback(&self, chat_id: i64, token: &str) -> UpdateDisposition {
        match SelectionToken::parse(token) {
            Some(SelectionToken::Branch(branch)) => {
                let report = self.run_branch_flow(chat_id, &branch).await;
                info!(branch = %branch, ok = report.ok, "branch deploy finished");
                UpdateDisposition::Handled
            }
            Some(SelectionToken::PullRequest(_)) => match self.selections.take(token).await {
                Some(selection) => {
                    let report = self
                        .run_pull_request_flow(Some(chat_id), selection.number, &selection.title)
                        .await;
                    info!(
                        number = selection.number,
                        ok = report.ok,
                        "pull request deploy finished"
                    );
                    UpdateDisposition::Handled
                }
                // Stale or expired button: do nothing rather than error at
                // the operator.
                None => {
                    info!(token, "ignoring stale selection token");
                    UpdateDisposition::Ignored
                }
            },
            None => {
                info!(token, "ignoring unparseable callback token");
                UpdateDisposition::Ignored
            }
        }
    }

    /// The two-step PR flow: merge the pull request, then mainline into
    /// release. The second step only runs when the first succeeded;
    /// "already up to date" counts as forward progress on the second step.
    ///
    /// With `chat_id` set, progress and the final report are also sent to
    /// the chat; the HTTP deploy endpoint passes `None` and only uses the
    /// returned report.
    pub async fn run_pull_request_flow(
        &self,
        chat_id: Option<i64>,
        number: u64,
        title: &str,
    ) -> DeployReport {
        info!(number, title, "starting pull request deploy");

        let first = self.scm.merge_pull_request(number, title).await;
        if !first.success {
            let report = DeployReport::from_failed_step(&first);
            if let Some(chat_id) = chat_id {
                self.chat.send_message(chat_id, &report.message).await;
            }
            return report;
        }

        if let Some(chat_id) = chat_id {
            let progress = format!(
                "✅ PR #{number} merged. Merging {} → {}…",
                self.branches.mainline, self.branches.release
            );
            self.chat.send_message(chat_id, &progress).await;
        }

        let commit_message = format!(
            "Merge {} into {} via release-valet",
            self.branches.mainline, self.branches.release
        );
        let second = self
            .scm
            .merge_branches(&self.branches.mainline, &self.branches.release, &commit_message)
            .await;

        let report = if second.success {
            let body = if second.already_up_to_date {
                format!(
                    "✅ PR #{number} merged. {} is already up to date with {}.",
                    self.branches.release, self.branches.mainline
                )
            } else {
                format!(
                    "✅ PR #{number} merged and {} → {} deploy started.",
                    self.branches.mainline, self.branches.release
                )
            };
            DeployReport::success(format!("{body}{}", self.ci_log_suffix()))
        } else {
            DeployReport::from_failed_step(&second)
        };

        if let Some(chat_id) = chat_id {
            self.chat.send_message(chat_id, &report.message).await;
        }
        report
    }

    /// The single-step branch flow: merge the chosen branch into the
    /// integration branch.
    pub async fn run_branch_flow(&self, chat_id: i64, branch: &str) -> DeployReport {
        info!(branch, "starting branch deploy");

        let commit_message = format!(
            "Merge {branch} into {} via release-valet",
            self.branches.integration
        );
        let outcome = self
            .scm
            .merge_branches(branch, &self.branches.integration, &commit_message)
            .await;

        let report = if outcome.success {
            let body = if outcome.already_up_to_date {
                format!(
                    "✅ [{branch}] is already up to date with {}.",
                    self.branches.integration
                )
            } else {
                format!(
                    "✅ Merged [{branch}] into {} and started the deploy.",
                    self.branches.integration
                )
            };
            DeployReport::success(format!("{body}{}", self.ci_log_suffix()))
        } else if outcome.conflict {
            DeployReport {
                ok: false,
                conflict: true,
                message: format!(
                    "❌ Merge conflict! [{branch}] → {} needs manual resolution\nError: {}",
                    self.branches.integration,
                    outcome.message()
                ),
            }
        } else {
            DeployReport {
                ok: false,
                conflict: false,
                message: format!("❌ Deploy failed: {}", outcome.message()),
            }
        };

        self.chat.send_message(chat_id, &report.message).await;
        report
    }
}
