//! Build-completion notifications.
//!
//! Pure filter-and-format half of the notify endpoint: the HTTP handler
//! verifies the signature, then uses these helpers to decide whether the
//! event is worth broadcasting and what the message looks like.

use serde::Deserialize;

/// The slice of a `workflow_run` webhook payload this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: Option<String>,
    pub workflow_run: Option<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub name: Option<String>,
    pub head_branch: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
}

impl WorkflowRunEvent {
    /// Only completed runs on the release branch are broadcast.
    pub fn is_completed(&self) -> bool {
        self.action.as_deref() == Some("completed")
    }

    pub fn head_branch(&self) -> Option<&str> {
        self.workflow_run.as_ref()?.head_branch.as_deref()
    }
}

/// Map a run conclusion to its emoji and label.
pub fn conclusion_badge(conclusion: Option<&str>) -> (&'static str, String) {
    match conclusion {
        Some("success") => ("✅", "Deploy succeeded".to_string()),
        Some("failure") => ("❌", "Deploy failed".to_string()),
        Some("cancelled") => ("⚠️", "Deploy cancelled".to_string()),
        Some(other) => ("ℹ️", format!("Deploy {other}")),
        None => ("ℹ️", "Deploy finished".to_string()),
    }
}

/// Render the HTML broadcast message for a completed run.
pub fn format_run_message(run: &WorkflowRun) -> String {
    let (emoji, label) = conclusion_badge(run.conclusion.as_deref());
    let workflow = run.name.as_deref().unwrap_or("Unknown Workflow");
    let branch = run.head_branch.as_deref().unwrap_or("unknown");

    let mut text = format!(
        "{emoji} <b>{label}</b>\n\n📋 Workflow: <code>{workflow}</code>\n🌿 Branch: <code>{branch}</code>"
    );
    if let Some(url) = &run.html_url {
        text.push_str(&format!("\n\n🔗 <a href=\"{url}\">View the run logs</a>"));
    }
    text
}
