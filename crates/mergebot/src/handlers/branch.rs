//! Branch-convention labeling: `kind/*` labels derived from branch names.

use tracing::{error, info};

use crate::github::GitHubClient;
use crate::labels::LabelSet;
use crate::webhooks::{PullRequestAction, PullRequestEvent};

/// A branch-name pattern and the kind label it maps to.
#[derive(Debug, Clone, Copy)]
pub struct KindLabel {
    /// Substring matched against the branch name.
    pub pattern: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

/// Ordered branch-prefix table; the first matching pattern wins.
pub const BRANCH_KIND_LABELS: [KindLabel; 6] = [
    KindLabel {
        pattern: "feat/",
        name: "kind/feature",
        description: "Categorizes issue or PR as related to a new feature.",
        color: "c7def8",
    },
    KindLabel {
        pattern: "fix/",
        name: "kind/bug",
        description: "Categorizes issue or PR as related to a bug.",
        color: "e11d21",
    },
    KindLabel {
        pattern: "test/",
        name: "kind/testing",
        description: "Categorizes issue or PR as related to tests.",
        color: "f9d0c4",
    },
    KindLabel {
        pattern: "chore/",
        name: "kind/chore",
        description: "Categorizes issue or PR as routine maintenance.",
        color: "bfe5bf",
    },
    KindLabel {
        pattern: "refactor/",
        name: "kind/cleanup",
        description: "Categorizes issue or PR as related to cleaning up code or tech debt.",
        color: "c7def8",
    },
    KindLabel {
        pattern: "docs/",
        name: "kind/documentation",
        description: "Categorizes issue or PR as related to documentation.",
        color: "c7def8",
    },
];

/// Map a branch name to a kind label by substring match.
#[must_use]
pub fn classify_branch(branch: &str) -> Option<&'static KindLabel> {
    BRANCH_KIND_LABELS.iter().find(|k| branch.contains(k.pattern))
}

/// Label a PR after its branch naming convention on open/edit, creating the
/// repository label first if it does not exist yet.
pub async fn handle_branch_label(github: &GitHubClient, event: &PullRequestEvent) {
    if !matches!(
        event.action,
        PullRequestAction::Opened | PullRequestAction::Edited
    ) {
        return;
    }

    let Some(kind) = classify_branch(&event.pull_request.head.ref_name) else {
        return;
    };

    let org = event.org();
    let repo = &event.repository.name;
    let number = event.pull_request.number;

    let labels = match github.get_issue_labels(org, repo, number).await {
        Ok(labels) => LabelSet::from_labels(&labels),
        Err(err) => {
            error!(error = %err, pr = number, "Failed to list labels on PR");
            return;
        }
    };
    if labels.has(kind.name) {
        return;
    }

    let repo_vocabulary = match github.list_repo_labels(org, repo).await {
        Ok(labels) => LabelSet::from_labels(&labels),
        Err(err) => {
            error!(error = %err, pr = number, "Failed to list repository labels");
            return;
        }
    };
    if !repo_vocabulary.has(kind.name) {
        info!(label = %kind.name, "Creating missing repository label");
        if let Err(err) = github
            .create_label(org, repo, kind.name, kind.description, kind.color)
            .await
        {
            error!(error = %err, label = %kind.name, "Failed to create repository label");
            return;
        }
    }

    if let Err(err) = github
        .add_labels(org, repo, number, &[kind.name.to_string()])
        .await
    {
        error!(error = %err, label = %kind.name, "Failed to add label");
    }
}
