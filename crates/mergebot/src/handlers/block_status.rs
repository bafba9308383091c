//! Merge-block aggregation: blocking labels roll up into one commit status.

use tracing::{debug, error};

use crate::github::{GitHubClient, StatusState};
use crate::handlers::release_notes::{RELEASE_NOTE_ACTION_REQUIRED, RELEASE_NOTE_LABEL_NEEDED};
use crate::labels::LabelSet;

/// Labels whose presence blocks a merge, in scan order.
pub const BLOCKING_LABELS: [&str; 7] = [
    "WIP",
    "do-not-merge",
    "do-not-merge/awaiting-PR",
    "do-not-merge/awaiting-submitter-action",
    "do-not-merge/work-in-progress",
    RELEASE_NOTE_LABEL_NEEDED,
    RELEASE_NOTE_ACTION_REQUIRED,
];

/// Compute the merge-gate commit status from the current labels.
///
/// Pure and re-entrant: replaying the same label set yields the same status,
/// so duplicate webhook deliveries are safe.
#[must_use]
pub fn aggregate(labels: &LabelSet) -> (StatusState, String) {
    let blocking: Vec<&str> = BLOCKING_LABELS
        .iter()
        .copied()
        .filter(|l| labels.has(l))
        .collect();

    match blocking.len() {
        0 => (StatusState::Success, "Merged allowed.".to_string()),
        1 => (
            StatusState::Pending,
            format!("Should not have {} label.", blocking[0]),
        ),
        _ => (
            StatusState::Pending,
            format!("Should not have {} labels.", blocking.join(", ")),
        ),
    }
}

/// Recompute the merge-block status of a PR.
///
/// Dispatched as a detached task after the webhook response; closed PRs are
/// never re-gated.
pub async fn check_block_status(github: &GitHubClient, org: &str, repo: &str, number: u64) {
    debug!(org = %org, repo = %repo, pr = number, "Checking if need to set a merge blocker");

    let pr = match github.get_pull_request(org, repo, number).await {
        Ok(pr) => pr,
        Err(err) => {
            error!(error = %err, pr = number, "Failed to get the PR");
            return;
        }
    };
    if pr.state == "closed" {
        return;
    }

    let labels = match github.get_issue_labels(org, repo, number).await {
        Ok(labels) => LabelSet::from_labels(&labels),
        Err(err) => {
            error!(error = %err, pr = number, "Failed to list labels on PR");
            return;
        }
    };

    let (state, description) = aggregate(&labels);
    if let Err(err) = github
        .set_status(org, repo, &pr.head.sha, state, &description)
        .await
    {
        error!(error = %err, pr = number, "Failed to set the status");
    }
}
