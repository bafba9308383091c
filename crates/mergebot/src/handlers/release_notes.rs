//! Release-note classification and the labels it drives.
//!
//! Every PR must end up with exactly one of the four release-note labels,
//! derived from the release-note block in the PR body, the deprecation label,
//! and the `/release-note-none` comment command.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{error, info};

use crate::github::GitHubClient;
use crate::handlers::commands::authorize;
use crate::labels::LabelSet;
use crate::reconcile::{add_label_if_missing, remove_other_labels};
use crate::response::{format_ic_response, format_simple_response};
use crate::webhooks::{
    Comment, IssueCommentAction, IssueCommentEvent, PullRequestAction, PullRequestEvent,
};

/// Label blocking the merge while a release-note block is missing.
pub const RELEASE_NOTE_LABEL_NEEDED: &str = "release-note-label-needed";
/// Label for a PR carrying a user-facing release note.
pub const RELEASE_NOTE: &str = "release-note";
/// Label for a PR explicitly declaring it needs no release note.
pub const RELEASE_NOTE_NONE: &str = "release-note-none";
/// Label for a release note that requires operator action.
pub const RELEASE_NOTE_ACTION_REQUIRED: &str = "release-note-action-required";
/// Deprecating PRs must always carry an explicit, human-reviewed note.
pub const DEPRECATION_LABEL: &str = "kind/deprecation";

/// The mutually-exclusive release-note label group.
pub const ALL_RELEASE_NOTE_LABELS: [&str; 4] = [
    RELEASE_NOTE_NONE,
    RELEASE_NOTE_ACTION_REQUIRED,
    RELEASE_NOTE_LABEL_NEEDED,
    RELEASE_NOTE,
];

const ACTION_REQUIRED_NOTE: &str = "action required";

static NOTE_MATCHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?:Release note\*\*:\s*(?:<!--[^<>]*-->\s*)?```(?:release-note)?|```release-note)(.+?)```",
    )
    .unwrap()
});

static NONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\W*NONE\W*$").unwrap());

static RELEASE_NOTE_NONE_COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/release-note-none\s*$").unwrap());

/// Release-note category of a PR. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseNoteCategory {
    /// No usable note; the merge-blocking label is required.
    Needed,
    /// The note is an explicit "none".
    None,
    /// The note announces an action operators must take.
    ActionRequired,
    /// The note carries regular changelog text.
    HasNote,
}

impl ReleaseNoteCategory {
    /// The label this category maps to.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Needed => RELEASE_NOTE_LABEL_NEEDED,
            Self::None => RELEASE_NOTE_NONE,
            Self::ActionRequired => RELEASE_NOTE_ACTION_REQUIRED,
            Self::HasNote => RELEASE_NOTE,
        }
    }
}

/// Extract the release-note block from a PR body. Only the first fenced match
/// is considered; an unterminated fence yields nothing.
#[must_use]
pub fn extract_release_note(body: &str) -> Option<String> {
    NOTE_MATCHER_RE
        .captures(body)
        .map(|c| c[1].trim().to_string())
}

/// Determine the release-note category from the PR body text and the PR's
/// current labels.
#[must_use]
pub fn classify(body: &str, labels: &LabelSet) -> ReleaseNoteCategory {
    let note = extract_release_note(body)
        .unwrap_or_default()
        .to_lowercase();
    let has_none_note = NONE_RE.is_match(&note);
    let has_deprecation_label = labels.has(DEPRECATION_LABEL);

    if note.is_empty() {
        // Deprecation or not: a missing block always blocks the merge.
        ReleaseNoteCategory::Needed
    } else if has_none_note && has_deprecation_label {
        ReleaseNoteCategory::Needed
    } else if has_none_note {
        ReleaseNoteCategory::None
    } else if note.contains(ACTION_REQUIRED_NOTE) {
        ReleaseNoteCategory::ActionRequired
    } else {
        ReleaseNoteCategory::HasNote
    }
}

/// Check the comment history for a `/release-note-none` command.
#[must_use]
pub fn contains_none_command(comments: &[Comment]) -> bool {
    comments
        .iter()
        .any(|c| RELEASE_NOTE_NONE_COMMAND_RE.is_match(&c.body))
}

fn release_note_comment() -> String {
    format!(
        "Adding the \"{RELEASE_NOTE_LABEL_NEEDED}\" label because no release-note block was \
         detected, please follow our [release note process]\
         (https://github.com/5dlabs/mergebot/blob/main/docs/commands.md#release-notes-process) \
         to remove it."
    )
}

fn deprecation_comment() -> String {
    format!(
        "Adding the \"{RELEASE_NOTE_LABEL_NEEDED}\" label and removing any existing \
         \"{RELEASE_NOTE_NONE}\" label because there is a \"{DEPRECATION_LABEL}\" label on the PR."
    )
}

/// Keep the release-note label of a PR in sync with its body text on every
/// qualifying PR event.
pub async fn handle_release_notes_pr(github: &GitHubClient, event: &PullRequestEvent) {
    // Only consider events that edit the PR body or touch labels.
    if !matches!(
        event.action,
        PullRequestAction::Opened
            | PullRequestAction::Reopened
            | PullRequestAction::Edited
            | PullRequestAction::Labeled
    ) {
        return;
    }

    let org = event.org();
    let repo = &event.repository.name;
    let number = event.pull_request.number;
    let author = &event.pull_request.user.login;

    let mut labels = match github.get_issue_labels(org, repo, number).await {
        Ok(labels) => LabelSet::from_labels(&labels),
        Err(err) => {
            error!(error = %err, pr = number, "Failed to list labels on PR");
            return;
        }
    };

    let body = event.pull_request.body.as_deref().unwrap_or("");
    let category = classify(body, &labels);
    let mut label_to_add = category.label();

    if category == ReleaseNoteCategory::Needed {
        if labels.has(DEPRECATION_LABEL) {
            if !labels.has(RELEASE_NOTE_LABEL_NEEDED) {
                let comment = format_simple_response(author, &deprecation_comment());
                if let Err(err) = github.create_comment(org, repo, number, &comment).await {
                    error!(error = %err, pr = number, "Failed to create comment");
                }
            }
        } else {
            // A maintainer may have declared "no note needed" via comment
            // instead of editing the PR body.
            let comments = match github.list_issue_comments(org, repo, number).await {
                Ok(comments) => comments,
                Err(err) => {
                    error!(error = %err, pr = number, "Failed to list comments on PR");
                    return;
                }
            };
            if contains_none_command(&comments) {
                label_to_add = RELEASE_NOTE_NONE;
            } else if !labels.has(RELEASE_NOTE_LABEL_NEEDED) {
                let comment = format_simple_response(author, &release_note_comment());
                if let Err(err) = github.create_comment(org, repo, number, &comment).await {
                    error!(error = %err, pr = number, "Failed to create comment");
                }
            }
        }
    }

    if let Err(err) =
        add_label_if_missing(github, org, repo, number, label_to_add, &mut labels).await
    {
        error!(error = %err, pr = number, label = %label_to_add, "Failed to add label");
    }

    if let Err(err) = remove_other_labels(
        github,
        org,
        repo,
        number,
        label_to_add,
        &ALL_RELEASE_NOTE_LABELS,
        &mut labels,
    )
    .await
    {
        error!(error = %err, pr = number, "Failed to remove conflicting release-note labels");
    }
}

/// Apply a `/release-note-none` comment command.
pub async fn handle_release_notes_comment(github: &GitHubClient, event: &IssueCommentEvent) {
    // Only consider PRs and new comments.
    if !event.issue.is_pull_request() || event.action != IssueCommentAction::Created {
        return;
    }
    if !RELEASE_NOTE_NONE_COMMAND_RE.is_match(&event.comment.body) {
        return;
    }

    let org = event.org();
    let repo = &event.repository.name;
    let number = event.issue.number;

    info!(pr = number, "release note none command match");

    let allowed = match authorize(
        github,
        org,
        &event.comment.user.login,
        &event.issue.user.login,
    )
    .await
    {
        Ok(allowed) => allowed,
        Err(err) => {
            error!(error = %err, pr = number, "Failed to check org membership");
            return;
        }
    };
    if !allowed {
        let reply = format!(
            "you can only set the release note label to {RELEASE_NOTE_NONE} if you are the PR \
             author or an org member."
        );
        let comment = format_ic_response(&event.comment, &reply);
        if let Err(err) = github.create_comment(org, repo, number, &comment).await {
            error!(error = %err, pr = number, "Failed to create comment");
        }
        return;
    }

    // Refuse the command while the release-note block holds a valid note.
    let mut labels = LabelSet::from_labels(&event.issue.labels);
    let category = classify(event.issue.body.as_deref().unwrap_or(""), &labels);
    if matches!(
        category,
        ReleaseNoteCategory::HasNote | ReleaseNoteCategory::ActionRequired
    ) {
        let reply = format!(
            "you can only set the release note label to {RELEASE_NOTE_NONE} if the release-note \
             block in the PR body text is empty or \"none\"."
        );
        let comment = format_ic_response(&event.comment, &reply);
        if let Err(err) = github.create_comment(org, repo, number, &comment).await {
            error!(error = %err, pr = number, "Failed to create comment");
        }
        return;
    }

    if let Err(err) =
        add_label_if_missing(github, org, repo, number, RELEASE_NOTE_NONE, &mut labels).await
    {
        error!(error = %err, pr = number, "Failed to add label");
        return;
    }

    if let Err(err) = remove_other_labels(
        github,
        org,
        repo,
        number,
        RELEASE_NOTE_NONE,
        &ALL_RELEASE_NOTE_LABELS,
        &mut labels,
    )
    .await
    {
        error!(error = %err, pr = number, "Failed to remove conflicting release-note labels");
    }
}
