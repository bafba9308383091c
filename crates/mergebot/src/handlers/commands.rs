//! Comment-driven label commands.
//!
//! Comments are lexed into a typed command list (`/kind`, `/priority`,
//! `/label` and their `remove` duals), validated against the custom-label
//! allow-list and the repository's actual label vocabulary, then applied by
//! the reconciler. Commands are gated to the PR author or an org member.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{error, info};

use crate::github::{GitHubClient, GitHubError};
use crate::labels::LabelSet;
use crate::response::{format_ic_response, format_response_raw};
use crate::webhooks::{IssueCommentAction, IssueCommentEvent};

/// Custom labels that may be applied through `/label` and `/remove-label`.
pub const CUSTOM_LABELS: [&str; 10] = [
    "kind/bug",
    "kind/feature",
    "kind/cleanup",
    "kind/api-change",
    "kind/design",
    "kind/regression",
    "kind/documentation",
    "priority/critical-urgent",
    "priority/important-longterm",
    "priority/important-soon",
];

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/(kind|priority)\s*(.*?)\s*$").unwrap());
static REMOVE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/remove-(kind|priority)\s*(.*?)\s*$").unwrap());
static CUSTOM_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/label\s*(.*?)\s*$").unwrap());
static CUSTOM_REMOVE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/remove-label\s*(.*?)\s*$").unwrap());

/// Whether a command adds or removes its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerb {
    Add,
    Remove,
}

/// One parsed label command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: CommandVerb,
    /// The label the command targets (`kind/x`, `priority/x`, or a custom
    /// label in its original spelling).
    pub label: String,
    /// The matched command line, for error reporting.
    pub raw: String,
}

/// Result of lexing a comment body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommands {
    pub commands: Vec<Command>,
    /// `/label`/`/remove-label` lines naming a label outside the allow-list.
    pub invalid: Vec<String>,
}

impl ParsedCommands {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.invalid.is_empty()
    }
}

/// Lex every label command out of a comment body.
///
/// `/kind` and `/priority` take any number of arguments, each yielding one
/// lowercased `family/arg` label. `/label` and `/remove-label` take exactly
/// one argument, which must come from [`CUSTOM_LABELS`]; anything else is
/// collected into `invalid` for user-visible reporting.
#[must_use]
pub fn parse_commands(body: &str) -> ParsedCommands {
    let mut parsed = ParsedCommands::default();

    for (re, verb) in [
        (&*LABEL_RE, CommandVerb::Add),
        (&*REMOVE_LABEL_RE, CommandVerb::Remove),
    ] {
        for caps in re.captures_iter(body) {
            let raw = caps[0].trim().to_string();
            let family = caps[1].to_lowercase();
            for arg in raw.split_whitespace().skip(1) {
                parsed.commands.push(Command {
                    verb,
                    label: format!("{family}/{arg}").to_lowercase(),
                    raw: raw.clone(),
                });
            }
        }
    }

    for (re, verb, keyword) in [
        (&*CUSTOM_LABEL_RE, CommandVerb::Add, "/label"),
        (&*CUSTOM_REMOVE_LABEL_RE, CommandVerb::Remove, "/remove-label"),
    ] {
        for caps in re.captures_iter(body) {
            let raw = caps[0].trim().to_string();
            let parts: Vec<&str> = raw.split_whitespace().collect();
            if parts.len() != 2 || !parts[0].eq_ignore_ascii_case(keyword) {
                continue;
            }
            if CUSTOM_LABELS
                .iter()
                .any(|l| l.eq_ignore_ascii_case(parts[1]))
            {
                parsed.commands.push(Command {
                    verb,
                    label: parts[1].to_string(),
                    raw,
                });
            } else {
                parsed.invalid.push(raw);
            }
        }
    }

    parsed
}

/// Normalize a GitHub login for comparison.
#[must_use]
pub fn norm_login(login: &str) -> String {
    login.trim_start_matches('@').to_lowercase()
}

/// Check if the commenter is the author of the issue.
#[must_use]
pub fn is_author(issue_user: &str, comment_user: &str) -> bool {
    norm_login(issue_user) == norm_login(comment_user)
}

/// Authorize a label-changing comment command: the commenter must be the PR
/// author or an active org member.
///
/// # Errors
///
/// Returns an error if the membership lookup fails.
pub async fn authorize(
    github: &GitHubClient,
    org: &str,
    comment_author: &str,
    pr_author: &str,
) -> Result<bool, GitHubError> {
    if is_author(pr_author, comment_author) {
        return Ok(true);
    }
    github.is_member(org, comment_author).await
}

/// Apply the label commands found in a new or edited comment.
pub async fn handle_comment_label(github: &GitHubClient, event: &IssueCommentEvent) {
    if event.action == IssueCommentAction::Deleted || !event.issue.is_pull_request() {
        return;
    }

    let parsed = parse_commands(&event.comment.body);
    if parsed.is_empty() {
        return;
    }

    let org = event.org();
    let repo = &event.repository.name;
    let number = event.issue.number;

    info!(pr = number, commands = parsed.commands.len(), "Label commands matched");

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
        let comment = format_ic_response(
            &event.comment,
            "you can only add or remove labels if you are the PR author or an org member.",
        );
        if let Err(err) = github.create_comment(org, repo, number, &comment).await {
            error!(error = %err, pr = number, "Failed to create comment");
        }
        return;
    }

    let repo_vocabulary = match github.list_repo_labels(org, repo).await {
        Ok(labels) => LabelSet::from_labels(&labels),
        Err(err) => {
            error!(error = %err, pr = number, "Failed to list repository labels");
            return;
        }
    };
    let mut current = match github.get_issue_labels(org, repo, number).await {
        Ok(labels) => LabelSet::from_labels(&labels),
        Err(err) => {
            error!(error = %err, pr = number, "Failed to list labels on PR");
            return;
        }
    };

    let mut no_such_labels_in_repo = Vec::new();
    let mut no_such_labels_on_issue = Vec::new();

    for command in &parsed.commands {
        match command.verb {
            CommandVerb::Add => {
                if current.has(&command.label) {
                    continue;
                }
                if !repo_vocabulary.has(&command.label) {
                    no_such_labels_in_repo.push(command.label.clone());
                    continue;
                }
                match github
                    .add_labels(org, repo, number, &[command.label.clone()])
                    .await
                {
                    Ok(()) => current.insert(&command.label),
                    Err(err) => {
                        error!(error = %err, label = %command.label, "GitHub failed to add label");
                    }
                }
            }
            CommandVerb::Remove => {
                if !current.has(&command.label) {
                    no_such_labels_on_issue.push(command.label.clone());
                    continue;
                }
                if !repo_vocabulary.has(&command.label) {
                    continue;
                }
                if let Err(err) = github.remove_label(org, repo, number, &command.label).await {
                    error!(error = %err, label = %command.label, "GitHub failed to remove label");
                }
                current.remove(&command.label);
            }
        }
    }

    // Report the first applicable problem class back to the commenter.
    let reply = if !parsed.invalid.is_empty() {
        info!(invalid = ?parsed.invalid, "Commands named labels outside the allow-list");
        Some(format!(
            "The label(s) `{}` cannot be applied. These labels are supported: `{}`",
            parsed.invalid.join(", "),
            CUSTOM_LABELS.join(", ")
        ))
    } else if !no_such_labels_in_repo.is_empty() {
        info!(labels = ?no_such_labels_in_repo, "Labels missing in repo");
        Some(format!(
            "The label(s) `{}` cannot be applied, because the repository doesn't have them",
            no_such_labels_in_repo.join(", ")
        ))
    } else if !no_such_labels_on_issue.is_empty() {
        Some(format!(
            "Those labels are not set on the issue: `{}`",
            no_such_labels_on_issue.join(", ")
        ))
    } else {
        None
    };

    if let Some(reply) = reply {
        let comment = format_response_raw(
            &event.comment.body,
            &event.issue.html_url,
            &event.comment.user.login,
            &reply,
        );
        if let Err(err) = github.create_comment(org, repo, number, &comment).await {
            error!(error = %err, pr = number, "Failed to create comment");
        }
    }
}
