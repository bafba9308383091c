//! Webhook payload types and signature verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Why an `X-Hub-Signature` header was rejected.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The header named a digest other than the supported `sha1`.
    #[error("unsupported webhook digest algorithm: {0:?}")]
    UnsupportedDigest(String),
    /// The computed digest of the raw body differs from the received one.
    #[error("webhook signature does not match request body")]
    SignatureMismatch,
}

/// Verify a GitHub webhook signature using HMAC-SHA1.
///
/// The header carries `sha1=<hex digest>` (GitHub's legacy
/// `X-Hub-Signature`). The digest is computed over the raw, unparsed request
/// body, so this must run before any payload decoding. Comparison is
/// constant-time to prevent timing attacks.
///
/// # Errors
///
/// Returns [`SignatureError::UnsupportedDigest`] for any algorithm other than
/// `sha1`, and [`SignatureError::SignatureMismatch`] when the digest differs.
pub fn verify_signature(header: &str, body: &[u8], secret: &str) -> Result<(), SignatureError> {
    let (algorithm, received_hex) = header
        .split_once('=')
        .ok_or_else(|| SignatureError::UnsupportedDigest(header.to_string()))?;

    if algorithm != "sha1" {
        return Err(SignatureError::UnsupportedDigest(algorithm.to_string()));
    }

    let received =
        hex::decode(received_hex).map_err(|_| SignatureError::SignatureMismatch)?;

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::SignatureMismatch)?;
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if bool::from(computed.as_slice().ct_eq(&received)) {
        Ok(())
    } else {
        Err(SignatureError::SignatureMismatch)
    }
}

/// Pull request event action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Edited,
    Labeled,
    Unlabeled,
    Closed,
    Synchronize,
    ReadyForReview,
    Assigned,
    Unassigned,
    ReviewRequested,
    ReviewRequestRemoved,
    /// Catch-all to avoid parse failures on new actions.
    #[serde(other)]
    Unknown,
}

/// Issue comment event action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCommentAction {
    Created,
    Edited,
    Deleted,
    #[serde(other)]
    Unknown,
}

/// GitHub user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    /// User login
    pub login: String,
}

/// GitHub label.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
    /// Label color
    #[serde(default)]
    pub color: Option<String>,
    /// Label description
    #[serde(default)]
    pub description: Option<String>,
}

/// GitHub repository.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// Repository owner
    pub owner: User,
    /// Full name (org/repo)
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Git reference (branch).
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    /// Branch name
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// SHA
    pub sha: String,
}

/// GitHub pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR body/description
    #[serde(default)]
    pub body: Option<String>,
    /// PR state (open, closed)
    pub state: String,
    /// PR author
    pub user: User,
    /// Source branch
    pub head: GitRef,
    /// Labels on the PR
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// GitHub issue (pull requests are issues with a `pull_request` key).
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    /// Issue number
    pub number: u64,
    /// Issue body
    #[serde(default)]
    pub body: Option<String>,
    /// Issue author
    pub user: User,
    /// Labels on the issue
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Issue HTML URL
    #[serde(default)]
    pub html_url: String,
    /// Present when the issue is a pull request
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// Check if this issue is a pull request.
    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// GitHub issue comment.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    /// Comment body
    #[serde(default)]
    pub body: String,
    /// Comment author
    pub user: User,
    /// Comment HTML URL
    #[serde(default)]
    pub html_url: String,
}

/// `pull_request` webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Action type
    pub action: PullRequestAction,
    /// Pull request details
    pub pull_request: PullRequest,
    /// Repository info
    pub repository: Repository,
}

impl PullRequestEvent {
    /// Organization (repository owner) login.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.repository.owner.login
    }
}

/// `issue_comment` webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    /// Action type
    pub action: IssueCommentAction,
    /// Parent issue (or pull request)
    pub issue: Issue,
    /// The comment itself
    pub comment: Comment,
    /// Repository info
    pub repository: Repository,
}

impl IssueCommentEvent {
    /// Organization (repository owner) login.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.repository.owner.login
    }
}

/// `ping` webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PingEvent {
    /// GitHub zen aphorism
    #[serde(default)]
    pub zen: Option<String>,
    /// Webhook ID
    #[serde(default)]
    pub hook_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_verify_signature_valid() {
        let body = b"test payload";
        let secret = "test-secret";
        let header = sign(body, secret);

        assert!(verify_signature(&header, body, secret).is_ok());
    }

    #[test]
    fn test_verify_signature_mismatch() {
        let body = b"test payload";
        let secret = "test-secret";
        let header = sign(b"another payload", secret);

        assert!(matches!(
            verify_signature(&header, body, secret),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let body = b"test payload";
        let header = sign(body, "other-secret");

        assert!(matches!(
            verify_signature(&header, body, "test-secret"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_signature_unsupported_digest() {
        let body = b"test payload";

        assert!(matches!(
            verify_signature("sha256=abcdef", body, "s"),
            Err(SignatureError::UnsupportedDigest(_))
        ));
        // No `algorithm=` prefix at all
        assert!(matches!(
            verify_signature("deadbeef", body, "s"),
            Err(SignatureError::UnsupportedDigest(_))
        ));
    }

    #[test]
    fn test_verify_signature_malformed_hex() {
        assert!(matches!(
            verify_signature("sha1=not-hex", b"body", "s"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_parse_pull_request_event() {
        let json = r#"{
            "action": "opened",
            "pull_request": {
                "number": 42,
                "body": "Fixes a bug",
                "state": "open",
                "user": {"login": "octocat"},
                "head": {"ref": "fix/nil-deref", "sha": "abc123"},
                "labels": [{"name": "WIP"}]
            },
            "repository": {
                "name": "widgets",
                "owner": {"login": "acme"}
            }
        }"#;

        let event: PullRequestEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, PullRequestAction::Opened);
        assert_eq!(event.org(), "acme");
        assert_eq!(event.pull_request.number, 42);
        assert_eq!(event.pull_request.head.ref_name, "fix/nil-deref");
        assert_eq!(event.pull_request.labels[0].name, "WIP");
    }

    #[test]
    fn test_parse_issue_comment_event() {
        let json = r#"{
            "action": "created",
            "issue": {
                "number": 7,
                "user": {"login": "octocat"},
                "html_url": "https://github.com/acme/widgets/pull/7",
                "pull_request": {"url": "https://api.github.com/repos/acme/widgets/pulls/7"}
            },
            "comment": {
                "body": "/kind bug",
                "user": {"login": "someone"},
                "html_url": "https://github.com/acme/widgets/pull/7#issuecomment-1"
            },
            "repository": {
                "name": "widgets",
                "owner": {"login": "acme"}
            }
        }"#;

        let event: IssueCommentEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, IssueCommentAction::Created);
        assert!(event.issue.is_pull_request());
        assert_eq!(event.comment.body, "/kind bug");
    }

    #[test]
    fn test_unknown_action_does_not_fail_parse() {
        let json = r#"{
            "action": "auto_merge_enabled",
            "pull_request": {
                "number": 1,
                "state": "open",
                "user": {"login": "octocat"},
                "head": {"ref": "main", "sha": "abc"}
            },
            "repository": {"name": "widgets", "owner": {"login": "acme"}}
        }"#;

        let event: PullRequestEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, PullRequestAction::Unknown);
    }
}
