//! Label reconciliation: minimal add/remove operations converging the remote
//! label set toward a desired state.

use tracing::debug;

use crate::github::{GitHubClient, GitHubError};
use crate::labels::LabelSet;

/// Aggregate error from a reconciliation pass.
///
/// Every removal is attempted even when earlier ones fail; the failures are
/// collected here instead of aborting the loop.
#[derive(Debug, thiserror::Error)]
#[error("encountered {} errors converging labels: {errors:?}", errors.len())]
pub struct ReconcileError {
    pub errors: Vec<GitHubError>,
}

/// Add `label` unless the set already carries it, updating the in-memory set
/// so subsequent decisions in the same pipeline see the intended end state.
///
/// # Errors
///
/// Returns an error if the add call fails; the set is left unchanged then.
pub async fn add_label_if_missing(
    github: &GitHubClient,
    org: &str,
    repo: &str,
    number: u64,
    label: &str,
    labels: &mut LabelSet,
) -> Result<(), GitHubError> {
    if labels.has(label) {
        debug!(label = %label, "Label already present, skipping add");
        return Ok(());
    }

    github
        .add_labels(org, repo, number, &[label.to_string()])
        .await?;
    labels.insert(label);
    Ok(())
}

/// Remove every member of the mutually-exclusive `group` other than `keep`
/// that is currently present.
///
/// The in-memory set is updated as removals are issued, whether or not the
/// remote call succeeded, so a caller's next read reflects the intended end
/// state without a round-trip.
///
/// # Errors
///
/// Returns an aggregate error once every removal has been attempted.
pub async fn remove_other_labels(
    github: &GitHubClient,
    org: &str,
    repo: &str,
    number: u64,
    keep: &str,
    group: &[&str],
    labels: &mut LabelSet,
) -> Result<(), ReconcileError> {
    let mut errors = Vec::new();

    for &label in group {
        if label.eq_ignore_ascii_case(keep) || !labels.has(label) {
            continue;
        }
        if let Err(err) = github.remove_label(org, repo, number, label).await {
            errors.push(err);
        }
        labels.remove(label);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GROUP: [&str; 4] = [
        "release-note-none",
        "release-note-action-required",
        "release-note-label-needed",
        "release-note",
    ];

    #[tokio::test]
    async fn test_add_label_if_missing_skips_present() {
        // No server: a request would fail, so a skip must not issue one.
        let github = GitHubClient::with_base_url("t", "http://127.0.0.1:1").unwrap();
        let mut labels: LabelSet = ["release-note"].into_iter().collect();

        add_label_if_missing(&github, "acme", "widgets", 1, "Release-Note", &mut labels)
            .await
            .unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[tokio::test]
    async fn test_add_label_updates_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/1/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let github = GitHubClient::with_base_url("t", server.uri()).unwrap();
        let mut labels = LabelSet::new();

        add_label_if_missing(&github, "acme", "widgets", 1, "release-note", &mut labels)
            .await
            .unwrap();
        assert!(labels.has("release-note"));
    }

    #[tokio::test]
    async fn test_mutual_exclusion_holds_after_reconcile() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let github = GitHubClient::with_base_url("t", server.uri()).unwrap();
        let mut labels: LabelSet = [
            "release-note-none",
            "release-note-label-needed",
            "release-note",
            "kind/bug",
        ]
        .into_iter()
        .collect();

        remove_other_labels(
            &github,
            "acme",
            "widgets",
            1,
            "release-note-none",
            &GROUP,
            &mut labels,
        )
        .await
        .unwrap();

        // Exactly one group member survives; unrelated labels are untouched.
        assert!(labels.has("release-note-none"));
        assert!(!labels.has("release-note"));
        assert!(!labels.has("release-note-label-needed"));
        assert!(labels.has("kind/bug"));

        let removed = server.received_requests().await.unwrap();
        assert_eq!(removed.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_fatal() {
        let server = MockServer::start().await;
        // First group member fails, the second succeeds.
        Mock::given(method("DELETE"))
            .and(path(
                "/repos/acme/widgets/issues/1/labels/release-note-action-required",
            ))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/widgets/issues/1/labels/release-note"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let github = GitHubClient::with_base_url("t", server.uri()).unwrap();
        let mut labels: LabelSet = [
            "release-note-none",
            "release-note-action-required",
            "release-note",
        ]
        .into_iter()
        .collect();

        let err = remove_other_labels(
            &github,
            "acme",
            "widgets",
            1,
            "release-note-none",
            &GROUP,
            &mut labels,
        )
        .await
        .unwrap_err();

        // Both removals were attempted despite the failure.
        assert_eq!(err.errors.len(), 1);
        assert!(labels.has("release-note-none"));
        assert!(!labels.has("release-note"));
        assert!(!labels.has("release-note-action-required"));
    }

    #[tokio::test]
    async fn test_reconcile_noop_when_only_keep_present() {
        let github = GitHubClient::with_base_url("t", "http://127.0.0.1:1").unwrap();
        let mut labels: LabelSet = ["release-note-none"].into_iter().collect();

        remove_other_labels(
            &github,
            "acme",
            "widgets",
            1,
            "release-note-none",
            &GROUP,
            &mut labels,
        )
        .await
        .unwrap();
        assert_eq!(labels.len(), 1);
    }
}
