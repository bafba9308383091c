//! GitHub REST API client used by the label and status handlers.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::webhooks::{Comment, Label, PullRequest};

const GITHUB_API_URL: &str = "https://api.github.com";

/// Context name the merge-block status is reported under.
pub const STATUS_CONTEXT: &str = "blocker";

/// Commit status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
}

impl StatusState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
        }
    }
}

/// GitHub API error.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
}

/// Organization membership, as returned by the memberships endpoint.
#[derive(Debug, Deserialize)]
struct Membership {
    #[serde(default)]
    state: String,
}

/// GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    /// Create a new GitHub client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: &str) -> Result<Self, GitHubError> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Create a client against a custom API base URL (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(token: &str, base_url: impl Into<String>) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("mergebot/1.0"));

        // Membership probes must observe 302 responses instead of chasing them.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.to_string(),
        })
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Get a pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_pull_request(
        &self,
        org: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GitHubError> {
        let url = format!("{}/repos/{org}/{repo}/pulls/{number}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        let response = error_for_status(response).await?;

        Ok(response.json().await?)
    }

    /// Get all labels on an issue or pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_issue_labels(
        &self,
        org: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Label>, GitHubError> {
        let url = format!(
            "{}/repos/{org}/{repo}/issues/{number}/labels?per_page=100",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        let response = error_for_status(response).await?;

        Ok(response.json().await?)
    }

    /// List every label defined in the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_repo_labels(
        &self,
        org: &str,
        repo: &str,
    ) -> Result<Vec<Label>, GitHubError> {
        const PER_PAGE: usize = 50;

        let mut all_labels = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/repos/{org}/{repo}/labels?per_page={PER_PAGE}&page={page}",
                self.base_url
            );

            let response = self
                .client
                .get(&url)
                .header(AUTHORIZATION, self.auth())
                .send()
                .await?;
            let response = error_for_status(response).await?;

            let labels: Vec<Label> = response.json().await?;
            let last_page = labels.len() < PER_PAGE;
            all_labels.extend(labels);

            if last_page {
                break;
            }
            page += 1;
        }

        Ok(all_labels)
    }

    /// List all comments on an issue or pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_issue_comments(
        &self,
        org: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, GitHubError> {
        let url = format!(
            "{}/repos/{org}/{repo}/issues/{number}/comments?per_page=100",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        let response = error_for_status(response).await?;

        Ok(response.json().await?)
    }

    /// Add labels to an issue or pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn add_labels(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), GitHubError> {
        debug!(labels = ?labels, "Adding GitHub labels");
        let url = format!(
            "{}/repos/{org}/{repo}/issues/{number}/labels",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&json!({ "labels": labels }))
            .send()
            .await?;
        error_for_status(response).await?;

        Ok(())
    }

    /// Remove a label from an issue or pull request.
    ///
    /// A 404 means the label is already gone and is treated as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn remove_label(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), GitHubError> {
        debug!(label = %label, "Removing GitHub label");
        let url = format!(
            "{}/repos/{org}/{repo}/issues/{number}/labels/{}",
            self.base_url,
            encode_label(label)
        );

        let response = self
            .client
            .delete(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(label = %label, "Label already absent");
            return Ok(());
        }
        error_for_status(response).await?;

        Ok(())
    }

    /// Create a repository label.
    ///
    /// A 422 means the label already exists and is treated as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_label(
        &self,
        org: &str,
        repo: &str,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), GitHubError> {
        debug!(label = %name, "Creating GitHub label");
        let url = format!("{}/repos/{org}/{repo}/labels", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&json!({
                "name": name,
                "description": description,
                "color": color,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(label = %name, "Label already exists");
            return Ok(());
        }
        error_for_status(response).await?;

        Ok(())
    }

    /// Post a comment on an issue or pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_comment(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        debug!("Sending GitHub comment");
        let url = format!(
            "{}/repos/{org}/{repo}/issues/{number}/comments",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&json!({ "body": body }))
            .send()
            .await?;
        error_for_status(response).await?;

        Ok(())
    }

    /// Set the commit status under the fixed merge-block context.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn set_status(
        &self,
        org: &str,
        repo: &str,
        sha: &str,
        state: StatusState,
        description: &str,
    ) -> Result<(), GitHubError> {
        debug!(
            sha = %sha,
            state = %state.as_str(),
            description = %description,
            "Setting commit status"
        );
        let url = format!("{}/repos/{org}/{repo}/statuses/{sha}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&json!({
                "state": state,
                "description": description,
                "context": STATUS_CONTEXT,
            }))
            .send()
            .await?;
        error_for_status(response).await?;

        Ok(())
    }

    /// Check if a user is an active member of the organization.
    ///
    /// When the organization name equals the user login the check always
    /// passes, so the bot can operate on personal namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or answers with an unexpected
    /// status (a 302 means the requester itself lacks membership).
    pub async fn is_member(&self, org: &str, user: &str) -> Result<bool, GitHubError> {
        if org.eq_ignore_ascii_case(user) {
            return Ok(true);
        }

        let url = format!("{}/orgs/{org}/memberships/{user}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let membership: Membership = response.json().await?;
                Ok(membership.state == "active")
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(GitHubError::Api { status, body })
            }
        }
    }
}

/// Surface non-2xx responses as typed errors with the response body attached.
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GitHubError::Api { status, body })
}

/// Percent-encode a label name for use as a path segment. Label names only
/// ever contain word characters, `-`, spaces, and `/`.
fn encode_label(label: &str) -> String {
    label.replace('%', "%25").replace('/', "%2F").replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_encode_label() {
        assert_eq!(encode_label("WIP"), "WIP");
        assert_eq!(
            encode_label("do-not-merge/awaiting-PR"),
            "do-not-merge%2Fawaiting-PR"
        );
    }

    #[tokio::test]
    async fn test_is_member_self_org() {
        // No server configured: must short-circuit before any request.
        let client = GitHubClient::with_base_url("t", "http://127.0.0.1:1").unwrap();
        assert!(client.is_member("octocat", "octocat").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_member_active() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/memberships/dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "active",
                "role": "member"
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        assert!(client.is_member("acme", "dev").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_member_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/memberships/stranger"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        assert!(!client.is_member("acme", "stranger").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_member_pending_is_not_active() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/memberships/invitee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "pending"
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        assert!(!client.is_member("acme", "invitee").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_label_404_is_benign() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/widgets/issues/3/labels/WIP"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        assert!(client.remove_label("acme", "widgets", 3, "WIP").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_label_422_is_benign() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/labels"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        assert!(client
            .create_label("acme", "widgets", "kind/bug", "A bug", "e11d21")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_add_labels_error_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/3/labels"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        let err = client
            .add_labels("acme", "widgets", 3, &["WIP".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_list_repo_labels_paginates() {
        let server = MockServer::start().await;

        let first_page: Vec<serde_json::Value> = (0..50)
            .map(|i| serde_json::json!({ "name": format!("label-{i}") }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/labels"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first_page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/labels"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "name": "last" }])),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("t", server.uri()).unwrap();
        let labels = client.list_repo_labels("acme", "widgets").await.unwrap();
        assert_eq!(labels.len(), 51);
        assert_eq!(labels.last().unwrap().name, "last");
    }
}
