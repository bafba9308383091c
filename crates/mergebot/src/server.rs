//! HTTP server for GitHub webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::github::GitHubClient;
use crate::handlers::block_status::check_block_status;
use crate::handlers::branch::handle_branch_label;
use crate::handlers::commands::handle_comment_label;
use crate::handlers::release_notes::{handle_release_notes_comment, handle_release_notes_pr};
use crate::webhooks::{verify_signature, IssueCommentEvent, PingEvent, PullRequestEvent};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Config,
    /// GitHub API client.
    pub github: Arc<GitHubClient>,
}

/// Build the HTTP router for the webhook service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/github_event", post(github_event_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Handle incoming GitHub webhooks.
///
/// The signature is verified over the raw body before anything is decoded;
/// the merge-block recomputation is dispatched as a detached task after the
/// response is produced, so concurrent deliveries for the same PR converge
/// eventually instead of serializing.
async fn github_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let delivery_id = headers
        .get("X-GitHub-Delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    info!(
        event_type = %event_type,
        delivery_id = %delivery_id,
        "Received GitHub webhook"
    );

    if let Some(secret) = &state.config.webhook_secret {
        let Some(signature) = headers.get("X-Hub-Signature").and_then(|v| v.to_str().ok())
        else {
            warn!("Missing X-Hub-Signature header");
            return Err(StatusCode::FORBIDDEN);
        };

        if let Err(err) = verify_signature(signature, &body, secret) {
            warn!(error = %err, "Invalid webhook signature");
            return Err(StatusCode::FORBIDDEN);
        }
        debug!("Webhook signature verified");
    } else {
        warn!("No webhook secret configured - accepting unverified delivery");
    }

    match event_type {
        "ping" => {
            let event: PingEvent = serde_json::from_slice(&body).map_err(|err| {
                error!(error = %err, "Failed to parse ping payload");
                StatusCode::BAD_REQUEST
            })?;
            info!(hook_id = ?event.hook_id, "ping event");
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "pong" }))))
        }
        "pull_request" => {
            let event: PullRequestEvent = serde_json::from_slice(&body).map_err(|err| {
                error!(error = %err, "Failed to parse pull_request payload");
                StatusCode::BAD_REQUEST
            })?;
            info!(
                pr = event.pull_request.number,
                action = ?event.action,
                "pull request event"
            );

            handle_pull_request_event(&state.github, &event).await;

            spawn_block_status(
                &state.github,
                event.org().to_string(),
                event.repository.name.clone(),
                event.pull_request.number,
            );
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
        }
        "issue_comment" => {
            let event: IssueCommentEvent = serde_json::from_slice(&body).map_err(|err| {
                error!(error = %err, "Failed to parse issue_comment payload");
                StatusCode::BAD_REQUEST
            })?;
            info!(issue = event.issue.number, "issue comment event");

            handle_issue_comment_event(&state.github, &event).await;

            if !event.issue.is_pull_request() {
                // Plain issues carry no merge gate.
                return Ok((
                    StatusCode::ACCEPTED,
                    Json(json!({ "status": "accepted", "reason": "not_pull_request" })),
                ));
            }

            spawn_block_status(
                &state.github,
                event.org().to_string(),
                event.repository.name.clone(),
                event.issue.number,
            );
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
        }
        _ => {
            info!(event_type = %event_type, "other events not implemented");
            Err(StatusCode::NOT_IMPLEMENTED)
        }
    }
}

/// Route a `pull_request` event through the label policies.
pub async fn handle_pull_request_event(github: &GitHubClient, event: &PullRequestEvent) {
    handle_release_notes_pr(github, event).await;
    handle_branch_label(github, event).await;
}

/// Route an `issue_comment` event through the comment commands.
pub async fn handle_issue_comment_event(github: &GitHubClient, event: &IssueCommentEvent) {
    handle_release_notes_comment(github, event).await;
    handle_comment_label(github, event).await;
}

/// Recompute the merge-block status on its own task, after the response.
fn spawn_block_status(github: &Arc<GitHubClient>, org: String, repo: String, number: u64) {
    let github = Arc::clone(github);
    tokio::spawn(async move {
        check_block_status(&github, &org, &repo, number).await;
    });
}
