//! Configuration for the webhook service.

use std::env;

/// Webhook service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// GitHub token for API calls.
    pub github_token: Option<String>,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: Option<String>,
    /// GitHub API base URL (overridable for tests).
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8075),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
            webhook_secret: env::var("GITHUB_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            api_base_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
        }
    }
}
