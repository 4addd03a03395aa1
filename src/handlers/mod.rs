pub mod cycles;
pub mod health;
pub mod providers;
pub mod pull_requests;
pub mod recommendations;
pub mod rule_configs;

use std::sync::Arc;

use crate::scm::GithubClient;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub github: Arc<GithubClient>,
    pub encryption_key: String,
}
