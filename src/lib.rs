//! Review Roster - pull request reviewer assignment for teams.
//!
//! Tracks teams, users and pull requests in SQLite, assigns reviewers from
//! the author's team and serves the operations over a JSON HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use config::Config;
use services::http_api::{api_router, ApiState};
use services::http_server::{self, ServerError};
use services::{DirectoryService, PullRequestService, StatsService};
use tokio_util::sync::CancellationToken;

/// Initialize the database and serve the API until `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), ServerError> {
    let pool = db::initialize(&config.database_path).await?;
    let retry = config.retry_policy();

    let state = ApiState {
        directory: DirectoryService::new(pool.clone(), retry),
        pull_requests: PullRequestService::new(pool.clone(), retry),
        stats: StatsService::new(),
        shutdown: shutdown.clone(),
        request_timeout: config.request_timeout(),
    };

    let listener = http_server::bind(&config.bind_address()).await?;
    http_server::serve(listener, api_router(state), shutdown).await?;

    pool.close().await;
    Ok(())
}
