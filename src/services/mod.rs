//! Business logic services.
//!
//! The directory and pull request services run each operation as one retried
//! transaction against the store. The HTTP modules adapt them to JSON routes.

pub mod directory;
pub mod http_api;
pub mod http_server;
pub mod pull_requests;
pub mod retry;
pub mod reviewer_selection;
pub mod stats;

pub use directory::DirectoryService;
pub use pull_requests::PullRequestService;
pub use retry::RetryPolicy;
pub use stats::StatsService;
