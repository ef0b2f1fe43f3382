//! Data models for the application.
//!
//! These models represent the entities stored in the SQLite database and the
//! request/response shapes of the HTTP API.

pub mod pull_request;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{
    CreatePrRequest, PullRequest, PullRequestRow, PullRequestShort, PullRequestStatus,
    ReassignOutcome, ReassignRequest, MAX_REVIEWERS,
};
pub use team::{Team, TeamMember};
pub use user::{SetUserActiveRequest, User};
