//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team member who can author and review pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub user_id: String,

    /// Display name.
    pub username: String,

    /// Team the user currently belongs to.
    pub team_name: String,

    /// Only active users are picked as reviewers.
    pub is_active: bool,
}

/// Input for toggling a user's activity flag.
#[derive(Debug, Clone, Deserialize)]
pub struct SetUserActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}
