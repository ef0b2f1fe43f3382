//! Pull request model.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Most reviewers a pull request can have.
pub const MAX_REVIEWERS: usize = 2;

/// State of a pull request. Only ever moves from `Open` to `Merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl TryFrom<&str> for PullRequestStatus {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(AppError::internal(format!(
                "Unknown pull request status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request with its assigned reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,

    pub pull_request_name: String,

    pub author_id: String,

    pub status: PullRequestStatus,

    /// Ordered, distinct, never contains the author.
    pub assigned_reviewers: Vec<String>,

    /// Creation timestamp (Unix milliseconds).
    #[serde(rename = "createdAt")]
    pub created_at: i64,

    /// Merge timestamp (Unix milliseconds), set once on merge.
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<i64>,
}

impl PullRequest {
    /// Check if the pull request is still open.
    pub fn is_open(&self) -> bool {
        self.status == PullRequestStatus::Open
    }

    /// Check if the pull request has been merged.
    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    /// Check if a user is among the assigned reviewers.
    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }
}

/// Row shape of the `pull_requests` table.
///
/// `assigned_reviewers` is stored as a JSON array string.
#[derive(Debug, Clone, FromRow)]
pub struct PullRequestRow {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
    pub assigned_reviewers: String,
    pub created_at: i64,
    pub merged_at: Option<i64>,
}

impl TryFrom<PullRequestRow> for PullRequest {
    type Error = AppError;

    fn try_from(row: PullRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: PullRequestStatus::try_from(row.status.as_str())?,
            assigned_reviewers: serde_json::from_str(&row.assigned_reviewers)?,
            pull_request_id: row.pull_request_id,
            pull_request_name: row.pull_request_name,
            author_id: row.author_id,
            created_at: row.created_at,
            merged_at: row.merged_at,
        })
    }
}

/// Lightweight projection used by the reviewer-centric query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Input for replacing one reviewer of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

/// Result of a successful reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct ReassignOutcome {
    pub pr: PullRequest,
    pub replaced_by: String,
}
