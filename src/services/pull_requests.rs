//! Pull request lifecycle service.
//!
//! Every operation runs as one serializable transaction wrapped in the retry
//! executor: all reads and writes go through that transaction, and it commits
//! only if every step succeeded. On failure it is rolled back before the
//! executor decides whether to run the operation again.

use crate::db::pool::DbPool;
use crate::db::{self, pull_requests, teams, users, DbTransaction};
use crate::error::AppError;
use crate::models::{
    CreatePrRequest, PullRequest, PullRequestShort, PullRequestStatus, ReassignOutcome,
    ReassignRequest, Team, User,
};
use crate::services::retry::RetryPolicy;
use crate::services::reviewer_selection::{
    replace_reviewer, select_initial_reviewers, select_replacement,
};
use tokio_util::sync::CancellationToken;

/// Creates, merges and reassigns pull requests.
///
/// Holds no state between calls beyond the pool handle.
#[derive(Clone)]
pub struct PullRequestService {
    pool: DbPool,
    retry: RetryPolicy,
}

impl PullRequestService {
    pub fn new(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Create a pull request and assign up to two reviewers from the
    /// author's team.
    pub async fn create_pr(
        &self,
        request: &CreatePrRequest,
        cancel: &CancellationToken,
    ) -> Result<PullRequest, AppError> {
        let pr = self
            .retry
            .run("create_pr", cancel, move || self.create_pr_once(request))
            .await?;

        log::info!(
            "[pr] Created {} by {} with reviewers {:?}",
            pr.pull_request_id,
            pr.author_id,
            pr.assigned_reviewers
        );
        Ok(pr)
    }

    /// Merge a pull request. Merging a merged pull request returns it unchanged.
    pub async fn merge_pr(
        &self,
        pull_request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PullRequest, AppError> {
        self.retry
            .run("merge_pr", cancel, move || self.merge_pr_once(pull_request_id))
            .await
    }

    /// Replace one reviewer of an open pull request with another team member.
    pub async fn reassign_reviewer(
        &self,
        request: &ReassignRequest,
        cancel: &CancellationToken,
    ) -> Result<ReassignOutcome, AppError> {
        let outcome = self
            .retry
            .run("reassign_reviewer", cancel, move || {
                self.reassign_reviewer_once(request)
            })
            .await?;

        log::info!(
            "[pr] Reassigned {} on {} to {}",
            request.old_user_id,
            request.pull_request_id,
            outcome.replaced_by
        );
        Ok(outcome)
    }

    /// List the pull requests a user reviews, newest first.
    pub async fn get_user_reviews(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        self.retry
            .run("get_user_reviews", cancel, move || {
                self.get_user_reviews_once(user_id)
            })
            .await
    }

    async fn create_pr_once(&self, request: &CreatePrRequest) -> Result<PullRequest, AppError> {
        let mut tx = db::begin(&self.pool).await?;
        match create_pr_tx(&mut tx, request).await {
            Ok(pr) => {
                db::commit(tx).await?;
                Ok(pr)
            }
            Err(err) => {
                db::rollback(tx).await;
                Err(err)
            }
        }
    }

    async fn merge_pr_once(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        let mut tx = db::begin(&self.pool).await?;
        match merge_pr_tx(&mut tx, pull_request_id).await {
            Ok(pr) => {
                db::commit(tx).await?;
                Ok(pr)
            }
            Err(err) => {
                db::rollback(tx).await;
                Err(err)
            }
        }
    }

    async fn reassign_reviewer_once(
        &self,
        request: &ReassignRequest,
    ) -> Result<ReassignOutcome, AppError> {
        let mut tx = db::begin(&self.pool).await?;
        match reassign_reviewer_tx(&mut tx, request).await {
            Ok(outcome) => {
                db::commit(tx).await?;
                Ok(outcome)
            }
            Err(err) => {
                db::rollback(tx).await;
                Err(err)
            }
        }
    }

    async fn get_user_reviews_once(
        &self,
        user_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        let mut tx = db::begin(&self.pool).await?;
        match user_reviews_tx(&mut tx, user_id).await {
            Ok(reviews) => {
                db::commit(tx).await?;
                Ok(reviews)
            }
            Err(err) => {
                db::rollback(tx).await;
                Err(err)
            }
        }
    }
}

async fn require_user(tx: &mut DbTransaction, user_id: &str) -> Result<User, AppError> {
    users::get_user(&mut **tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", user_id))
}

async fn require_team(tx: &mut DbTransaction, team_name: &str) -> Result<Team, AppError> {
    teams::get_team(&mut **tx, team_name)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Team", team_name))
}

async fn require_pull_request(
    tx: &mut DbTransaction,
    pull_request_id: &str,
) -> Result<PullRequest, AppError> {
    pull_requests::get_pull_request(&mut **tx, pull_request_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("PullRequest", pull_request_id))
}

async fn user_reviews_tx(
    tx: &mut DbTransaction,
    user_id: &str,
) -> Result<Vec<PullRequestShort>, AppError> {
    require_user(tx, user_id).await?;
    pull_requests::list_by_reviewer(&mut **tx, user_id).await
}

async fn create_pr_tx(
    tx: &mut DbTransaction,
    request: &CreatePrRequest,
) -> Result<PullRequest, AppError> {
    let author = require_user(tx, &request.author_id).await?;
    let team = require_team(tx, &author.team_name).await?;

    if pull_requests::pull_request_exists(&mut **tx, &request.pull_request_id).await? {
        return Err(AppError::pr_exists(&request.pull_request_id));
    }

    let pr = PullRequest {
        pull_request_id: request.pull_request_id.clone(),
        pull_request_name: request.pull_request_name.clone(),
        author_id: author.user_id.clone(),
        status: PullRequestStatus::Open,
        assigned_reviewers: select_initial_reviewers(&team.members, &author.user_id),
        created_at: db::now_millis(),
        merged_at: None,
    };

    pull_requests::insert_pull_request(&mut **tx, &pr).await?;
    Ok(pr)
}

async fn merge_pr_tx(tx: &mut DbTransaction, pull_request_id: &str) -> Result<PullRequest, AppError> {
    let pr = require_pull_request(tx, pull_request_id).await?;
    if pr.is_merged() {
        return Ok(pr);
    }

    if pull_requests::mark_merged(&mut **tx, pull_request_id, db::now_millis()).await? {
        log::info!("[pr] Merged {}", pull_request_id);
    }

    require_pull_request(tx, pull_request_id).await
}

async fn reassign_reviewer_tx(
    tx: &mut DbTransaction,
    request: &ReassignRequest,
) -> Result<ReassignOutcome, AppError> {
    let pr = require_pull_request(tx, &request.pull_request_id).await?;

    if !pr.is_open() {
        return Err(AppError::pr_merged(&pr.pull_request_id));
    }

    if !pr.has_reviewer(&request.old_user_id) {
        return Err(AppError::not_assigned(
            &pr.pull_request_id,
            &request.old_user_id,
        ));
    }

    let author = require_user(tx, &pr.author_id).await?;
    let team = require_team(tx, &author.team_name).await?;

    let replacement = select_replacement(
        &team.members,
        &pr.author_id,
        &pr.assigned_reviewers,
        &request.old_user_id,
    )
    .ok_or_else(|| AppError::no_candidate(&pr.pull_request_id))?
    .to_string();

    let reviewers = replace_reviewer(&pr.assigned_reviewers, &request.old_user_id, &replacement);
    pull_requests::update_reviewers(&mut **tx, &pr.pull_request_id, &reviewers).await?;

    let updated = require_pull_request(tx, &pr.pull_request_id).await?;
    Ok(ReassignOutcome {
        pr: updated,
        replaced_by: replacement,
    })
}
