//! Team and user directory service.

use crate::db::pool::DbPool;
use crate::db::{self, teams, users, DbTransaction};
use crate::error::AppError;
use crate::models::{Team, User};
use crate::services::retry::RetryPolicy;
use tokio_util::sync::CancellationToken;

/// Team creation, lookups and the user activity flag.
#[derive(Clone)]
pub struct DirectoryService {
    pool: DbPool,
    retry: RetryPolicy,
}

impl DirectoryService {
    pub fn new(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Create a team and upsert its members.
    ///
    /// Members that already exist move to the new team and take the name and
    /// activity given here.
    pub async fn create_team(&self, team: &Team, cancel: &CancellationToken) -> Result<Team, AppError> {
        let created = self
            .retry
            .run("create_team", cancel, move || self.create_team_once(team))
            .await?;

        log::info!(
            "[directory] Created team {} with {} members",
            created.team_name,
            created.members.len()
        );
        Ok(created)
    }

    /// Get a team with its current members.
    pub async fn get_team(&self, team_name: &str, cancel: &CancellationToken) -> Result<Team, AppError> {
        self.retry
            .run("get_team", cancel, move || self.get_team_once(team_name))
            .await
    }

    /// Set a user's activity flag and return the updated user.
    pub async fn set_user_active(
        &self,
        user_id: &str,
        is_active: bool,
        cancel: &CancellationToken,
    ) -> Result<User, AppError> {
        let user = self
            .retry
            .run("set_user_active", cancel, move || {
                self.set_user_active_once(user_id, is_active)
            })
            .await?;

        log::debug!("[directory] {} is_active={}", user.user_id, user.is_active);
        Ok(user)
    }

    /// Get a user by id.
    pub async fn get_user(&self, user_id: &str, cancel: &CancellationToken) -> Result<User, AppError> {
        self.retry
            .run("get_user", cancel, move || self.get_user_once(user_id))
            .await
    }

    async fn get_team_once(&self, team_name: &str) -> Result<Team, AppError> {
        teams::get_team(&self.pool, team_name)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("Team", team_name))
    }

    async fn get_user_once(&self, user_id: &str) -> Result<User, AppError> {
        users::get_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("User", user_id))
    }

    async fn create_team_once(&self, team: &Team) -> Result<Team, AppError> {
        let mut tx = db::begin(&self.pool).await?;
        match create_team_tx(&mut tx, team).await {
            Ok(created) => {
                db::commit(tx).await?;
                Ok(created)
            }
            Err(err) => {
                db::rollback(tx).await;
                Err(err)
            }
        }
    }

    async fn set_user_active_once(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        let mut tx = db::begin(&self.pool).await?;
        match set_user_active_tx(&mut tx, user_id, is_active).await {
            Ok(user) => {
                db::commit(tx).await?;
                Ok(user)
            }
            Err(err) => {
                db::rollback(tx).await;
                Err(err)
            }
        }
    }
}

async fn create_team_tx(tx: &mut DbTransaction, team: &Team) -> Result<Team, AppError> {
    if teams::team_exists(&mut **tx, &team.team_name).await? {
        return Err(AppError::team_exists(&team.team_name));
    }

    teams::insert_team(&mut **tx, &team.team_name).await?;
    for member in &team.members {
        users::upsert_user(&mut **tx, &member.to_user(&team.team_name)).await?;
    }

    // A team created without members reads back as absent
    let created = teams::get_team(&mut **tx, &team.team_name)
        .await?
        .unwrap_or_else(|| Team {
            team_name: team.team_name.clone(),
            members: Vec::new(),
        });

    Ok(created)
}

async fn set_user_active_tx(
    tx: &mut DbTransaction,
    user_id: &str,
    is_active: bool,
) -> Result<User, AppError> {
    users::set_active(&mut **tx, user_id, is_active).await?;

    users::get_user(&mut **tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", user_id))
}
