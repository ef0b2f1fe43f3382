//! Database queries for teams.
//!
//! A team row only reserves the name. Membership is the set of users whose
//! `team_name` points at it.

use crate::error::AppError;
use crate::models::{Team, TeamMember, User};
use sqlx::{Executor, Sqlite};

/// Check whether a team name is taken.
pub async fn team_exists<'e, E>(executor: E, team_name: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM teams WHERE team_name = ?)")
            .bind(team_name)
            .fetch_one(executor)
            .await?;

    Ok(exists)
}

/// Insert a team name.
///
/// A duplicate name is reported as `TeamExists`.
pub async fn insert_team<'e, E>(executor: E, team_name: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO teams (team_name) VALUES (?)")
        .bind(team_name)
        .execute(executor)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::team_exists(team_name)
            }
            other => AppError::from(other),
        })?;

    Ok(())
}

/// Get a team with its live members ordered by `user_id`.
///
/// Returns `None` both for an unknown name and for a team that currently
/// has no members; the two are indistinguishable.
pub async fn get_team<'e, E>(executor: E, team_name: &str) -> Result<Option<Team>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT user_id, username, team_name, is_active
        FROM users
        WHERE team_name = ?
        ORDER BY user_id
        "#,
    )
    .bind(team_name)
    .fetch_all(executor)
    .await?;

    if users.is_empty() {
        return Ok(None);
    }

    Ok(Some(Team {
        team_name: team_name.to_string(),
        members: users.into_iter().map(TeamMember::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, pool::DbPool, users};
    use crate::models::User;
    use tempfile::tempdir;

    async fn setup_test_db() -> DbPool {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);
        db::initialize(&db_path).await.unwrap()
    }

    async fn add_user(pool: &DbPool, id: &str, team: &str, active: bool) {
        users::upsert_user(
            pool,
            &User {
                user_id: id.into(),
                username: id.into(),
                team_name: team.into(),
                is_active: active,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let pool = setup_test_db().await;

        assert!(!team_exists(&pool, "backend").await.unwrap());
        insert_team(&pool, "backend").await.unwrap();
        assert!(team_exists(&pool, "backend").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_team_exists() {
        let pool = setup_test_db().await;
        insert_team(&pool, "backend").await.unwrap();

        let err = insert_team(&pool, "backend").await.unwrap_err();
        assert!(matches!(err, AppError::TeamExists { ref team_name } if team_name == "backend"));
    }

    #[tokio::test]
    async fn test_members_ordered_by_user_id() {
        let pool = setup_test_db().await;
        insert_team(&pool, "backend").await.unwrap();
        add_user(&pool, "dave", "backend", true).await;
        add_user(&pool, "alice", "backend", true).await;
        add_user(&pool, "carol", "backend", false).await;

        let team = get_team(&pool, "backend").await.unwrap().unwrap();
        let ids: Vec<&str> = team.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "carol", "dave"]);
        assert!(!team.member("carol").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_team_without_members_is_not_found() {
        let pool = setup_test_db().await;
        insert_team(&pool, "empty").await.unwrap();

        assert!(get_team(&pool, "empty").await.unwrap().is_none());
        assert!(get_team(&pool, "never-created").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_membership_follows_user_moves() {
        let pool = setup_test_db().await;
        insert_team(&pool, "backend").await.unwrap();
        insert_team(&pool, "frontend").await.unwrap();
        add_user(&pool, "bob", "backend", true).await;

        add_user(&pool, "bob", "frontend", true).await;

        assert!(get_team(&pool, "backend").await.unwrap().is_none());
        let frontend = get_team(&pool, "frontend").await.unwrap().unwrap();
        assert_eq!(frontend.members.len(), 1);
    }
}
