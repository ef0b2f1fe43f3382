//! Database queries for users.

use crate::error::AppError;
use crate::models::User;
use sqlx::{Executor, Sqlite};

/// Get a user by id.
pub async fn get_user<'e, E>(executor: E, user_id: &str) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(
        "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// Insert a user, or overwrite name, team and activity if the id exists.
///
/// This is how a user moves between teams: the newest team claim wins.
/// Lock and snapshot conflicts keep their `Conflict` classification.
pub async fn upsert_user<'e, E>(executor: E, user: &User) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO users (user_id, username, team_name, is_active)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            username = excluded.username,
            team_name = excluded.team_name,
            is_active = excluded.is_active
        "#,
    )
    .bind(&user.user_id)
    .bind(&user.username)
    .bind(&user.team_name)
    .bind(user.is_active)
    .execute(executor)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Database { message, .. } => {
            AppError::database_with_op(message, format!("upsert user {}", user.user_id))
        }
        other => other,
    })?;

    Ok(())
}

/// Set a user's activity flag.
///
/// Returns `NotFound` when no user has this id.
pub async fn set_active<'e, E>(executor: E, user_id: &str, is_active: bool) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE user_id = ?")
        .bind(is_active)
        .bind(user_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found_with_id("User", user_id));
    }

    Ok(())
}
