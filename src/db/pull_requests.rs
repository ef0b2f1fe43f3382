//! Database queries for pull requests.
//!
//! The two mutating queries on an existing row (merge and reviewer update)
//! are conditional on `status = 'OPEN'`, so a merged pull request is never
//! modified even if a caller acts on a stale read.

use crate::error::AppError;
use crate::models::{PullRequest, PullRequestRow, PullRequestShort, PullRequestStatus};
use sqlx::{Executor, Sqlite};

const SELECT_PULL_REQUEST: &str = r#"
    SELECT pull_request_id, pull_request_name, author_id, status,
           assigned_reviewers, created_at, merged_at
    FROM pull_requests
    WHERE pull_request_id = ?
"#;

/// Get a pull request by id.
pub async fn get_pull_request<'e, E>(
    executor: E,
    pull_request_id: &str,
) -> Result<Option<PullRequest>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, PullRequestRow>(SELECT_PULL_REQUEST)
        .bind(pull_request_id)
        .fetch_optional(executor)
        .await?;

    row.map(PullRequest::try_from).transpose()
}

/// Check whether a pull request id is taken.
pub async fn pull_request_exists<'e, E>(executor: E, pull_request_id: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?)",
    )
    .bind(pull_request_id)
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

/// Insert a new pull request.
///
/// A duplicate id is reported as `PrExists`; every other failure propagates.
pub async fn insert_pull_request<'e, E>(executor: E, pr: &PullRequest) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let reviewers = serde_json::to_string(&pr.assigned_reviewers)?;

    sqlx::query(
        r#"
        INSERT INTO pull_requests (
            pull_request_id, pull_request_name, author_id, status,
            assigned_reviewers, created_at, merged_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&pr.pull_request_id)
    .bind(&pr.pull_request_name)
    .bind(&pr.author_id)
    .bind(pr.status.as_str())
    .bind(&reviewers)
    .bind(pr.created_at)
    .bind(pr.merged_at)
    .execute(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::pr_exists(&pr.pull_request_id)
        }
        other => AppError::from(other),
    })?;

    Ok(())
}

/// Mark an open pull request merged at `merged_at`.
///
/// Returns `false` when no open row matched, which leaves an already-merged
/// pull request (and its `merged_at`) untouched.
pub async fn mark_merged<'e, E>(
    executor: E,
    pull_request_id: &str,
    merged_at: i64,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE pull_requests
        SET status = ?, merged_at = ?
        WHERE pull_request_id = ? AND status = ?
        "#,
    )
    .bind(PullRequestStatus::Merged.as_str())
    .bind(merged_at)
    .bind(pull_request_id)
    .bind(PullRequestStatus::Open.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the reviewer list of an open pull request.
///
/// Zero affected rows means the pull request is no longer open and is
/// reported as `PrMerged`.
pub async fn update_reviewers<'e, E>(
    executor: E,
    pull_request_id: &str,
    reviewers: &[String],
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let reviewers = serde_json::to_string(reviewers)?;

    let result = sqlx::query(
        r#"
        UPDATE pull_requests
        SET assigned_reviewers = ?
        WHERE pull_request_id = ? AND status = ?
        "#,
    )
    .bind(&reviewers)
    .bind(pull_request_id)
    .bind(PullRequestStatus::Open.as_str())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::pr_merged(pull_request_id));
    }

    Ok(())
}

// CROSS JOIN pins the reviewer table as the outer loop so the lookup starts
// from its primary key.
const LIST_BY_REVIEWER: &str = r#"
    SELECT p.pull_request_id, p.pull_request_name, p.author_id, p.status
    FROM pull_request_reviewers r
    CROSS JOIN pull_requests p ON p.pull_request_id = r.pull_request_id
    WHERE r.user_id = ?
    ORDER BY p.created_at DESC, p.rowid DESC
"#;

/// List pull requests that have `user_id` among their reviewers, newest first.
///
/// Reads the `pull_request_reviewers` index, which triggers keep in step with
/// `assigned_reviewers`.
pub async fn list_by_reviewer<'e, E>(
    executor: E,
    user_id: &str,
) -> Result<Vec<PullRequestShort>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(LIST_BY_REVIEWER)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

    rows.into_iter()
        .map(|(pull_request_id, pull_request_name, author_id, status)| -> Result<_, AppError> {
            Ok(PullRequestShort {
                status: PullRequestStatus::try_from(status.as_str())?,
                pull_request_id,
                pull_request_name,
                author_id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, pool::DbPool};
    use tempfile::tempdir;

    async fn setup_test_db() -> DbPool {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);

        let pool = db::initialize(&db_path).await.unwrap();

        sqlx::query("INSERT INTO teams (team_name) VALUES ('backend')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"INSERT INTO users (user_id, username, team_name, is_active) VALUES
            ('alice', 'Alice', 'backend', 1),
            ('bob', 'Bob', 'backend', 1),
            ('dave', 'Dave', 'backend', 1)"#,
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn open_pr(id: &str, reviewers: &[&str], created_at: i64) -> PullRequest {
        PullRequest {
            pull_request_id: id.into(),
            pull_request_name: format!("Change {}", id),
            author_id: "alice".into(),
            status: PullRequestStatus::Open,
            assigned_reviewers: reviewers.iter().map(|r| r.to_string()).collect(),
            created_at,
            merged_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let pool = setup_test_db().await;
        let pr = open_pr("pr-1", &["bob", "dave"], 1_000);

        insert_pull_request(&pool, &pr).await.unwrap();

        let stored = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(stored, pr);
        assert!(pull_request_exists(&pool, "pr-1").await.unwrap());
        assert!(get_pull_request(&pool, "pr-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_pr_exists_and_keeps_original() {
        let pool = setup_test_db().await;
        insert_pull_request(&pool, &open_pr("pr-1", &["bob"], 1_000))
            .await
            .unwrap();

        let mut duplicate = open_pr("pr-1", &["dave"], 2_000);
        duplicate.pull_request_name = "Other".into();
        let err = insert_pull_request(&pool, &duplicate).await.unwrap_err();
        assert!(matches!(err, AppError::PrExists { .. }));

        let stored = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(stored.assigned_reviewers, vec!["bob"]);
        assert_eq!(stored.pull_request_name, "Change pr-1");
    }

    #[tokio::test]
    async fn test_mark_merged_only_once() {
        let pool = setup_test_db().await;
        insert_pull_request(&pool, &open_pr("pr-1", &["bob"], 1_000))
            .await
            .unwrap();

        assert!(mark_merged(&pool, "pr-1", 5_000).await.unwrap());
        assert!(!mark_merged(&pool, "pr-1", 9_000).await.unwrap());

        let stored = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert!(stored.is_merged());
        assert_eq!(stored.merged_at, Some(5_000));
    }

    #[tokio::test]
    async fn test_update_reviewers_guarded_by_open_status() {
        let pool = setup_test_db().await;
        insert_pull_request(&pool, &open_pr("pr-1", &["bob"], 1_000))
            .await
            .unwrap();

        update_reviewers(&pool, "pr-1", &["dave".to_string()])
            .await
            .unwrap();
        mark_merged(&pool, "pr-1", 2_000).await.unwrap();

        let err = update_reviewers(&pool, "pr-1", &["bob".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PrMerged { .. }));

        let stored = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(stored.assigned_reviewers, vec!["dave"]);
    }

    #[tokio::test]
    async fn test_list_by_reviewer_newest_first() {
        let pool = setup_test_db().await;
        insert_pull_request(&pool, &open_pr("pr-old", &["bob", "dave"], 1_000))
            .await
            .unwrap();
        insert_pull_request(&pool, &open_pr("pr-new", &["bob"], 3_000))
            .await
            .unwrap();
        insert_pull_request(&pool, &open_pr("pr-other", &["dave"], 2_000))
            .await
            .unwrap();
        mark_merged(&pool, "pr-old", 4_000).await.unwrap();

        let reviews = list_by_reviewer(&pool, "bob").await.unwrap();
        let ids: Vec<&str> = reviews.iter().map(|p| p.pull_request_id.as_str()).collect();
        assert_eq!(ids, vec!["pr-new", "pr-old"]);
        assert_eq!(reviews[1].status, PullRequestStatus::Merged);

        assert!(list_by_reviewer(&pool, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_in_rolled_back_transaction_are_discarded() {
        let pool = setup_test_db().await;

        let mut tx = db::begin(&pool).await.unwrap();
        insert_pull_request(&mut *tx, &open_pr("pr-1", &["bob"], 1_000))
            .await
            .unwrap();
        assert!(pull_request_exists(&mut *tx, "pr-1").await.unwrap());
        db::rollback(tx).await;

        assert!(!pull_request_exists(&pool, "pr-1").await.unwrap());
    }

    async fn reviewer_rows(pool: &DbPool) -> Vec<(String, String)> {
        sqlx::query_as(
            "SELECT user_id, pull_request_id FROM pull_request_reviewers ORDER BY pull_request_id, user_id",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_reviewer_index_follows_reviewer_list() {
        let pool = setup_test_db().await;
        insert_pull_request(&pool, &open_pr("pr-1", &["bob", "dave"], 1_000))
            .await
            .unwrap();
        insert_pull_request(&pool, &open_pr("pr-2", &["bob"], 2_000))
            .await
            .unwrap();

        assert_eq!(
            reviewer_rows(&pool).await,
            vec![
                ("bob".to_string(), "pr-1".to_string()),
                ("dave".to_string(), "pr-1".to_string()),
                ("bob".to_string(), "pr-2".to_string()),
            ]
        );

        update_reviewers(&pool, "pr-1", &["dave".to_string(), "alice".to_string()])
            .await
            .unwrap();

        assert_eq!(
            reviewer_rows(&pool).await,
            vec![
                ("alice".to_string(), "pr-1".to_string()),
                ("dave".to_string(), "pr-1".to_string()),
                ("bob".to_string(), "pr-2".to_string()),
            ]
        );
        let bob: Vec<String> = list_by_reviewer(&pool, "bob")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.pull_request_id)
            .collect();
        assert_eq!(bob, vec!["pr-2"]);
    }

    #[tokio::test]
    async fn test_reviewer_index_discarded_with_rolled_back_insert() {
        let pool = setup_test_db().await;

        let mut tx = db::begin(&pool).await.unwrap();
        insert_pull_request(&mut *tx, &open_pr("pr-1", &["bob"], 1_000))
            .await
            .unwrap();
        db::rollback(tx).await;

        assert!(reviewer_rows(&pool).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_reviewer_searches_index() {
        let pool = setup_test_db().await;

        let sql = format!("EXPLAIN QUERY PLAN {}", LIST_BY_REVIEWER);
        let plan: Vec<(i64, i64, i64, String)> = sqlx::query_as(&sql)
            .bind("bob")
            .fetch_all(&pool)
            .await
            .unwrap();
        let details: Vec<&str> = plan.iter().map(|(_, _, _, d)| d.as_str()).collect();

        assert!(
            details.iter().any(|d| d.starts_with("SEARCH r USING PRIMARY KEY")),
            "{:?}",
            details
        );
        assert!(!details.iter().any(|d| d.starts_with("SCAN")), "{:?}", details);
    }
}
