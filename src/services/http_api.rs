//! JSON HTTP routes over the directory and pull request services.

use crate::error::AppError;
use crate::models::{
    CreatePrRequest, PullRequest, PullRequestShort, ReassignOutcome, ReassignRequest,
    SetUserActiveRequest, Team, User,
};
use crate::services::directory::DirectoryService;
use crate::services::pull_requests::PullRequestService;
use crate::services::stats::{ServerStats, StatsService};
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

// ── State ────────────────────────────────────────────────────────────────────

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub directory: DirectoryService,
    pub pull_requests: PullRequestService,
    pub stats: StatsService,
    /// Parent of every request token. Cancelled on server shutdown.
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

impl ApiState {
    fn request_scope(&self) -> RequestScope {
        RequestScope::new(&self.shutdown, self.request_timeout)
    }
}

/// Cancellation token for one request.
///
/// The token is cancelled when the deadline passes or the server shuts down.
/// Dropping the scope stops the deadline timer.
struct RequestScope {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl RequestScope {
    fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let token = parent.child_token();
        let deadline = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        });
        Self { token, timer }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiError {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ApiErrorBody {
    error: ApiError,
}

/// Wrapper to make AppError usable as an axum error response.
struct ApiErr(AppError);

impl ApiErr {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::TeamExists { .. } => (StatusCode::BAD_REQUEST, "TEAM_EXISTS"),
            AppError::PrExists { .. } => (StatusCode::CONFLICT, "PR_EXISTS"),
            AppError::PrMerged { .. } => (StatusCode::CONFLICT, "PR_MERGED"),
            AppError::NotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
            AppError::NoCandidate { .. } => (StatusCode::CONFLICT, "NO_CANDIDATE"),
            AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            log::error!("[api] {}: {}", code, self.0);
        }

        (
            status,
            Json(ApiErrorBody {
                error: ApiError {
                    code: code.to_string(),
                    message: self.0.to_string(),
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

fn require_field(value: &str, field: &str) -> Result<(), ApiErr> {
    if value.trim().is_empty() {
        return Err(ApiErr(AppError::invalid_input_field(
            format!("{} must not be empty", field),
            field,
        )));
    }
    Ok(())
}

// ── Request and response types ───────────────────────────────────────────────

#[derive(Deserialize)]
struct TeamQuery {
    team_name: String,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
struct MergePrBody {
    pull_request_id: String,
}

#[derive(Serialize)]
struct TeamResponse {
    team: Team,
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Serialize)]
struct PrResponse {
    pr: PullRequest,
}

#[derive(Serialize)]
struct UserReviewsResponse {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the full API router with request counting and CORS.
pub fn api_router(state: ApiState) -> Router {
    let stats = state.stats.clone();

    Router::new()
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/users/setIsActive", post(set_user_active))
        .route("/users/get", get(get_user))
        .route("/users/getReview", get(get_user_reviews))
        .route("/pullRequest/create", post(create_pr))
        .route("/pullRequest/merge", post(merge_pr))
        .route("/pullRequest/reassign", post(reassign_pr))
        .route("/health", get(health))
        .route("/stats", get(stats_snapshot))
        .with_state(state)
        .layer(middleware::from_fn_with_state(stats, count_requests))
        .layer(CorsLayer::permissive())
}

async fn count_requests(
    State(stats): State<StatsService>,
    request: Request<Body>,
    next: Next,
) -> Response {
    stats.record_request();
    next.run(request).await
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /team/add: create a team with its members.
async fn add_team(
    State(state): State<ApiState>,
    payload: Result<Json<Team>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let Json(team) = payload?;
    require_field(&team.team_name, "team_name")?;
    for member in &team.members {
        require_field(&member.user_id, "user_id")?;
    }

    let scope = state.request_scope();
    let team = state.directory.create_team(&team, &scope.token).await?;
    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<ApiState>,
    params: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<Team>, ApiErr> {
    let Query(params) = params?;
    require_field(&params.team_name, "team_name")?;

    let scope = state.request_scope();
    let team = state.directory.get_team(&params.team_name, &scope.token).await?;
    Ok(Json(team))
}

/// POST /users/setIsActive
async fn set_user_active(
    State(state): State<ApiState>,
    payload: Result<Json<SetUserActiveRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Json(request) = payload?;
    require_field(&request.user_id, "user_id")?;

    let scope = state.request_scope();
    let user = state
        .directory
        .set_user_active(&request.user_id, request.is_active, &scope.token)
        .await?;
    Ok(Json(UserResponse { user }))
}

/// GET /users/get?user_id=X
async fn get_user(
    State(state): State<ApiState>,
    params: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Query(params) = params?;
    require_field(&params.user_id, "user_id")?;

    let scope = state.request_scope();
    let user = state.directory.get_user(&params.user_id, &scope.token).await?;
    Ok(Json(UserResponse { user }))
}

/// GET /users/getReview?user_id=X: pull requests the user reviews.
async fn get_user_reviews(
    State(state): State<ApiState>,
    params: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserReviewsResponse>, ApiErr> {
    let Query(params) = params?;
    require_field(&params.user_id, "user_id")?;

    let scope = state.request_scope();
    let pull_requests = state
        .pull_requests
        .get_user_reviews(&params.user_id, &scope.token)
        .await?;
    Ok(Json(UserReviewsResponse {
        user_id: params.user_id,
        pull_requests,
    }))
}

/// POST /pullRequest/create
async fn create_pr(
    State(state): State<ApiState>,
    payload: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrResponse>), ApiErr> {
    let Json(request) = payload?;
    require_field(&request.pull_request_id, "pull_request_id")?;
    require_field(&request.pull_request_name, "pull_request_name")?;
    require_field(&request.author_id, "author_id")?;

    let scope = state.request_scope();
    let pr = state.pull_requests.create_pr(&request, &scope.token).await?;
    Ok((StatusCode::CREATED, Json(PrResponse { pr })))
}

/// POST /pullRequest/merge
async fn merge_pr(
    State(state): State<ApiState>,
    payload: Result<Json<MergePrBody>, JsonRejection>,
) -> Result<Json<PrResponse>, ApiErr> {
    let Json(body) = payload?;
    require_field(&body.pull_request_id, "pull_request_id")?;

    let scope = state.request_scope();
    let pr = state
        .pull_requests
        .merge_pr(&body.pull_request_id, &scope.token)
        .await?;
    Ok(Json(PrResponse { pr }))
}

/// POST /pullRequest/reassign
async fn reassign_pr(
    State(state): State<ApiState>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<ReassignOutcome>, ApiErr> {
    let Json(request) = payload?;
    require_field(&request.pull_request_id, "pull_request_id")?;
    require_field(&request.old_user_id, "old_user_id")?;

    let scope = state.request_scope();
    let outcome = state
        .pull_requests
        .reassign_reviewer(&request, &scope.token)
        .await?;
    Ok(Json(outcome))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /stats
async fn stats_snapshot(State(state): State<ApiState>) -> Json<ServerStats> {
    Json(state.stats.snapshot())
}
