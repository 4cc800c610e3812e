use axum::extract::{FromRequestParts, Path, Query};
use axum::http::{header::AUTHORIZATION, request::Parts, StatusCode};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::types::*;
use crate::api::AppState;
use crate::errors::{AppError, Result};
use crate::models::gate::{AccessGate, RestrictedAction};
use crate::models::session::Session;
use crate::models::user::UserResponse;
use crate::models::verification::{
    Decision, DecisionOutcome, ImageUpload, SubmissionForm, VerificationRequest, VerificationStatus,
};
use crate::utils::liveness::Liveness;
use crate::utils::validation::Validator;

/// The caller behind `Authorization: Bearer ...`.
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
            .ok_or_else(|| AppError::AuthenticationError("Missing or invalid Authorization header".to_string()))?;

        let state = parts
            .extensions
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| AppError::InternalError("Application state missing".to_string()))?;

        let session = state
            .identity
            .current_user(&token)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("Invalid or expired token".to_string()))?;
        state.moderation.require_active(&session.user_id).await?;
        Ok(AuthSession(session))
    }
}

/// An [`AuthSession`] that must belong to an administrator.
pub struct AdminSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        session.require_admin()?;
        Ok(AdminSession(session))
    }
}

pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn verification_router() -> Router {
    Router::new()
        .route("/submit", post(submit_verification))
        .route("/status", get(verification_status))
        .route("/gate", get(verification_gate))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/verifications", get(admin_review_queue))
        .route("/verifications/:id/decision", post(admin_decide))
        .route("/users", get(admin_list_users))
        .route("/users/:id", get(admin_get_user).delete(admin_delete_user))
        .route("/users/:id/freeze", post(admin_freeze))
        .route("/users/:id/suspend", post(admin_suspend))
        .route("/users/:id/reactivate", post(admin_reactivate))
        .route("/users/:id/reset-credential", post(admin_reset_credential))
}

pub fn users_router() -> Router {
    Router::new().route("/display-name", get(display_name))
}

#[utoipa::path(post, path = "/api/auth/register", tag = "Auth", request_body = RegisterRequest,
    responses((status = 201, body = RegisterResponse), (status = 400, body = ErrorResponse)))]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let user = state.auth.register(&req.email, &req.password, req.display_name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id: user.id, email: user.email })))
}

#[utoipa::path(post, path = "/api/auth/login", tag = "Auth", request_body = LoginRequest,
    responses((status = 200, body = LoginResponse), (status = 401, body = ErrorResponse), (status = 403, body = ErrorResponse)))]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let token = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}

fn decode_image(field: &str, encoded: &str, content_type: String) -> Result<Option<ImageUpload>> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(None);
    }
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AppError::ValidationError(format!("{} is not valid base64", field)))?;
    Ok(Some(ImageUpload::new(bytes, content_type)))
}

#[utoipa::path(post, path = "/api/verification/submit", tag = "Verification", request_body = SubmitVerificationRequest,
    responses((status = 201, body = VerificationRequest), (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse), (status = 502, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn submit_verification(
    Extension(state): Extension<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Json(req): Json<SubmitVerificationRequest>,
) -> Result<(StatusCode, Json<VerificationRequest>)> {
    let form = SubmissionForm {
        phone: req.phone,
        student_id: req.student_id,
        id_image: decode_image("ID image", &req.id_image_base64, req.id_image_content_type)?,
        cor_image: decode_image("COR image", &req.cor_image_base64, req.cor_image_content_type)?,
    };

    // The submission runs on its own task so a dropped connection cannot
    // interrupt it between the uploads and the insert.
    let liveness = Liveness::new();
    let _guard = liveness.guard();
    let service = state.verification.clone();
    let email = session.email.clone();
    let task = tokio::spawn(async move {
        let delivered = liveness.deliver(service.submit(&session, form)).await;
        if delivered.is_none() {
            info!(action = "verification_submit_unobserved", user = %email);
        }
        delivered
    });

    match task.await {
        Ok(Some(result)) => Ok((StatusCode::CREATED, Json(result?))),
        Ok(None) => Err(AppError::InternalError("Submission finished after the caller left".to_string())),
        Err(e) => Err(AppError::InternalError(format!("Submission task failed: {}", e))),
    }
}

#[utoipa::path(get, path = "/api/verification/status", tag = "Verification",
    responses((status = 200, body = VerificationStatusResponse), (status = 401, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn verification_status(
    Extension(state): Extension<Arc<AppState>>,
    AuthSession(session): AuthSession,
) -> Result<Json<VerificationStatusResponse>> {
    let request = state.verification.latest_request(&session.email).await?;
    let status = request.as_ref().map(|r| r.status);
    Ok(Json(VerificationStatusResponse {
        status,
        gate: AccessGate::from_latest(status),
        request,
    }))
}

#[utoipa::path(get, path = "/api/verification/gate", tag = "Verification", params(GateQuery),
    responses((status = 200, body = GateResponse), (status = 400, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn verification_gate(
    Extension(state): Extension<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Query(query): Query<GateQuery>,
) -> Result<Json<GateResponse>> {
    let action: RestrictedAction = query.action.parse()?;
    let gate = state.verification.access_gate(&session).await?;
    Ok(Json(GateResponse { action, gate, decision: gate.for_action(action) }))
}

#[utoipa::path(get, path = "/api/users/display-name", tag = "Users", params(DisplayNameQuery),
    responses((status = 200, body = DisplayNameResponse)),
    security(("bearerAuth" = [])))]
pub async fn display_name(
    Extension(state): Extension<Arc<AppState>>,
    AuthSession(_session): AuthSession,
    Query(query): Query<DisplayNameQuery>,
) -> Result<Json<DisplayNameResponse>> {
    let display_name = state.directory.display_name(&query.email).await?;
    Ok(Json(DisplayNameResponse { email: query.email, display_name }))
}

#[utoipa::path(get, path = "/api/admin/verifications", tag = "Admin", params(ReviewQueueQuery),
    responses((status = 200, body = ReviewQueueResponse), (status = 400, body = ErrorResponse), (status = 403, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_review_queue(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<ReviewQueueResponse>> {
    let status = query.status.as_deref().map(str::parse::<VerificationStatus>).transpose()?;
    let limit = Validator::validate_limit(query.limit)?;
    let rows = state.verification.list_requests(status, limit).await?;

    let mut requests = Vec::with_capacity(rows.len());
    for request in rows {
        let applicant_name = state.directory.display_name(&request.email).await?;
        requests.push(ReviewQueueItem { applicant_name, request });
    }
    Ok(Json(ReviewQueueResponse { requests }))
}

#[utoipa::path(post, path = "/api/admin/verifications/{id}/decision", tag = "Admin", request_body = DecisionRequest,
    params(("id" = Uuid, Path, description = "Verification request id")),
    responses((status = 200, body = DecisionOutcome), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_decide(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionOutcome>> {
    let decision: Decision = req.decision.parse()?;
    let outcome = state.verification.decide(&id, decision).await?;
    info!(action = "admin_decision", admin = %admin.email, request_id = %id, decision = ?decision);
    Ok(Json(outcome))
}

#[utoipa::path(get, path = "/api/admin/users", tag = "Admin", params(UserListQuery),
    responses((status = 200, body = UserListResponse), (status = 400, body = ErrorResponse), (status = 403, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_list_users(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>> {
    let limit = Validator::validate_limit(query.limit)?;
    let users = state.moderation.list_users(limit).await?;
    Ok(Json(UserListResponse { users: users.into_iter().map(UserResponse::from).collect() }))
}

#[utoipa::path(get, path = "/api/admin/users/{id}", tag = "Admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = UserResponse), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_get_user(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    Ok(Json(state.moderation.get_user(&id).await?.into()))
}

#[utoipa::path(post, path = "/api/admin/users/{id}/freeze", tag = "Admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = ModerationResponse), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_freeze(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ModerationResponse>> {
    state.moderation.freeze(&id).await?;
    Ok(Json(ModerationResponse { success: true, message: "Account frozen".to_string() }))
}

fn days_from_json(value: &serde_json::Value) -> Result<i64> {
    match value {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(days) => Validator::validate_suspension_days(days),
            None => Err(AppError::InvalidDuration(format!("{} is not a whole number of days", n))),
        },
        serde_json::Value::String(s) => Validator::parse_suspension_days(s),
        other => Err(AppError::InvalidDuration(format!("{} is not a number of days", other))),
    }
}

#[utoipa::path(post, path = "/api/admin/users/{id}/suspend", tag = "Admin", request_body = SuspendRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = SuspendResponse), (status = 400, body = ErrorResponse), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_suspend(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<SuspendRequest>,
) -> Result<Json<SuspendResponse>> {
    let days = days_from_json(&req.days)?;
    let suspended_until = state.moderation.suspend(&id, days).await?;
    Ok(Json(SuspendResponse { user_id: id, suspended_until }))
}

#[utoipa::path(post, path = "/api/admin/users/{id}/reactivate", tag = "Admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = ModerationResponse), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_reactivate(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ModerationResponse>> {
    state.moderation.reactivate(&id).await?;
    Ok(Json(ModerationResponse { success: true, message: "Account reactivated".to_string() }))
}

#[utoipa::path(post, path = "/api/admin/users/{id}/reset-credential", tag = "Admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = ResetCredentialResponse), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_reset_credential(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(_admin): AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ResetCredentialResponse>> {
    let temporary_password = state.moderation.reset_credential(&id).await?;
    Ok(Json(ResetCredentialResponse { user_id: id, temporary_password }))
}

#[utoipa::path(delete, path = "/api/admin/users/{id}", tag = "Admin", request_body = DeleteUserRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = ModerationResponse), (status = 400, body = ErrorResponse), (status = 404, body = ErrorResponse)),
    security(("bearerAuth" = [])))]
pub async fn admin_delete_user(
    Extension(state): Extension<Arc<AppState>>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<DeleteUserRequest>,
) -> Result<Json<ModerationResponse>> {
    let user = state.moderation.get_user(&id).await?;
    state.moderation.delete(&id, &req.confirm_email).await?;
    state.directory.forget(&user.email);
    info!(action = "admin_delete_user", admin = %admin.email, user_id = %id);
    Ok(Json(ModerationResponse { success: true, message: "Account deleted".to_string() }))
}
