use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::gate::{AccessGate, GateDecision, RestrictedAction};
use crate::models::user::UserResponse;
use crate::models::verification::{VerificationRequest, VerificationStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

/// Images travel as base64 so the whole form is one JSON body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitVerificationRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub id_image_base64: String,
    #[serde(default = "default_image_type")]
    pub id_image_content_type: String,
    #[serde(default)]
    pub cor_image_base64: String,
    #[serde(default = "default_image_type")]
    pub cor_image_content_type: String,
}

fn default_image_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerificationStatusResponse {
    /// `null` when no request was ever submitted.
    pub status: Option<VerificationStatus>,
    pub gate: AccessGate,
    pub request: Option<VerificationRequest>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GateQuery {
    /// One of `post_listing`, `post_rental`, `messaging`, `checkout`.
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GateResponse {
    pub action: RestrictedAction,
    pub gate: AccessGate,
    pub decision: GateDecision,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DisplayNameQuery {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisplayNameResponse {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewQueueQuery {
    /// `pending`, `approved` or `rejected`; all when omitted.
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewQueueItem {
    pub applicant_name: String,
    pub request: VerificationRequest,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewQueueResponse {
    pub requests: Vec<ReviewQueueItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionRequest {
    /// `approved` or `rejected`.
    pub decision: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SuspendRequest {
    /// Whole number of days; text is accepted as typed by the admin.
    #[schema(value_type = String, example = "7")]
    pub days: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuspendResponse {
    pub user_id: Uuid,
    pub suspended_until: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetCredentialResponse {
    pub user_id: Uuid,
    /// Shown once; only its hash is stored.
    pub temporary_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteUserRequest {
    /// Must repeat the account's email address.
    pub confirm_email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModerationResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}
