use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Duration;
use hyper::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, Instrument};
use utoipa::{Modify, OpenApi};
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::{RecordStore, SqliteDatabase};
use crate::errors::{AppError, Result};
use crate::services::auth::AuthService;
use crate::services::directory_service::SellerDirectory;
use crate::services::identity::IdentityProvider;
use crate::services::jwt::JwtManager;
use crate::services::moderation_service::ModerationService;
use crate::services::verification_service::VerificationService;
use crate::storage::{BlobStore, LocalBlobStore};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::middleware::{rate_limiter_middleware, RateLimiter};

pub mod routes;
pub mod types;

/// Services shared by every handler, injected as `Extension<Arc<AppState>>`.
pub struct AppState {
    pub verification: Arc<VerificationService>,
    pub moderation: Arc<ModerationService>,
    pub auth: Arc<AuthService>,
    pub directory: Arc<SellerDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Wires the services over the given stores.
    pub fn new(
        config: &AppConfig,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let jwt = Arc::new(JwtManager::new(config.require_jwt_secret()?.to_string()));
        let verification = VerificationService::new(
            records.clone(),
            blobs,
            clock.clone(),
            config.verification_bucket.clone(),
        )
        .with_max_image_bytes(config.max_image_bytes);

        Ok(Self {
            verification: Arc::new(verification),
            moderation: Arc::new(ModerationService::new(records.clone(), clock.clone())),
            auth: Arc::new(AuthService::new(
                jwt.clone(),
                records.clone(),
                clock.clone(),
                config.admin_emails.clone(),
            )),
            directory: Arc::new(SellerDirectory::new(
                records,
                config.name_cache_capacity,
                Duration::seconds(config.name_cache_ttl_secs),
                clock,
            )),
            identity: jwt,
        })
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyPending | AppError::AlreadyVerified => StatusCode::CONFLICT,
            AppError::RequestNotFound(_) | AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AccountRestricted(_) => StatusCode::FORBIDDEN,
            AppError::UploadError(_) => StatusCode::BAD_GATEWAY,
            AppError::RecordStoreError(_)
            | AppError::ConfigError(_)
            | AppError::SerializationError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::AlreadyPending => "already_pending",
            AppError::AlreadyVerified => "already_verified",
            AppError::UploadError(_) => "upload_error",
            AppError::RecordStoreError(_) => "record_store_error",
            AppError::InvalidDuration(_) => "invalid_duration",
            AppError::RequestNotFound(_) => "request_not_found",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::AuthenticationError(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::AccountRestricted(_) => "account_restricted",
            AppError::ConfigError(_) | AppError::SerializationError(_) | AppError::InternalError(_) => {
                "internal_error"
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(action = "request_failed", status = status.as_u16(), error = %self);
        }
        let body = types::ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::register,
        routes::login,
        routes::submit_verification,
        routes::verification_status,
        routes::verification_gate,
        routes::display_name,
        routes::admin_review_queue,
        routes::admin_decide,
        routes::admin_list_users,
        routes::admin_get_user,
        routes::admin_freeze,
        routes::admin_suspend,
        routes::admin_reactivate,
        routes::admin_reset_credential,
        routes::admin_delete_user,
    ),
    components(
        schemas(
            types::ErrorResponse,
            types::RegisterRequest,
            types::RegisterResponse,
            types::LoginRequest,
            types::LoginResponse,
            types::SubmitVerificationRequest,
            types::VerificationStatusResponse,
            types::GateResponse,
            types::DisplayNameResponse,
            types::ReviewQueueItem,
            types::ReviewQueueResponse,
            types::DecisionRequest,
            types::SuspendRequest,
            types::SuspendResponse,
            types::ResetCredentialResponse,
            types::DeleteUserRequest,
            types::ModerationResponse,
            types::UserListResponse,
            crate::models::user::UserResponse,
            crate::models::user::AccountStatus,
            crate::models::verification::VerificationRequest,
            crate::models::verification::VerificationStatus,
            crate::models::verification::DecisionOutcome,
            crate::models::verification::CopyThrough,
            crate::models::gate::AccessGate,
            crate::models::gate::RestrictedAction,
            crate::models::gate::GateDecision,
            crate::models::gate::GateScreen,
        )
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Verification", description = "Submit a verification request and read its status. Requires a bearer token."),
        (name = "Users", description = "Public seller information"),
        (name = "Admin", description = "Review queue and account moderation. Requires an administrator token.")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

pub async fn request_id_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());
    let span = tracing::info_span!("request", request_id = %request_id, method = %req.method(), uri = %req.uri());
    next.run(req).instrument(span).await
}

/// Builds the full application router: API, docs, uploaded blobs and health.
pub fn build_router(state: Arc<AppState>, limiter: Arc<RateLimiter>, upload_dir: &str) -> Router {
    let openapi = ApiDoc::openapi();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .nest("/api/auth", routes::auth_router())
        .nest("/api/verification", routes::verification_router())
        .nest("/api/users", routes::users_router())
        .nest("/api/admin", routes::admin_router())
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .route("/health", get(health_check))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", openapi.clone()))
        .merge(Redoc::with_url("/api/redoc", openapi))
        .layer(axum::middleware::from_fn(rate_limiter_middleware))
        .layer(Extension(limiter))
        .layer(Extension(state))
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// Opens the configured stores and serves the API until the process exits.
pub async fn start_http_server(config: &AppConfig) -> Result<()> {
    let records: Arc<dyn RecordStore> = Arc::new(SqliteDatabase::new(&config.database_path).await?);
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.upload_dir, &config.public_base_url));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState::new(config, records, blobs, clock)?);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_sec, 1));

    let app = build_router(state, limiter, &config.upload_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(action = "http_server_started", addr = %addr, docs = "/api/docs");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    "OK"
}
