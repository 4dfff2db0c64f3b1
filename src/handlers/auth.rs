use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::profile::UserResponse;
use super::{bearer_token, MessageResponse};
use crate::application::identity::LoginOutcome;
use crate::errors::AppError;
use crate::infrastructure::auth_client::{Session, SignUpOutcome};
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Defaults to the local part of the email.
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub expires_at: Option<i64>,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            expires_in: s.expires_in,
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub session: SessionResponse,
    pub user: UserResponse,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(o: LoginOutcome) -> Self {
        Self {
            session: o.session.into(),
            user: o.user.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    /// Absent while the email address still awaits confirmation.
    pub session: Option<SessionResponse>,
    pub message: String,
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /auth/register
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing email or password"),
        (status = 409, description = "Username already taken"),
    ),
    tag = "account"
)]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    validate_credentials(&body.email, &body.password)?;

    let (outcome, profile) = state
        .sessions
        .register(body.email.trim(), &body.password, body.username.as_deref())
        .await?;

    let (session, message) = match outcome {
        SignUpOutcome::Session(session) => {
            (Some(SessionResponse::from(session)), "Registration successful")
        }
        SignUpOutcome::Pending(_) => (None, "Check your email to confirm your account"),
    };
    Ok(HttpResponse::Created().json(RegisterResponse {
        user: profile.into(),
        session,
        message: message.to_string(),
    }))
}

/// POST /auth/login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 504, description = "Login timed out"),
    ),
    tag = "account"
)]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    validate_credentials(&body.email, &body.password)?;
    let outcome = state.sessions.login(body.email.trim(), &body.password).await?;
    Ok(HttpResponse::Ok().json(LoginResponse::from(outcome)))
}

/// POST /auth/crew-login
///
/// Back-office login; only admins get a session.
#[utoipa::path(
    post,
    path = "/auth/crew-login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in as admin", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Admin privileges required"),
    ),
    tag = "account"
)]
pub async fn crew_login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    validate_credentials(&body.email, &body.password)?;
    let outcome = state
        .sessions
        .crew_login(body.email.trim(), &body.password)
        .await?;
    Ok(HttpResponse::Ok().json(LoginResponse::from(outcome)))
}

/// POST /auth/refresh
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New session", body = SessionResponse),
        (status = 401, description = "Refresh token rejected"),
    ),
    tag = "account"
)]
pub async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let session = state.sessions.refresh(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// POST /auth/password-reset
#[utoipa::path(
    post,
    path = "/auth/password-reset",
    request_body = PasswordResetRequest,
    responses((status = 200, description = "Reset email requested", body = MessageResponse)),
    tag = "account"
)]
pub async fn password_reset(
    state: web::Data<AppState>,
    body: web::Json<PasswordResetRequest>,
) -> Result<HttpResponse, AppError> {
    let email = body.email.trim();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }
    state
        .sessions
        .request_password_reset(email, body.redirect_to.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok(
        "Password reset email sent. Please check your inbox.",
    )))
}

/// POST /auth/logout
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 401, description = "Missing bearer token"),
    ),
    security(("bearer_auth" = [])),
    tag = "account"
)]
pub async fn logout(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    state.sessions.logout(&token).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Signed out")))
}
