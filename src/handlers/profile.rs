use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Caller;
use crate::domain::user::{AuthUser, Profile};
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: String,
}

impl From<AuthUser> for UserResponse {
    fn from(u: AuthUser) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            role: u.role.to_string(),
        }
    }
}

impl From<Profile> for UserResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            username: p.username,
            role: p.role.to_string(),
        }
    }
}

/// GET /profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The signed-in user", body = UserResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("bearer_auth" = [])),
    tag = "account"
)]
pub async fn get_profile(caller: Caller) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(caller.0))
}

/// PUT /profile/username
#[utoipa::path(
    put,
    path = "/profile/username",
    request_body = UpdateUsernameRequest,
    responses(
        (status = 200, description = "Username changed", body = UserResponse),
        (status = 400, description = "Username cannot be empty"),
        (status = 409, description = "Username already taken"),
    ),
    security(("bearer_auth" = [])),
    tag = "account"
)]
pub async fn update_username(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<UpdateUsernameRequest>,
) -> Result<HttpResponse, AppError> {
    let profile = state
        .sessions
        .update_username(caller.0.id, body.into_inner().username)
        .await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(profile)))
}
