//! HTTP client for the hosted auth API (`{base}/auth/v1`).
//!
//! Every request carries the project's anon key in the `apikey` header;
//! user-scoped calls add the access token as a bearer.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::user::SessionUser;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AuthUserDto {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<AuthUserDto> for SessionUser {
    fn from(u: AuthUserDto) -> Self {
        SessionUser {
            id: u.id,
            email: u.email,
        }
    }
}

/// Token pair returned by sign-in, sign-up and refresh.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUserDto,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| at <= Utc::now().timestamp())
            .unwrap_or(false)
    }
}

/// Sign-up answers with a session when e-mail confirmation is off and with
/// the bare user otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
    Session(Session),
    Pending(AuthUserDto),
}

impl SignUpOutcome {
    pub fn user(&self) -> &AuthUserDto {
        match self {
            SignUpOutcome::Session(s) => &s.user,
            SignUpOutcome::Pending(u) => u,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(project_url: &str, api_key: &str, timeout: Duration) -> Result<Self, DomainError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Internal(format!("auth client: {e}")))?;
        Ok(Self {
            http,
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, DomainError> {
        let response = request
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| format!("auth service responded {status}"));
        Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DomainError::Unauthorized(message)
            }
            StatusCode::UNPROCESSABLE_ENTITY => DomainError::InvalidInput(message),
            StatusCode::TOO_MANY_REQUESTS => DomainError::Conflict(message),
            _ => DomainError::Internal(message),
        })
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, DomainError> {
        let request = self.http.post(self.url("/signup")).json(&json!({
            "email": email,
            "password": password,
            "data": { "username": username },
        }));
        parse(self.send(request).await?).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, DomainError> {
        let request = self
            .http
            .post(self.url("/token?grant_type=password"))
            .json(&json!({ "email": email, "password": password }));
        parse(self.send(request).await?).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, DomainError> {
        let request = self
            .http
            .post(self.url("/token?grant_type=refresh_token"))
            .json(&json!({ "refresh_token": refresh_token }));
        parse(self.send(request).await?).await
    }

    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), DomainError> {
        let mut request = self
            .http
            .post(self.url("/recover"))
            .json(&json!({ "email": email }));
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        self.send(request).await?;
        Ok(())
    }

    /// Resolves an access token to its user. Invalid or expired tokens are
    /// `Unauthorized`.
    pub async fn get_user(&self, access_token: &str) -> Result<SessionUser, DomainError> {
        let request = self.http.get(self.url("/user")).bearer_auth(access_token);
        let user: AuthUserDto = parse(self.send(request).await?).await?;
        Ok(user.into())
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), DomainError> {
        let request = self.http.post(self.url("/logout")).bearer_auth(access_token);
        self.send(request).await?;
        Ok(())
    }
}

async fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DomainError> {
    response
        .json::<T>()
        .await
        .map_err(|e| DomainError::Internal(format!("unexpected auth response: {e}")))
}

fn map_transport_error(e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::Timeout("Auth request timed out".to_string())
    } else {
        DomainError::Internal(format!("auth request failed: {e}"))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-process stand-in for the auth API. Knows a fixed set of accounts;
    //! the access token of an account is `token-<email>`.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use serde_json::{json, Value};
    use uuid::Uuid;

    #[derive(Default)]
    pub(crate) struct Accounts {
        by_email: Mutex<HashMap<String, (Uuid, String)>>,
        pub(crate) signed_out: Mutex<Vec<String>>,
    }

    impl Accounts {
        pub(crate) fn add(&self, email: &str, password: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.by_email
                .lock()
                .expect("accounts lock")
                .insert(email.to_string(), (id, password.to_string()));
            id
        }

        fn session(&self, email: &str) -> Option<Value> {
            let accounts = self.by_email.lock().expect("accounts lock");
            let (id, _) = accounts.get(email)?;
            Some(json!({
                "access_token": format!("token-{email}"),
                "refresh_token": format!("refresh-{email}"),
                "expires_in": 3600,
                "expires_at": chrono::Utc::now().timestamp() + 3600,
                "user": { "id": id, "email": email },
            }))
        }
    }

    fn bearer_email(req: &HttpRequest) -> Option<String> {
        req.headers()
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer token-")
            .map(str::to_string)
    }

    fn denied(message: &str) -> HttpResponse {
        HttpResponse::BadRequest().json(json!({
            "error": "invalid_grant",
            "error_description": message,
        }))
    }

    async fn token(
        accounts: web::Data<Arc<Accounts>>,
        query: web::Query<HashMap<String, String>>,
        body: web::Json<Value>,
    ) -> HttpResponse {
        let email = match query.get("grant_type").map(String::as_str) {
            Some("password") => {
                let email = body["email"].as_str().unwrap_or_default();
                let password = body["password"].as_str().unwrap_or_default();
                let known = accounts.by_email.lock().expect("accounts lock").get(email).cloned();
                match known {
                    Some((_, expected)) if expected == password => email.to_string(),
                    _ => return denied("Invalid login credentials"),
                }
            }
            Some("refresh_token") => {
                let token = body["refresh_token"].as_str().unwrap_or_default();
                match token.strip_prefix("refresh-") {
                    Some(email) => email.to_string(),
                    None => return denied("Invalid Refresh Token"),
                }
            }
            _ => return denied("unsupported grant"),
        };
        match accounts.session(&email) {
            Some(session) => HttpResponse::Ok().json(session),
            None => denied("Invalid login credentials"),
        }
    }

    async fn signup(accounts: web::Data<Arc<Accounts>>, body: web::Json<Value>) -> HttpResponse {
        let email = body["email"].as_str().unwrap_or_default().to_string();
        let password = body["password"].as_str().unwrap_or_default();
        if password.len() < 6 {
            return HttpResponse::UnprocessableEntity()
                .json(json!({ "msg": "Password should be at least 6 characters" }));
        }
        if accounts.by_email.lock().expect("accounts lock").contains_key(&email) {
            return HttpResponse::UnprocessableEntity()
                .json(json!({ "msg": "User already registered" }));
        }
        accounts.add(&email, password);
        match accounts.session(&email) {
            Some(session) => HttpResponse::Ok().json(session),
            None => HttpResponse::InternalServerError().finish(),
        }
    }

    async fn user(accounts: web::Data<Arc<Accounts>>, req: HttpRequest) -> HttpResponse {
        let email = bearer_email(&req).unwrap_or_default();
        let known = accounts.by_email.lock().expect("accounts lock").get(&email).cloned();
        match known {
            Some((id, _)) => HttpResponse::Ok().json(json!({ "id": id, "email": email })),
            None => HttpResponse::Unauthorized().json(json!({ "msg": "invalid JWT" })),
        }
    }

    async fn logout(accounts: web::Data<Arc<Accounts>>, req: HttpRequest) -> HttpResponse {
        if let Some(email) = bearer_email(&req) {
            accounts.signed_out.lock().expect("accounts lock").push(email);
        }
        HttpResponse::NoContent().finish()
    }

    async fn recover(body: web::Json<Value>) -> HttpResponse {
        if body["email"].as_str().unwrap_or_default().contains('@') {
            HttpResponse::Ok().json(json!({}))
        } else {
            HttpResponse::UnprocessableEntity().json(json!({ "msg": "Invalid email" }))
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .expect("bind failed")
            .local_addr()
            .expect("addr failed")
            .port()
    }

    /// Starts the fake on a free port and returns its base URL.
    pub(crate) fn spawn(accounts: Arc<Accounts>) -> String {
        let port = free_port();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(accounts.clone()))
                .service(
                    web::scope("/auth/v1")
                        .route("/token", web::post().to(token))
                        .route("/signup", web::post().to(signup))
                        .route("/user", web::get().to(user))
                        .route("/logout", web::post().to(logout))
                        .route("/recover", web::post().to(recover)),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", port))
        .expect("bind fake auth server")
        .run();
        tokio::spawn(server);
        format!("http://127.0.0.1:{port}")
    }
}
