//! Who is calling: sessions from the auth API, roles from the profile table.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::ports::ProfileRepository;
use crate::domain::user::{default_username, AuthUser, NewProfile, Profile, Role, SessionUser};
use crate::infrastructure::auth_client::{AuthClient, Session, SignUpOutcome};

use super::admin_service::ADMIN_REQUIRED;

const PROFILE_ATTEMPTS: u32 = 3;

/// Profile lookups and edits. Blocking; run off the async executor.
pub struct IdentityService {
    profiles: Arc<dyn ProfileRepository>,
}

impl IdentityService {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    /// Profile-backed identity for a session, creating the profile on first
    /// sight.
    pub fn resolve(&self, user: &SessionUser) -> Result<AuthUser, DomainError> {
        if let Some(profile) = self.profiles.find_by_id(user.id)? {
            return Ok(profile.into());
        }

        let fresh = NewProfile::for_session(user);
        match self.profiles.insert(fresh.clone()) {
            Ok(profile) => {
                log::info!("Created missing profile for {}", user.id);
                Ok(profile.into())
            }
            // Username clash with another account: keep it unique.
            Err(DomainError::Conflict(_)) => {
                let suffix = user.id.simple().to_string();
                let profile = self.profiles.insert(NewProfile {
                    username: format!("{}-{}", fresh.username, &suffix[..6]),
                    ..fresh
                })?;
                Ok(profile.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`resolve`](Self::resolve), but a failing profile table degrades
    /// to a plain shopper built from the session.
    pub fn current_user(&self, user: &SessionUser) -> AuthUser {
        match self.resolve(user) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("Profile lookup for {} failed, using session only: {e}", user.id);
                AuthUser::from_session(user)
            }
        }
    }

    pub fn create_profile(&self, user: &SessionUser, username: &str) -> Result<Profile, DomainError> {
        self.profiles.insert(NewProfile {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
            username: username.to_string(),
            role: Role::User,
        })
    }

    pub fn username_available(&self, username: &str, user_id: Uuid) -> Result<bool, DomainError> {
        Ok(!self.profiles.username_taken(username.trim(), user_id)?)
    }

    pub fn update_username(&self, user_id: Uuid, username: &str) -> Result<Profile, DomainError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        if self.profiles.username_taken(username, user_id)? {
            return Err(DomainError::Conflict("Username already taken".to_string()));
        }
        self.profiles
            .update_username(user_id, username)?
            .ok_or(DomainError::NotFound("Profile"))
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub login: Duration,
    pub profile: Duration,
    pub profile_retry_delay: Duration,
}

/// Login, registration and token handling against the auth API.
pub struct SessionManager {
    auth: AuthClient,
    identity: Arc<IdentityService>,
    timeouts: SessionTimeouts,
}

impl SessionManager {
    pub fn new(auth: AuthClient, identity: Arc<IdentityService>, timeouts: SessionTimeouts) -> Self {
        Self {
            auth,
            identity,
            timeouts,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&IdentityService) -> Result<T, DomainError> + Send + 'static,
    {
        let identity = self.identity.clone();
        tokio::task::spawn_blocking(move || f(identity.as_ref()))
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?
    }

    async fn with_timeout<T>(
        limit: Duration,
        what: &str,
        fut: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        timeout(limit, fut)
            .await
            .map_err(|_| DomainError::Timeout(format!("{what} timed out. Please try again.")))?
    }

    /// Resolves a bearer token to the caller.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthUser, DomainError> {
        let user = self.auth.get_user(access_token).await?;
        self.blocking(move |identity| Ok(identity.current_user(&user)))
            .await
    }

    /// Profile lookup retried with a growing pause; the last resort is a
    /// session-only identity.
    async fn load_profile(&self, user: SessionUser) -> AuthUser {
        for attempt in 1..=PROFILE_ATTEMPTS {
            let lookup = user.clone();
            let result = Self::with_timeout(
                self.timeouts.profile,
                "Profile fetch",
                self.blocking(move |identity| identity.resolve(&lookup)),
            )
            .await;
            match result {
                Ok(resolved) => return resolved,
                Err(e) => {
                    log::warn!("Profile fetch attempt {attempt} for {} failed: {e}", user.id);
                    if attempt < PROFILE_ATTEMPTS {
                        tokio::time::sleep(self.timeouts.profile_retry_delay * attempt).await;
                    }
                }
            }
        }
        AuthUser::from_session(&user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, DomainError> {
        let mut session =
            Self::with_timeout(self.timeouts.login, "Login", self.auth.sign_in(email, password))
                .await?;
        if session.is_expired() {
            log::info!("Session for {email} already expired, refreshing");
            session = self.auth.refresh(&session.refresh_token).await?;
        }
        let user = self.load_profile(session.user.clone().into()).await;
        log::info!("{} logged in as {}", user.username, user.role);
        Ok(LoginOutcome { session, user })
    }

    /// Login for the back-office. Non-admins are signed out again.
    pub async fn crew_login(&self, email: &str, password: &str) -> Result<LoginOutcome, DomainError> {
        let outcome = self.login(email, password).await?;
        if outcome.user.is_admin() {
            return Ok(outcome);
        }
        if let Err(e) = self.auth.sign_out(&outcome.session.access_token).await {
            log::warn!("Failed to sign out rejected crew login {email}: {e}");
        }
        log::warn!("Crew login refused for non-admin {email}");
        Err(DomainError::Forbidden(ADMIN_REQUIRED.to_string()))
    }

    /// Creates the auth account and its `user` profile.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<(SignUpOutcome, Profile), DomainError> {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_username(Some(email)));

        let candidate = username.clone();
        let available = self
            .blocking(move |identity| identity.username_available(&candidate, Uuid::nil()))
            .await?;
        if !available {
            return Err(DomainError::Conflict("Username already taken".to_string()));
        }

        let outcome = Self::with_timeout(
            self.timeouts.login,
            "Registration",
            self.auth.sign_up(email, password, &username),
        )
        .await?;

        let user: SessionUser = outcome.user().clone().into();
        let profile = self
            .blocking(move |identity| identity.create_profile(&user, &username))
            .await?;
        log::info!("Registered {} ({})", profile.username, profile.id);
        Ok((outcome, profile))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, DomainError> {
        self.auth.refresh(refresh_token).await
    }

    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), DomainError> {
        self.auth.request_password_reset(email, redirect_to).await
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), DomainError> {
        self.auth.sign_out(access_token).await
    }

    pub async fn update_username(
        &self,
        user_id: Uuid,
        username: String,
    ) -> Result<Profile, DomainError> {
        self.blocking(move |identity| identity.update_username(user_id, &username))
            .await
    }
}
