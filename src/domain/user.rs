use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl NewProfile {
    /// Profile for a session whose user has none yet: username defaults to the
    /// local part of the e-mail address.
    pub fn for_session(user: &SessionUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
            username: default_username(user.email.as_deref()),
            role: Role::User,
        }
    }
}

/// The user behind a verified access token, as reported by the auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Identity and role of the caller, resolved from the session and profile.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Plain shopper identity built from the session alone.
    pub fn from_session(user: &SessionUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
            username: default_username(user.email.as_deref()),
            role: Role::User,
        }
    }
}

impl From<Profile> for AuthUser {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            username: p.username,
            role: p.role,
        }
    }
}

impl From<NewProfile> for AuthUser {
    fn from(p: NewProfile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            username: p.username,
            role: p.role,
        }
    }
}

pub fn default_username(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or("User")
        .to_string()
}
