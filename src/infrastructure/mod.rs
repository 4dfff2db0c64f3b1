pub mod auth_client;
pub mod cart_repo;
pub mod image_store;
#[cfg(test)]
pub(crate) mod memory;
pub mod models;
pub mod order_repo;
pub mod product_repo;
pub mod profile_repo;
pub mod wishlist_repo;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::Repositories;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<DieselError> for DomainError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DomainError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                DomainError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                DomainError::InvalidInput(info.message().to_string())
            }
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

/// Postgres-backed repositories sharing one connection pool.
pub fn diesel_repositories(pool: DbPool) -> Repositories {
    Repositories {
        products: Arc::new(product_repo::DieselProductRepository::new(pool.clone())),
        carts: Arc::new(cart_repo::DieselCartRepository::new(pool.clone())),
        orders: Arc::new(order_repo::DieselOrderRepository::new(pool.clone())),
        profiles: Arc::new(profile_repo::DieselProfileRepository::new(pool.clone())),
        wishlist: Arc::new(wishlist_repo::DieselWishlistRepository::new(pool)),
    }
}
