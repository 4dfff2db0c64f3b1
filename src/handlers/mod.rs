pub mod admin;
pub mod auth;
pub mod cart;
pub mod library;
pub mod orders;
pub mod products;
pub mod profile;
pub mod wishlist;

use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use serde::Serialize;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use uuid::Uuid;

use crate::application::admin_service::require_admin;
use crate::domain::product::Product;
use crate::domain::user::AuthUser;
use crate::errors::AppError;
use crate::AppState;

// ── Authentication ───────────────────────────────────────────────────────────

pub(crate) fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// The signed-in caller, resolved from the `Authorization: Bearer` header.
pub struct Caller(pub AuthUser);

impl FromRequest for Caller {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let token = token.ok_or_else(|| {
                AppError::Unauthorized("Missing bearer token".to_string())
            })?;
            let state = state
                .ok_or_else(|| AppError::Internal("application state missing".to_string()))?;
            let user = state.sessions.authenticate(&token).await?;
            Ok(Caller(user))
        })
    }
}

/// A caller with the admin role.
pub struct Admin(pub AuthUser);

impl FromRequest for Admin {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let caller = Caller::from_request(req, payload);
        Box::pin(async move {
            let Caller(user) = caller.await?;
            require_admin(&user)?;
            Ok(Admin(user))
        })
    }
}

// ── Shared DTOs ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    /// Decimal price as a string, e.g. "125000.00"
    pub price: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub stock: i32,
    pub vehicle_type: Option<String>,
    pub item_type: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: p.price.to_string(),
            description: p.description,
            image_url: p.image_url,
            stock: p.stock,
            vehicle_type: p.vehicle_type,
            item_type: p.item_type,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ── OpenAPI ──────────────────────────────────────────────────────────────────

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        products::health,
        products::list_products,
        products::get_product,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        orders::expire_orders,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        wishlist::move_to_cart,
        profile::get_profile,
        profile::update_username,
        auth::register,
        auth::login,
        auth::crew_login,
        auth::refresh,
        auth::password_reset,
        auth::logout,
        admin::list_products,
        admin::name_exists,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::upload_image,
        admin::delete_image,
        admin::list_orders,
        admin::set_order_status,
        admin::restore_stock,
        library::serve_item_image,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "catalog", description = "Storefront product catalog"),
        (name = "cart", description = "Shopping cart"),
        (name = "orders", description = "Checkout and order lifecycle"),
        (name = "wishlist", description = "Saved products"),
        (name = "account", description = "Sessions and profiles"),
        (name = "admin", description = "Back-office"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
pub(crate) mod test_support;
