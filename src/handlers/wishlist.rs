use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::cart::CartItemResponse;
use super::{Caller, MessageResponse, ProductResponse};
use crate::domain::wishlist::{WishlistEntry, WishlistItem};
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToWishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub created_at: String,
}

impl From<WishlistItem> for WishlistItemResponse {
    fn from(i: WishlistItem) -> Self {
        Self {
            id: i.id,
            product_id: i.product_id,
            created_at: i.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistEntryResponse {
    pub id: Uuid,
    pub created_at: String,
    pub product: ProductResponse,
}

impl From<WishlistEntry> for WishlistEntryResponse {
    fn from(e: WishlistEntry) -> Self {
        Self {
            id: e.item.id,
            created_at: e.item.created_at.to_rfc3339(),
            product: e.product.into(),
        }
    }
}

/// GET /wishlist
#[utoipa::path(
    get,
    path = "/wishlist",
    responses((status = 200, description = "Saved products, newest first", body = [WishlistEntryResponse])),
    security(("bearer_auth" = [])),
    tag = "wishlist"
)]
pub async fn list_wishlist(
    state: web::Data<AppState>,
    caller: Caller,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let entries = web::block(move || state.wishlist.list(user_id)).await??;
    let body: Vec<WishlistEntryResponse> = entries.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /wishlist
#[utoipa::path(
    post,
    path = "/wishlist",
    request_body = AddToWishlistRequest,
    responses(
        (status = 200, description = "Saved (or already saved)", body = WishlistItemResponse),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "wishlist"
)]
pub async fn add_to_wishlist(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<AddToWishlistRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let product_id = body.product_id;
    let item = web::block(move || state.wishlist.add(user_id, product_id)).await??;
    Ok(HttpResponse::Ok().json(WishlistItemResponse::from(item)))
}

/// DELETE /wishlist/{id}
#[utoipa::path(
    delete,
    path = "/wishlist/{id}",
    params(("id" = Uuid, Path, description = "Wishlist entry UUID")),
    responses(
        (status = 200, description = "Removed", body = MessageResponse),
        (status = 404, description = "Wishlist item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "wishlist"
)]
pub async fn remove_from_wishlist(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let id = path.into_inner();
    web::block(move || state.wishlist.remove(user_id, id)).await??;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Removed from wishlist")))
}

/// POST /wishlist/{id}/to-cart
///
/// Adds one unit of the saved product to the cart; the entry stays.
#[utoipa::path(
    post,
    path = "/wishlist/{id}/to-cart",
    params(("id" = Uuid, Path, description = "Wishlist entry UUID")),
    responses(
        (status = 200, description = "Added to cart", body = CartItemResponse),
        (status = 404, description = "Wishlist item not found"),
        (status = 409, description = "Not enough stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "wishlist"
)]
pub async fn move_to_cart(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let id = path.into_inner();
    let item = web::block(move || state.wishlist.add_to_cart(user_id, id)).await??;
    Ok(HttpResponse::Ok().json(CartItemResponse::from(item)))
}
