use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Caller, MessageResponse, ProductResponse};
use crate::application::cart_service::CartView;
use crate::domain::cart::{CartItem, CartLine};
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Defaults to 1.
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: String,
}

impl From<CartItem> for CartItemResponse {
    fn from(i: CartItem) -> Self {
        Self {
            id: i.id,
            product_id: i.product_id,
            quantity: i.quantity,
            created_at: i.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub id: Uuid,
    pub quantity: i32,
    pub subtotal: String,
    pub product: ProductResponse,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            id: line.item.id,
            quantity: line.item.quantity,
            subtotal: line.subtotal().to_string(),
            product: line.product.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub total: String,
    /// Present when the cart was adjusted to live stock.
    pub notice: Option<String>,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            items: view.lines.into_iter().map(CartLineResponse::from).collect(),
            total: view.total.to_string(),
            notice: view.notice,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /cart
///
/// The caller's cart after bringing every line back within live stock.
/// Expired orders are swept first so their stock is back on the shelf.
#[utoipa::path(
    get,
    path = "/cart",
    responses(
        (status = 200, description = "Reconciled cart", body = CartResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    state: web::Data<AppState>,
    caller: Caller,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let view = web::block(move || {
        state.orders.expire_sweep();
        state.cart.fetch_reconciled(user_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(CartResponse::from(view)))
}

/// POST /cart/items
#[utoipa::path(
    post,
    path = "/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Line added or merged", body = CartItemResponse),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Not enough stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn add_item(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<AddToCartRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let body = body.into_inner();
    let item = web::block(move || state.cart.add_to_cart(user_id, body.product_id, body.quantity))
        .await??;
    Ok(HttpResponse::Ok().json(CartItemResponse::from(item)))
}

/// PATCH /cart/items/{id}
#[utoipa::path(
    patch,
    path = "/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item UUID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = CartItemResponse),
        (status = 404, description = "Cart item not found"),
        (status = 409, description = "Not enough stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn update_item(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<Uuid>,
    body: web::Json<UpdateQuantityRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let item_id = path.into_inner();
    let quantity = body.quantity;
    let item = web::block(move || state.cart.update_quantity(user_id, item_id, quantity)).await??;
    Ok(HttpResponse::Ok().json(CartItemResponse::from(item)))
}

/// DELETE /cart/items/{id}
#[utoipa::path(
    delete,
    path = "/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item UUID")),
    responses(
        (status = 200, description = "Line removed", body = MessageResponse),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn remove_item(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let item_id = path.into_inner();
    web::block(move || state.cart.remove_item(user_id, item_id)).await??;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Item removed from cart")))
}
