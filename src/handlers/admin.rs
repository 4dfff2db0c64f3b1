use std::str::FromStr;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::orders::{OrderFilterParams, OrderSummaryResponse};
use super::{Admin, MessageResponse, ProductResponse};
use crate::domain::order::OrderStatus;
use crate::domain::product::ProductFields;
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub name: String,
    /// Decimal price as a string, e.g. "125000"
    pub price: String,
    #[serde(default)]
    pub description: String,
    pub stock: i32,
    pub vehicle_type: Option<String>,
    pub item_type: Option<String>,
    /// Only read on create; the URL returned by /upload-image.
    pub image_url: Option<String>,
}

impl ProductRequest {
    fn into_fields(self) -> Result<(ProductFields, Option<String>), AppError> {
        let price = BigDecimal::from_str(self.price.trim())
            .map_err(|_| AppError::BadRequest(format!("Invalid price '{}'", self.price)))?;
        Ok((
            ProductFields {
                name: self.name,
                price,
                description: self.description,
                stock: self.stock,
                vehicle_type: self.vehicle_type,
                item_type: self.item_type,
            },
            self.image_url,
        ))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NameExistsParams {
    pub name: String,
    /// Product being edited, ignored in the check.
    pub exclude_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NameExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    /// Original file name; its extension is kept.
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub image_url: String,
    pub filename: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestoreStockResponse {
    pub success: bool,
    pub already_restored: bool,
    pub restored_items: i64,
}

// ── Products ─────────────────────────────────────────────────────────────────

/// GET /admin/products
///
/// Every product, sold out ones included.
#[utoipa::path(
    get,
    path = "/admin/products",
    params(SearchParams),
    responses(
        (status = 200, description = "All products, newest first", body = [ProductResponse]),
        (status = 403, description = "Admin privileges required"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_products(
    state: web::Data<AppState>,
    _admin: Admin,
    query: web::Query<SearchParams>,
) -> Result<HttpResponse, AppError> {
    let search = query.into_inner().search;
    let products = web::block(move || state.admin.list_products(search.as_deref())).await??;
    let body: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /admin/products/name-exists
#[utoipa::path(
    get,
    path = "/admin/products/name-exists",
    params(NameExistsParams),
    responses((status = 200, description = "Whether another product uses the name", body = NameExistsResponse)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn name_exists(
    state: web::Data<AppState>,
    _admin: Admin,
    query: web::Query<NameExistsParams>,
) -> Result<HttpResponse, AppError> {
    let NameExistsParams { name, exclude_id } = query.into_inner();
    let exists = web::block(move || state.admin.name_exists(&name, exclude_id)).await??;
    Ok(HttpResponse::Ok().json(NameExistsResponse { exists }))
}

/// POST /admin/products
#[utoipa::path(
    post,
    path = "/admin/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product fields"),
        (status = 409, description = "Product name already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_product(
    state: web::Data<AppState>,
    admin: Admin,
    body: web::Json<ProductRequest>,
) -> Result<HttpResponse, AppError> {
    let (fields, image_url) = body.into_inner().into_fields()?;
    let admin_id = admin.0.id;
    let product =
        web::block(move || state.admin.create_product(admin_id, fields, image_url)).await??;
    Ok(HttpResponse::Created().json(ProductResponse::from(product)))
}

/// PUT /update-product/{id}
#[utoipa::path(
    put,
    path = "/update-product/{id}",
    params(("id" = Uuid, Path, description = "Product UUID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product name already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_product(
    state: web::Data<AppState>,
    _admin: Admin,
    path: web::Path<Uuid>,
    body: web::Json<ProductRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let (fields, _) = body.into_inner().into_fields()?;
    let product = web::block(move || state.admin.update_product(id, fields)).await??;
    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

/// DELETE /delete-product/{id}
#[utoipa::path(
    delete,
    path = "/delete-product/{id}",
    params(("id" = Uuid, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product is referenced by orders"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_product(
    state: web::Data<AppState>,
    _admin: Admin,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let product = web::block(move || state.admin.delete_product(id)).await??;
    Ok(HttpResponse::Ok().json(MessageResponse::ok(format!(
        "Product {} deleted successfully",
        product.name
    ))))
}

// ── Images ───────────────────────────────────────────────────────────────────

/// POST /upload-image
///
/// The raw image is the request body; its type comes from `Content-Type`.
#[utoipa::path(
    post,
    path = "/upload-image",
    params(UploadParams),
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Missing or non-image upload"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn upload_image(
    state: web::Data<AppState>,
    _admin: Admin,
    req: HttpRequest,
    query: web::Query<UploadParams>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let original_name = query.into_inner().filename.unwrap_or_default();

    let uploaded = web::block(move || {
        state
            .admin
            .upload_image(&content_type, &original_name, &body)
    })
    .await??;

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        image_url: uploaded.image_url,
        filename: uploaded.filename,
    }))
}

/// DELETE /delete-image/{filename}
#[utoipa::path(
    delete,
    path = "/delete-image/{filename}",
    params(("filename" = String, Path, description = "Stored image file name")),
    responses(
        (status = 200, description = "Image deleted", body = MessageResponse),
        (status = 404, description = "Image not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_image(
    state: web::Data<AppState>,
    _admin: Admin,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let filename = path.into_inner();
    let name = filename.clone();
    let existed = web::block(move || state.admin.delete_image(&name)).await??;
    if !existed {
        return Err(AppError::NotFound("Image not found".to_string()));
    }
    Ok(HttpResponse::Ok().json(MessageResponse::ok(format!("Image {filename} deleted"))))
}

// ── Orders ───────────────────────────────────────────────────────────────────

/// GET /admin/orders
#[utoipa::path(
    get,
    path = "/admin/orders",
    params(OrderFilterParams),
    responses(
        (status = 200, description = "All orders, newest first", body = [OrderSummaryResponse]),
        (status = 400, description = "Unknown status filter"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    _admin: Admin,
    query: web::Query<OrderFilterParams>,
) -> Result<HttpResponse, AppError> {
    let status = query.parse()?;
    let orders = web::block(move || state.admin.list_orders(status)).await??;
    let now = Utc::now();
    let body: Vec<OrderSummaryResponse> = orders
        .into_iter()
        .map(|order| OrderSummaryResponse::at(order, now))
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

/// PATCH /admin/orders/{id}/status
///
/// Writes any status; moves outside the usual lifecycle are only logged.
#[utoipa::path(
    patch,
    path = "/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status written", body = OrderSummaryResponse),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn set_order_status(
    state: web::Data<AppState>,
    _admin: Admin,
    path: web::Path<Uuid>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let status = OrderStatus::from_str(body.status.trim())?;
    let order = web::block(move || state.admin.set_order_status(id, status)).await??;
    Ok(HttpResponse::Ok().json(OrderSummaryResponse::at(order, Utc::now())))
}

/// POST /admin/orders/{id}/restore-stock
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/restore-stock",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Stock restored or already restored", body = RestoreStockResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not cancelled"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn restore_stock(
    state: web::Data<AppState>,
    _admin: Admin,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let outcome = web::block(move || state.orders.restore_stock(id)).await??;
    Ok(HttpResponse::Ok().json(RestoreStockResponse {
        success: true,
        already_restored: outcome.already_restored,
        restored_items: outcome.restored_items,
    }))
}
