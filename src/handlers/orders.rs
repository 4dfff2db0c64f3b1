use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{Admin, Caller};
use crate::application::order_service::SweepReport;
use crate::domain::order::{format_time_left, Order, OrderItemView, OrderStatus, OrderView};
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilterParams {
    /// One of pending, paid, confirmed, completed, cancelled. Absent or "all"
    /// lists every status.
    pub status: Option<String>,
}

impl OrderFilterParams {
    pub(crate) fn parse(&self) -> Result<Option<OrderStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => Ok(Some(raw.parse()?)),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    /// Unit price captured at checkout.
    pub price_at_time: String,
    pub subtotal: String,
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(v: OrderItemView) -> Self {
        Self {
            id: v.item.id,
            product_id: v.item.product_id,
            subtotal: v.item.subtotal().to_string(),
            product_name: v.product_name,
            image_url: v.image_url,
            quantity: v.item.quantity,
            price_at_time: v.item.price_at_time.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummaryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: String,
    /// Stored status, or expired-pending / expired-confirmed once past expiry.
    pub display_status: String,
    pub total_amount: String,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
    /// Countdown such as "23h 59m 58s", or "Expired".
    pub time_left: String,
}

impl OrderSummaryResponse {
    pub(crate) fn at(order: Order, now: DateTime<Utc>) -> Self {
        Self {
            display_status: order.display_status(now).label().to_string(),
            time_left: format_time_left(order.time_until_expiry(now)),
            id: order.id,
            user_id: order.user_id,
            order_number: order.order_number,
            status: order.status.to_string(),
            total_amount: order.total_amount.to_string(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            expires_at: order.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: OrderSummaryResponse,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub(crate) fn at(view: OrderView, now: DateTime<Utc>) -> Self {
        Self {
            order: OrderSummaryResponse::at(view.order, now),
            items: view.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassSweepResponse {
    pub status: String,
    pub method: String,
    pub cancelled: u64,
    pub failed: u64,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub total_cancelled: u64,
    pub classes: Vec<ClassSweepResponse>,
}

impl From<SweepReport> for SweepResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            total_cancelled: report.total_cancelled(),
            classes: report
                .classes
                .into_iter()
                .map(|c| ClassSweepResponse {
                    status: c.class.status().to_string(),
                    method: c.method.as_str().to_string(),
                    cancelled: c.cancelled,
                    failed: c.failed,
                    error: c.error,
                })
                .collect(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Checks the caller's cart out into a pending order.
#[utoipa::path(
    post,
    path = "/orders",
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Cart is empty"),
        (status = 409, description = "Not enough stock for a line"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn place_order(
    state: web::Data<AppState>,
    caller: Caller,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let view = web::block(move || state.orders.place_order(user_id)).await??;
    Ok(HttpResponse::Created().json(OrderResponse::at(view, Utc::now())))
}

/// GET /orders
#[utoipa::path(
    get,
    path = "/orders",
    params(OrderFilterParams),
    responses(
        (status = 200, description = "The caller's orders, newest first", body = [OrderResponse]),
        (status = 400, description = "Unknown status filter"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    caller: Caller,
    query: web::Query<OrderFilterParams>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let status = query.parse()?;
    let views = web::block(move || {
        state.orders.expire_sweep();
        state.orders.list_for_user(user_id, status)
    })
    .await??;
    let now = Utc::now();
    let body: Vec<OrderResponse> = views
        .into_iter()
        .map(|view| OrderResponse::at(view, now))
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order receipt", body = OrderResponse),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let order_id = path.into_inner();
    let view = web::block(move || {
        state.orders.expire_sweep();
        state.orders.get_for_user(user_id, order_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(OrderResponse::at(view, Utc::now())))
}

/// POST /orders/{id}/cancel
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order cancelled", body = OrderSummaryResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn cancel_order(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller.0.id;
    let order_id = path.into_inner();
    let order = web::block(move || state.orders.cancel_order(user_id, order_id)).await??;
    Ok(HttpResponse::Ok().json(OrderSummaryResponse::at(order, Utc::now())))
}

/// POST /orders/expire
///
/// Runs the expiry sweep on demand. Order and cart reads also run it first.
#[utoipa::path(
    post,
    path = "/orders/expire",
    responses(
        (status = 200, description = "Sweep report", body = SweepResponse),
        (status = 403, description = "Admin privileges required"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn expire_orders(
    state: web::Data<AppState>,
    admin: Admin,
) -> Result<HttpResponse, AppError> {
    log::info!("Expiry sweep requested by {}", admin.0.username);
    let report = web::block(move || state.orders.expire_sweep()).await?;
    Ok(HttpResponse::Ok().json(SweepResponse::from(report)))
}


#[cfg(test)]
mod route_tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::handlers::test_support::{bearer, TestApp, CREW_EMAIL, RIDER_EMAIL};

    #[actix_web::test]
    async fn checkout_snapshots_cart_and_decrements_stock() {
        let app = TestApp::start();
        let svc =
            test::init_service(App::new().app_data(app.state.clone()).configure(crate::configure))
                .await;
        let pad = app.product("Brake Pad", "50000", 5);

        let req = test::TestRequest::post()
            .uri("/cart/items")
            .insert_header(bearer(RIDER_EMAIL))
            .set_json(json!({ "product_id": pad.id, "quantity": 3 }))
            .to_request();
        test::call_service(&svc, req).await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        let resp = test::call_service(&svc, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let order: Value = test::read_body_json(resp).await;

        assert_eq!(order["status"], "pending");
        assert_eq!(order["display_status"], "pending");
        assert_eq!(order["total_amount"], "150000");
        assert_eq!(order["user_id"], app.rider_id.to_string());
        assert_eq!(order["items"][0]["product_name"], "Brake Pad");
        assert_eq!(order["items"][0]["quantity"], 3);
        assert!(order["order_number"]
            .as_str()
            .is_some_and(|n| n.starts_with("ORD-")));

        let req = test::TestRequest::get()
            .uri(&format!("/products/{}", pad.id))
            .to_request();
        let product: Value = test::call_and_read_body_json(&svc, req).await;
        assert_eq!(product["stock"], 2);

        let req = test::TestRequest::get()
            .uri("/cart")
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        let cart: Value = test::call_and_read_body_json(&svc, req).await;
        assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
    }

    #[actix_web::test]
    async fn empty_cart_cannot_be_checked_out() {
        let app = TestApp::start();
        let svc =
            test::init_service(App::new().app_data(app.state.clone()).configure(crate::configure))
                .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        let resp = test::call_service(&svc, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Cart is empty");
    }

    fn place_rider_order(app: &TestApp) -> Uuid {
        let pad = app.product(&format!("Pad {}", Uuid::new_v4()), "75000", 4);
        app.state
            .cart
            .add_to_cart(app.rider_id, pad.id, 1)
            .expect("add to cart");
        app.state
            .orders
            .place_order(app.rider_id)
            .expect("place order")
            .order
            .id
    }

    #[actix_web::test]
    async fn orders_of_other_users_read_as_missing() {
        let app = TestApp::start();
        let svc =
            test::init_service(App::new().app_data(app.state.clone()).configure(crate::configure))
                .await;
        let order_id = place_rider_order(&app);

        let req = test::TestRequest::get()
            .uri(&format!("/orders/{order_id}"))
            .insert_header(bearer(CREW_EMAIL))
            .to_request();
        let resp = test::call_service(&svc, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Order not found");
    }

    #[actix_web::test]
    async fn expired_orders_are_cancelled_when_the_list_loads() {
        let app = TestApp::start();
        let svc =
            test::init_service(App::new().app_data(app.state.clone()).configure(crate::configure))
                .await;
        let order_id = place_rider_order(&app);
        app.store
            .set_expires_at(order_id, Utc::now() - Duration::minutes(5));

        let req = test::TestRequest::get()
            .uri("/orders?status=all")
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        let orders: Value = test::call_and_read_body_json(&svc, req).await;

        assert_eq!(orders[0]["status"], "cancelled");
        assert_eq!(orders[0]["time_left"], "Expired");
    }

    #[actix_web::test]
    async fn explicit_sweep_is_admin_only() {
        let app = TestApp::start();
        let svc =
            test::init_service(App::new().app_data(app.state.clone()).configure(crate::configure))
                .await;
        let order_id = place_rider_order(&app);
        app.store
            .set_expires_at(order_id, Utc::now() - Duration::minutes(5));

        let req = test::TestRequest::post()
            .uri("/orders/expire")
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        assert_eq!(
            test::call_service(&svc, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = test::TestRequest::post()
            .uri("/orders/expire")
            .insert_header(bearer(CREW_EMAIL))
            .to_request();
        let report: Value = test::call_and_read_body_json(&svc, req).await;
        assert_eq!(report["total_cancelled"], 1);
        assert_eq!(report["classes"][0]["status"], "pending");
        assert_eq!(report["classes"][0]["method"], "procedure");
    }

    #[actix_web::test]
    async fn shopper_cancel_puts_stock_back() {
        let app = TestApp::start();
        let svc =
            test::init_service(App::new().app_data(app.state.clone()).configure(crate::configure))
                .await;
        let order_id = place_rider_order(&app);

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{order_id}/cancel"))
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        let order: Value = test::call_and_read_body_json(&svc, req).await;
        assert_eq!(order["status"], "cancelled");

        let req = test::TestRequest::get()
            .uri(&format!("/orders/{order_id}"))
            .insert_header(bearer(RIDER_EMAIL))
            .to_request();
        let receipt: Value = test::call_and_read_body_json(&svc, req).await;
        let product_id = receipt["items"][0]["product_id"]
            .as_str()
            .expect("product id")
            .to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/products/{product_id}"))
            .to_request();
        let product: Value = test::call_and_read_body_json(&svc, req).await;
        assert_eq!(product["stock"], 4);
    }
}
