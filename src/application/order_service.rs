use std::sync::Arc;
use std::time::Duration as StdDuration;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    items_total, order_number, ExpiryClass, NewOrder, NewOrderItem, Order, OrderStatus,
    OrderView, RestoreOutcome, ORDER_NUMBER_KEY, RESTORE_REQUIRES_CANCELLED,
};
use crate::domain::ports::{CartRepository, OrderRepository, ProductRepository, Repositories};

/// Order numbers only carry millisecond resolution, so a clash is retried
/// with a fresh timestamp.
const ORDER_NUMBER_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMethod {
    Procedure,
    Manual,
}

impl SweepMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SweepMethod::Procedure => "procedure",
            SweepMethod::Manual => "manual",
        }
    }
}

/// Outcome of sweeping one status class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSweep {
    pub class: ExpiryClass,
    pub method: SweepMethod,
    pub cancelled: u64,
    pub failed: u64,
    /// Set when even the manual lookup could not run.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub classes: Vec<ClassSweep>,
}

impl SweepReport {
    pub fn total_cancelled(&self) -> u64 {
        self.classes.iter().map(|c| c.cancelled).sum()
    }
}

/// Checkout, cancellation and expiry of orders.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    carts: Arc<dyn CartRepository>,
    expiry_window: Duration,
}

impl OrderService {
    pub fn new(repos: &Repositories, expiry_window: Duration) -> Self {
        Self {
            orders: repos.orders.clone(),
            products: repos.products.clone(),
            carts: repos.carts.clone(),
            expiry_window,
        }
    }

    /// Turns the user's cart into a pending order.
    ///
    /// Every line is checked against live stock first; one short line fails
    /// the whole checkout with stock untouched. Once the order row exists a
    /// failure to write its items deletes it again. Stock decrements and the
    /// cart clear after that are best-effort and only logged.
    pub fn place_order(&self, user_id: Uuid) -> Result<OrderView, DomainError> {
        let lines = self.carts.lines_for_user(user_id)?;
        if lines.is_empty() {
            return Err(DomainError::InvalidInput("Cart is empty".to_string()));
        }

        for line in &lines {
            if line.exceeds_stock() {
                return Err(DomainError::InsufficientStock {
                    product: line.product.name.clone(),
                    available: line.product.stock,
                    requested: line.item.quantity,
                });
            }
        }

        let items: Vec<NewOrderItem> = lines
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product.id,
                quantity: line.item.quantity,
                price_at_time: line.product.price.clone(),
            })
            .collect();
        let total = items_total(&items);

        let order = self.create_order_row(user_id, total)?;

        if let Err(e) = self.orders.insert_items(order.id, &items) {
            log::error!("Failed to write items of order {}: {e}", order.order_number);
            if let Err(cleanup) = self.orders.delete(order.id) {
                log::error!(
                    "Failed to delete half-written order {}: {cleanup}",
                    order.order_number
                );
            }
            return Err(e);
        }

        for item in &items {
            match self.products.decrement_stock(item.product_id, item.quantity) {
                Ok(true) => {}
                Ok(false) => log::warn!(
                    "Stock of product {} no longer covers {} units for order {}",
                    item.product_id,
                    item.quantity,
                    order.order_number
                ),
                Err(e) => log::error!(
                    "Failed to decrement stock of product {} for order {}: {e}",
                    item.product_id,
                    order.order_number
                ),
            }
        }

        if let Err(e) = self.carts.clear(user_id) {
            log::error!("Failed to clear cart after order {}: {e}", order.order_number);
        }

        log::info!(
            "Order {} placed by {} for {}",
            order.order_number,
            user_id,
            order.total_amount
        );

        self.orders
            .find_by_id(order.id)?
            .ok_or(DomainError::NotFound("Order"))
    }

    fn create_order_row(
        &self,
        user_id: Uuid,
        total: BigDecimal,
    ) -> Result<Order, DomainError> {
        let id = Uuid::new_v4();
        let mut attempt = 1;
        loop {
            let now = Utc::now();
            let result = self.orders.create(NewOrder {
                id,
                user_id,
                order_number: order_number(now),
                total_amount: total.clone(),
                created_at: now,
                expires_at: now + self.expiry_window,
            });
            match result {
                Err(DomainError::Conflict(msg))
                    if msg.contains(ORDER_NUMBER_KEY) && attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    log::debug!("Order number clash, retrying: {msg}");
                    attempt += 1;
                    std::thread::sleep(StdDuration::from_millis(1));
                }
                other => return other,
            }
        }
    }

    /// Fetches one of the user's orders. Orders of other users read as
    /// missing.
    pub fn get_for_user(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, DomainError> {
        self.orders
            .find_by_id(order_id)?
            .filter(|view| view.order.user_id == user_id)
            .ok_or(DomainError::NotFound("Order"))
    }

    pub fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderView>, DomainError> {
        self.orders.list_for_user(user_id, status)
    }

    /// Shopper-side cancellation. Putting the items back into stock is done
    /// by the database when the status flips.
    pub fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, DomainError> {
        let view = self.get_for_user(user_id, order_id)?;
        match view.order.status {
            OrderStatus::Cancelled => return Ok(view.order),
            OrderStatus::Completed => {
                return Err(DomainError::Conflict(
                    "Completed orders cannot be cancelled".to_string(),
                ))
            }
            _ => {}
        }

        if !self.orders.update_status(order_id, OrderStatus::Cancelled)? {
            return Err(DomainError::NotFound("Order"));
        }
        log::info!(
            "Order {} cancelled, stock restoration handled by database trigger",
            view.order.order_number
        );

        let mut order = view.order;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(order)
    }

    /// Explicit stock restore for a cancelled order. Safe to repeat. Live
    /// orders still hold their units and are refused.
    pub fn restore_stock(&self, order_id: Uuid) -> Result<RestoreOutcome, DomainError> {
        let view = self
            .orders
            .find_by_id(order_id)?
            .ok_or(DomainError::NotFound("Order"))?;
        if view.order.status != OrderStatus::Cancelled {
            return Err(DomainError::Conflict(RESTORE_REQUIRES_CANCELLED.to_string()));
        }
        let outcome = self.orders.restore_stock(order_id)?;
        if outcome.already_restored {
            log::info!("Stock was already restored for order {order_id}");
        } else {
            log::info!(
                "Restored stock of {} lines for order {order_id}",
                outcome.restored_items
            );
        }
        Ok(outcome)
    }

    /// Cancels every pending and confirmed order past its expiry.
    pub fn expire_sweep(&self) -> SweepReport {
        self.expire_sweep_at(Utc::now())
    }

    pub fn expire_sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let classes = ExpiryClass::ALL
            .into_iter()
            .map(|class| self.sweep_class(class, now))
            .collect();
        let report = SweepReport { classes };
        log::info!(
            "Expired orders cleanup cancelled {} orders",
            report.total_cancelled()
        );
        report
    }

    fn sweep_class(&self, class: ExpiryClass, now: DateTime<Utc>) -> ClassSweep {
        match self.orders.run_expiry_procedure(class) {
            Ok(cancelled) => {
                return ClassSweep {
                    class,
                    method: SweepMethod::Procedure,
                    cancelled,
                    failed: 0,
                    error: None,
                }
            }
            Err(e) => log::warn!(
                "{}() failed, cancelling expired {} orders one by one: {e}",
                class.procedure(),
                class.status()
            ),
        }

        let mut sweep = ClassSweep {
            class,
            method: SweepMethod::Manual,
            cancelled: 0,
            failed: 0,
            error: None,
        };

        let expired = match self.orders.find_expired(class.status(), now) {
            Ok(expired) => expired,
            Err(e) => {
                log::error!("Failed to look up expired {} orders: {e}", class.status());
                sweep.error = Some(e.to_string());
                return sweep;
            }
        };

        for order in expired {
            match self.orders.cancel_if_status(order.id, class.status()) {
                Ok(true) => sweep.cancelled += 1,
                Ok(false) => log::debug!(
                    "Order {} left the {} class before the sweep reached it",
                    order.order_number,
                    class.status()
                ),
                Err(e) => {
                    sweep.failed += 1;
                    log::error!("Failed to cancel expired order {}: {e}", order.order_number);
                }
            }
        }
        sweep
    }
}
