use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::errors::DomainError;

pub const PENDING_EXPIRY_PROCEDURE: &str = "cancel_expired_orders";
pub const CONFIRMED_EXPIRY_PROCEDURE: &str = "cancel_expired_confirmed_orders";
/// Unique constraint on `orders.order_number`; named in the database error
/// when two checkouts draw the same number.
pub const ORDER_NUMBER_KEY: &str = "orders_order_number_key";
pub const RESTORE_REQUIRES_CANCELLED: &str = "Stock can only be restored for cancelled orders";

/// Stored order status.
///
/// The lifecycle is pending → {paid, confirmed, cancelled},
/// paid → {confirmed, completed, cancelled}, confirmed → {completed, cancelled}.
/// Completed and cancelled are terminal. The back-office may still write any
/// status; [`OrderStatus::can_transition_to`] only describes the business rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Paid,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Confirmed,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Confirmed | Cancelled)
                | (Paid, Confirmed | Completed | Cancelled)
                | (Confirmed, Completed | Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown order status '{s}'")))
    }
}

/// Status classes cleaned up by the expiry sweep, each backed by its own
/// stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryClass {
    Pending,
    Confirmed,
}

impl ExpiryClass {
    pub const ALL: [ExpiryClass; 2] = [ExpiryClass::Pending, ExpiryClass::Confirmed];

    pub fn status(self) -> OrderStatus {
        match self {
            ExpiryClass::Pending => OrderStatus::Pending,
            ExpiryClass::Confirmed => OrderStatus::Confirmed,
        }
    }

    pub fn procedure(self) -> &'static str {
        match self {
            ExpiryClass::Pending => PENDING_EXPIRY_PROCEDURE,
            ExpiryClass::Confirmed => CONFIRMED_EXPIRY_PROCEDURE,
        }
    }
}

/// Status as shown to people: stored status, except that a pending or
/// confirmed order past its expiry reads as expired before the sweep gets
/// to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Stored(OrderStatus),
    ExpiredPending,
    ExpiredConfirmed,
}

impl DisplayStatus {
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::Stored(status) => status.as_str(),
            DisplayStatus::ExpiredPending => "expired-pending",
            DisplayStatus::ExpiredConfirmed => "expired-confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Order {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn display_status(&self, now: DateTime<Utc>) -> DisplayStatus {
        match self.status {
            OrderStatus::Pending if self.is_expired(now) => DisplayStatus::ExpiredPending,
            OrderStatus::Confirmed if self.is_expired(now) => DisplayStatus::ExpiredConfirmed,
            status => DisplayStatus::Stored(status),
        }
    }

    /// Remaining time before expiry, or `None` once it has passed.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        let left = self.expires_at - now;
        (left > Duration::zero()).then_some(left)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_time: BigDecimal,
}

impl OrderItem {
    pub fn subtotal(&self) -> BigDecimal {
        &self.price_at_time * BigDecimal::from(self.quantity)
    }
}

/// An order line joined with the name of the product it snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemView {
    pub item: OrderItem,
    pub product_name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub total_amount: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_time: BigDecimal,
}

/// Result of the stock-restore procedure for a cancelled order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub already_restored: bool,
    pub restored_items: i64,
}

pub fn items_total(items: &[NewOrderItem]) -> BigDecimal {
    items.iter().fold(BigDecimal::zero(), |acc, item| {
        acc + &item.price_at_time * BigDecimal::from(item.quantity)
    })
}

/// `ORD-YYYYMMDD-NNNN`, the suffix being the last four digits of the epoch
/// milliseconds.
pub fn order_number(now: DateTime<Utc>) -> String {
    let suffix = now.timestamp_millis().rem_euclid(10_000);
    format!("ORD-{}-{:04}", now.format("%Y%m%d"), suffix)
}

/// Countdown text for a receipt: `"2h 5m 9s"`, `"5m 9s"`, `"9s"` or
/// `"Expired"`.
pub fn format_time_left(left: Option<Duration>) -> String {
    let Some(left) = left else {
        return "Expired".to_string();
    };
    let total = left.num_seconds();
    if total <= 0 {
        return "Expired".to_string();
    }
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
