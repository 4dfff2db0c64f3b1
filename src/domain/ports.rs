use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::cart::{CartItem, CartLine};
use super::errors::DomainError;
use super::order::{
    ExpiryClass, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, OrderView, RestoreOutcome,
};
use super::product::{NewProduct, Product, ProductFields};
use super::user::{NewProfile, Profile};
use super::wishlist::{WishlistEntry, WishlistItem};

pub trait ProductRepository: Send + Sync + 'static {
    /// All products, newest first.
    fn list(&self) -> Result<Vec<Product>, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DomainError>;
    fn find_by_name(&self, name: &str) -> Result<Option<Product>, DomainError>;
    fn create(&self, product: NewProduct) -> Result<Product, DomainError>;
    fn update(&self, id: Uuid, fields: &ProductFields) -> Result<Option<Product>, DomainError>;
    /// Deletes the row and hands back what was deleted.
    fn delete(&self, id: Uuid) -> Result<Option<Product>, DomainError>;
    /// Takes `quantity` off the stock only when that much is left. Returns
    /// whether the decrement applied.
    fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<bool, DomainError>;
}

pub trait CartRepository: Send + Sync + 'static {
    /// The user's cart joined with live products, newest first.
    fn lines_for_user(&self, user_id: Uuid) -> Result<Vec<CartLine>, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<CartItem>, DomainError>;
    fn find_for_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, DomainError>;
    fn insert(&self, user_id: Uuid, product_id: Uuid, quantity: i32)
        -> Result<CartItem, DomainError>;
    fn set_quantity(&self, id: Uuid, quantity: i32) -> Result<(), DomainError>;
    fn remove(&self, id: Uuid) -> Result<(), DomainError>;
    /// Empties the user's cart, returning how many lines went.
    fn clear(&self, user_id: Uuid) -> Result<usize, DomainError>;
}

pub trait OrderRepository: Send + Sync + 'static {
    fn create(&self, order: NewOrder) -> Result<Order, DomainError>;
    fn insert_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, DomainError>;
    fn delete(&self, id: Uuid) -> Result<(), DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;
    /// Newest first, items included.
    fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderView>, DomainError>;
    /// Newest first, without items.
    fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, DomainError>;
    /// Returns false when no such order exists.
    fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<bool, DomainError>;
    /// Cancels the order only while its status is still `expected`. Returns
    /// false when the order is gone or has moved on.
    fn cancel_if_status(&self, id: Uuid, expected: OrderStatus) -> Result<bool, DomainError>;
    fn find_expired(
        &self,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, DomainError>;
    /// Runs the stored procedure that cancels every expired order of the
    /// class, returning the number of rows it cancelled.
    fn run_expiry_procedure(&self, class: ExpiryClass) -> Result<u64, DomainError>;
    fn restore_stock(&self, order_id: Uuid) -> Result<RestoreOutcome, DomainError>;
}

pub trait ProfileRepository: Send + Sync + 'static {
    fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, DomainError>;
    fn insert(&self, profile: NewProfile) -> Result<Profile, DomainError>;
    fn username_taken(&self, username: &str, excluding: Uuid) -> Result<bool, DomainError>;
    fn update_username(&self, id: Uuid, username: &str) -> Result<Option<Profile>, DomainError>;
}

pub trait WishlistRepository: Send + Sync + 'static {
    /// Newest first, joined with products.
    fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<WishlistItem>, DomainError>;
    /// Adding a product already on the list returns the existing entry.
    fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistItem, DomainError>;
    fn remove(&self, id: Uuid) -> Result<(), DomainError>;
}

/// One handle per table group, shared by every service.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub wishlist: Arc<dyn WishlistRepository>,
}
