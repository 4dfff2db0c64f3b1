//! In-process store implementing every repository port.
//!
//! Mirrors the database behaviour the services rely on: unique product
//! names, the stock-restore trigger on cancellation and the two expiry
//! procedures. The `fail_*` switches make individual backend calls error so
//! fallback paths can be driven deterministically.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::cart::{CartItem, CartLine};
use crate::domain::errors::DomainError;
use crate::domain::order::{
    ExpiryClass, NewOrder, NewOrderItem, Order, OrderItem, OrderItemView, OrderStatus, OrderView,
    RestoreOutcome, ORDER_NUMBER_KEY, RESTORE_REQUIRES_CANCELLED,
};
use crate::domain::ports::{
    CartRepository, OrderRepository, ProductRepository, ProfileRepository, Repositories,
    WishlistRepository,
};
use crate::domain::product::{NewProduct, Product, ProductFields};
use crate::domain::user::{NewProfile, Profile};
use crate::domain::wishlist::{WishlistEntry, WishlistItem};

#[derive(Default)]
struct State {
    products: Vec<Product>,
    cart: Vec<CartItem>,
    orders: Vec<(Order, bool)>,
    order_items: Vec<OrderItem>,
    profiles: Vec<Profile>,
    wishlist: Vec<WishlistItem>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    pub fail_procedures: AtomicBool,
    pub fail_item_insert: AtomicBool,
    pub fail_cart_clear: AtomicBool,
    pub fail_cart_writes: AtomicBool,
    /// Number of upcoming product listings that fail before one succeeds.
    pub failing_product_lists: AtomicU32,
    pub fail_status_updates_for: Mutex<HashSet<Uuid>>,
    /// When set, every order insert fails with this conflict message.
    pub order_create_conflict: Mutex<Option<String>>,
    pub order_create_attempts: AtomicU32,
}

fn backend_error(what: &str) -> DomainError {
    DomainError::Internal(format!("{what} failed"))
}

fn newest_first<T, F: Fn(&T) -> DateTime<Utc>>(mut rows: Vec<T>, created_at: F) -> Vec<T> {
    rows.reverse();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            products: self.clone(),
            carts: self.clone(),
            orders: self.clone(),
            profiles: self.clone(),
            wishlist: self.clone(),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Internal("in-memory store poisoned".to_string()))
    }

    /// Overwrites an order's expiry, for putting orders in the past.
    pub fn set_expires_at(&self, order_id: Uuid, expires_at: DateTime<Utc>) -> bool {
        let Ok(mut state) = self.state() else {
            return false;
        };
        match state.orders.iter_mut().find(|(o, _)| o.id == order_id) {
            Some((order, _)) => {
                order.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Overwrites stock directly, as another client would.
    pub fn set_stock(&self, product_id: Uuid, stock: i32) -> bool {
        let Ok(mut state) = self.state() else {
            return false;
        };
        match state.products.iter_mut().find(|p| p.id == product_id) {
            Some(product) => {
                product.stock = stock;
                true
            }
            None => false,
        }
    }

    pub fn insert_profile(&self, profile: Profile) {
        if let Ok(mut state) = self.state() {
            state.profiles.retain(|p| p.id != profile.id);
            state.profiles.push(profile);
        }
    }

    fn restore_locked(state: &mut State, order_id: Uuid) -> Option<RestoreOutcome> {
        let idx = state.orders.iter().position(|(o, _)| o.id == order_id)?;
        if state.orders[idx].1 {
            return Some(RestoreOutcome {
                already_restored: true,
                restored_items: 0,
            });
        }
        let lines: Vec<(Uuid, i32)> = state
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .map(|i| (i.product_id, i.quantity))
            .collect();
        let mut restored = 0;
        for (product_id, quantity) in lines {
            if let Some(p) = state.products.iter_mut().find(|p| p.id == product_id) {
                p.stock += quantity;
                restored += 1;
            }
        }
        state.orders[idx].1 = true;
        Some(RestoreOutcome {
            already_restored: false,
            restored_items: restored,
        })
    }

    fn status_update_rejected(&self, id: Uuid) -> bool {
        self.fail_status_updates_for
            .lock()
            .map(|ids| ids.contains(&id))
            .unwrap_or(false)
    }

    fn set_status_locked(state: &mut State, id: Uuid, status: OrderStatus) -> bool {
        let Some((order, _)) = state.orders.iter_mut().find(|(o, _)| o.id == id) else {
            return false;
        };
        let was = order.status;
        order.status = status;
        order.updated_at = Utc::now();
        if status == OrderStatus::Cancelled && was != OrderStatus::Cancelled {
            Self::restore_locked(state, id);
        }
        true
    }

    fn view_locked(state: &State, order: &Order) -> OrderView {
        let items = state
            .order_items
            .iter()
            .filter(|i| i.order_id == order.id)
            .map(|i| {
                let product = state.products.iter().find(|p| p.id == i.product_id);
                OrderItemView {
                    item: i.clone(),
                    product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
                    image_url: product.and_then(|p| p.image_url.clone()),
                }
            })
            .collect();
        OrderView {
            order: order.clone(),
            items,
        }
    }
}

impl ProductRepository for InMemoryStore {
    fn list(&self) -> Result<Vec<Product>, DomainError> {
        let pending_failures = self.failing_product_lists.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.failing_product_lists
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(backend_error("product listing"));
        }
        let state = self.state()?;
        Ok(newest_first(state.products.clone(), |p| p.created_at))
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        Ok(self.state()?.products.iter().find(|p| p.id == id).cloned())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Product>, DomainError> {
        Ok(self
            .state()?
            .products
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    fn create(&self, product: NewProduct) -> Result<Product, DomainError> {
        let mut state = self.state()?;
        if state.products.iter().any(|p| p.name == product.fields.name) {
            return Err(DomainError::Conflict(
                "duplicate key value violates unique constraint \"products_name_key\"".to_string(),
            ));
        }
        let now = Utc::now();
        let row = Product {
            id: Uuid::new_v4(),
            name: product.fields.name,
            price: product.fields.price,
            description: Some(product.fields.description),
            image_url: product.image_url,
            stock: product.fields.stock,
            vehicle_type: product.fields.vehicle_type,
            item_type: product.fields.item_type,
            created_at: now,
            updated_at: now,
            created_by: product.created_by,
        };
        state.products.push(row.clone());
        Ok(row)
    }

    fn update(&self, id: Uuid, fields: &ProductFields) -> Result<Option<Product>, DomainError> {
        let mut state = self.state()?;
        if state
            .products
            .iter()
            .any(|p| p.id != id && p.name == fields.name)
        {
            return Err(DomainError::Conflict(
                "duplicate key value violates unique constraint \"products_name_key\"".to_string(),
            ));
        }
        let Some(p) = state.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        p.name = fields.name.clone();
        p.price = fields.price.clone();
        p.description = Some(fields.description.clone());
        p.stock = fields.stock;
        p.vehicle_type = fields.vehicle_type.clone();
        p.item_type = fields.item_type.clone();
        p.updated_at = Utc::now();
        Ok(Some(p.clone()))
    }

    fn delete(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        let mut state = self.state()?;
        let Some(idx) = state.products.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let removed = state.products.remove(idx);
        state.cart.retain(|c| c.product_id != id);
        state.wishlist.retain(|w| w.product_id != id);
        Ok(Some(removed))
    }

    fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<bool, DomainError> {
        let mut state = self.state()?;
        match state.products.iter_mut().find(|p| p.id == id) {
            Some(p) if p.stock >= quantity => {
                p.stock -= quantity;
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl CartRepository for InMemoryStore {
    fn lines_for_user(&self, user_id: Uuid) -> Result<Vec<CartLine>, DomainError> {
        let state = self.state()?;
        let lines = state
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter_map(|c| {
                state
                    .products
                    .iter()
                    .find(|p| p.id == c.product_id)
                    .map(|p| CartLine {
                        item: c.clone(),
                        product: p.clone(),
                    })
            })
            .collect();
        Ok(newest_first(lines, |l: &CartLine| l.item.created_at))
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<CartItem>, DomainError> {
        Ok(self.state()?.cart.iter().find(|c| c.id == id).cloned())
    }

    fn find_for_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, DomainError> {
        Ok(self
            .state()?
            .cart
            .iter()
            .find(|c| c.user_id == user_id && c.product_id == product_id)
            .cloned())
    }

    fn insert(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, DomainError> {
        if self.fail_cart_writes.load(Ordering::SeqCst) {
            return Err(backend_error("cart insert"));
        }
        let mut state = self.state()?;
        if state
            .cart
            .iter()
            .any(|c| c.user_id == user_id && c.product_id == product_id)
        {
            return Err(DomainError::Conflict("product already in cart".to_string()));
        }
        let item = CartItem {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        };
        state.cart.push(item.clone());
        Ok(item)
    }

    fn set_quantity(&self, id: Uuid, quantity: i32) -> Result<(), DomainError> {
        if self.fail_cart_writes.load(Ordering::SeqCst) {
            return Err(backend_error("cart update"));
        }
        let mut state = self.state()?;
        if let Some(item) = state.cart.iter_mut().find(|c| c.id == id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    fn remove(&self, id: Uuid) -> Result<(), DomainError> {
        if self.fail_cart_writes.load(Ordering::SeqCst) {
            return Err(backend_error("cart delete"));
        }
        self.state()?.cart.retain(|c| c.id != id);
        Ok(())
    }

    fn clear(&self, user_id: Uuid) -> Result<usize, DomainError> {
        if self.fail_cart_clear.load(Ordering::SeqCst) {
            return Err(backend_error("cart clear"));
        }
        let mut state = self.state()?;
        let before = state.cart.len();
        state.cart.retain(|c| c.user_id != user_id);
        Ok(before - state.cart.len())
    }
}

impl OrderRepository for InMemoryStore {
    fn create(&self, order: NewOrder) -> Result<Order, DomainError> {
        self.order_create_attempts.fetch_add(1, Ordering::SeqCst);
        let forced = self
            .order_create_conflict
            .lock()
            .ok()
            .and_then(|msg| msg.clone());
        if let Some(msg) = forced {
            return Err(DomainError::Conflict(msg));
        }
        let mut state = self.state()?;
        if state
            .orders
            .iter()
            .any(|(o, _)| o.order_number == order.order_number)
        {
            return Err(DomainError::Conflict(format!(
                "duplicate key value violates unique constraint \"{ORDER_NUMBER_KEY}\""
            )));
        }
        let row = Order {
            id: order.id,
            user_id: order.user_id,
            order_number: order.order_number,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            created_at: order.created_at,
            updated_at: order.created_at,
            expires_at: order.expires_at,
        };
        state.orders.push((row.clone(), false));
        Ok(row)
    }

    fn insert_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, DomainError> {
        if self.fail_item_insert.load(Ordering::SeqCst) {
            return Err(backend_error("order item insert"));
        }
        let mut state = self.state()?;
        let rows: Vec<OrderItem> = items
            .iter()
            .map(|i| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: i.product_id,
                quantity: i.quantity,
                price_at_time: i.price_at_time.clone(),
            })
            .collect();
        state.order_items.extend(rows.iter().cloned());
        Ok(rows)
    }

    fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = self.state()?;
        state.orders.retain(|(o, _)| o.id != id);
        state.order_items.retain(|i| i.order_id != id);
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let state = self.state()?;
        Ok(state
            .orders
            .iter()
            .find(|(o, _)| o.id == id)
            .map(|(o, _)| Self::view_locked(&state, o)))
    }

    fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderView>, DomainError> {
        let state = self.state()?;
        let views = state
            .orders
            .iter()
            .filter(|(o, _)| o.user_id == user_id && status.map_or(true, |s| o.status == s))
            .map(|(o, _)| Self::view_locked(&state, o))
            .collect();
        Ok(newest_first(views, |v: &OrderView| v.order.created_at))
    }

    fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, DomainError> {
        let state = self.state()?;
        let orders = state
            .orders
            .iter()
            .filter(|(o, _)| status.map_or(true, |s| o.status == s))
            .map(|(o, _)| o.clone())
            .collect();
        Ok(newest_first(orders, |o: &Order| o.created_at))
    }

    fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<bool, DomainError> {
        if self.status_update_rejected(id) {
            return Err(backend_error("order status update"));
        }
        let mut state = self.state()?;
        Ok(Self::set_status_locked(&mut state, id, status))
    }

    fn cancel_if_status(&self, id: Uuid, expected: OrderStatus) -> Result<bool, DomainError> {
        if self.status_update_rejected(id) {
            return Err(backend_error("order status update"));
        }
        let mut state = self.state()?;
        let current = state
            .orders
            .iter()
            .find(|(o, _)| o.id == id)
            .map(|(o, _)| o.status);
        if current != Some(expected) {
            return Ok(false);
        }
        Ok(Self::set_status_locked(&mut state, id, OrderStatus::Cancelled))
    }

    fn find_expired(
        &self,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .state()?
            .orders
            .iter()
            .filter(|(o, _)| o.status == status && o.expires_at < now)
            .map(|(o, _)| o.clone())
            .collect())
    }

    fn run_expiry_procedure(&self, class: ExpiryClass) -> Result<u64, DomainError> {
        if self.fail_procedures.load(Ordering::SeqCst) {
            return Err(DomainError::Internal(format!(
                "function {}() does not exist",
                class.procedure()
            )));
        }
        let mut state = self.state()?;
        let now = Utc::now();
        let expired: Vec<Uuid> = state
            .orders
            .iter()
            .filter(|(o, _)| o.status == class.status() && o.expires_at < now)
            .map(|(o, _)| o.id)
            .collect();
        for id in &expired {
            Self::set_status_locked(&mut state, *id, OrderStatus::Cancelled);
        }
        Ok(expired.len() as u64)
    }

    fn restore_stock(&self, order_id: Uuid) -> Result<RestoreOutcome, DomainError> {
        let mut state = self.state()?;
        let status = state
            .orders
            .iter()
            .find(|(o, _)| o.id == order_id)
            .map(|(o, _)| o.status)
            .ok_or(DomainError::NotFound("Order"))?;
        if status != OrderStatus::Cancelled {
            return Err(DomainError::Conflict(RESTORE_REQUIRES_CANCELLED.to_string()));
        }
        Self::restore_locked(&mut state, order_id).ok_or(DomainError::NotFound("Order"))
    }
}

impl ProfileRepository for InMemoryStore {
    fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, DomainError> {
        Ok(self.state()?.profiles.iter().find(|p| p.id == id).cloned())
    }

    fn insert(&self, profile: NewProfile) -> Result<Profile, DomainError> {
        let mut state = self.state()?;
        if state.profiles.iter().any(|p| p.id == profile.id) {
            return Err(DomainError::Conflict("profile already exists".to_string()));
        }
        if state.profiles.iter().any(|p| p.username == profile.username) {
            return Err(DomainError::Conflict(
                "duplicate key value violates unique constraint \"profiles_username_key\""
                    .to_string(),
            ));
        }
        let now = Utc::now();
        let row = Profile {
            id: profile.id,
            email: profile.email,
            username: profile.username,
            role: profile.role,
            created_at: now,
            updated_at: now,
        };
        state.profiles.push(row.clone());
        Ok(row)
    }

    fn username_taken(&self, username: &str, excluding: Uuid) -> Result<bool, DomainError> {
        Ok(self
            .state()?
            .profiles
            .iter()
            .any(|p| p.username == username && p.id != excluding))
    }

    fn update_username(&self, id: Uuid, username: &str) -> Result<Option<Profile>, DomainError> {
        let mut state = self.state()?;
        let Some(p) = state.profiles.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        p.username = username.to_string();
        p.updated_at = Utc::now();
        Ok(Some(p.clone()))
    }
}

impl WishlistRepository for InMemoryStore {
    fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, DomainError> {
        let state = self.state()?;
        let entries = state
            .wishlist
            .iter()
            .filter(|w| w.user_id == user_id)
            .filter_map(|w| {
                state
                    .products
                    .iter()
                    .find(|p| p.id == w.product_id)
                    .map(|p| WishlistEntry {
                        item: w.clone(),
                        product: p.clone(),
                    })
            })
            .collect();
        Ok(newest_first(entries, |e: &WishlistEntry| e.item.created_at))
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<WishlistItem>, DomainError> {
        Ok(self.state()?.wishlist.iter().find(|w| w.id == id).cloned())
    }

    fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistItem, DomainError> {
        let mut state = self.state()?;
        if let Some(existing) = state
            .wishlist
            .iter()
            .find(|w| w.user_id == user_id && w.product_id == product_id)
        {
            return Ok(existing.clone());
        }
        let item = WishlistItem {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            created_at: Utc::now(),
        };
        state.wishlist.push(item.clone());
        Ok(item)
    }

    fn remove(&self, id: Uuid) -> Result<(), DomainError> {
        self.state()?.wishlist.retain(|w| w.id != id);
        Ok(())
    }
}
