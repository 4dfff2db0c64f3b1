use std::sync::Arc;

use uuid::Uuid;

use crate::domain::cart::CartItem;
use crate::domain::errors::DomainError;
use crate::domain::ports::{ProductRepository, Repositories, WishlistRepository};
use crate::domain::wishlist::{WishlistEntry, WishlistItem};

use super::cart_service::CartService;

pub struct WishlistService {
    wishlist: Arc<dyn WishlistRepository>,
    products: Arc<dyn ProductRepository>,
    cart: CartService,
}

impl WishlistService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            wishlist: repos.wishlist.clone(),
            products: repos.products.clone(),
            cart: CartService::new(repos),
        }
    }

    pub fn list(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, DomainError> {
        self.wishlist.entries_for_user(user_id)
    }

    pub fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistItem, DomainError> {
        if self.products.find_by_id(product_id)?.is_none() {
            return Err(DomainError::NotFound("Product"));
        }
        self.wishlist.add(user_id, product_id)
    }

    pub fn remove(&self, user_id: Uuid, wishlist_id: Uuid) -> Result<(), DomainError> {
        let item = self.owned(user_id, wishlist_id)?;
        self.wishlist.remove(item.id)
    }

    /// Puts one unit of the wished product in the cart. The wishlist entry
    /// stays.
    pub fn add_to_cart(&self, user_id: Uuid, wishlist_id: Uuid) -> Result<CartItem, DomainError> {
        let item = self.owned(user_id, wishlist_id)?;
        self.cart.add_to_cart(user_id, item.product_id, 1)
    }

    fn owned(&self, user_id: Uuid, wishlist_id: Uuid) -> Result<WishlistItem, DomainError> {
        self.wishlist
            .find_by_id(wishlist_id)?
            .filter(|item| item.user_id == user_id)
            .ok_or(DomainError::NotFound("Wishlist item"))
    }
}
