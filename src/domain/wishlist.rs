use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::product::Product;

#[derive(Debug, Clone, PartialEq)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WishlistEntry {
    pub item: WishlistItem,
    pub product: Product,
}
