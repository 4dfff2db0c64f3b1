use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::product::Product;

#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart item joined with the live product row.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    pub fn subtotal(&self) -> BigDecimal {
        &self.product.price * BigDecimal::from(self.item.quantity)
    }

    pub fn exceeds_stock(&self) -> bool {
        self.item.quantity > self.product.stock
    }
}

pub fn cart_total(lines: &[CartLine]) -> BigDecimal {
    lines
        .iter()
        .fold(BigDecimal::zero(), |acc, line| acc + line.subtotal())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAdjustment {
    /// The product sold out; the line is dropped.
    Remove { item_id: Uuid },
    /// The line asked for more than is left; it is cut down to stock.
    Clamp { item_id: Uuid, quantity: i32 },
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub lines: Vec<CartLine>,
    pub adjustments: Vec<CartAdjustment>,
}

impl Reconciliation {
    pub fn removed(&self) -> usize {
        self.adjustments
            .iter()
            .filter(|a| matches!(a, CartAdjustment::Remove { .. }))
            .count()
    }

    pub fn clamped(&self) -> usize {
        self.adjustments.len() - self.removed()
    }

    /// Shopper-facing summary of what changed, if anything did.
    pub fn notice(&self) -> Option<String> {
        match (self.removed(), self.clamped()) {
            (0, 0) => None,
            (removed, 0) => Some(format!(
                "{removed} out-of-stock items removed from cart."
            )),
            (0, clamped) => Some(format!(
                "{clamped} items adjusted to available stock."
            )),
            (removed, clamped) => Some(format!(
                "{removed} out-of-stock items removed and {clamped} items adjusted to available stock."
            )),
        }
    }
}

/// Brings every line back within live stock. Lines whose product is sold out
/// are removed, lines above stock are clamped, the rest pass through.
pub fn reconcile(lines: Vec<CartLine>) -> Reconciliation {
    let mut out = Reconciliation::default();
    for mut line in lines {
        if !line.exceeds_stock() {
            out.lines.push(line);
            continue;
        }
        if line.product.stock <= 0 {
            out.adjustments.push(CartAdjustment::Remove {
                item_id: line.item.id,
            });
            continue;
        }
        out.adjustments.push(CartAdjustment::Clamp {
            item_id: line.item.id,
            quantity: line.product.stock,
        });
        line.item.quantity = line.product.stock;
        out.lines.push(line);
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::product::tests::product;

    pub(crate) fn line(product: Product, quantity: i32) -> CartLine {
        CartLine {
            item: CartItem {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                product_id: product.id,
                quantity,
                created_at: Utc::now(),
            },
            product,
        }
    }

    #[test]
    fn lines_within_stock_pass_through() {
        let r = reconcile(vec![line(product("Seat", "10", 5), 3)]);
        assert!(r.adjustments.is_empty());
        assert_eq!(r.lines.len(), 1);
        assert_eq!(r.notice(), None);
    }

    #[test]
    fn sold_out_line_is_removed_with_notice() {
        let r = reconcile(vec![line(product("Seat", "10", 0), 2)]);
        assert!(r.lines.is_empty());
        assert!(matches!(r.adjustments[0], CartAdjustment::Remove { .. }));
        assert_eq!(
            r.notice().as_deref(),
            Some("1 out-of-stock items removed from cart.")
        );
    }

    #[test]
    fn line_above_stock_is_clamped() {
        let r = reconcile(vec![line(product("Seat", "10", 2), 7)]);
        assert_eq!(r.lines[0].item.quantity, 2);
        assert!(matches!(
            r.adjustments[0],
            CartAdjustment::Clamp { quantity: 2, .. }
        ));
        assert_eq!(
            r.notice().as_deref(),
            Some("1 items adjusted to available stock.")
        );
    }

    #[test]
    fn mixed_adjustments_produce_combined_notice() {
        let r = reconcile(vec![
            line(product("A", "10", 0), 1),
            line(product("B", "10", 1), 4),
            line(product("C", "10", 9), 4),
        ]);
        assert_eq!(r.lines.len(), 2);
        assert!(r.lines.iter().all(|l| !l.exceeds_stock()));
        assert_eq!(
            r.notice().as_deref(),
            Some("1 out-of-stock items removed and 1 items adjusted to available stock.")
        );
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let lines = vec![
            line(product("A", "150.50", 5), 2),
            line(product("B", "20", 5), 3),
        ];
        assert_eq!(cart_total(&lines), BigDecimal::from(361));
    }
}
