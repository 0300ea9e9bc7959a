//! Pricing policy used to compute checkout totals.

use common::{LineItem, ProductId};

use crate::value_objects::Money;

/// Prices cart contents.
pub trait PricingPolicy: Send + Sync {
    /// Price of one unit of a product.
    fn unit_price(&self, product_id: &ProductId) -> Money;

    /// Total price of the given lines.
    fn total(&self, items: &[LineItem]) -> Money {
        items
            .iter()
            .map(|item| self.unit_price(&item.product_id).multiply(item.quantity))
            .sum()
    }
}

/// Every unit costs the same, regardless of product.
#[derive(Debug, Clone, Copy)]
pub struct FlatRatePricing {
    unit_price: Money,
}

impl FlatRatePricing {
    pub fn new(unit_price: Money) -> Self {
        Self { unit_price }
    }
}

impl Default for FlatRatePricing {
    /// $10.00 per unit.
    fn default() -> Self {
        Self::new(Money::from_dollars(10))
    }
}

impl PricingPolicy for FlatRatePricing {
    fn unit_price(&self, _product_id: &ProductId) -> Money {
        self.unit_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ten_dollars_per_unit() {
        let pricing = FlatRatePricing::default();
        let items = vec![LineItem::new("P1", 5), LineItem::new("P2", 2)];
        assert_eq!(pricing.total(&items), Money::from_dollars(70));
    }

    #[test]
    fn test_empty_total_is_zero() {
        assert!(FlatRatePricing::default().total(&[]).is_zero());
    }

    #[test]
    fn test_custom_unit_price() {
        let pricing = FlatRatePricing::new(Money::from_cents(250));
        assert_eq!(
            pricing.total(&[LineItem::new("P1", 3)]),
            Money::from_cents(750)
        );
    }
}
