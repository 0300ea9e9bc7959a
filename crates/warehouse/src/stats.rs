//! Process-wide fulfillment counters.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::{FulfillmentOrder, ProductId};

/// Aggregate counters shared by all workers.
///
/// `total_orders` is a lock-free counter. Per-product quantities live in one
/// map behind a single mutex so a read-modify-write of one entry never
/// interleaves with another worker's update. The lock is never held across an
/// `.await`.
///
/// Counts are in-memory only and reset on restart. Redelivered messages are
/// counted again.
#[derive(Debug, Default)]
pub struct AggregateStats {
    total_orders: AtomicU64,
    product_quantity: Mutex<HashMap<ProductId, u64>>,
}

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one order and adds its line quantities to the product totals.
    pub fn record(&self, order: &FulfillmentOrder) {
        self.total_orders.fetch_add(1, Ordering::Relaxed);

        let mut products = self.products();
        for item in &order.items {
            *products.entry(item.product_id.clone()).or_default() += u64::from(item.quantity);
        }
    }

    pub fn total_orders(&self) -> u64 {
        self.total_orders.load(Ordering::Relaxed)
    }

    /// Cumulative quantity recorded for a product (zero if never seen).
    pub fn product_quantity(&self, product_id: &ProductId) -> u64 {
        self.products().get(product_id).copied().unwrap_or(0)
    }

    /// Copies the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let product_quantity = self
            .products()
            .iter()
            .map(|(id, qty)| (id.clone(), *qty))
            .collect();

        StatsSnapshot {
            total_orders: self.total_orders(),
            product_quantity,
        }
    }

    fn products(&self) -> MutexGuard<'_, HashMap<ProductId, u64>> {
        self.product_quantity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of [`AggregateStats`], ordered by product ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_orders: u64,
    pub product_quantity: BTreeMap<ProductId, u64>,
}

impl StatsSnapshot {
    /// Sum of all product quantities.
    pub fn total_units(&self) -> u64 {
        self.product_quantity.values().sum()
    }
}

impl fmt::Display for StatsSnapshot {
    /// Shutdown banner. Lists the counters but not every product.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = "=".repeat(50);
        writeln!(f, "{separator}")?;
        writeln!(f, "WAREHOUSE SERVICE STATISTICS")?;
        writeln!(f, "{separator}")?;
        writeln!(f, "Total Orders Processed: {}", self.total_orders)?;
        writeln!(f, "Distinct Products:      {}", self.product_quantity.len())?;
        writeln!(f, "Total Units:            {}", self.total_units())?;
        write!(f, "{separator}")
    }
}
