//! Concurrent checkout simulation.
//!
//! Many shoppers fill their carts with the same scarce product and check out
//! at the same moment; half of the winners then cancel. The report shows
//! that units sold plus units on hand always equal the initial stock.

use std::sync::{Arc, Barrier};
use std::thread;

use serde::Serialize;

use storefront_core::{DomainError, DomainResult, Money, ProductId, UserId};
use storefront_infra::Storefront;
use storefront_orders::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationPlan {
    pub shoppers: usize,
    pub units_per_shopper: u32,
    pub initial_stock: u64,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            shoppers: 64,
            units_per_shopper: 2,
            initial_stock: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub placed: usize,
    pub out_of_stock: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub units_sold: u64,
    pub units_available: u64,
}

impl SimulationReport {
    /// Every unit is either sold or back on the shelf.
    pub fn is_consistent(&self, plan: &SimulationPlan) -> bool {
        self.units_sold + self.units_available == plan.initial_stock
    }
}

pub fn run(shop: Arc<Storefront>, plan: SimulationPlan) -> DomainResult<SimulationReport> {
    let product = ProductId::new();
    shop.add_product(product, "Limited edition grinder", Money::from_minor(14_900), plan.initial_stock)?;

    let barrier = Arc::new(Barrier::new(plan.shoppers.max(1)));
    let handles: Vec<_> = (0..plan.shoppers)
        .map(|_| {
            let shop = shop.clone();
            let barrier = barrier.clone();
            thread::spawn(move || -> DomainResult<_> {
                let user = UserId::new();
                let added = shop.add_to_cart(user, product, plan.units_per_shopper);
                // Every shopper reaches the barrier, even one whose add failed.
                barrier.wait();
                added?;
                Ok(shop.create_order(user))
            })
        })
        .collect();

    let mut report = SimulationReport {
        placed: 0,
        out_of_stock: 0,
        failed: 0,
        cancelled: 0,
        units_sold: 0,
        units_available: 0,
    };
    let mut placed = Vec::new();
    for handle in handles {
        let outcome = handle
            .join()
            .map_err(|_| DomainError::persistence("shopper thread panicked"))??;
        match outcome {
            Ok(order) => placed.push(order.id_typed()),
            Err(DomainError::InsufficientStock { .. }) => report.out_of_stock += 1,
            Err(err) => {
                tracing::warn!(error = %err, "checkout failed");
                report.failed += 1;
            }
        }
    }
    report.placed = placed.len();

    for order_id in placed.iter().step_by(2) {
        shop.update_status(*order_id, OrderStatus::Cancelled)?;
        report.cancelled += 1;
    }

    report.units_available = shop.ledger().get_available(product)?;
    report.units_sold =
        (report.placed - report.cancelled) as u64 * u64::from(plan.units_per_shopper);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_infra::StorefrontConfig;

    #[test]
    fn simulation_never_oversells() {
        let plan = SimulationPlan {
            shoppers: 16,
            units_per_shopper: 3,
            initial_stock: 20,
        };
        let shop = Arc::new(Storefront::in_memory(StorefrontConfig::default()));

        let report = run(shop, plan).unwrap();

        assert_eq!(report.placed, 6);
        assert_eq!(report.out_of_stock, 10);
        assert_eq!(report.failed, 0);
        assert_eq!(report.cancelled, 3);
        assert!(report.is_consistent(&plan));
    }
}
