use std::sync::Arc;

use anyhow::Context;

use storefront_app::SimulationPlan;
use storefront_infra::{Storefront, StorefrontConfig};

fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = StorefrontConfig::from_env().context("invalid storefront configuration")?;
    let shop = Arc::new(Storefront::in_memory(config));
    let plan = SimulationPlan::default();

    let report = storefront_app::run(shop, plan).context("checkout simulation failed")?;
    tracing::info!(
        placed = report.placed,
        out_of_stock = report.out_of_stock,
        failed = report.failed,
        cancelled = report.cancelled,
        units_sold = report.units_sold,
        units_available = report.units_available,
        "checkout simulation finished"
    );

    if !report.is_consistent(&plan) {
        anyhow::bail!("stock does not reconcile: {}", serde_json::to_string(&report)?);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
