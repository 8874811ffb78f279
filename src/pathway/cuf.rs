use tracing::debug;

use crate::config::PathwayConfig;
use crate::domain::{AssetId, AssetStack, Year};
use crate::error::Result;
use crate::inputs::DemandTable;

/// Fits capacity utilisation of a stack to demand at the start of a year
#[cfg_attr(test, mockall::automock)]
pub trait CufAdjustment: Send + Sync {
    fn adjust(
        &self,
        stack: &mut AssetStack,
        year: Year,
        config: &PathwayConfig,
        demand: &DemandTable,
    ) -> Result<()>;
}

/// Uniform CUF per product so that production matches global demand,
/// bounded to the configured CUF thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct DemandMatchedCuf;

impl CufAdjustment for DemandMatchedCuf {
    fn adjust(
        &self,
        stack: &mut AssetStack,
        year: Year,
        config: &PathwayConfig,
        demand: &DemandTable,
    ) -> Result<()> {
        for product in config.products.iter() {
            let ids: Vec<AssetId> = stack
                .iter()
                .filter(|a| a.product == *product)
                .map(|a| a.id)
                .collect();
            let capacity: f64 = ids
                .iter()
                .filter_map(|id| stack.get(*id))
                .map(|a| a.annual_production_capacity)
                .sum();
            if capacity <= 0.0 {
                continue;
            }

            let target = demand.global_demand(product, year, config.missing_data)? / capacity;
            let cuf = target.clamp(config.cuf_lower_threshold, config.cuf_upper_threshold);
            debug!(year, product = %product, target, cuf, "CUF adjusted");
            for id in ids {
                stack.set_cuf(id, cuf, config.cuf_lower_threshold, config.cuf_upper_threshold)?;
            }
        }
        Ok(())
    }
}

/// Leaves every CUF as it is
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedCuf;

impl CufAdjustment for FixedCuf {
    fn adjust(&self, _: &mut AssetStack, _: Year, _: &PathwayConfig, _: &DemandTable) -> Result<()> {
        Ok(())
    }
}
