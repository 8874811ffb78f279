use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MissingDataPolicy;
use crate::domain::Year;
use crate::error::{Result, SimulationError};

/// Region name of explicit global demand rows
pub const GLOBAL_REGION: &str = "Global";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRow {
    pub product: String,
    pub region: String,
    pub year: Year,
    /// Mt product / year
    pub value: f64,
}

/// Demand keyed by (product, region, year)
#[derive(Debug, Clone, Default)]
pub struct DemandTable {
    values: BTreeMap<(String, String, Year), f64>,
}

impl DemandTable {
    pub fn from_rows(rows: Vec<DemandRow>) -> Result<Self> {
        let mut values = BTreeMap::new();
        for row in rows {
            if !row.value.is_finite() || row.value < 0.0 {
                return Err(SimulationError::InvalidInput(format!(
                    "demand for {}/{}/{} must be a non-negative number, got {}",
                    row.product, row.region, row.year, row.value
                )));
            }
            let key = (row.product, row.region, row.year);
            if values.insert(key.clone(), row.value).is_some() {
                return Err(SimulationError::InvalidInput(format!(
                    "duplicate demand row for {}/{}/{}",
                    key.0, key.1, key.2
                )));
            }
        }
        Ok(Self { values })
    }

    pub fn demand(
        &self,
        product: &str,
        region: &str,
        year: Year,
        policy: MissingDataPolicy,
    ) -> Result<f64> {
        let value = self
            .values
            .get(&(product.to_string(), region.to_string(), year))
            .copied();
        policy.resolve(value, "demand", || format!("{product}/{region}/{year}"))
    }

    /// Global demand: the explicit global row if present, else the sum over regions
    pub fn global_demand(&self, product: &str, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        if let Some(global) = self
            .values
            .get(&(product.to_string(), GLOBAL_REGION.to_string(), year))
        {
            return Ok(*global);
        }

        let mut found = false;
        let mut total = 0.0;
        for ((p, _, y), value) in self.values.iter() {
            if p == product && *y == year {
                found = true;
                total += value;
            }
        }
        policy.resolve(found.then_some(total), "demand", || {
            format!("{product}/{GLOBAL_REGION}/{year}")
        })
    }

    /// Demand per region for one product and year, excluding the global row
    pub fn regional_demand(&self, product: &str, year: Year) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .filter(|((p, r, y), _)| p == product && *y == year && r != GLOBAL_REGION)
            .map(|((_, r, _), v)| (r.clone(), *v))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
