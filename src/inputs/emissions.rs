use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MissingDataPolicy;
use crate::domain::Year;
use crate::error::{Result, SimulationError};

pub const CO2_SCOPE1: &str = "co2_scope1";
pub const CO2_SCOPE2: &str = "co2_scope2";

/// Emission factors of one (product, region, technology, year)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsRow {
    pub product: String,
    pub region: String,
    pub technology: String,
    pub year: Year,
    /// t emission / t product, per emission key
    #[serde(default)]
    pub factors: BTreeMap<String, f64>,
    /// t CO2 captured / t product
    #[serde(default)]
    pub co2_captured: f64,
}

impl EmissionsRow {
    pub fn new(product: &str, region: &str, technology: &str, year: Year) -> Self {
        Self {
            product: product.to_string(),
            region: region.to_string(),
            technology: technology.to_string(),
            year,
            factors: BTreeMap::new(),
            co2_captured: 0.0,
        }
    }

    pub fn factor(mut self, key: &str, value: f64) -> Self {
        self.factors.insert(key.to_string(), value);
        self
    }

    pub fn captured(mut self, value: f64) -> Self {
        self.co2_captured = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmissionFactors {
    pub values: BTreeMap<String, f64>,
    pub co2_captured: f64,
}

impl EmissionFactors {
    /// Scope 1 plus scope 2 CO2 per tonne of product
    pub fn co2_scope1_2(&self) -> f64 {
        self.values.get(CO2_SCOPE1).copied().unwrap_or(0.0)
            + self.values.get(CO2_SCOPE2).copied().unwrap_or(0.0)
    }

    /// Still emits or relies on capture
    pub fn is_residual(&self) -> bool {
        self.co2_scope1_2() > 0.0 || self.co2_captured > 0.0
    }
}

type EmissionsKey = (String, String, String, Year);

#[derive(Debug, Clone, Default)]
pub struct EmissionsTable {
    rows: BTreeMap<EmissionsKey, EmissionFactors>,
}

impl EmissionsTable {
    pub fn from_rows(rows: Vec<EmissionsRow>) -> Result<Self> {
        let mut indexed = BTreeMap::new();
        for row in rows {
            if row.factors.values().any(|v| !v.is_finite()) || !row.co2_captured.is_finite() {
                return Err(SimulationError::InvalidInput(format!(
                    "non-finite emission factor for {}/{}/{}/{}",
                    row.product, row.region, row.technology, row.year
                )));
            }
            let key = (row.product, row.region, row.technology, row.year);
            let factors = EmissionFactors {
                values: row.factors,
                co2_captured: row.co2_captured,
            };
            if indexed.insert(key.clone(), factors).is_some() {
                return Err(SimulationError::InvalidInput(format!(
                    "duplicate emissions row for {}/{}/{}/{}",
                    key.0, key.1, key.2, key.3
                )));
            }
        }
        Ok(Self { rows: indexed })
    }

    fn get(&self, product: &str, region: &str, technology: &str, year: Year) -> Option<&EmissionFactors> {
        self.rows.get(&(
            product.to_string(),
            region.to_string(),
            technology.to_string(),
            year,
        ))
    }

    /// Factors for one asset. `Ok(None)` only when the policy zero-fills.
    pub fn lookup(
        &self,
        product: &str,
        region: &str,
        technology: &str,
        year: Year,
        policy: MissingDataPolicy,
    ) -> Result<Option<&EmissionFactors>> {
        policy.resolve_optional(self.get(product, region, technology, year), "emissions", || {
            format!("{product}/{region}/{technology}/{year}")
        })
    }

    /// Any row of the technology in that year captures CO2
    pub fn captures_co2(&self, technology: &str, year: Year) -> bool {
        self.rows
            .iter()
            .any(|((_, _, t, y), f)| t == technology && *y == year && f.co2_captured > 0.0)
    }

    /// Technology still has direct emissions or relies on capture in that
    /// product and region
    pub fn has_residual_emissions(
        &self,
        product: &str,
        region: &str,
        technology: &str,
        year: Year,
    ) -> bool {
        self.get(product, region, technology, year)
            .is_some_and(EmissionFactors::is_residual)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
