//! # Prepared Inputs
//!
//! Tables produced by the upstream data pipeline (demand, rankings, emission
//! factors, technology characteristics, constraint curves). They are loaded
//! once before the year loop starts and are read-only for the whole run.

pub mod curves;
pub mod demand;
pub mod emissions;
pub mod ranking;
pub mod technology;

pub use curves::*;
pub use demand::*;
pub use emissions::*;
pub use ranking::*;
pub use technology::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumString};
use tracing::warn;

use crate::domain::{Asset, AssetId, TechnologyClassification, Year};
use crate::error::{Result, SimulationError};

/// What to do when a join key is missing from an input table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissingDataPolicy {
    /// Abort with a `DataAlignment` error naming the missing key
    #[default]
    FailFast,
    /// Treat the missing value as zero and log a warning
    ZeroFill,
}

impl MissingDataPolicy {
    /// Resolve an optional lookup. `Ok(None)` means the value was zero-filled.
    pub fn resolve_optional<T>(
        self,
        value: Option<T>,
        table: &'static str,
        key: impl FnOnce() -> String,
    ) -> Result<Option<T>> {
        match (value, self) {
            (Some(v), _) => Ok(Some(v)),
            (None, MissingDataPolicy::FailFast) => {
                Err(SimulationError::data_alignment(table, key()))
            }
            (None, MissingDataPolicy::ZeroFill) => {
                warn!(table, key = %key(), "missing input data treated as zero");
                Ok(None)
            }
        }
    }

    pub fn resolve(
        self,
        value: Option<f64>,
        table: &'static str,
        key: impl FnOnce() -> String,
    ) -> Result<f64> {
        Ok(self.resolve_optional(value, table, key)?.unwrap_or(0.0))
    }
}

/// Asset of the initial stack, as delivered by the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialAsset {
    #[serde(default)]
    pub id: Option<AssetId>,
    pub product: String,
    pub region: String,
    pub technology: String,
    pub annual_production_capacity: f64,
    pub cuf: f64,
    #[serde(default)]
    pub technology_classification: Option<TechnologyClassification>,
    pub year_commissioned: Year,
    #[serde(default)]
    pub asset_lifetime: Option<u32>,
}

/// Regional aggregate of the initial fleet, expanded into standard-size assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalStackRow {
    pub product: String,
    pub region: String,
    pub technology: String,
    pub year: Year,
    pub annual_production_capacity: f64,
    pub average_cuf: f64,
    pub average_age: f64,
}

/// Raw scenario inputs, deserialized from a JSON bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputBundle {
    #[serde(default)]
    pub initial_assets: Vec<InitialAsset>,
    #[serde(default)]
    pub initial_regional_stack: Vec<RegionalStackRow>,
    #[serde(default)]
    pub demand: Vec<DemandRow>,
    #[serde(default)]
    pub rankings: RankingInputs,
    #[serde(default)]
    pub emissions: Vec<EmissionsRow>,
    #[serde(default)]
    pub technologies: Vec<TechnologyCharacteristics>,
    #[serde(default)]
    pub curves: CurveInputs,
}

impl InputBundle {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Index the raw tables for lookup
    pub fn index(self) -> Result<PathwayInputs> {
        Ok(PathwayInputs {
            demand: DemandTable::from_rows(self.demand)?,
            rankings: RankingTables::from_inputs(self.rankings)?,
            emissions: EmissionsTable::from_rows(self.emissions)?,
            technologies: TechnologyTable::from_rows(self.technologies),
            curves: self.curves,
            initial_assets: self.initial_assets,
            initial_regional_stack: self.initial_regional_stack,
        })
    }
}

/// Indexed, read-only inputs of one scenario run
#[derive(Debug, Clone)]
pub struct PathwayInputs {
    pub demand: DemandTable,
    pub rankings: RankingTables,
    pub emissions: EmissionsTable,
    pub technologies: TechnologyTable,
    pub curves: CurveInputs,
    pub initial_assets: Vec<InitialAsset>,
    pub initial_regional_stack: Vec<RegionalStackRow>,
}

impl InitialAsset {
    /// Build the asset, filling classification and lifetime from the
    /// technology table when the record does not carry them
    pub fn to_asset(&self, id: AssetId, technologies: &TechnologyTable) -> Result<Asset> {
        let (classification, lifetime) =
            match (self.technology_classification, self.asset_lifetime) {
                (Some(c), Some(l)) => (c, l),
                (c, l) => {
                    let tech = technologies.require(&self.technology)?;
                    (
                        c.unwrap_or(tech.technology_classification),
                        l.unwrap_or(tech.technology_lifetime),
                    )
                }
            };

        let asset = Asset {
            id: self.id.unwrap_or(id),
            product: self.product.clone(),
            region: self.region.clone(),
            technology: self.technology.clone(),
            annual_production_capacity: self.annual_production_capacity,
            cuf: self.cuf,
            technology_classification: classification,
            year_commissioned: self.year_commissioned,
            asset_lifetime: lifetime,
            retrofit: false,
            rebuild: false,
            greenfield: false,
            year_last_transition: None,
        };
        asset.validate().map_err(SimulationError::InvalidInput)?;
        Ok(asset)
    }
}
