use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum::{Display, EnumString};
use validator::Validate;

use crate::constraints::ConstraintKind;
use crate::domain::{SwitchType, TransitionType, Year};
use crate::error::SimulationError;
use crate::inputs::MissingDataPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub runner: RunnerConfig,
    /// JSON input bundle shared by all configured pathways
    pub inputs_path: PathBuf,
    #[serde(default)]
    pub pathways: Vec<PathwayConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig { pub root: PathBuf, #[serde(default = "default_true")] pub export_stacks: bool }

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig { pub max_parallel_runs: usize }

fn default_true() -> bool { true }

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("PATHWAY__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        for pathway in config.pathways.iter() {
            pathway.check()?;
        }
        Ok(config)
    }
}

/// How CO2 storage use is compared against the storage curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Co2StorageAccounting {
    /// Captured CO2 added this year against limit(Y+1)
    #[default]
    AnnualAddition,
    /// Total captured CO2 of the tentative stack against limit(Y)
    AnnualCumulative,
    /// Captured CO2 per region against a regional curve
    TotalCumulative,
}

/// Which CUF collaborator runs at the start of each year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CufAdjustmentMode {
    #[default]
    DemandMatched,
    Fixed,
}

/// Constraint kinds enforced per transition type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSets {
    pub decommission: Vec<ConstraintKind>,
    pub brownfield: Vec<ConstraintKind>,
    pub greenfield: Vec<ConstraintKind>,
}

impl ConstraintSets {
    pub fn for_type(&self, transition_type: TransitionType) -> &[ConstraintKind] {
        match transition_type {
            TransitionType::Decommission => &self.decommission,
            TransitionType::Brownfield => &self.brownfield,
            TransitionType::Greenfield => &self.greenfield,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BrownfieldConfig {
    /// Minimum relative decrease of the cost metric for a switch to qualify
    #[validate(range(min = 0.0))]
    pub cost_metric_decrease: Option<f64>,
    pub renovation_start_year: Option<Year>,
    pub rebuild_start_year: Option<Year>,
    /// Destination technologies banned per region
    pub regional_technology_bans: BTreeMap<String, Vec<String>>,
    /// Switch types that reset the vintage of the asset
    pub switch_types_update_year_commissioned: Vec<SwitchType>,
}

impl Default for BrownfieldConfig {
    fn default() -> Self {
        Self {
            cost_metric_decrease: None,
            renovation_start_year: None,
            rebuild_start_year: None,
            regional_technology_bans: BTreeMap::new(),
            switch_types_update_year_commissioned: vec![SwitchType::BrownfieldNewbuild],
        }
    }
}

impl BrownfieldConfig {
    pub fn start_year(&self, switch_type: SwitchType) -> Option<Year> {
        match switch_type {
            SwitchType::BrownfieldRenovation => self.renovation_start_year,
            SwitchType::BrownfieldNewbuild => self.rebuild_start_year,
            _ => None,
        }
    }

    pub fn is_banned(&self, region: &str, technology: &str) -> bool {
        self.regional_technology_bans
            .get(region)
            .is_some_and(|banned| banned.iter().any(|t| t == technology))
    }
}

/// Parameters of the technology ramp-up trajectories
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RampupConfig {
    pub maximum_asset_additions: u32,
    #[validate(range(min = 0.0))]
    pub maximum_capacity_growth_rate: f64,
    #[validate(range(min = 0))]
    pub years_rampup_phase: i32,
}

/// Linear sectoral carbon pathway (Gt CO2 / year)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CarbonPathwayConfig {
    #[validate(range(min = 0.0))]
    pub emissions_start: f64,
    #[validate(range(min = 0.0))]
    pub emissions_end: f64,
    pub action_start: Year,
}

/// Parameters of one (sector, pathway, sensitivity) run. Immutable once the
/// run starts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PathwayConfig {
    #[validate(length(min = 1))]
    pub sector: String,
    #[validate(length(min = 1))]
    pub pathway_name: String,
    #[validate(length(min = 1))]
    pub sensitivity: String,
    pub start_year: Year,
    pub end_year: Year,
    #[validate(length(min = 1))]
    pub products: Vec<String>,
    /// Capacity of a new standard asset per product (Mt / year)
    pub assumed_annual_production_capacity: BTreeMap<String, f64>,

    #[validate(range(min = 0.0, max = 1.0))]
    pub standard_cuf: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub cuf_lower_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub cuf_upper_threshold: f64,
    pub cuf_adjustment: CufAdjustmentMode,

    #[validate(range(min = 0))]
    pub investment_cycle: i32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub annual_renovation_share: f64,

    pub constraints: ConstraintSets,
    /// From this year on, greenfield additions are checked against the
    /// end-year carbon budget
    pub terminal_emissions_year: Option<Year>,
    pub co2_storage_accounting: Co2StorageAccounting,
    pub electrolysis_technologies: Vec<String>,
    pub technologies_maximum_global_demand_share: Vec<String>,
    /// Constant share used when no global demand share curve is supplied
    #[validate(range(min = 0.0, max = 1.0))]
    pub maximum_global_demand_share: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub maximum_regional_demand_share: Option<f64>,
    /// Regional supply cap on greenfield additions
    #[validate(range(min = 0.0, max = 1.0))]
    pub maximum_global_demand_share_one_region: Option<f64>,
    /// Minimum share of regional demand produced in the region
    pub regional_production_shares: BTreeMap<String, f64>,

    #[validate(nested)]
    pub brownfield: BrownfieldConfig,
    pub rampup: Option<RampupConfig>,
    pub carbon_budget: Option<CarbonPathwayConfig>,

    pub missing_data: MissingDataPolicy,
    /// Seed of the brownfield tie-break and of generated asset ids
    pub seed: u64,
}

impl Default for PathwayConfig {
    fn default() -> Self {
        Self {
            sector: "ammonia".to_string(),
            pathway_name: "bau".to_string(),
            sensitivity: "def".to_string(),
            start_year: 2020,
            end_year: 2050,
            products: Vec::new(),
            assumed_annual_production_capacity: BTreeMap::new(),
            standard_cuf: 0.95,
            cuf_lower_threshold: 0.5,
            cuf_upper_threshold: 0.95,
            cuf_adjustment: CufAdjustmentMode::default(),
            investment_cycle: 20,
            annual_renovation_share: 0.5,
            constraints: ConstraintSets::default(),
            terminal_emissions_year: None,
            co2_storage_accounting: Co2StorageAccounting::default(),
            electrolysis_technologies: Vec::new(),
            technologies_maximum_global_demand_share: Vec::new(),
            maximum_global_demand_share: None,
            maximum_regional_demand_share: None,
            maximum_global_demand_share_one_region: None,
            regional_production_shares: BTreeMap::new(),
            brownfield: BrownfieldConfig::default(),
            rampup: None,
            carbon_budget: None,
            missing_data: MissingDataPolicy::default(),
            seed: 42,
        }
    }
}

impl PathwayConfig {
    /// Field ranges plus cross-field consistency
    pub fn check(&self) -> Result<(), SimulationError> {
        self.validate()?;
        if let Some(rampup) = &self.rampup {
            rampup.validate()?;
        }
        if let Some(budget) = &self.carbon_budget {
            budget.validate()?;
        }

        if self.start_year >= self.end_year {
            return Err(SimulationError::InvalidConfig(format!(
                "start_year {} must be before end_year {}",
                self.start_year, self.end_year
            )));
        }
        if self.cuf_lower_threshold > self.cuf_upper_threshold {
            return Err(SimulationError::InvalidConfig(format!(
                "cuf_lower_threshold {} exceeds cuf_upper_threshold {}",
                self.cuf_lower_threshold, self.cuf_upper_threshold
            )));
        }
        for product in self.products.iter() {
            match self.assumed_annual_production_capacity.get(product) {
                Some(capacity) if capacity.is_finite() && *capacity > 0.0 => {}
                _ => {
                    return Err(SimulationError::InvalidConfig(format!(
                        "assumed_annual_production_capacity for {product} must be positive"
                    )))
                }
            }
        }
        if let Some((region, share)) = self
            .regional_production_shares
            .iter()
            .find(|(_, s)| !(0.0..=1.0).contains(*s))
        {
            return Err(SimulationError::InvalidConfig(format!(
                "regional production share for {region} must be within [0, 1], got {share}"
            )));
        }
        Ok(())
    }

    /// Standard asset capacity of a product
    pub fn assumed_capacity(&self, product: &str) -> Result<f64, SimulationError> {
        self.assumed_annual_production_capacity
            .get(product)
            .copied()
            .ok_or_else(|| SimulationError::InvalidConfig(format!(
                "no assumed_annual_production_capacity for {product}"
            )))
    }

    /// Standard CUF of new assets, within the CUF bounds
    pub fn bounded_standard_cuf(&self) -> f64 {
        self.standard_cuf
            .clamp(self.cuf_lower_threshold, self.cuf_upper_threshold)
    }

    pub fn years(&self) -> std::ops::Range<Year> {
        self.start_year..self.end_year
    }
}
