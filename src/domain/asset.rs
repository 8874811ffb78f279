use serde::{Deserialize, Serialize};

use super::{AssetId, SwitchType, TechnologyClassification, Year};

/// One production unit (plant) of the sector.
///
/// Production volume is never stored: it is always derived from capacity and
/// capacity utilisation factor (CUF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub product: String,
    pub region: String,
    pub technology: String,

    /// Nameplate capacity (Mt product / year)
    pub annual_production_capacity: f64,

    /// Capacity utilisation factor (fraction of nameplate capacity produced)
    pub cuf: f64,

    pub technology_classification: TechnologyClassification,
    pub year_commissioned: Year,

    /// Technical lifetime in years
    pub asset_lifetime: u32,

    #[serde(default)]
    pub retrofit: bool,
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default)]
    pub greenfield: bool,

    /// Year of the last brownfield transition, if any
    #[serde(default)]
    pub year_last_transition: Option<Year>,
}

/// Technology switch applied to an existing asset through [`super::AssetStack::update_asset`]
#[derive(Debug, Clone, PartialEq)]
pub struct AssetUpdate {
    pub new_technology: String,
    pub new_classification: TechnologyClassification,
    pub new_lifetime: u32,
    pub switch_type: SwitchType,
    /// Year in which the switch is enacted
    pub year: Year,
    /// Reset the vintage of the asset to `year`
    pub update_year_commissioned: bool,
}

impl Asset {
    /// Annual production volume (Mt product / year)
    pub fn annual_production_volume(&self) -> f64 {
        self.annual_production_capacity * self.cuf
    }

    /// Age in years at `year`
    pub fn age(&self, year: Year) -> i32 {
        year - self.year_commissioned
    }

    /// Old enough for an investment decision and not switched during the
    /// current investment cycle
    pub fn is_eligible_for_brownfield(&self, year: Year, investment_cycle: i32) -> bool {
        if self.age(year) < investment_cycle {
            return false;
        }
        match self.year_last_transition {
            Some(last) => year - last >= investment_cycle,
            None => true,
        }
    }

    /// Set the CUF, bounded to `[lower, upper]`
    pub fn set_cuf_bounded(&mut self, cuf: f64, lower: f64, upper: f64) {
        self.cuf = cuf.clamp(lower, upper);
    }

    pub(crate) fn apply_update(&mut self, update: &AssetUpdate) {
        self.technology = update.new_technology.clone();
        self.technology_classification = update.new_classification;
        self.asset_lifetime = update.new_lifetime;
        self.year_last_transition = Some(update.year);

        match update.switch_type {
            SwitchType::BrownfieldRenovation => self.retrofit = true,
            SwitchType::BrownfieldNewbuild => self.rebuild = true,
            _ => {}
        }

        if update.update_year_commissioned {
            self.year_commissioned = update.year;
        }
    }

    /// Validate physical plausibility of the asset data
    pub fn validate(&self) -> Result<(), String> {
        if !self.annual_production_capacity.is_finite() || self.annual_production_capacity <= 0.0 {
            return Err(format!(
                "asset {}: annual_production_capacity must be positive, got {}",
                self.id, self.annual_production_capacity
            ));
        }
        if !self.cuf.is_finite() || !(0.0..=1.0).contains(&self.cuf) {
            return Err(format!(
                "asset {}: cuf must be between 0 and 1, got {}",
                self.id, self.cuf
            ));
        }
        if self.product.is_empty() || self.region.is_empty() || self.technology.is_empty() {
            return Err(format!(
                "asset {}: product, region and technology must be set",
                self.id
            ));
        }
        Ok(())
    }
}
