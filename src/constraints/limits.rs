use tracing::warn;

use super::ConstraintKind;
use crate::config::{Co2StorageAccounting, PathwayConfig};
use crate::domain::Year;
use crate::error::{Result, SimulationError};
use crate::inputs::{
    CarbonBudget, MissingDataPolicy, PathwayInputs, RegionalYearCurve, TechnologyRampups,
    YearCurve,
};

/// Limit curves of one run, resolved from the input bundle and the pathway
/// configuration
#[derive(Debug, Clone, Default)]
pub struct ConstraintLimits {
    pub carbon_budget: Option<CarbonBudget>,
    pub rampups: TechnologyRampups,
    pub co2_storage: Option<YearCurve>,
    pub co2_storage_regional: Option<RegionalYearCurve>,
    pub electrolysis_capacity_addition: Option<YearCurve>,
    pub global_demand_share: Option<YearCurve>,
}

impl ConstraintLimits {
    /// Resolve every curve the configured constraint sets need. A supplied
    /// curve takes precedence over one derived from configuration.
    pub fn from_inputs(config: &PathwayConfig, inputs: &PathwayInputs) -> Result<Self> {
        let curves = &inputs.curves;

        let carbon_budget = match (&curves.carbon_budget, &config.carbon_budget) {
            (Some(curve), _) => Some(CarbonBudget::from_curve(curve.clone())),
            (None, Some(pathway)) => Some(CarbonBudget::linear(
                config.start_year,
                config.end_year,
                pathway.emissions_start,
                pathway.emissions_end,
                pathway.action_start,
            )),
            (None, None) => None,
        };

        let rampups = if !curves.technology_rampup.is_empty() {
            TechnologyRampups::from_trajectories(curves.technology_rampup.iter().cloned())
        } else if let Some(rampup) = &config.rampup {
            TechnologyRampups::from_characteristics(
                &inputs.technologies,
                rampup.maximum_asset_additions,
                rampup.maximum_capacity_growth_rate,
                rampup.years_rampup_phase,
            )
        } else {
            TechnologyRampups::default()
        };

        let global_demand_share = curves.global_demand_share.clone().or_else(|| {
            config
                .maximum_global_demand_share
                .map(|share| YearCurve::new((config.start_year..=config.end_year).map(|y| (y, share))))
        });

        let limits = Self {
            carbon_budget,
            rampups,
            co2_storage: curves.co2_storage.clone(),
            co2_storage_regional: curves.co2_storage_regional.clone(),
            electrolysis_capacity_addition: curves.electrolysis_capacity_addition.clone(),
            global_demand_share,
        };
        limits.ensure_complete(config)?;
        Ok(limits)
    }

    /// Every configured constraint kind has the limit it is checked against
    fn ensure_complete(&self, config: &PathwayConfig) -> Result<()> {
        let sets = &config.constraints;
        let configured = sets
            .decommission
            .iter()
            .chain(sets.brownfield.iter())
            .chain(sets.greenfield.iter());

        for kind in configured {
            let missing = match kind {
                ConstraintKind::AnnualCarbonBudget => self.carbon_budget.is_none(),
                ConstraintKind::TechnologyRampup => {
                    if self.rampups.is_empty() {
                        warn!("technology_rampup configured without ramp-up trajectories; every technology is unconstrained");
                    }
                    false
                }
                ConstraintKind::Co2Storage => match config.co2_storage_accounting {
                    Co2StorageAccounting::TotalCumulative => self.co2_storage_regional.is_none(),
                    _ => self.co2_storage.is_none(),
                },
                ConstraintKind::ElectrolysisCapacityAddition => {
                    self.electrolysis_capacity_addition.is_none()
                }
                ConstraintKind::GlobalDemandShare => self.global_demand_share.is_none(),
                ConstraintKind::RegionalDemandShare => config.maximum_regional_demand_share.is_none(),
                ConstraintKind::RegionalProductionShare => config.regional_production_shares.is_empty(),
            };
            if missing {
                return Err(SimulationError::InvalidConfig(format!(
                    "constraint {kind} is configured but has no limit"
                )));
            }
        }
        Ok(())
    }

    pub fn carbon_budget(&self, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        match &self.carbon_budget {
            Some(budget) => budget.limit(year, policy),
            None => policy.resolve(None, "carbon_budget", || year.to_string()),
        }
    }

    pub fn co2_storage(&self, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        curve_value(self.co2_storage.as_ref(), year, "co2_storage", policy)
    }

    pub fn co2_storage_regional(&self, region: &str, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        match &self.co2_storage_regional {
            Some(curve) => curve.value(region, year, "co2_storage", policy),
            None => policy.resolve(None, "co2_storage", || format!("{region}/{year}")),
        }
    }

    pub fn electrolysis_capacity_addition(&self, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        curve_value(
            self.electrolysis_capacity_addition.as_ref(),
            year,
            "electrolysis_capacity_addition",
            policy,
        )
    }

    pub fn global_demand_share(&self, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        curve_value(self.global_demand_share.as_ref(), year, "global_demand_share", policy)
    }
}

fn curve_value(
    curve: Option<&YearCurve>,
    year: Year,
    table: &'static str,
    policy: MissingDataPolicy,
) -> Result<f64> {
    match curve {
        Some(curve) => curve.value(year, table, policy),
        None => policy.resolve(None, table, || year.to_string()),
    }
}
