//! Per-year limit curves consumed by the constraint checker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{MissingDataPolicy, TechnologyTable};
use crate::domain::{TechnologyClassification, Year};
use crate::error::Result;

/// Value per year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearCurve(BTreeMap<Year, f64>);

impl YearCurve {
    pub fn new(points: impl IntoIterator<Item = (Year, f64)>) -> Self {
        Self(points.into_iter().collect())
    }

    pub fn get(&self, year: Year) -> Option<f64> {
        self.0.get(&year).copied()
    }

    pub fn value(&self, year: Year, table: &'static str, policy: MissingDataPolicy) -> Result<f64> {
        policy.resolve(self.get(year), table, || year.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Year, f64)> + '_ {
        self.0.iter().map(|(y, v)| (*y, *v))
    }
}

/// Value per region and year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionalYearCurve(BTreeMap<String, YearCurve>);

impl RegionalYearCurve {
    pub fn new(curves: impl IntoIterator<Item = (String, YearCurve)>) -> Self {
        Self(curves.into_iter().collect())
    }

    pub fn get(&self, region: &str, year: Year) -> Option<f64> {
        self.0.get(region).and_then(|c| c.get(year))
    }

    pub fn value(
        &self,
        region: &str,
        year: Year,
        table: &'static str,
        policy: MissingDataPolicy,
    ) -> Result<f64> {
        policy.resolve(self.get(region, year), table, || format!("{region}/{year}"))
    }
}

/// Annual scope 1+2 CO2 limit of the sector (Gt CO2 / year)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarbonBudget {
    curve: YearCurve,
}

impl CarbonBudget {
    pub fn from_curve(curve: YearCurve) -> Self {
        Self { curve }
    }

    /// Flat at `emissions_start` until `action_start`, then a straight line
    /// down to `emissions_end` in `end_year`
    pub fn linear(
        start_year: Year,
        end_year: Year,
        emissions_start: f64,
        emissions_end: f64,
        action_start: Year,
    ) -> Self {
        let span = (end_year - action_start).max(1) as f64;
        let curve = (start_year..=end_year).map(|year| {
            let value = if year <= action_start {
                emissions_start
            } else {
                emissions_start + (emissions_end - emissions_start) * (year - action_start) as f64 / span
            };
            (year, value)
        });
        Self {
            curve: YearCurve::new(curve),
        }
    }

    pub fn limit(&self, year: Year, policy: MissingDataPolicy) -> Result<f64> {
        self.curve.value(year, "carbon_budget", policy)
    }

    pub fn curve(&self) -> &YearCurve {
        &self.curve
    }
}

/// Maximum number of new assets of one technology per year during its ramp-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyRampup {
    pub technology: String,
    pub start_year: Year,
    pub end_year: Year,
    pub maximum_asset_additions: BTreeMap<Year, u32>,
}

impl TechnologyRampup {
    /// Build the trajectory from a constant number of additions and a
    /// compound growth rate of the cumulative asset count, whichever is
    /// larger in each year
    pub fn new(
        technology: impl Into<String>,
        start_year: Year,
        end_year: Year,
        maximum_asset_additions: u32,
        maximum_capacity_growth_rate: f64,
    ) -> Self {
        let additions = f64::from(maximum_asset_additions);
        let mut trajectory = BTreeMap::new();

        let mut discrete = additions;
        let mut number = additions;
        let mut previous_floor = 0.0;
        for year in start_year..=end_year {
            if year > start_year {
                discrete += additions;
                let growth = number * (1.0 + maximum_capacity_growth_rate);
                number = discrete.max(growth);
            }
            let floor = number.floor();
            trajectory.insert(year, (floor - previous_floor).max(0.0) as u32);
            previous_floor = floor;
        }

        Self {
            technology: technology.into(),
            start_year,
            end_year,
            maximum_asset_additions: trajectory,
        }
    }

    /// `None` once the ramp-up phase is over (unconstrained)
    pub fn limit(&self, year: Year) -> Option<u32> {
        if year < self.start_year {
            Some(0)
        } else if year > self.end_year {
            None
        } else {
            Some(self.maximum_asset_additions.get(&year).copied().unwrap_or(0))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TechnologyRampups {
    by_technology: BTreeMap<String, TechnologyRampup>,
}

impl TechnologyRampups {
    pub fn from_trajectories(trajectories: impl IntoIterator<Item = TechnologyRampup>) -> Self {
        Self {
            by_technology: trajectories
                .into_iter()
                .map(|t| (t.technology.clone(), t))
                .collect(),
        }
    }

    /// Trajectories for every transition and end-state technology, starting
    /// at its expected maturity
    pub fn from_characteristics(
        technologies: &TechnologyTable,
        maximum_asset_additions: u32,
        maximum_capacity_growth_rate: f64,
        years_rampup_phase: i32,
    ) -> Self {
        Self::from_trajectories(
            technologies
                .iter()
                .filter(|t| t.technology_classification != TechnologyClassification::Initial)
                .map(|t| {
                    TechnologyRampup::new(
                        t.technology.clone(),
                        t.expected_maturity,
                        t.expected_maturity + years_rampup_phase,
                        maximum_asset_additions,
                        maximum_capacity_growth_rate,
                    )
                }),
        )
    }

    /// Maximum additions of `technology` in `year`. `None` means unconstrained.
    pub fn limit(&self, technology: &str, year: Year) -> Option<u32> {
        self.by_technology.get(technology).and_then(|t| t.limit(year))
    }

    pub fn is_empty(&self) -> bool {
        self.by_technology.is_empty()
    }
}

/// Curves as delivered in the input bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurveInputs {
    #[serde(default)]
    pub carbon_budget: Option<YearCurve>,
    /// Mt CO2, global
    #[serde(default)]
    pub co2_storage: Option<YearCurve>,
    /// Mt CO2 per region, for total cumulative accounting
    #[serde(default)]
    pub co2_storage_regional: Option<RegionalYearCurve>,
    /// Mt capacity added per year
    #[serde(default)]
    pub electrolysis_capacity_addition: Option<YearCurve>,
    #[serde(default)]
    pub global_demand_share: Option<YearCurve>,
    #[serde(default)]
    pub technology_rampup: Vec<TechnologyRampup>,
}
