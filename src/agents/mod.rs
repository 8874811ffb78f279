//! # Transition Agents
//!
//! The three per-year decision procedures, run in this order on the
//! next-year stack:
//!
//! - **Decommission**: retires under-utilised assets while supply exceeds demand
//! - **Brownfield**: renovates or rebuilds old assets into better-ranked technologies
//! - **Greenfield**: builds new assets until next year's demand is met
//!
//! Each agent walks a disposable copy of its ranking best-first, checks the
//! configured constraints on a tentative stack before committing, and applies
//! the remediation of any failed check to its ranking. Committed transitions
//! are appended to a per-year buffer that the pathway commits only when the
//! whole year succeeds.

pub mod brownfield;
pub mod decommission;
pub mod greenfield;

pub use brownfield::run_brownfield;
pub use decommission::run_decommission;
pub use greenfield::run_greenfield;

use crate::config::PathwayConfig;
use crate::constraints::{ConstraintChecker, ConstraintLimits, ConstraintMap, Remediation};
use crate::domain::{AssetStack, TransitionType, Year};
use crate::error::Result;
use crate::inputs::{MissingDataPolicy, PathwayInputs, RankingRow, RankingTable};

/// Tolerance on production volumes
pub(crate) const EPSILON: f64 = 1e-9;

/// Read-only state shared by the agents of one simulated year
pub struct AgentContext<'a> {
    pub year: Year,
    pub config: &'a PathwayConfig,
    pub inputs: &'a PathwayInputs,
    pub checker: ConstraintChecker<'a>,
}

impl<'a> AgentContext<'a> {
    pub fn new(
        year: Year,
        config: &'a PathwayConfig,
        inputs: &'a PathwayInputs,
        limits: &'a ConstraintLimits,
    ) -> Self {
        Self {
            year,
            config,
            inputs,
            checker: ConstraintChecker::new(config, limits, &inputs.demand, &inputs.emissions),
        }
    }

    pub fn policy(&self) -> MissingDataPolicy {
        self.config.missing_data
    }

    /// Check the constraints that apply to a transition towards `destination`.
    /// `None` when nothing is configured.
    pub(crate) fn check(
        &self,
        current: &AssetStack,
        tentative: impl FnOnce() -> Result<AssetStack>,
        transition_type: TransitionType,
        destination: Option<&str>,
    ) -> Result<Option<ConstraintMap>> {
        let kinds = self
            .checker
            .applicable_constraints(transition_type, destination, self.year);
        if kinds.is_empty() {
            return Ok(None);
        }
        let tentative = tentative()?;
        self.checker
            .check(current, &tentative, self.year, transition_type, &kinds)
            .map(Some)
    }

    /// Apply the remediation of every failed check, returning the number of
    /// ranking rows removed
    pub(crate) fn apply_remediation(
        &self,
        table: &mut RankingTable,
        row: &RankingRow,
        results: &ConstraintMap,
    ) -> usize {
        let destination = row.technology_destination.as_str();
        results
            .failures()
            .filter_map(|result| result.remediation.as_ref())
            .map(|remediation| match remediation {
                Remediation::StrikeDestination => table.strike_destination(destination),
                Remediation::StrikeDestinationInRegion(region) => {
                    table.strike_destination_in_region(destination, region)
                }
                Remediation::StrikeRegion(region) => table.strike_region(region),
                Remediation::StrikeResidualEmitters => {
                    let emissions = &self.inputs.emissions;
                    let year = self.year;
                    table.retain(|r| {
                        !emissions.has_residual_emissions(
                            &r.product,
                            &r.region,
                            &r.technology_destination,
                            year,
                        )
                    })
                }
            })
            .sum()
    }
}
