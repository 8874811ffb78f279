//! Evaluation of the configured constraints on a tentative stack.
//!
//! Every check compares the current stack (year Y) with a tentative stack
//! (hypothetical year Y+1) and is side-effect free.

use std::collections::BTreeMap;
use tracing::debug;

use super::{ConstraintKind, ConstraintLimits, ConstraintMap, ConstraintResult, Remediation};
use crate::config::{Co2StorageAccounting, PathwayConfig};
use crate::domain::{AssetStack, TechnologyClassification, TransitionType, Year};
use crate::error::Result;
use crate::inputs::{DemandTable, EmissionsTable, CO2_SCOPE1, CO2_SCOPE2};

/// Tolerance for comparing production volumes and capacities
const EPSILON: f64 = 1e-9;

/// Mt to Gt
const MT_PER_GT: f64 = 1e3;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct ConstraintChecker<'a> {
    config: &'a PathwayConfig,
    limits: &'a ConstraintLimits,
    demand: &'a DemandTable,
    emissions: &'a EmissionsTable,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(
        config: &'a PathwayConfig,
        limits: &'a ConstraintLimits,
        demand: &'a DemandTable,
        emissions: &'a EmissionsTable,
    ) -> Self {
        Self {
            config,
            limits,
            demand,
            emissions,
        }
    }

    /// Configured constraints of a transition type that are relevant for a
    /// destination technology
    pub fn applicable_constraints(
        &self,
        transition_type: TransitionType,
        destination: Option<&str>,
        year: Year,
    ) -> Vec<ConstraintKind> {
        self.config
            .constraints
            .for_type(transition_type)
            .iter()
            .copied()
            .filter(|kind| match (kind, destination) {
                (ConstraintKind::Co2Storage, Some(technology)) => {
                    self.emissions.captures_co2(technology, year)
                }
                (ConstraintKind::ElectrolysisCapacityAddition, Some(technology)) => self
                    .config
                    .electrolysis_technologies
                    .iter()
                    .any(|t| t == technology),
                _ => true,
            })
            .collect()
    }

    pub fn check(
        &self,
        current: &AssetStack,
        tentative: &AssetStack,
        year: Year,
        transition_type: TransitionType,
        kinds: &[ConstraintKind],
    ) -> Result<ConstraintMap> {
        let mut results = ConstraintMap::default();
        for kind in kinds {
            let result = match kind {
                ConstraintKind::AnnualCarbonBudget => {
                    self.check_carbon_budget(tentative, year, transition_type)?
                }
                ConstraintKind::TechnologyRampup => self.check_rampup(current, tentative, year),
                ConstraintKind::Co2Storage => self.check_co2_storage(current, tentative, year)?,
                ConstraintKind::ElectrolysisCapacityAddition => {
                    self.check_electrolysis_capacity(current, tentative, year)?
                }
                ConstraintKind::RegionalDemandShare => {
                    self.check_regional_demand_share(current, tentative, year)?
                }
                ConstraintKind::GlobalDemandShare => {
                    self.check_global_demand_share(current, tentative, year)?
                }
                ConstraintKind::RegionalProductionShare => {
                    self.check_regional_production_share(current, tentative, year)?
                }
            };
            if !result.passed {
                debug!(year, constraint = %kind, detail = %result.detail, "constraint failed");
            }
            results.insert(result);
        }
        Ok(results)
    }

    fn is_terminal(&self, year: Year, transition_type: TransitionType) -> bool {
        transition_type == TransitionType::Greenfield
            && self.config.terminal_emissions_year.is_some_and(|t| year >= t)
    }

    fn check_carbon_budget(
        &self,
        tentative: &AssetStack,
        year: Year,
        transition_type: TransitionType,
    ) -> Result<ConstraintResult> {
        let kind = ConstraintKind::AnnualCarbonBudget;
        let policy = self.config.missing_data;
        let terminal = self.is_terminal(year, transition_type);

        let (classification, budget_year) = if terminal {
            (Some(TechnologyClassification::EndState), self.config.end_year)
        } else {
            (None, year)
        };
        let totals =
            tentative.calculate_emissions_stack(year, self.emissions, classification, policy)?;
        let emissions = (totals.get(CO2_SCOPE1).copied().unwrap_or(0.0)
            + totals.get(CO2_SCOPE2).copied().unwrap_or(0.0))
            / MT_PER_GT;
        let limit = self.limits.carbon_budget(budget_year, policy)?;

        if round2(emissions) <= round2(limit) {
            let result = ConstraintResult::pass(kind);
            return Ok(if terminal { result.residual() } else { result });
        }

        let detail = format!("{emissions:.3} Gt CO2 exceeds the {budget_year} budget of {limit:.3} Gt");
        Ok(if terminal {
            ConstraintResult::fail(kind, Remediation::StrikeResidualEmitters, detail).residual()
        } else {
            ConstraintResult::fail(kind, Remediation::StrikeDestination, detail)
        })
    }

    fn check_rampup(&self, current: &AssetStack, tentative: &AssetStack, year: Year) -> ConstraintResult {
        let kind = ConstraintKind::TechnologyRampup;
        let before = current.count_by_technology();
        let after = tentative.count_by_technology();

        let exceeded: Vec<String> = after
            .iter()
            .filter_map(|(technology, count)| {
                let added = *count as i64 - before.get(technology).copied().unwrap_or(0) as i64;
                let limit = self.limits.rampups.limit(technology, year)?;
                (added > i64::from(limit)).then(|| format!("{technology} +{added} > {limit}"))
            })
            .collect();

        if exceeded.is_empty() {
            ConstraintResult::pass(kind)
        } else {
            ConstraintResult::fail(kind, Remediation::StrikeDestination, exceeded.join("; "))
        }
    }

    fn check_co2_storage(
        &self,
        current: &AssetStack,
        tentative: &AssetStack,
        year: Year,
    ) -> Result<ConstraintResult> {
        let kind = ConstraintKind::Co2Storage;
        let policy = self.config.missing_data;

        match self.config.co2_storage_accounting {
            Co2StorageAccounting::AnnualAddition => {
                let added = tentative.calculate_co2_captured_stack(year, self.emissions, policy)?
                    - current.calculate_co2_captured_stack(year, self.emissions, policy)?;
                let limit = self.limits.co2_storage(year + 1, policy)?;
                Ok(if added <= limit + EPSILON {
                    ConstraintResult::pass(kind)
                } else {
                    ConstraintResult::fail(
                        kind,
                        Remediation::StrikeDestination,
                        format!("{added:.3} Mt CO2 added to storage exceeds {limit:.3} Mt"),
                    )
                })
            }
            Co2StorageAccounting::AnnualCumulative => {
                let captured = tentative.calculate_co2_captured_stack(year, self.emissions, policy)?;
                let limit = self.limits.co2_storage(year, policy)?;
                Ok(if captured <= limit + EPSILON {
                    ConstraintResult::pass(kind)
                } else {
                    ConstraintResult::fail(
                        kind,
                        Remediation::StrikeDestination,
                        format!("{captured:.3} Mt CO2 captured exceeds {limit:.3} Mt"),
                    )
                })
            }
            Co2StorageAccounting::TotalCumulative => {
                let before = current.co2_captured_by_region(year, self.emissions, policy)?;
                let after = tentative.co2_captured_by_region(year, self.emissions, policy)?;
                for (region, captured) in after.iter() {
                    let previous = before.get(region).copied().unwrap_or(0.0);
                    if *captured <= previous + EPSILON {
                        continue;
                    }
                    let limit = self.limits.co2_storage_regional(region, year, policy)?;
                    if *captured > limit + EPSILON {
                        return Ok(ConstraintResult::fail(
                            kind,
                            Remediation::StrikeDestinationInRegion(region.clone()),
                            format!("{captured:.3} Mt CO2 captured in {region} exceeds {limit:.3} Mt"),
                        ));
                    }
                }
                Ok(ConstraintResult::pass(kind))
            }
        }
    }

    fn check_electrolysis_capacity(
        &self,
        current: &AssetStack,
        tentative: &AssetStack,
        year: Year,
    ) -> Result<ConstraintResult> {
        let kind = ConstraintKind::ElectrolysisCapacityAddition;
        let technologies = &self.config.electrolysis_technologies;
        let added = tentative.capacity_of_technologies(technologies)
            - current.capacity_of_technologies(technologies);
        let limit = self
            .limits
            .electrolysis_capacity_addition(year, self.config.missing_data)?;

        Ok(if added <= limit + EPSILON {
            ConstraintResult::pass(kind)
        } else {
            ConstraintResult::fail(
                kind,
                Remediation::StrikeDestination,
                format!("{added:.3} Mt electrolysis capacity added exceeds {limit:.3} Mt"),
            )
        })
    }

    fn check_regional_demand_share(
        &self,
        current: &AssetStack,
        tentative: &AssetStack,
        year: Year,
    ) -> Result<ConstraintResult> {
        let kind = ConstraintKind::RegionalDemandShare;
        let policy = self.config.missing_data;
        let share = self.config.maximum_regional_demand_share.unwrap_or(1.0);

        for product in self.config.products.iter() {
            let global = self.demand.global_demand(product, year + 1, policy)?;
            let before = current.get_regional_production_volume(product);
            for (region, production) in tentative.get_regional_production_volume(product) {
                let previous = before.get(&region).copied().unwrap_or(0.0);
                if production > share * global + EPSILON && production > previous + EPSILON {
                    return Ok(ConstraintResult::fail(
                        kind,
                        Remediation::StrikeRegion(region.clone()),
                        format!(
                            "{region} would supply {production:.3} Mt of {product}, above {share} of global demand {global:.3} Mt"
                        ),
                    ));
                }
            }
        }
        Ok(ConstraintResult::pass(kind))
    }

    fn check_global_demand_share(
        &self,
        current: &AssetStack,
        tentative: &AssetStack,
        year: Year,
    ) -> Result<ConstraintResult> {
        let kind = ConstraintKind::GlobalDemandShare;
        let policy = self.config.missing_data;
        let technologies = &self.config.technologies_maximum_global_demand_share;
        if technologies.is_empty() {
            return Ok(ConstraintResult::pass(kind));
        }
        let share = self.limits.global_demand_share(year, policy)?;

        for product in self.config.products.iter() {
            let volume = tentative.volume_of_technologies(product, technologies);
            let previous = current.volume_of_technologies(product, technologies);
            if volume <= previous + EPSILON {
                continue;
            }
            let limit = share * self.demand.global_demand(product, year + 1, policy)?;
            if volume > limit + EPSILON {
                return Ok(ConstraintResult::fail(
                    kind,
                    Remediation::StrikeDestination,
                    format!("{volume:.3} Mt of {product} from capped technologies exceeds {limit:.3} Mt"),
                ));
            }
        }
        Ok(ConstraintResult::pass(kind))
    }

    fn check_regional_production_share(
        &self,
        current: &AssetStack,
        tentative: &AssetStack,
        year: Year,
    ) -> Result<ConstraintResult> {
        let kind = ConstraintKind::RegionalProductionShare;
        let policy = self.config.missing_data;

        for product in self.config.products.iter() {
            let before = current.get_regional_production_volume(product);
            let after = tentative.get_regional_production_volume(product);
            for (region, share) in self.config.regional_production_shares.iter() {
                let production = after.get(region).copied().unwrap_or(0.0);
                let previous = before.get(region).copied().unwrap_or(0.0);
                if production + EPSILON >= previous {
                    continue;
                }
                let required = share * self.demand.demand(product, region, year + 1, policy)?;
                if round2(production) < round2(required) {
                    return Ok(ConstraintResult::fail(
                        kind,
                        Remediation::StrikeDestinationInRegion(region.clone()),
                        format!(
                            "{region} would produce {production:.3} Mt of {product}, below {required:.3} Mt"
                        ),
                    ));
                }
            }
        }
        Ok(ConstraintResult::pass(kind))
    }
}

/// Regional greenfield additions still allowed under the supply cap
pub fn regional_supply_headroom(
    share: f64,
    greenfield_total: usize,
    required_additions: usize,
    regional_greenfield: &BTreeMap<String, usize>,
    region: &str,
) -> i64 {
    let cap = (share * (greenfield_total + required_additions) as f64).ceil() as i64;
    cap - regional_greenfield.get(region).copied().unwrap_or(0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathwayConfig;
    use crate::domain::{Asset, TechnologyClassification};
    use crate::inputs::{EmissionsRow, RegionalYearCurve, TechnologyRampup, TechnologyRampups, YearCurve};
    use crate::test_support::{asset, demand, pathway_config};
    use rstest::rstest;

    struct Fixture {
        config: PathwayConfig,
        limits: ConstraintLimits,
        demand: DemandTable,
        emissions: EmissionsTable,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = pathway_config();
            config.electrolysis_technologies = vec!["Electrolyser".to_string()];
            config.technologies_maximum_global_demand_share = vec!["Biomass".to_string()];
            config.maximum_regional_demand_share = Some(0.5);
            config.regional_production_shares =
                std::collections::BTreeMap::from([("Europe".to_string(), 0.4)]);

            let mut emission_rows = Vec::new();
            for region in ["Europe", "China"] {
                emission_rows.push(
                    EmissionsRow::new("Ammonia", region, "SMR", 2020).factor(CO2_SCOPE1, 2000.0),
                );
                emission_rows.push(
                    EmissionsRow::new("Ammonia", region, "SMR + CCS", 2020)
                        .factor(CO2_SCOPE1, 200.0)
                        .captured(2.0),
                );
                emission_rows.push(EmissionsRow::new("Ammonia", region, "Electrolyser", 2020));
                emission_rows.push(EmissionsRow::new("Ammonia", region, "Biomass", 2020));
            }

            Self {
                config,
                limits: ConstraintLimits {
                    carbon_budget: Some(crate::inputs::CarbonBudget::from_curve(YearCurve::new([
                        (2020, 4.0),
                        (2025, 0.5),
                    ]))),
                    rampups: TechnologyRampups::from_trajectories([TechnologyRampup::new(
                        "Electrolyser",
                        2020,
                        2024,
                        1,
                        0.0,
                    )]),
                    co2_storage: Some(YearCurve::new([(2020, 3.0), (2021, 1.0)])),
                    co2_storage_regional: Some(RegionalYearCurve::new([(
                        "Europe".to_string(),
                        YearCurve::new([(2020, 3.0)]),
                    )])),
                    electrolysis_capacity_addition: Some(YearCurve::new([(2020, 1.5)])),
                    global_demand_share: Some(YearCurve::new([(2020, 0.1)])),
                },
                demand: DemandTable::from_rows(vec![
                    demand("Ammonia", "Europe", 2021, 4.0),
                    demand("Ammonia", "China", 2021, 6.0),
                ])
                .unwrap(),
                emissions: EmissionsTable::from_rows(emission_rows).unwrap(),
            }
        }

        fn checker(&self) -> ConstraintChecker<'_> {
            ConstraintChecker::new(&self.config, &self.limits, &self.demand, &self.emissions)
        }
    }

    fn end_state(region: &str, technology: &str) -> Asset {
        let mut a = asset("Ammonia", region, technology, 1.0, 1.0, 2020);
        a.technology_classification = TechnologyClassification::EndState;
        a
    }

    fn current() -> AssetStack {
        AssetStack::new(
            2020,
            vec![
                asset("Ammonia", "Europe", "SMR", 1.0, 1.0, 1990),
                asset("Ammonia", "China", "SMR", 1.0, 1.0, 1990),
            ],
        )
        .unwrap()
    }

    fn with_added(base: &AssetStack, added: Vec<Asset>) -> AssetStack {
        let mut next = base.successor();
        for a in added {
            next.append(a).unwrap();
        }
        next
    }

    fn check_one(fixture: &Fixture, tentative: &AssetStack, kind: ConstraintKind) -> ConstraintResult {
        fixture
            .checker()
            .check(&current(), tentative, 2020, TransitionType::Greenfield, &[kind])
            .unwrap()
            .get(kind)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_carbon_budget_rounds_to_two_decimals() {
        let fixture = Fixture::new();
        // 2 SMR assets at 2000 t/t → 4.0 Gt, equal to the budget
        let result = check_one(&fixture, &current().successor(), ConstraintKind::AnnualCarbonBudget);
        assert!(result.passed);

        let tentative = with_added(&current(), vec![asset("Ammonia", "Europe", "SMR", 1.0, 1.0, 2020)]);
        let result = check_one(&fixture, &tentative, ConstraintKind::AnnualCarbonBudget);
        assert!(!result.passed);
        assert!(!result.residual);
        assert_eq!(result.remediation, Some(Remediation::StrikeDestination));
    }

    #[test]
    fn test_terminal_year_checks_end_state_subtotal() {
        let mut fixture = Fixture::new();
        fixture.config.terminal_emissions_year = Some(2020);

        let tentative = with_added(&current(), vec![end_state("Europe", "SMR + CCS")]);
        let result = check_one(&fixture, &tentative, ConstraintKind::AnnualCarbonBudget);
        assert!(result.residual);
        // 0.2 Gt end-state emissions against the 2025 budget of 0.5 Gt
        assert!(result.passed);

        let tentative = with_added(
            &current(),
            vec![
                end_state("Europe", "SMR + CCS"),
                end_state("Europe", "SMR + CCS"),
                end_state("China", "SMR + CCS"),
            ],
        );
        let result = check_one(&fixture, &tentative, ConstraintKind::AnnualCarbonBudget);
        assert!(!result.passed);
        assert_eq!(result.remediation, Some(Remediation::StrikeResidualEmitters));

        // Brownfield is never held to the terminal budget
        let map = fixture
            .checker()
            .check(&current(), &tentative, 2020, TransitionType::Brownfield, &[ConstraintKind::AnnualCarbonBudget])
            .unwrap();
        assert!(!map.get(ConstraintKind::AnnualCarbonBudget).unwrap().residual);
    }

    #[rstest]
    #[case(1, true)]
    #[case(2, false)]
    fn test_rampup(#[case] additions: usize, #[case] passed: bool) {
        let fixture = Fixture::new();
        let added = (0..additions).map(|_| end_state("Europe", "Electrolyser")).collect();
        let tentative = with_added(&current(), added);
        assert_eq!(check_one(&fixture, &tentative, ConstraintKind::TechnologyRampup).passed, passed);
    }

    #[test]
    fn test_co2_storage_accounting_modes() {
        let mut fixture = Fixture::new();
        let tentative = with_added(&current(), vec![end_state("Europe", "SMR + CCS")]);

        // 2 Mt added against limit(2021) = 1 Mt
        fixture.config.co2_storage_accounting = Co2StorageAccounting::AnnualAddition;
        let result = check_one(&fixture, &tentative, ConstraintKind::Co2Storage);
        assert!(!result.passed);
        assert_eq!(result.remediation, Some(Remediation::StrikeDestination));

        // 2 Mt captured against limit(2020) = 3 Mt
        fixture.config.co2_storage_accounting = Co2StorageAccounting::AnnualCumulative;
        assert!(check_one(&fixture, &tentative, ConstraintKind::Co2Storage).passed);

        fixture.config.co2_storage_accounting = Co2StorageAccounting::TotalCumulative;
        assert!(check_one(&fixture, &tentative, ConstraintKind::Co2Storage).passed);
        let tentative = with_added(
            &current(),
            vec![end_state("Europe", "SMR + CCS"), end_state("Europe", "SMR + CCS")],
        );
        let result = check_one(&fixture, &tentative, ConstraintKind::Co2Storage);
        assert_eq!(
            result.remediation,
            Some(Remediation::StrikeDestinationInRegion("Europe".to_string()))
        );
    }

    #[test]
    fn test_electrolysis_capacity_addition() {
        let fixture = Fixture::new();
        let one = with_added(&current(), vec![end_state("Europe", "Electrolyser")]);
        assert!(check_one(&fixture, &one, ConstraintKind::ElectrolysisCapacityAddition).passed);
        let two = with_added(
            &current(),
            vec![end_state("Europe", "Electrolyser"), end_state("China", "Electrolyser")],
        );
        assert!(!check_one(&fixture, &two, ConstraintKind::ElectrolysisCapacityAddition).passed);
    }

    #[test]
    fn test_regional_demand_share_strikes_region() {
        let fixture = Fixture::new();
        // China: 1 + 4 = 5 Mt, limit 0.5 × 10 Mt
        let at_limit = with_added(&current(), (0..4).map(|_| end_state("China", "Electrolyser")).collect());
        assert!(check_one(&fixture, &at_limit, ConstraintKind::RegionalDemandShare).passed);

        let over = with_added(&current(), (0..5).map(|_| end_state("China", "Electrolyser")).collect());
        let result = check_one(&fixture, &over, ConstraintKind::RegionalDemandShare);
        assert_eq!(result.remediation, Some(Remediation::StrikeRegion("China".to_string())));
    }

    #[test]
    fn test_global_demand_share() {
        let fixture = Fixture::new();
        // Limit 0.1 × 10 Mt
        let one = with_added(&current(), vec![end_state("Europe", "Biomass")]);
        assert!(check_one(&fixture, &one, ConstraintKind::GlobalDemandShare).passed);
        let two = with_added(&current(), vec![end_state("Europe", "Biomass"), end_state("China", "Biomass")]);
        assert!(!check_one(&fixture, &two, ConstraintKind::GlobalDemandShare).passed);
    }

    #[test]
    fn test_regional_production_share_blocks_decreases_only() {
        let fixture = Fixture::new();
        let mut tentative = current().successor();
        let europe = tentative
            .iter()
            .find(|a| a.region == "Europe")
            .map(|a| a.id)
            .unwrap();
        tentative.remove(europe).unwrap();

        // Europe drops to 0 Mt, below 0.4 × 4 Mt
        let result = fixture
            .checker()
            .check(&current(), &tentative, 2020, TransitionType::Decommission, &[ConstraintKind::RegionalProductionShare])
            .unwrap();
        assert!(!result.all_passed());

        // Unchanged production passes even below the share
        let unchanged = current().successor();
        assert!(check_one(&fixture, &unchanged, ConstraintKind::RegionalProductionShare).passed);
    }

    #[test]
    fn test_relevance_filter() {
        let mut fixture = Fixture::new();
        fixture.config.constraints.greenfield = vec![
            ConstraintKind::Co2Storage,
            ConstraintKind::ElectrolysisCapacityAddition,
            ConstraintKind::TechnologyRampup,
        ];
        let checker = fixture.checker();
        assert_eq!(
            checker.applicable_constraints(TransitionType::Greenfield, Some("SMR + CCS"), 2020),
            vec![ConstraintKind::Co2Storage, ConstraintKind::TechnologyRampup]
        );
        assert_eq!(
            checker.applicable_constraints(TransitionType::Greenfield, Some("Electrolyser"), 2020),
            vec![ConstraintKind::ElectrolysisCapacityAddition, ConstraintKind::TechnologyRampup]
        );
        assert!(checker
            .applicable_constraints(TransitionType::Brownfield, Some("SMR"), 2020)
            .is_empty());
    }

    #[test]
    fn test_check_is_pure() {
        let fixture = Fixture::new();
        let current = current();
        let tentative = with_added(&current, vec![end_state("Europe", "SMR + CCS")]);
        let kinds = [
            ConstraintKind::AnnualCarbonBudget,
            ConstraintKind::TechnologyRampup,
            ConstraintKind::Co2Storage,
            ConstraintKind::GlobalDemandShare,
        ];
        let first = fixture
            .checker()
            .check(&current, &tentative, 2020, TransitionType::Greenfield, &kinds)
            .unwrap();
        let second = fixture
            .checker()
            .check(&current, &tentative, 2020, TransitionType::Greenfield, &kinds)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(current.len(), 2);
        assert_eq!(tentative.len(), 3);
    }

    #[test]
    fn test_missing_demand_fails_fast() {
        let fixture = Fixture::new();
        let result = fixture.checker().check(
            &current(),
            &current().successor(),
            2023,
            TransitionType::Greenfield,
            &[ConstraintKind::RegionalDemandShare],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_regional_supply_headroom() {
        let regional = BTreeMap::from([("Europe".to_string(), 3usize)]);
        // ceil(0.3 × (5 + 5)) − 3
        assert_eq!(regional_supply_headroom(0.3, 5, 5, &regional, "Europe"), 0);
        assert_eq!(regional_supply_headroom(0.3, 5, 5, &regional, "China"), 3);
    }
}
