//! # Scenario Runner
//!
//! Runs independent (pathway, sensitivity) scenarios in parallel. Each
//! scenario owns its pathway and stacks; only the read-only input tables are
//! shared. A failing scenario is reported in its outcome and never stops its
//! siblings.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::{OutputConfig, PathwayConfig};
use crate::error::{Result, SimulationError};
use crate::inputs::PathwayInputs;
use crate::output::{export_pathway, RunSummary, ScenarioPaths};
use crate::pathway::SimulationPathway;

#[derive(Clone)]
pub struct Scenario {
    pub config: Arc<PathwayConfig>,
    pub inputs: Arc<PathwayInputs>,
}

impl Scenario {
    pub fn new(config: Arc<PathwayConfig>, inputs: Arc<PathwayInputs>) -> Self {
        Self { config, inputs }
    }
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub pathway: String,
    pub sensitivity: String,
    pub result: Result<RunSummary>,
}

impl ScenarioOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run one scenario to completion and, with an output config, export it
pub fn run_scenario(scenario: &Scenario, output: Option<&OutputConfig>) -> Result<RunSummary> {
    let config = &scenario.config;
    let mut pathway =
        SimulationPathway::new(Arc::clone(&scenario.config), Arc::clone(&scenario.inputs))?;
    pathway.run()?;

    match output {
        Some(output) => {
            let paths = ScenarioPaths::new(
                &output.root,
                &config.sector,
                &config.pathway_name,
                &config.sensitivity,
            );
            export_pathway(&pathway, &paths, output.export_stacks)
        }
        None => Ok(RunSummary::from_pathway(&pathway)),
    }
}

/// Run all scenarios with at most `max_parallel` at a time. Outcomes are
/// returned in input order.
pub async fn run_scenarios(
    scenarios: Vec<Scenario>,
    output: Option<OutputConfig>,
    max_parallel: usize,
) -> Vec<ScenarioOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();

    for (index, scenario) in scenarios.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let output = output.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let pathway = scenario.config.pathway_name.clone();
            let sensitivity = scenario.config.sensitivity.clone();
            info!(%pathway, %sensitivity, "scenario started");

            let result =
                tokio::task::spawn_blocking(move || run_scenario(&scenario, output.as_ref()))
                    .await
                    .unwrap_or_else(|e| Err(SimulationError::Aborted(e.to_string())));

            match &result {
                Ok(summary) => info!(
                    %pathway,
                    %sensitivity,
                    final_assets = summary.final_asset_count,
                    "scenario finished"
                ),
                Err(e) => error!(%pathway, %sensitivity, kind = e.kind(), error = %e, "scenario failed"),
            }
            (
                index,
                ScenarioOutcome {
                    pathway,
                    sensitivity,
                    result,
                },
            )
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!(error = %e, "scenario task did not complete"),
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CufAdjustmentMode;
    use crate::domain::{SwitchType, TechnologyClassification};
    use crate::inputs::{InputBundle, RankingInputs, RegionalStackRow, TechnologyCharacteristics};
    use crate::test_support::{demand, pathway_config, ranking_row};
    use tempfile::tempdir;

    fn inputs() -> Arc<PathwayInputs> {
        let bundle = InputBundle {
            initial_regional_stack: vec![RegionalStackRow {
                product: "Ammonia".to_string(),
                region: "Europe".to_string(),
                technology: "SMR".to_string(),
                year: 2020,
                annual_production_capacity: 2.0,
                average_cuf: 0.9,
                average_age: 5.0,
            }],
            demand: (2020..=2026)
                .map(|y| demand("Ammonia", "Europe", y, 1.8 + 0.9 * (y - 2020) as f64))
                .collect(),
            rankings: RankingInputs {
                greenfield: (2020..2025)
                    .map(|y| {
                        ranking_row(SwitchType::Greenfield, "Ammonia", "Europe", "New-build", "Electrolyser", y, 1.0)
                    })
                    .collect(),
                ..RankingInputs::default()
            },
            technologies: vec![TechnologyCharacteristics {
                technology: "SMR".to_string(),
                technology_classification: TechnologyClassification::Initial,
                technology_lifetime: 30,
                expected_maturity: 1950,
            }],
            ..InputBundle::default()
        };
        Arc::new(bundle.index().unwrap())
    }

    fn config(sensitivity: &str, products: &[&str]) -> Arc<PathwayConfig> {
        let mut config = pathway_config();
        config.sensitivity = sensitivity.to_string();
        config.cuf_adjustment = CufAdjustmentMode::Fixed;
        config.products = products.iter().map(|p| p.to_string()).collect();
        for product in config.products.iter() {
            config
                .assumed_annual_production_capacity
                .insert(product.clone(), 1.0);
        }
        Arc::new(config)
    }

    #[test]
    fn test_run_scenario_without_export() {
        let summary = run_scenario(&Scenario::new(config("def", &["Ammonia"]), inputs()), None).unwrap();
        assert_eq!(summary.end_year, 2025);
        assert_eq!(summary.transitions.get(&SwitchType::Greenfield), Some(&5));
    }

    #[tokio::test]
    async fn test_failing_scenario_does_not_affect_siblings() {
        let dir = tempdir().unwrap();
        let output = OutputConfig {
            root: dir.path().to_path_buf(),
            export_stacks: false,
        };
        let inputs = inputs();
        let scenarios = vec![
            Scenario::new(config("def", &["Ammonia"]), Arc::clone(&inputs)),
            // no demand rows for Urea
            Scenario::new(config("urea", &["Ammonia", "Urea"]), Arc::clone(&inputs)),
            Scenario::new(config("high", &["Ammonia"]), Arc::clone(&inputs)),
        ];

        let outcomes = run_scenarios(scenarios, Some(output), 2).await;

        let sensitivities: Vec<_> = outcomes.iter().map(|o| o.sensitivity.as_str()).collect();
        assert_eq!(sensitivities, vec!["def", "urea", "high"]);
        assert!(outcomes[0].is_success());
        assert!(outcomes[2].is_success());
        let err = outcomes[1].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), "DataAlignment");

        let final_dir = dir.path().join("ammonia").join("lc").join("def").join("final");
        assert!(final_dir.join("run_summary.json").is_file());
        assert!(!dir.path().join("ammonia").join("lc").join("urea").join("final").exists());
    }
}
