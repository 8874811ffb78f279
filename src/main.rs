use anyhow::{Context, Result};
use sector_pathway_engine::{config, inputs, runner, telemetry};
use config::AppConfig;
use inputs::InputBundle;
use runner::Scenario;
use std::sync::Arc;
use telemetry::init_tracing;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = AppConfig::load()?;
    if cfg.pathways.is_empty() {
        warn!("no pathways configured, nothing to run");
        return Ok(());
    }

    let inputs = InputBundle::from_json_file(&cfg.inputs_path)
        .with_context(|| format!("failed to read inputs from {}", cfg.inputs_path.display()))?
        .index()?;
    let inputs = Arc::new(inputs);

    let scenarios: Vec<Scenario> = cfg
        .pathways
        .iter()
        .cloned()
        .map(|pathway| Scenario::new(Arc::new(pathway), Arc::clone(&inputs)))
        .collect();

    info!(
        scenarios = scenarios.len(),
        max_parallel = cfg.runner.max_parallel_runs,
        output = %cfg.output.root.display(),
        "starting pathway runs"
    );

    let outcomes =
        runner::run_scenarios(scenarios, Some(cfg.output.clone()), cfg.runner.max_parallel_runs)
            .await;

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    for outcome in outcomes.iter() {
        if let Err(e) = &outcome.result {
            error!(pathway = %outcome.pathway, sensitivity = %outcome.sensitivity, kind = e.kind(), "{e}");
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} scenarios failed", outcomes.len());
    }

    info!("all scenarios complete");
    Ok(())
}
