//! # Simulation Pathway
//!
//! Orchestrates one (sector, pathway, sensitivity) run. The pathway owns one
//! asset stack per simulated year and the transition ledger.
//!
//! For every year Y of the horizon:
//!
//! 1. CUF adjustment of stack Y
//! 2. stack Y+1 created from stack Y
//! 3. decommission, brownfield and greenfield agents mutate stack Y+1
//! 4. stack Y+1 and the year's transitions are committed
//!
//! A failing year commits nothing.

pub mod cuf;

pub use cuf::{CufAdjustment, DemandMatchedCuf, FixedCuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agents::{run_brownfield, run_decommission, run_greenfield, AgentContext};
use crate::config::{CufAdjustmentMode, PathwayConfig};
use crate::constraints::ConstraintLimits;
use crate::domain::{Asset, AssetId, AssetStack, Year};
use crate::error::{Result, SimulationError};
use crate::inputs::PathwayInputs;
use crate::transitions::TransitionRegistry;

pub struct SimulationPathway {
    config: Arc<PathwayConfig>,
    inputs: Arc<PathwayInputs>,
    limits: ConstraintLimits,
    cuf_adjustment: Box<dyn CufAdjustment>,
    stacks: BTreeMap<Year, AssetStack>,
    transitions: TransitionRegistry,
    /// Brownfield tie-break
    rng: StdRng,
    /// Ids of generated assets
    id_rng: StdRng,
}

impl SimulationPathway {
    pub fn new(config: Arc<PathwayConfig>, inputs: Arc<PathwayInputs>) -> Result<Self> {
        config.check()?;
        let limits = ConstraintLimits::from_inputs(&config, &inputs)?;
        let rng = StdRng::seed_from_u64(config.seed);
        let mut id_rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));

        let initial = initial_stack(&config, &inputs, &mut id_rng)?;
        info!(
            sector = %config.sector,
            pathway = %config.pathway_name,
            sensitivity = %config.sensitivity,
            assets = initial.len(),
            "initial stack loaded"
        );

        let cuf_adjustment: Box<dyn CufAdjustment> = match config.cuf_adjustment {
            CufAdjustmentMode::DemandMatched => Box::new(DemandMatchedCuf),
            CufAdjustmentMode::Fixed => Box::new(FixedCuf),
        };

        Ok(Self {
            stacks: BTreeMap::from([(config.start_year, initial)]),
            config,
            inputs,
            limits,
            cuf_adjustment,
            transitions: TransitionRegistry::new(),
            rng,
            id_rng,
        })
    }

    pub fn with_cuf_adjustment(mut self, cuf_adjustment: Box<dyn CufAdjustment>) -> Self {
        self.cuf_adjustment = cuf_adjustment;
        self
    }

    /// Simulate every year of the horizon
    pub fn run(&mut self) -> Result<()> {
        for year in self.config.years() {
            self.step(year)?;
        }
        info!(
            pathway = %self.config.pathway_name,
            sensitivity = %self.config.sensitivity,
            transitions = self.transitions.len(),
            final_assets = self.final_stack().map_or(0, AssetStack::len),
            "pathway complete"
        );
        Ok(())
    }

    /// Derive stack `year + 1` from stack `year`
    pub fn step(&mut self, year: Year) -> Result<()> {
        let mut current = self
            .stacks
            .get(&year)
            .cloned()
            .ok_or(SimulationError::StackMissing(year))?;
        self.cuf_adjustment
            .adjust(&mut current, year, &self.config, &self.inputs.demand)?;

        let mut next = current.successor();
        let mut pending = Vec::new();
        let ctx = AgentContext::new(year, &self.config, &self.inputs, &self.limits);
        run_decommission(&ctx, &current, &mut next, &mut pending)?;
        run_brownfield(&ctx, &current, &mut next, &mut self.rng, &mut pending)?;
        run_greenfield(&ctx, &current, &mut next, &mut self.id_rng, &mut pending)?;

        info!(year, assets = next.len(), transitions = pending.len(), "year simulated");
        self.stacks.insert(year, current);
        self.stacks.insert(year + 1, next);
        self.transitions.extend(pending);
        Ok(())
    }

    pub fn config(&self) -> &PathwayConfig {
        &self.config
    }

    pub fn inputs(&self) -> &PathwayInputs {
        &self.inputs
    }

    pub fn stack(&self, year: Year) -> Result<&AssetStack> {
        self.stacks
            .get(&year)
            .ok_or(SimulationError::StackMissing(year))
    }

    pub fn stacks(&self) -> &BTreeMap<Year, AssetStack> {
        &self.stacks
    }

    /// Latest simulated stack
    pub fn final_stack(&self) -> Option<&AssetStack> {
        self.stacks.values().next_back()
    }

    pub fn transitions(&self) -> &TransitionRegistry {
        &self.transitions
    }
}

/// Stack of the start year: explicit assets when given, otherwise the
/// regional aggregate expanded into standard-size assets. CUFs are bounded
/// to the configured thresholds.
fn initial_stack(
    config: &PathwayConfig,
    inputs: &PathwayInputs,
    id_rng: &mut StdRng,
) -> Result<AssetStack> {
    let mut assets = initial_assets(config, inputs, id_rng)?;
    for asset in assets.iter_mut() {
        let cuf = asset.cuf;
        asset.set_cuf_bounded(cuf, config.cuf_lower_threshold, config.cuf_upper_threshold);
        if asset.cuf != cuf {
            warn!(asset_id = %asset.id, technology = %asset.technology, cuf, bounded = asset.cuf, "initial CUF outside thresholds");
        }
    }
    AssetStack::new(config.start_year, assets)
}

fn initial_assets(
    config: &PathwayConfig,
    inputs: &PathwayInputs,
    id_rng: &mut StdRng,
) -> Result<Vec<Asset>> {
    if !inputs.initial_assets.is_empty() {
        return inputs
            .initial_assets
            .iter()
            .map(|record| record.to_asset(AssetId::from_rng(id_rng), &inputs.technologies))
            .collect();
    }

    let rows: Vec<_> = inputs
        .initial_regional_stack
        .iter()
        .filter(|r| r.year == config.start_year)
        .collect();
    if rows.is_empty() {
        return Err(SimulationError::InvalidInput(format!(
            "no initial stack for {}",
            config.start_year
        )));
    }

    let mut assets = Vec::new();
    for row in rows {
        let capacity = config.assumed_capacity(&row.product)?;
        let technology = inputs.technologies.require(&row.technology)?;
        let count = (row.annual_production_capacity / capacity).round().max(1.0) as usize;
        for _ in 0..count {
            assets.push(Asset {
                id: AssetId::from_rng(id_rng),
                product: row.product.clone(),
                region: row.region.clone(),
                technology: row.technology.clone(),
                annual_production_capacity: capacity,
                cuf: row.average_cuf,
                technology_classification: technology.technology_classification,
                year_commissioned: config.start_year - row.average_age.round() as Year,
                asset_lifetime: technology.technology_lifetime,
                retrofit: false,
                rebuild: false,
                greenfield: false,
                year_last_transition: None,
            });
        }
    }
    Ok(assets)
}
