//! # Output
//!
//! Files of a finished run, laid out as
//! `<root>/<sector>/<pathway>/<sensitivity>/{intermediate,ranking,stack_tracker,final}`.

pub mod tables;

pub use tables::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::{AssetStack, SwitchType, Year};
use crate::error::Result;
use crate::pathway::SimulationPathway;

#[derive(Debug, Clone)]
pub struct ScenarioPaths {
    base: PathBuf,
}

impl ScenarioPaths {
    pub fn new(root: impl AsRef<Path>, sector: &str, pathway: &str, sensitivity: &str) -> Self {
        Self {
            base: root.as_ref().join(sector).join(pathway).join(sensitivity),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn intermediate(&self) -> PathBuf {
        self.base.join("intermediate")
    }

    pub fn ranking(&self) -> PathBuf {
        self.base.join("ranking")
    }

    pub fn stack_tracker(&self) -> PathBuf {
        self.base.join("stack_tracker")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.base.join("final")
    }

    pub fn stack_file(&self, year: Year) -> PathBuf {
        self.stack_tracker().join(format!("stack_{year}.csv"))
    }

    pub fn create_all(&self) -> Result<()> {
        for dir in [
            self.intermediate(),
            self.ranking(),
            self.stack_tracker(),
            self.final_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub sector: String,
    pub pathway: String,
    pub sensitivity: String,
    pub start_year: Year,
    pub end_year: Year,
    pub seed: u64,
    pub final_asset_count: usize,
    pub final_production_volume: f64,
    pub transitions: BTreeMap<SwitchType, usize>,
    pub generated_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_pathway(pathway: &SimulationPathway) -> Self {
        let config = pathway.config();
        let final_stack = pathway.final_stack();
        Self {
            sector: config.sector.clone(),
            pathway: config.pathway_name.clone(),
            sensitivity: config.sensitivity.clone(),
            start_year: config.start_year,
            end_year: config.end_year,
            seed: config.seed,
            final_asset_count: final_stack.map_or(0, AssetStack::len),
            final_production_volume: final_stack.map_or(0.0, |s| s.annual_production_volume(None)),
            transitions: pathway.transitions().count_by_type(),
            generated_at: Utc::now(),
        }
    }
}

pub fn export_stack(paths: &ScenarioPaths, stack: &AssetStack) -> Result<()> {
    let mut writer = BufWriter::new(File::create(paths.stack_file(stack.year()))?);
    write_stack_csv(&mut writer, stack)?;
    writer.flush()?;
    Ok(())
}

/// Re-ingest a stack exported by [`export_stack`]
pub fn load_stack(paths: &ScenarioPaths, year: Year) -> Result<AssetStack> {
    let reader = BufReader::new(File::open(paths.stack_file(year))?);
    read_stack_csv(year, reader)
}

/// Write stacks, transitions, technology roadmap, emissions trajectory and run
/// summary of a completed pathway. The trajectory is skipped without emission
/// factors.
pub fn export_pathway(
    pathway: &SimulationPathway,
    paths: &ScenarioPaths,
    export_stacks: bool,
) -> Result<RunSummary> {
    paths.create_all()?;

    if export_stacks {
        for stack in pathway.stacks().values() {
            export_stack(paths, stack)?;
        }
    }

    let final_dir = paths.final_dir();
    let mut writer = BufWriter::new(File::create(final_dir.join("transitions.csv"))?);
    write_transitions_csv(&mut writer, pathway.transitions().entries())?;
    writer.flush()?;

    let mut writer = BufWriter::new(File::create(final_dir.join("technology_roadmap.csv"))?);
    write_technology_roadmap_csv(&mut writer, pathway.stacks())?;
    writer.flush()?;

    let emissions = &pathway.inputs().emissions;
    if emissions.is_empty() {
        debug!("no emission factors, emissions trajectory skipped");
    } else {
        let trajectory =
            emissions_trajectory(pathway.stacks(), emissions, pathway.config().missing_data)?;
        let mut writer = BufWriter::new(File::create(final_dir.join("emissions_trajectory.csv"))?);
        write_emissions_trajectory_csv(&mut writer, pathway.stacks().keys().copied(), &trajectory)?;
        writer.flush()?;
    }

    let summary = RunSummary::from_pathway(pathway);
    let mut writer = BufWriter::new(File::create(final_dir.join("run_summary.json"))?);
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer.flush()?;

    info!(path = %paths.base().display(), "pathway exported");
    Ok(summary)
}
