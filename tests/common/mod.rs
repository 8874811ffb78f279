//! Shared builders for pathway integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use sector_pathway_engine::config::{ConstraintSets, CufAdjustmentMode, PathwayConfig};
use sector_pathway_engine::domain::{SwitchType, TechnologyClassification, Year};
use sector_pathway_engine::inputs::{
    DemandRow, InitialAsset, InputBundle, PathwayInputs, RankingInputs, RankingRow,
};

pub const PRODUCT: &str = "Ammonia";
pub const REGION: &str = "Europe";

/// Unconstrained pathway over `start..=end` with fixed CUFs
pub fn config(start: Year, end: Year) -> PathwayConfig {
    PathwayConfig {
        sector: "ammonia".to_string(),
        pathway_name: "lc".to_string(),
        sensitivity: "def".to_string(),
        start_year: start,
        end_year: end,
        products: vec![PRODUCT.to_string()],
        assumed_annual_production_capacity: BTreeMap::from([(PRODUCT.to_string(), 1.0)]),
        standard_cuf: 0.9,
        cuf_lower_threshold: 0.5,
        cuf_upper_threshold: 0.95,
        cuf_adjustment: CufAdjustmentMode::Fixed,
        investment_cycle: 20,
        annual_renovation_share: 0.25,
        constraints: ConstraintSets::default(),
        ..PathwayConfig::default()
    }
}

pub fn initial_asset(technology: &str, cuf: f64, year_commissioned: Year) -> InitialAsset {
    InitialAsset {
        id: None,
        product: PRODUCT.to_string(),
        region: REGION.to_string(),
        technology: technology.to_string(),
        annual_production_capacity: 1.0,
        cuf,
        technology_classification: Some(TechnologyClassification::Initial),
        year_commissioned,
        asset_lifetime: Some(30),
    }
}

pub fn demand_row(year: Year, value: f64) -> DemandRow {
    DemandRow {
        product: PRODUCT.to_string(),
        region: REGION.to_string(),
        year,
        value,
    }
}

pub fn row(
    switch_type: SwitchType,
    region: &str,
    origin: &str,
    destination: &str,
    year: Year,
    score: f64,
) -> RankingRow {
    RankingRow {
        product: PRODUCT.to_string(),
        region: region.to_string(),
        technology_origin: origin.to_string(),
        technology_destination: destination.to_string(),
        switch_type,
        year,
        score,
        technology_classification: TechnologyClassification::EndState,
        technology_lifetime: 25,
        cost_metric_decrease: None,
    }
}

/// One decommission, renovation and new-build row per year of `years`
pub fn full_rankings(years: impl Iterator<Item = Year> + Clone) -> RankingInputs {
    RankingInputs {
        decommission: years
            .clone()
            .map(|y| row(SwitchType::Decommission, REGION, "SMR", "Decommissioned", y, 1.0))
            .collect(),
        brownfield: years
            .clone()
            .map(|y| row(SwitchType::BrownfieldRenovation, REGION, "SMR", "SMR + CCS", y, 1.0))
            .collect(),
        greenfield: years
            .map(|y| row(SwitchType::Greenfield, REGION, "New-build", "Electrolyser", y, 1.0))
            .collect(),
    }
}

pub fn index(bundle: InputBundle) -> Arc<PathwayInputs> {
    Arc::new(bundle.index().expect("valid input bundle"))
}
