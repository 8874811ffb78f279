//! Fixtures shared by unit tests

use std::collections::BTreeMap;

use crate::config::{ConstraintSets, PathwayConfig};
use crate::domain::{Asset, AssetId, SwitchType, TechnologyClassification, Year};
use crate::inputs::{DemandRow, RankingRow};

pub fn asset(
    product: &str,
    region: &str,
    technology: &str,
    capacity: f64,
    cuf: f64,
    year_commissioned: Year,
) -> Asset {
    Asset {
        id: AssetId::new_v4(),
        product: product.to_string(),
        region: region.to_string(),
        technology: technology.to_string(),
        annual_production_capacity: capacity,
        cuf,
        technology_classification: TechnologyClassification::Initial,
        year_commissioned,
        asset_lifetime: 30,
        retrofit: false,
        rebuild: false,
        greenfield: false,
        year_last_transition: None,
    }
}

pub fn ranking_row(
    switch_type: SwitchType,
    product: &str,
    region: &str,
    origin: &str,
    destination: &str,
    year: Year,
    score: f64,
) -> RankingRow {
    RankingRow {
        product: product.to_string(),
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

pub fn demand(product: &str, region: &str, year: Year, value: f64) -> DemandRow {
    DemandRow {
        product: product.to_string(),
        region: region.to_string(),
        year,
        value,
    }
}

/// Unconstrained single-product pathway over 2020..=2025
pub fn pathway_config() -> PathwayConfig {
    PathwayConfig {
        sector: "ammonia".to_string(),
        pathway_name: "lc".to_string(),
        sensitivity: "def".to_string(),
        start_year: 2020,
        end_year: 2025,
        products: vec!["Ammonia".to_string()],
        assumed_annual_production_capacity: BTreeMap::from([("Ammonia".to_string(), 1.0)]),
        standard_cuf: 0.9,
        cuf_lower_threshold: 0.5,
        cuf_upper_threshold: 0.95,
        investment_cycle: 20,
        annual_renovation_share: 0.5,
        constraints: ConstraintSets::default(),
        ..PathwayConfig::default()
    }
}
