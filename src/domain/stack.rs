//! # Asset Stack
//!
//! The complete fleet of a sector in one simulated year.
//!
//! Assets are held behind `Arc` with copy-on-write semantics: creating next
//! year's stack clones pointers only, and an asset is physically copied the
//! first time either stack mutates it. Each stack therefore owns its assets
//! logically, and no mutation is ever visible through another year's stack.

use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{Asset, AssetId, AssetUpdate, TechnologyClassification, Year};
use crate::error::{Result, SimulationError};
use crate::inputs::{EmissionsTable, MissingDataPolicy};

/// Column to group by in [`AssetStack::aggregate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Product,
    Region,
    Technology,
    TechnologyClassification,
}

impl GroupBy {
    fn key(self, asset: &Asset) -> String {
        match self {
            GroupBy::Product => asset.product.clone(),
            GroupBy::Region => asset.region.clone(),
            GroupBy::Technology => asset.technology.clone(),
            GroupBy::TechnologyClassification => asset.technology_classification.to_string(),
        }
    }
}

/// One group of an aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Group key values, in the order of the requested columns
    pub key: Vec<String>,
    pub annual_production_capacity: f64,
    pub annual_production_volume: f64,
    pub number_of_assets: usize,
}

/// Filter for counting assets
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    pub product: Option<String>,
    pub region: Option<String>,
    pub technology: Option<String>,
    pub classification: Option<TechnologyClassification>,
    pub greenfield_only: bool,
}

impl AssetFilter {
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn classification(mut self, classification: TechnologyClassification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn greenfield_only(mut self) -> Self {
        self.greenfield_only = true;
        self
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        self.product.as_deref().map_or(true, |p| asset.product == p)
            && self.region.as_deref().map_or(true, |r| asset.region == r)
            && self.technology.as_deref().map_or(true, |t| asset.technology == t)
            && self
                .classification
                .map_or(true, |c| asset.technology_classification == c)
            && (!self.greenfield_only || asset.greenfield)
    }
}

#[derive(Debug, Clone)]
pub struct AssetStack {
    year: Year,
    assets: Vec<Arc<Asset>>,
}

impl AssetStack {
    /// Create a stack from assets, rejecting duplicate ids
    pub fn new(year: Year, assets: Vec<Asset>) -> Result<Self> {
        let mut stack = Self::empty(year);
        for asset in assets {
            stack.append(asset)?;
        }
        Ok(stack)
    }

    pub fn empty(year: Year) -> Self {
        Self {
            year,
            assets: Vec::new(),
        }
    }

    pub fn year(&self) -> Year {
        self.year
    }

    /// Starting point of next year's stack. Shares asset storage until mutated.
    pub fn successor(&self) -> Self {
        Self {
            year: self.year + 1,
            assets: self.assets.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> + '_ {
        self.assets.iter().map(|a| a.as_ref())
    }

    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> BTreeSet<AssetId> {
        self.iter().map(|a| a.id).collect()
    }

    fn position(&self, id: AssetId) -> Option<usize> {
        self.assets.iter().position(|a| a.id == id)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn append(&mut self, asset: Asset) -> Result<()> {
        if self.contains(asset.id) {
            return Err(SimulationError::DuplicateAsset(asset.id));
        }
        self.assets.push(Arc::new(asset));
        Ok(())
    }

    pub fn remove(&mut self, id: AssetId) -> Result<Asset> {
        let idx = self
            .position(id)
            .ok_or(SimulationError::UnknownAsset(id))?;
        let asset = self.assets.remove(idx);
        Ok(Arc::unwrap_or_clone(asset))
    }

    /// Switch the technology of an asset, keeping its identity
    pub fn update_asset(&mut self, id: AssetId, update: &AssetUpdate) -> Result<&Asset> {
        let idx = self
            .position(id)
            .ok_or(SimulationError::UnknownAsset(id))?;
        let asset = Arc::make_mut(&mut self.assets[idx]);
        asset.apply_update(update);
        Ok(asset)
    }

    /// Set the CUF of one asset, bounded to `[lower, upper]`
    pub fn set_cuf(&mut self, id: AssetId, cuf: f64, lower: f64, upper: f64) -> Result<()> {
        let idx = self
            .position(id)
            .ok_or(SimulationError::UnknownAsset(id))?;
        if self.assets[idx].cuf != cuf.clamp(lower, upper) {
            Arc::make_mut(&mut self.assets[idx]).set_cuf_bounded(cuf, lower, upper);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Grouped sums of capacity, volume and asset count, ordered by key
    pub fn aggregate(&self, group_by: &[GroupBy]) -> Vec<AggregateRow> {
        let mut groups: BTreeMap<Vec<String>, AggregateRow> = BTreeMap::new();
        for asset in self.iter() {
            let key: Vec<String> = group_by.iter().map(|g| g.key(asset)).collect();
            let row = groups.entry(key.clone()).or_insert_with(|| AggregateRow {
                key,
                annual_production_capacity: 0.0,
                annual_production_volume: 0.0,
                number_of_assets: 0,
            });
            row.annual_production_capacity += asset.annual_production_capacity;
            row.annual_production_volume += asset.annual_production_volume();
            row.number_of_assets += 1;
        }
        groups.into_values().collect()
    }

    pub fn get_number_of_assets(&self, filter: &AssetFilter) -> usize {
        self.iter().filter(|a| filter.matches(a)).count()
    }

    /// Assets old enough for a brownfield switch and not switched during the
    /// current investment cycle, in stack order
    pub fn get_assets_eligible_for_brownfield(
        &self,
        year: Year,
        investment_cycle: i32,
    ) -> Vec<AssetId> {
        self.iter()
            .filter(|a| a.is_eligible_for_brownfield(year, investment_cycle))
            .map(|a| a.id)
            .collect()
    }

    /// Total production volume, optionally for one product only
    pub fn annual_production_volume(&self, product: Option<&str>) -> f64 {
        self.iter()
            .filter(|a| product.map_or(true, |p| a.product == p))
            .map(|a| a.annual_production_volume())
            .sum()
    }

    pub fn get_regional_production_volume(&self, product: &str) -> BTreeMap<String, f64> {
        let mut regional = BTreeMap::new();
        for asset in self.iter().filter(|a| a.product == product) {
            *regional.entry(asset.region.clone()).or_insert(0.0) +=
                asset.annual_production_volume();
        }
        regional
    }

    /// Number of assets per technology
    pub fn count_by_technology(&self) -> BTreeMap<String, usize> {
        self.iter().map(|a| a.technology.clone()).counts().into_iter().collect()
    }

    /// Summed capacity of the given technologies
    pub fn capacity_of_technologies(&self, technologies: &[String]) -> f64 {
        self.iter()
            .filter(|a| technologies.iter().any(|t| *t == a.technology))
            .map(|a| a.annual_production_capacity)
            .sum()
    }

    /// Summed production volume of the given technologies for one product
    pub fn volume_of_technologies(&self, product: &str, technologies: &[String]) -> f64 {
        self.iter()
            .filter(|a| a.product == product && technologies.iter().any(|t| *t == a.technology))
            .map(|a| a.annual_production_volume())
            .sum()
    }

    pub fn products(&self) -> Vec<String> {
        self.iter().map(|a| a.product.clone()).unique().sorted().collect()
    }

    pub fn technologies(&self) -> Vec<String> {
        self.iter().map(|a| a.technology.clone()).unique().sorted().collect()
    }

    /// Emissions of the stack (Mt per emission key such as `co2_scope1`),
    /// optionally restricted to one technology classification
    pub fn calculate_emissions_stack(
        &self,
        year: Year,
        emissions: &EmissionsTable,
        classification: Option<TechnologyClassification>,
        policy: MissingDataPolicy,
    ) -> Result<BTreeMap<String, f64>> {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for asset in self
            .iter()
            .filter(|a| classification.map_or(true, |c| a.technology_classification == c))
        {
            let Some(factors) =
                emissions.lookup(&asset.product, &asset.region, &asset.technology, year, policy)?
            else {
                continue;
            };
            let volume = asset.annual_production_volume();
            for (key, factor) in factors.values.iter() {
                *totals.entry(key.clone()).or_insert(0.0) += volume * factor;
            }
        }
        Ok(totals)
    }

    /// CO2 captured by the stack (Mt CO2)
    pub fn calculate_co2_captured_stack(
        &self,
        year: Year,
        emissions: &EmissionsTable,
        policy: MissingDataPolicy,
    ) -> Result<f64> {
        Ok(self
            .co2_captured_by_region(year, emissions, policy)?
            .values()
            .sum())
    }

    /// CO2 captured per region (Mt CO2)
    pub fn co2_captured_by_region(
        &self,
        year: Year,
        emissions: &EmissionsTable,
        policy: MissingDataPolicy,
    ) -> Result<BTreeMap<String, f64>> {
        let mut regional = BTreeMap::new();
        for asset in self.iter() {
            let captured = emissions
                .lookup(&asset.product, &asset.region, &asset.technology, year, policy)?
                .map_or(0.0, |f| f.co2_captured);
            *regional.entry(asset.region.clone()).or_insert(0.0) +=
                asset.annual_production_volume() * captured;
        }
        Ok(regional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SwitchType;
    use crate::inputs::EmissionsRow;
    use crate::test_support::asset;
    use proptest::prelude::*;

    fn stack() -> AssetStack {
        AssetStack::new(
            2020,
            vec![
                asset("Ammonia", "Europe", "SMR", 1.0, 0.9, 1995),
                asset("Ammonia", "Europe", "SMR", 1.0, 0.8, 2005),
                asset("Ammonia", "China", "Coal", 2.0, 0.5, 1990),
                asset("Urea", "China", "Coal", 1.0, 1.0, 2010),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_append_rejects_duplicate_ids() {
        let mut s = stack();
        let dup = s.iter().next().unwrap().clone();
        assert!(matches!(
            s.append(dup),
            Err(SimulationError::DuplicateAsset(_))
        ));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_remove_unknown_asset() {
        let mut s = stack();
        assert!(matches!(
            s.remove(AssetId::new_v4()),
            Err(SimulationError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_successor_is_independent_after_mutation() {
        let current = stack();
        let mut next = current.successor();
        assert_eq!(next.year(), 2021);

        let id = current.iter().next().unwrap().id;
        next.update_asset(
            id,
            &AssetUpdate {
                new_technology: "Electrolyser".to_string(),
                new_classification: TechnologyClassification::EndState,
                new_lifetime: 25,
                switch_type: SwitchType::BrownfieldRenovation,
                year: 2020,
                update_year_commissioned: false,
            },
        )
        .unwrap();

        assert_eq!(current.get(id).unwrap().technology, "SMR");
        assert_eq!(next.get(id).unwrap().technology, "Electrolyser");
        assert!(next.get(id).unwrap().retrofit);
        assert_eq!(next.get(id).unwrap().year_commissioned, 1995);

        let removed = next.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(current.contains(id));
    }

    #[test]
    fn test_aggregate_by_product_and_region() {
        let rows = stack().aggregate(&[GroupBy::Product, GroupBy::Region]);
        assert_eq!(rows.len(), 3);
        let europe = rows
            .iter()
            .find(|r| r.key == vec!["Ammonia".to_string(), "Europe".to_string()])
            .unwrap();
        assert_eq!(europe.number_of_assets, 2);
        assert!((europe.annual_production_capacity - 2.0).abs() < 1e-12);
        assert!((europe.annual_production_volume - 1.7).abs() < 1e-12);
    }

    #[test]
    fn test_counts_and_filters() {
        let s = stack();
        assert_eq!(s.get_number_of_assets(&AssetFilter::default()), 4);
        assert_eq!(
            s.get_number_of_assets(&AssetFilter::default().product("Ammonia").region("China")),
            1
        );
        assert_eq!(s.get_number_of_assets(&AssetFilter::default().greenfield_only()), 0);
        assert_eq!(s.count_by_technology()["SMR"], 2);
        assert_eq!(s.products(), vec!["Ammonia".to_string(), "Urea".to_string()]);
    }

    #[test]
    fn test_brownfield_eligibility() {
        let s = stack();
        let eligible = s.get_assets_eligible_for_brownfield(2020, 20);
        assert_eq!(eligible.len(), 2);
    }

    #[test]
    fn test_regional_production_volume() {
        let regional = stack().get_regional_production_volume("Ammonia");
        assert!((regional["Europe"] - 1.7).abs() < 1e-12);
        assert!((regional["China"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_emissions_and_capture() {
        let s = stack();
        let emissions = EmissionsTable::from_rows(vec![
            EmissionsRow::new("Ammonia", "Europe", "SMR", 2020)
                .factor("co2_scope1", 2.0)
                .captured(0.5),
            EmissionsRow::new("Ammonia", "China", "Coal", 2020).factor("co2_scope1", 3.0),
            EmissionsRow::new("Urea", "China", "Coal", 2020).factor("co2_scope2", 1.0),
        ])
        .unwrap();

        let totals = s
            .calculate_emissions_stack(2020, &emissions, None, MissingDataPolicy::FailFast)
            .unwrap();
        assert!((totals["co2_scope1"] - (1.7 * 2.0 + 1.0 * 3.0)).abs() < 1e-9);
        assert!((totals["co2_scope2"] - 1.0).abs() < 1e-9);

        let captured = s
            .calculate_co2_captured_stack(2020, &emissions, MissingDataPolicy::FailFast)
            .unwrap();
        assert!((captured - 0.85).abs() < 1e-9);

        let end_state = s
            .calculate_emissions_stack(
                2020,
                &emissions,
                Some(TechnologyClassification::EndState),
                MissingDataPolicy::FailFast,
            )
            .unwrap();
        assert!(end_state.is_empty());
    }

    #[test]
    fn test_emissions_missing_row_fails_fast() {
        let s = stack();
        let emissions = EmissionsTable::from_rows(vec![]).unwrap();
        let err = s
            .calculate_emissions_stack(2020, &emissions, None, MissingDataPolicy::FailFast)
            .unwrap_err();
        assert!(matches!(err, SimulationError::DataAlignment { table: "emissions", .. }));

        let zero = s
            .calculate_emissions_stack(2020, &emissions, None, MissingDataPolicy::ZeroFill)
            .unwrap();
        assert!(zero.is_empty());
    }

    proptest! {
        #[test]
        fn prop_ids_stay_unique(ops in proptest::collection::vec((any::<bool>(), 0usize..8), 1..40)) {
            let mut s = AssetStack::empty(2020);
            let pool: Vec<Asset> = (0..8)
                .map(|i| asset("Ammonia", "Europe", "SMR", 1.0, 0.5, 2000 + i))
                .collect();
            for (insert, idx) in ops {
                let a = pool[idx].clone();
                if insert {
                    let existed = s.contains(a.id);
                    prop_assert_eq!(s.append(a).is_err(), existed);
                } else {
                    let existed = s.contains(a.id);
                    prop_assert_eq!(s.remove(a.id).is_ok(), existed);
                }
                prop_assert_eq!(s.ids().len(), s.len());
                let volume: f64 = s.iter().map(|a| a.annual_production_volume()).sum();
                prop_assert!((s.annual_production_volume(None) - volume).abs() < 1e-9);
            }
        }
    }
}
