//! Ranked candidate transitions.
//!
//! Lower score is better. Rows with equal scores keep their input order.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::domain::{SwitchType, TechnologyClassification, TransitionType, Year};
use crate::error::{Result, SimulationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub product: String,
    pub region: String,
    pub technology_origin: String,
    pub technology_destination: String,
    pub switch_type: SwitchType,
    pub year: Year,
    pub score: f64,
    /// Classification of the destination technology
    pub technology_classification: TechnologyClassification,
    /// Lifetime of the destination technology (years)
    pub technology_lifetime: u32,
    /// Relative cost improvement of the switch, used by the brownfield threshold
    #[serde(default)]
    pub cost_metric_decrease: Option<f64>,
}

/// Ranking rows as delivered, one list per transition type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingInputs {
    #[serde(default)]
    pub decommission: Vec<RankingRow>,
    #[serde(default)]
    pub brownfield: Vec<RankingRow>,
    #[serde(default)]
    pub greenfield: Vec<RankingRow>,
}

#[derive(Debug, Clone, Default)]
pub struct RankingTables {
    by_type: BTreeMap<TransitionType, Vec<RankingRow>>,
}

impl RankingTables {
    pub fn from_inputs(inputs: RankingInputs) -> Result<Self> {
        let mut by_type = BTreeMap::new();
        for (transition_type, rows) in [
            (TransitionType::Decommission, inputs.decommission),
            (TransitionType::Brownfield, inputs.brownfield),
            (TransitionType::Greenfield, inputs.greenfield),
        ] {
            for row in rows.iter() {
                if !row.score.is_finite() {
                    return Err(SimulationError::InvalidInput(format!(
                        "non-finite {transition_type} ranking score for {}/{}/{} -> {}",
                        row.product, row.region, row.technology_origin, row.technology_destination
                    )));
                }
                if row.switch_type.transition_type() != transition_type {
                    return Err(SimulationError::InvalidInput(format!(
                        "{} row in the {transition_type} ranking",
                        row.switch_type
                    )));
                }
            }
            by_type.insert(transition_type, rows);
        }
        Ok(Self { by_type })
    }

    /// Fresh, best-first table of one year. The caller owns and consumes it.
    pub fn for_year(&self, transition_type: TransitionType, year: Year) -> RankingTable {
        let rows = self
            .by_type
            .get(&transition_type)
            .map(|rows| rows.iter().filter(|r| r.year == year).cloned().collect())
            .unwrap_or_default();
        RankingTable::from_rows(rows)
    }

    pub fn rows(&self, transition_type: TransitionType) -> &[RankingRow] {
        self.by_type
            .get(&transition_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Working copy of a ranking, consumed by one agent in one year
#[derive(Debug, Clone, Default)]
pub struct RankingTable {
    rows: VecDeque<RankingRow>,
}

impl RankingTable {
    pub fn from_rows(mut rows: Vec<RankingRow>) -> Self {
        rows.sort_by_key(|r| OrderedFloat(r.score));
        Self { rows: rows.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn best(&self) -> Option<&RankingRow> {
        self.rows.front()
    }

    pub fn pop_best(&mut self) -> Option<RankingRow> {
        self.rows.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankingRow> + '_ {
        self.rows.iter()
    }

    pub fn contains(&self, row: &RankingRow) -> bool {
        self.rows.iter().any(|r| r == row)
    }

    /// Keep rows matching the predicate, returning how many were dropped
    pub fn retain(&mut self, f: impl FnMut(&RankingRow) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(f);
        before - self.rows.len()
    }

    /// Remove the first row equal to `row`
    pub fn remove_row(&mut self, row: &RankingRow) -> bool {
        match self.rows.iter().position(|r| r == row) {
            Some(idx) => self.rows.remove(idx).is_some(),
            None => false,
        }
    }

    pub fn filter_product(&mut self, product: &str) -> usize {
        self.retain(|r| r.product == product)
    }

    pub fn strike_destination(&mut self, technology: &str) -> usize {
        self.retain(|r| r.technology_destination != technology)
    }

    pub fn strike_destination_in_region(&mut self, technology: &str, region: &str) -> usize {
        self.retain(|r| !(r.technology_destination == technology && r.region == region))
    }

    pub fn strike_region(&mut self, region: &str) -> usize {
        self.retain(|r| r.region != region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ranking_row;

    fn greenfield(region: &str, destination: &str, score: f64) -> RankingRow {
        ranking_row(SwitchType::Greenfield, "Ammonia", region, "New-build", destination, 2020, score)
    }

    #[test]
    fn test_sorted_best_first_and_stable() {
        let mut table = RankingTable::from_rows(vec![
            greenfield("Europe", "SMR", 3.0),
            greenfield("Europe", "Electrolyser", 1.0),
            greenfield("China", "Electrolyser", 1.0),
        ]);
        assert_eq!(table.pop_best().unwrap().region, "Europe");
        assert_eq!(table.pop_best().unwrap().region, "China");
        assert_eq!(table.pop_best().unwrap().technology_destination, "SMR");
        assert!(table.pop_best().is_none());
    }

    #[test]
    fn test_strikes() {
        let mut table = RankingTable::from_rows(vec![
            greenfield("Europe", "SMR", 3.0),
            greenfield("Europe", "Electrolyser", 1.0),
            greenfield("China", "Electrolyser", 2.0),
            greenfield("China", "SMR", 4.0),
        ]);
        assert_eq!(table.strike_destination_in_region("Electrolyser", "China"), 1);
        assert_eq!(table.strike_region("Europe"), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.strike_destination("SMR"), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_for_year_filters_and_copies() {
        let mut next_year = greenfield("Europe", "SMR", 0.5);
        next_year.year = 2021;
        let tables = RankingTables::from_inputs(RankingInputs {
            greenfield: vec![greenfield("Europe", "Electrolyser", 1.0), next_year],
            ..RankingInputs::default()
        })
        .unwrap();

        let mut table = tables.for_year(TransitionType::Greenfield, 2020);
        assert_eq!(table.len(), 1);
        table.pop_best();
        assert_eq!(tables.for_year(TransitionType::Greenfield, 2020).len(), 1);
        assert!(tables.for_year(TransitionType::Brownfield, 2020).is_empty());
    }

    #[test]
    fn test_rejects_misfiled_rows() {
        let result = RankingTables::from_inputs(RankingInputs {
            decommission: vec![greenfield("Europe", "SMR", 1.0)],
            ..RankingInputs::default()
        });
        assert!(matches!(result, Err(SimulationError::InvalidInput(_))));
    }
}
