use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{TechnologyClassification, Year};
use crate::error::{Result, SimulationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyCharacteristics {
    pub technology: String,
    pub technology_classification: TechnologyClassification,
    /// Years
    pub technology_lifetime: u32,
    /// First year the technology is commercially available
    pub expected_maturity: Year,
}

#[derive(Debug, Clone, Default)]
pub struct TechnologyTable {
    by_technology: BTreeMap<String, TechnologyCharacteristics>,
}

impl TechnologyTable {
    /// Index by technology name. The first row of a technology wins.
    pub fn from_rows(rows: Vec<TechnologyCharacteristics>) -> Self {
        let mut by_technology = BTreeMap::new();
        for row in rows {
            by_technology.entry(row.technology.clone()).or_insert(row);
        }
        Self { by_technology }
    }

    pub fn get(&self, technology: &str) -> Option<&TechnologyCharacteristics> {
        self.by_technology.get(technology)
    }

    pub fn require(&self, technology: &str) -> Result<&TechnologyCharacteristics> {
        self.get(technology)
            .ok_or_else(|| SimulationError::data_alignment("technology_characteristics", technology))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TechnologyCharacteristics> + '_ {
        self.by_technology.values()
    }

    pub fn is_empty(&self) -> bool {
        self.by_technology.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characteristics(technology: &str, lifetime: u32) -> TechnologyCharacteristics {
        TechnologyCharacteristics {
            technology: technology.to_string(),
            technology_classification: TechnologyClassification::Transition,
            technology_lifetime: lifetime,
            expected_maturity: 2030,
        }
    }

    #[test]
    fn test_first_row_wins() {
        let table = TechnologyTable::from_rows(vec![
            characteristics("SMR + CCS", 25),
            characteristics("SMR + CCS", 40),
        ]);
        assert_eq!(table.iter().count(), 1);
        assert_eq!(table.require("SMR + CCS").unwrap().technology_lifetime, 25);
    }

    #[test]
    fn test_missing_technology_names_key() {
        let err = TechnologyTable::default().require("Electrolyser").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing technology_characteristics data for Electrolyser"
        );
    }
}
