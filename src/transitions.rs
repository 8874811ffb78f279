//! Append-only ledger of every committed transition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{AssetId, SwitchType, Year};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub year: Year,
    pub transition_type: SwitchType,
    pub asset_id: AssetId,
    pub region: String,
    pub product: String,
    /// Absent for greenfield
    pub technology_origin: Option<String>,
    /// Absent for decommission
    pub technology_destination: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransitionRegistry {
    entries: Vec<TransitionEntry>,
}

impl TransitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: TransitionEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = TransitionEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[TransitionEntry] {
        &self.entries
    }

    pub fn for_year(&self, year: Year) -> impl Iterator<Item = &TransitionEntry> + '_ {
        self.entries.iter().filter(move |e| e.year == year)
    }

    pub fn count_by_type(&self) -> BTreeMap<SwitchType, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.iter() {
            *counts.entry(entry.transition_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<TransitionEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(year: Year, transition_type: SwitchType) -> TransitionEntry {
        TransitionEntry {
            year,
            transition_type,
            asset_id: AssetId::new_v4(),
            region: "Europe".to_string(),
            product: "Ammonia".to_string(),
            technology_origin: Some("SMR".to_string()),
            technology_destination: None,
        }
    }

    #[test]
    fn test_registry_keeps_insertion_order() {
        let mut registry = TransitionRegistry::new();
        registry.add(entry(2020, SwitchType::Decommission));
        registry.extend(vec![
            entry(2021, SwitchType::Greenfield),
            entry(2021, SwitchType::BrownfieldRenovation),
        ]);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.entries()[0].year, 2020);
        assert_eq!(registry.for_year(2021).count(), 2);
        assert_eq!(registry.count_by_type()[&SwitchType::Greenfield], 1);
    }

    #[test]
    fn test_entry_serializes_switch_type() {
        let json = serde_json::to_value(entry(2020, SwitchType::BrownfieldNewbuild)).unwrap();
        assert_eq!(json["transition_type"], "brownfield_newbuild");
        assert!(json["technology_destination"].is_null());
    }
}
