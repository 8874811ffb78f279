use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Constraint kinds that can be configured per transition type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintKind {
    AnnualCarbonBudget,
    TechnologyRampup,
    Co2Storage,
    ElectrolysisCapacityAddition,
    RegionalDemandShare,
    GlobalDemandShare,
    RegionalProductionShare,
}

/// What an agent does with its ranking after a failed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    /// Remove every row with the candidate's destination technology
    StrikeDestination,
    /// Remove rows with the candidate's destination technology in one region
    StrikeDestinationInRegion(String),
    /// Remove every row of one region
    StrikeRegion(String),
    /// Remove every row whose destination still emits or relies on capture
    StrikeResidualEmitters,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintResult {
    pub kind: ConstraintKind,
    pub passed: bool,
    /// Set for the terminal-year emissions check
    pub residual: bool,
    /// Present when the check failed
    pub remediation: Option<Remediation>,
    pub detail: String,
}

impl ConstraintResult {
    pub fn pass(kind: ConstraintKind) -> Self {
        Self {
            kind,
            passed: true,
            residual: false,
            remediation: None,
            detail: String::new(),
        }
    }

    pub fn fail(kind: ConstraintKind, remediation: Remediation, detail: impl Into<String>) -> Self {
        Self {
            kind,
            passed: false,
            residual: false,
            remediation: Some(remediation),
            detail: detail.into(),
        }
    }

    pub fn residual(mut self) -> Self {
        self.residual = true;
        self
    }
}

/// Results of one check, keyed by constraint kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintMap(BTreeMap<ConstraintKind, ConstraintResult>);

impl ConstraintMap {
    pub fn insert(&mut self, result: ConstraintResult) {
        self.0.insert(result.kind, result);
    }

    pub fn get(&self, kind: ConstraintKind) -> Option<&ConstraintResult> {
        self.0.get(&kind)
    }

    /// True for an empty map
    pub fn all_passed(&self) -> bool {
        self.0.values().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConstraintResult> + '_ {
        self.0.values().filter(|r| !r.passed)
    }

    /// Plain `{kind -> passed}` view
    pub fn as_flags(&self) -> BTreeMap<ConstraintKind, bool> {
        self.0.iter().map(|(k, r)| (*k, r.passed)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintResult> + '_ {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
