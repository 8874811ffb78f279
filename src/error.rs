use thiserror::Error;

use crate::domain::{AssetId, Year};

/// Errors raised by the transition engine.
///
/// Constraint violations are not errors: they are returned as
/// [`crate::constraints::ConstraintResult`] data and drive remediation.
/// Running out of decommission or brownfield candidates is not an error either.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{year}: demand for {product} cannot be met under the active constraint set ({unmet:.3} Mt unmet after the greenfield ranking was exhausted)")]
    GreenfieldDemandUnmet {
        year: Year,
        product: String,
        unmet: f64,
    },

    #[error("Missing {table} data for {key}")]
    DataAlignment { table: &'static str, key: String },

    #[error("Duplicate asset id: {0}")]
    DuplicateAsset(AssetId),

    #[error("Asset not found in stack: {0}")]
    UnknownAsset(AssetId),

    #[error("No asset stack for year {0}")]
    StackMissing(Year),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Scenario run aborted: {0}")]
    Aborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    pub fn data_alignment(table: &'static str, key: impl Into<String>) -> Self {
        SimulationError::DataAlignment {
            table,
            key: key.into(),
        }
    }

    /// Short error kind, used in run summaries and logs
    pub fn kind(&self) -> &'static str {
        match self {
            SimulationError::GreenfieldDemandUnmet { .. } => "GreenfieldDemandUnmet",
            SimulationError::DataAlignment { .. } => "DataAlignment",
            SimulationError::DuplicateAsset(_) => "DuplicateAsset",
            SimulationError::UnknownAsset(_) => "UnknownAsset",
            SimulationError::StackMissing(_) => "StackMissing",
            SimulationError::InvalidConfig(_) => "InvalidConfig",
            SimulationError::InvalidInput(_) => "InvalidInput",
            SimulationError::Aborted(_) => "Aborted",
            SimulationError::Io(_) => "Io",
            SimulationError::Json(_) => "Json",
        }
    }
}

impl From<validator::ValidationErrors> for SimulationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SimulationError::InvalidConfig(errors.to_string())
    }
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
