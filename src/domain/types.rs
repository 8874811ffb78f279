use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Calendar year of the model horizon
pub type Year = i32;

// ============================================================================
// Identifiers
// ============================================================================

/// Identity of one physical asset. Stable across years and technology switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub Uuid);

impl AssetId {
    /// Draw a new id from the given generator, so runs with a fixed seed
    /// produce identical ids.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bytes: [u8; 16] = rng.gen();
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Classifications
// ============================================================================

/// Maturity tier of a technology
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TechnologyClassification {
    Initial,
    Transition,
    EndState,
}

/// Kind of technology switch, as found in ranking tables and in the transition ledger
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SwitchType {
    Decommission,
    Greenfield,
    BrownfieldRenovation,
    BrownfieldNewbuild,
}

impl SwitchType {
    /// Agent responsible for this kind of switch
    pub fn transition_type(self) -> TransitionType {
        match self {
            SwitchType::Decommission => TransitionType::Decommission,
            SwitchType::Greenfield => TransitionType::Greenfield,
            SwitchType::BrownfieldRenovation | SwitchType::BrownfieldNewbuild => {
                TransitionType::Brownfield
            }
        }
    }

    pub fn is_brownfield(self) -> bool {
        matches!(
            self,
            SwitchType::BrownfieldRenovation | SwitchType::BrownfieldNewbuild
        )
    }
}

/// The three per-year decision agents. Constraint sets are configured per transition type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransitionType {
    Decommission,
    Brownfield,
    Greenfield,
}
