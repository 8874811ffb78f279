//! # Constraints
//!
//! Policy and physical limits checked before every transition is committed.
//! A failed check is data, not an error: the [`ConstraintResult`] names the
//! remediation the calling agent applies to its ranking.

pub mod checker;
pub mod limits;
pub mod result;

pub use checker::*;
pub use limits::*;
pub use result::*;
