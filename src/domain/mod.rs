pub mod asset;
pub mod stack;
pub mod types;

pub use asset::*;
pub use stack::*;
pub use types::*;
