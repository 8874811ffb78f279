//! Sector decarbonization pathway engine.
//!
//! Simulates the yearly evolution of a sector's production assets: each year
//! the stack of assets is decommissioned, switched to other technologies and
//! extended with new builds, subject to carbon, rampup and market-share
//! constraints.

pub mod agents;
pub mod config;
pub mod constraints;
pub mod domain;
pub mod error;
pub mod inputs;
pub mod output;
pub mod pathway;
pub mod runner;
pub mod telemetry;
pub mod transitions;

#[cfg(test)]
mod test_support;
