//! Outbound (driven) adapters.

pub mod payments;
pub mod persistence;
