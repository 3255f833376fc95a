//! Deterministic, local analysis over loaded tables.

pub mod aggregator;

pub use aggregator::*;
