//! Crate-level scenario tests.
//!
//! - `helpers.rs`: harness and counting modifiers shared with the unit tests
//! - `integration.rs`: end-to-end casts against the simulated host
//! - `properties.rs`: generated spells checked against the engine's invariants

pub mod helpers;
