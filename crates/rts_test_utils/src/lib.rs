//! # RTS Test Utilities
//!
//! Shared testing utilities for the engine and the headless runner:
//! - [`fixtures::MockWorld`], a scriptable in-memory game world
//! - Fixture builders for ledgers, profiles and directors
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

pub use fixtures::{MockWorld, Order};

/// Re-export proptest for convenience.
pub use proptest;
