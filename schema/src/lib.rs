//! Shared data model for the vigil supervisor
//!
//! This crate holds the serde types exchanged between the configuration
//! layer, the supervision engine, and the CLI. It intentionally has no
//! behavior beyond small accessors, so every other crate can depend on it
//! without pulling in the engine.

pub mod supervision;

pub use supervision::*;
