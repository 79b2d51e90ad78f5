//! core
//!
//! Core data types for shellx.
//!
//! # Modules
//!
//! - [`value`] - Dynamic values for flags, parameters and cells
//! - [`output`] - The tagged Output model and its builders
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Outputs are data, never pre-rendered text
//! - Every Output variant's payload is fixed by its tag
//! - Configuration is strict: unknown keys are errors

pub mod config;
pub mod output;
pub mod value;
