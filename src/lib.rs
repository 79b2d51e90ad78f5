//! shellx - an interactive shell with a staged command pipeline
//!
//! Every input line is parsed against a registered command definition and
//! driven through Parse → Intent → Validate → Plan → Execute → Present.
//! Commands return structured Outputs; a single presenter renders them in
//! one of five modes.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, drives a session)
//! - [`engine`] - Registry, pipeline stages, session
//! - [`core`] - Values, the Output model, configuration
//! - [`host`] - Filesystem, process and environment collaborators
//! - [`builtins`] - Commands registered at startup
//! - [`ui`] - Presentation and output writing
//!
//! # Correctness Invariants
//!
//! 1. A failing validation never reaches Execute
//! 2. Only Execute causes side effects or changes session state
//! 3. Every command failure becomes an error Output; the session survives
//! 4. Registry names and aliases never collide

pub mod builtins;
pub mod cli;
pub mod core;
pub mod engine;
pub mod host;
pub mod ui;
