//! ui
//!
//! Presentation: turning Outputs into text.
//!
//! # Modules
//!
//! - [`present`] - Presentation modes, config and the renderer
//! - [`format`] - Byte, date, duration and cell layout helpers
//! - [`output`] - Writing rendered blocks and diagnostics
//!
//! # Design
//!
//! Commands never print. They return a [`CommandOutput`](crate::core::output::CommandOutput)
//! and the session hands it to the [`Presenter`](present::Presenter), which
//! alone decides layout for the active mode.

pub mod format;
pub mod output;
pub mod present;
