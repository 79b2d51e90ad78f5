//! export command - Print registered command definitions

use std::process::ExitCode;

use anyhow::Result;

use crate::engine::Session;

/// Print the registry's definitions document on stdout.
pub fn export(session: &Session) -> Result<ExitCode> {
    println!("{}", session.registry().export_definitions()?);
    Ok(ExitCode::SUCCESS)
}
