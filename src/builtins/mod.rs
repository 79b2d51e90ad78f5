//! builtins
//!
//! Commands registered at startup.
//!
//! # Architecture
//!
//! Every built-in is an ordinary [`CommandDefinition`] assembled with the
//! same builder user commands use, so they pass through the full pipeline
//! and can be listed, searched and exported like any other command. They
//! reach the outside world only through the context's
//! [`Host`](crate::host::Host) collaborators.
//!
//! | Category     | Commands                                                 |
//! |--------------|----------------------------------------------------------|
//! | `basic`      | `help`, `hi`, `what`, `clear`                            |
//! | `filesystem` | `pwd`, `cd`, `lsx`, `info`, `cat`, `search`, `du`,       |
//! |              | `mkdir`, `touch`, `rm`, `rmdir`, `mv`                    |
//! | `system`     | `env`, `git`, `exit`                                     |

pub mod basic;
pub mod file_ops;
pub mod files;
pub mod help;
pub mod system;

use crate::engine::command::{CommandDefinition, DefinitionError};
use crate::engine::registry::{CommandRegistry, RegistryError};

/// Every built-in definition, in registration order.
pub fn builtin_commands() -> Result<Vec<CommandDefinition>, DefinitionError> {
    Ok(vec![
        help::help()?,
        basic::hi()?,
        basic::what()?,
        basic::clear()?,
        files::pwd()?,
        files::cd()?,
        files::lsx()?,
        files::info()?,
        files::cat()?,
        files::search()?,
        files::du()?,
        file_ops::mkdir()?,
        file_ops::touch()?,
        file_ops::rm()?,
        file_ops::rmdir()?,
        file_ops::mv()?,
        system::env()?,
        system::git()?,
        system::exit()?,
    ])
}

/// Register [`builtin_commands`] into `registry`.
pub fn register_builtins(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register_all(builtin_commands()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_do_not_collide() {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry).unwrap();
        assert_eq!(registry.len(), 19);
        assert_eq!(registry.get("rename").unwrap().name, "mv");
        assert_eq!(registry.get("bye").unwrap().name, "exit");
        assert_eq!(registry.get("grep").unwrap().name, "search");
    }

    #[test]
    fn export_covers_builtins() {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry).unwrap();
        let json = registry.export_definitions().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 19);
        assert_eq!(parsed[0]["name"], "help");
    }
}
