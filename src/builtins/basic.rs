//! builtins::basic
//!
//! Small conversational and terminal commands.

use crate::core::output::CommandOutput;
use crate::engine::command::{CommandDefinition, DefinitionError};

/// Erase the screen and home the cursor.
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

pub fn hi() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("hi")
        .description("Say hello")
        .category("basic")
        .on_execute(|_, _| Box::pin(async { Ok(CommandOutput::text("hello")) }))
        .build()
}

pub fn what() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("what")
        .description("What can I do?")
        .category("basic")
        .on_execute(|_, _| {
            Box::pin(async {
                Ok(CommandOutput::text(
                    "I can say hi, help you, and manage files and folders! Try 'help'.",
                ))
            })
        })
        .build()
}

pub fn clear() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("clear")
        .aliases(["cls"])
        .description("Clear the screen")
        .category("basic")
        .on_execute(|_, _| Box::pin(async { Ok(CommandOutput::text(CLEAR_SCREEN)) }))
        .build()
}
