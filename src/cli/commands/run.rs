//! run and plan commands - One line through the session

use std::process::ExitCode;

use anyhow::Result;

use crate::engine::Session;
use crate::ui::output;

/// Rebuild one input line from separate command-line words.
///
/// A single word is the whole line. Otherwise words containing whitespace
/// are double-quoted so the tokenizer sees them as one token again.
pub fn join_line(words: &[String]) -> String {
    if let [line] = words {
        return line.clone();
    }
    words
        .iter()
        .map(|word| {
            if word.contains(char::is_whitespace) && !word.contains('"') {
                format!("\"{}\"", word)
            } else {
                word.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `line`; the exit code reflects whether the Output is an error.
pub async fn run_line(mut session: Session, line: &str) -> Result<ExitCode> {
    let mut stdout = std::io::stdout();
    let result = session.handle_line(line, &mut stdout).await?;
    Ok(if result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Dry-run `line` and print the plan as JSON.
pub async fn plan(session: &Session, line: &str) -> Result<ExitCode> {
    match session.dry_run(line).await {
        Ok(plan) => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            output::error(err);
            Ok(ExitCode::FAILURE)
        }
    }
}
