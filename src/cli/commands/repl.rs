//! repl command - The interactive loop

use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::engine::Session;
use crate::ui::output::write_prompt;

/// Read lines from stdin until end of input or `exit`.
pub async fn repl(session: Session) -> Result<ExitCode> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    drive(session, stdin, &mut stdout, true).await
}

/// The loop behind [`repl`], over any line source.
///
/// With `interrupts` set, Ctrl-C at the prompt abandons the current line
/// instead of ending the process.
async fn drive<R>(mut session: Session, input: R, out: &mut dyn Write, interrupts: bool) -> Result<ExitCode>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while session.is_running() {
        write_prompt(out, &session.prompt())?;

        let line = if interrupts {
            tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    writeln!(out)?;
                    continue;
                }
            }
        } else {
            lines.next_line().await?
        };

        let Some(line) = line else {
            writeln!(out)?;
            break;
        };
        session.handle_line(&line, out).await?;
    }

    debug!("session ended");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::register_builtins;
    use crate::engine::registry::CommandRegistry;
    use crate::engine::CommandContext;
    use crate::ui::present::{PresentationConfig, Presenter};
    use tempfile::TempDir;

    fn session(dir: &std::path::Path) -> Session {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry).unwrap();
        Session::new(
            registry,
            Presenter::new(PresentationConfig::plain()),
            CommandContext::new(dir),
        )
    }

    async fn transcript(dir: &std::path::Path, input: &str) -> String {
        let mut out = Vec::new();
        drive(session(dir), input.as_bytes(), &mut out, false).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn exit_stops_reading() {
        let temp = TempDir::new().unwrap();
        let text = transcript(temp.path(), "exit\npwd\n").await;
        assert!(text.contains("Goodbye!"));
        assert_eq!(text.matches("> ").count(), 1);
    }

    #[tokio::test]
    async fn cd_changes_prompt() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        let text = transcript(temp.path(), "cd sub\npwd\n").await;
        let sub = temp.path().join("sub").display().to_string();
        assert!(text.contains(&format!("shellx {}> ", sub)));
        assert!(text.contains(&format!("{}\n", sub)));
    }

    #[tokio::test]
    async fn errors_do_not_end_session() {
        let temp = TempDir::new().unwrap();
        let text = transcript(temp.path(), "nope\n:mode compact\n").await;
        assert!(text.contains("Unknown command: nope"));
        assert!(text.contains("Presentation mode set to: compact"));
        assert!(text.contains("[compact] shellx "), "{}", text);
    }
}
