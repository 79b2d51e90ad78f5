//! ui::output
//!
//! Writing rendered blocks and diagnostics.
//!
//! # Design
//!
//! Rendered output goes to the session's sink (stdout in the binary, a
//! buffer in tests). Diagnostics that are not command output go to stderr
//! so they never mix with rendered Output.

use std::fmt::Display;
use std::io::{self, Write};

/// Write one rendered block followed by a newline.
///
/// Empty blocks print nothing.
pub fn write_block(out: &mut dyn Write, block: &str) -> io::Result<()> {
    if block.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", block)?;
    out.flush()
}

/// Write a prompt without a trailing newline.
pub fn write_prompt(out: &mut dyn Write, prompt: &str) -> io::Result<()> {
    write!(out, "{}", prompt)?;
    out.flush()
}

/// Print an error message to stderr (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_gets_newline() {
        let mut buf = Vec::new();
        write_block(&mut buf, "hello").unwrap();
        assert_eq!(buf, b"hello\n");
    }

    #[test]
    fn empty_block_skipped() {
        let mut buf = Vec::new();
        write_block(&mut buf, "").unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn prompt_has_no_newline() {
        let mut buf = Vec::new();
        write_prompt(&mut buf, "> ").unwrap();
        assert_eq!(buf, b"> ");
    }
}
