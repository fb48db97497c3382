//! Operator confirmation before a destructive run

use std::io::{BufRead, Write};

use crate::error::CoreError;

/// Text shown before reading the answer
pub const PROMPT: &str = "Continue with update? (yes/no): ";

/// Gate asked once before any host is touched
pub trait Confirm {
    /// `Ok(true)` to proceed with `total` hosts
    ///
    /// # Errors
    /// Returns `CoreError::Io` if the answer cannot be read
    fn confirm(&mut self, total: usize) -> Result<bool, CoreError>;
}

/// Interactive yes/no prompt over any reader and writer
///
/// Only `yes` (case-insensitive, surrounding whitespace ignored) proceeds.
/// End of input counts as a refusal.
pub struct Prompt<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl Prompt<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompt on the process terminal
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, _total: usize) -> Result<bool, CoreError> {
        write!(self.writer, "{PROMPT}")?;
        self.writer.flush()?;

        let mut answer = String::new();
        if self.reader.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        Ok(answer.trim().eq_ignore_ascii_case("yes"))
    }
}

/// Non-interactive approval (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _total: usize) -> Result<bool, CoreError> {
        Ok(true)
    }
}
