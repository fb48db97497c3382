//! Shell quoting and host identifier validation
//!
//! Remote commands go through the login shell on the far side, so every
//! path and value is wrapped with [`shell_quote`] before interpolation.

use crate::error::ExecError;

/// Quote a string as a single POSIX shell word
///
/// Wraps in single quotes and rewrites embedded `'` as `'\''`.
#[must_use]
pub fn shell_quote(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('\'');
    for c in raw.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Validate a host identifier before it is used for a connection
///
/// Allows ASCII alphanumerics and `.`, `-`, `_`, `:` (IPv6). Rejects empty
/// values and a leading `-`, which `ssh`-style tools would read as an option.
///
/// # Errors
/// Returns `ExecError::InvalidTarget` naming the offending host
pub fn validate_host(host: &str) -> Result<(), ExecError> {
    if host.is_empty() {
        return Err(ExecError::InvalidTarget("empty host".to_string()));
    }
    if host.starts_with('-') {
        return Err(ExecError::InvalidTarget(format!(
            "host may not start with '-': {host:?}"
        )));
    }
    if let Some(bad) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')))
    {
        return Err(ExecError::InvalidTarget(format!(
            "illegal character {bad:?} in host {host:?}"
        )));
    }
    Ok(())
}
