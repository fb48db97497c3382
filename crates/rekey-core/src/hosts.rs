//! Host list loading

use std::path::Path;

use tracing::debug;

use crate::error::CoreError;

/// Parse a host list, keeping file order
///
/// Lines are trimmed; empty lines and lines starting with `#` are skipped.
#[must_use]
pub fn parse_hosts(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read and parse the host list at `path`
///
/// # Errors
/// Returns `CoreError::Config` if the file is missing or unreadable
pub fn load_hosts(path: &Path) -> Result<Vec<String>, CoreError> {
    if !path.is_file() {
        return Err(CoreError::Config(format!(
            "host list {} not found",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("cannot read host list {}: {e}", path.display()))
    })?;

    let hosts = parse_hosts(&content);
    debug!(path = %path.display(), count = hosts.len(), "loaded host list");
    Ok(hosts)
}
