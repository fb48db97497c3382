//! SSH key resolution

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Where the private key used for authentication comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key from environment
    Env(String),
}

impl KeySource {
    /// Check that the key material is present without reading it
    ///
    /// # Errors
    /// Returns `KeyError::NotFound` for a missing file and
    /// `KeyError::EnvNotSet` for an unset variable
    pub fn ensure_present(&self) -> Result<(), KeyError> {
        match self {
            KeySource::Path(path) => {
                if path.is_file() {
                    Ok(())
                } else {
                    Err(KeyError::NotFound(path.display().to_string()))
                }
            }
            KeySource::Env(var_name) => env::var(var_name)
                .map(|_| ())
                .map_err(|_| KeyError::EnvNotSet(var_name.clone())),
        }
    }

    /// Resolve key source to a path on disk
    ///
    /// For `Env`, decodes base64 and writes to a temp file that is removed
    /// when the returned `ResolvedKey` is dropped.
    ///
    /// # Errors
    /// Returns `KeyError` if key resolution fails (env not set, invalid base64, etc.)
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                if !path.is_file() {
                    return Err(KeyError::NotFound(path.display().to_string()));
                }
                validate_key_permissions(path)?;
                Ok(ResolvedKey::Path(path.clone()))
            }
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;

                let temp_path = write_temp_key(&key_data)?;
                Ok(ResolvedKey::Temp(temp_path))
            }
        }
    }
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Path(path) => write!(f, "{}", path.display()),
            KeySource::Env(var) => write!(f, "${var}"),
        }
    }
}

/// Resolved key location
#[derive(Debug)]
pub enum ResolvedKey {
    /// Path to key file
    Path(PathBuf),
    /// Temporary file (deleted on drop)
    Temp(PathBuf),
}

impl ResolvedKey {
    /// Get path for SSH library
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ResolvedKey::Path(p) | ResolvedKey::Temp(p) => p,
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group and other bits must be clear
    if mode & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

fn write_temp_key(key_data: &[u8]) -> Result<PathBuf, KeyError> {
    use std::fs::OpenOptions;
    use std::io::Write;

    let temp_path = env::temp_dir().join(format!("rekey_ssh_key_{}", std::process::id()));

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&temp_path)?;
    file.write_all(key_data)?;

    debug!(path = %temp_path.display(), "wrote temporary SSH key");

    Ok(temp_path)
}

impl Drop for ResolvedKey {
    fn drop(&mut self) {
        if let ResolvedKey::Temp(path) = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!(path = %path.display(), error = %e, "failed to remove temp key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_file() {
        let source = KeySource::Path(PathBuf::from("/nonexistent/rekey/id_ed25519"));
        assert!(matches!(source.ensure_present(), Err(KeyError::NotFound(_))));
        assert!(matches!(source.resolve(), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_present_key_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = KeySource::Path(file.path().to_path_buf());
        assert!(source.ensure_present().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let source = KeySource::Path(file.path().to_path_buf());
        assert!(matches!(source.resolve(), Err(KeyError::BadPermissions(_))));
    }

    #[test]
    fn test_unset_env_key() {
        let source = KeySource::Env("REKEY_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        assert!(matches!(source.ensure_present(), Err(KeyError::EnvNotSet(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(KeySource::Env("SSH_KEY".into()).to_string(), "$SSH_KEY");
        assert_eq!(
            KeySource::Path(PathBuf::from("/keys/id")).to_string(),
            "/keys/id"
        );
    }
}
