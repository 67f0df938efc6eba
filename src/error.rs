//! Error types for the install pipeline.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InstallError>;

/// Failures surfaced by the install pipeline.
///
/// Every variant except `ReleaseIndex` aborts an install. `ReleaseIndex` is
/// consumed by the version resolver, which degrades to `latest` instead of
/// failing.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The requested version is neither `latest`, a range, nor a semver
    /// version, or a cache key would not be a single path component.
    #[error("Invalid version: {version}")]
    InvalidVersion { version: String },

    /// Host OS has no release asset.
    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The release asset could not be retrieved.
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// Neither the working directory nor a tool-prefixed subdirectory holds the binary.
    #[error("Could not find the {tool} binary in {}", dir.display())]
    BinaryNotFound { tool: String, dir: PathBuf },

    /// The release index could not be queried.
    #[error("Failed to list releases: {message}")]
    ReleaseIndex { message: String },

    /// Local filesystem failure while staging or caching.
    #[error("I/O {operation} failed for {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub fn download(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn release_index(message: impl ToString) -> Self {
        Self::ReleaseIndex {
            message: message.to_string(),
        }
    }

    pub fn io(operation: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Message reported at the process boundary for failures that are not an [`InstallError`].
pub fn unknown_failure_message(tool: &str) -> String {
    format!("Unknown error occurred during {tool} installation")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = InstallError::UnsupportedPlatform {
            os: "freebsd".into(),
            arch: "x86_64".into(),
        };
        assert_eq!(err.to_string(), "Unsupported platform: freebsd x86_64");

        let err = InstallError::BinaryNotFound {
            tool: "wash".into(),
            dir: PathBuf::from("/tmp/work"),
        };
        assert_eq!(err.to_string(), "Could not find the wash binary in /tmp/work");
    }

    #[test]
    fn invalid_version_names_the_input() {
        let err = InstallError::InvalidVersion {
            version: "../../x".into(),
        };
        assert_eq!(err.to_string(), "Invalid version: ../../x");
    }

    #[test]
    fn unknown_failure_is_fixed() {
        assert_eq!(
            unknown_failure_message("wash"),
            "Unknown error occurred during wash installation"
        );
    }
}
