//! Error handling for upkeep
//!
//! This module provides the error taxonomy of the update core and the
//! user-facing rendering of those errors. Like the rest of the crate it is
//! built around two ideas:
//! 1. **Strongly-typed errors** so callers can tell a harmless "rolled back"
//!    apart from a corrupted executable
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Severity
//!
//! Variants are ordered roughly by how destructive the failure is:
//!
//! - [`UpkeepError::VersionParse`], [`UpkeepError::InvalidRepository`] and
//!   [`UpkeepError::PermissionDenied`] abort before anything is written.
//! - [`UpkeepError::Fetch`], [`UpkeepError::Timeout`] and
//!   [`UpkeepError::AssetNotFound`] abort before anything is written and may
//!   be retried by the caller.
//! - [`UpkeepError::Apply`] means the swap failed and a rollback was attempted.
//! - [`UpkeepError::Rollback`] means the rollback failed as well. The executable
//!   may be missing or corrupted and the user must reinstall by hand.
//! - [`UpkeepError::Extraction`] reports a partially extracted bundle together
//!   with the last path that was written successfully.
//!
//! Skipping an unsafe archive entry is not an error; see
//! [`crate::archive::paths::Resolution`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use upkeep_cli::core::{UpkeepError, user_friendly_error};
//!
//! let error = UpkeepError::AssetNotFound {
//!     tool: "nuclei".to_string(),
//!     os: "linux".to_string(),
//!     arch: "riscv64".to_string(),
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The main error type for upkeep operations
///
/// Every fallible operation of the update core returns this type (through
/// [`UpkeepResult`]). The CLI layer wraps it in [`anyhow::Error`] and renders
/// it with [`user_friendly_error`].
#[derive(Error, Debug)]
pub enum UpkeepError {
    /// A version string could not be parsed as a semantic version
    ///
    /// Fatal to the update attempt: without a valid ordering there is no safe
    /// way to decide whether the running binary is outdated.
    #[error("Invalid semantic version '{input}': {reason}")]
    VersionParse {
        /// The offending version string
        input: String,
        /// Parser diagnostic
        reason: String,
    },

    /// A repository identifier could not be understood
    #[error("Invalid repository identifier '{identifier}': {reason}")]
    InvalidRepository {
        /// The identifier as supplied by the caller
        identifier: String,
        /// Why it was rejected
        reason: String,
    },

    /// The release source could not be reached or returned no release
    #[error("Failed to {operation}: {reason}")]
    Fetch {
        /// What was being fetched (e.g. "fetch latest release of owner/repo")
        operation: String,
        /// Transport or API diagnostic
        reason: String,
    },

    /// A network operation exceeded its configured timeout
    #[error("Timed out after {timeout:?} while trying to {operation}")]
    Timeout {
        /// What was being attempted
        operation: String,
        /// The timeout that expired
        timeout: Duration,
    },

    /// No release asset matches the running platform
    #[error("No release asset of '{tool}' found for {os}/{arch}")]
    AssetNotFound {
        /// Tool name the asset was searched for
        tool: String,
        /// Target operating system (canonical name)
        os: String,
        /// Target architecture (canonical name)
        arch: String,
    },

    /// The selected asset does not contain the expected executable
    #[error("Executable '{executable}' not found in release asset '{asset}'")]
    ExecutableNotFound {
        /// Executable file name that was searched for
        executable: String,
        /// Name of the asset that was searched
        asset: String,
    },

    /// An asset or source archive could not be read
    #[error("Failed to read archive '{name}': {reason}")]
    Archive {
        /// Asset or archive name
        name: String,
        /// Decoder diagnostic
        reason: String,
    },

    /// The executable location is not writable
    ///
    /// Raised before anything is downloaded or written.
    #[error("Insufficient permissions to update '{path}': {reason}")]
    PermissionDenied {
        /// Path of the executable (or its directory)
        path: String,
        /// OS diagnostic
        reason: String,
    },

    /// Writing or swapping the new executable failed
    ///
    /// The orchestrator attempts a rollback before reporting this error.
    #[error("Failed to apply update to '{path}': {reason}")]
    Apply {
        /// Path of the executable being replaced
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Restoring the previous executable failed after an apply failure
    ///
    /// This is the most severe error: the executable may be missing or
    /// corrupted and manual reinstallation is required.
    #[error(
        "Rollback of '{path}' failed ({reason}) after update failure ({apply_error}); the executable may be corrupted"
    )]
    Rollback {
        /// Path of the executable
        path: String,
        /// The apply failure that triggered the rollback
        apply_error: String,
        /// Why the rollback failed
        reason: String,
    },

    /// Extraction of a bundle stopped part way through
    #[error("Extraction failed at '{path}': {reason}{}", last_written_suffix(.last_written))]
    Extraction {
        /// Entry or destination path that failed
        path: String,
        /// Last file that was written successfully, if any
        last_written: Option<PathBuf>,
        /// What went wrong
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

fn last_written_suffix(last_written: &Option<PathBuf>) -> String {
    match last_written {
        Some(path) => format!(" (last written: {})", path.display()),
        None => " (nothing written)".to_string(),
    }
}

/// Result alias used by the update core.
pub type UpkeepResult<T> = std::result::Result<T, UpkeepError>;

impl UpkeepError {
    /// Whether this error leaves the executable in an unknown state.
    #[must_use]
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Rollback { .. })
    }

    pub(crate) fn fetch(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn apply(path: &Path, reason: impl fmt::Display) -> Self {
        Self::Apply {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn permission(path: &Path, reason: impl fmt::Display) -> Self {
        Self::PermissionDenied {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn archive(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Archive {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl Clone for UpkeepError {
    fn clone(&self) -> Self {
        match self {
            Self::VersionParse {
                input,
                reason,
            } => Self::VersionParse {
                input: input.clone(),
                reason: reason.clone(),
            },
            Self::InvalidRepository {
                identifier,
                reason,
            } => Self::InvalidRepository {
                identifier: identifier.clone(),
                reason: reason.clone(),
            },
            Self::Fetch {
                operation,
                reason,
            } => Self::Fetch {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::Timeout {
                operation,
                timeout,
            } => Self::Timeout {
                operation: operation.clone(),
                timeout: *timeout,
            },
            Self::AssetNotFound {
                tool,
                os,
                arch,
            } => Self::AssetNotFound {
                tool: tool.clone(),
                os: os.clone(),
                arch: arch.clone(),
            },
            Self::ExecutableNotFound {
                executable,
                asset,
            } => Self::ExecutableNotFound {
                executable: executable.clone(),
                asset: asset.clone(),
            },
            Self::Archive {
                name,
                reason,
            } => Self::Archive {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::PermissionDenied {
                path,
                reason,
            } => Self::PermissionDenied {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::Apply {
                path,
                reason,
            } => Self::Apply {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::Rollback {
                path,
                apply_error,
                reason,
            } => Self::Rollback {
                path: path.clone(),
                apply_error: apply_error.clone(),
                reason: reason.clone(),
            },
            Self::Extraction {
                path,
                last_written,
                reason,
            } => Self::Extraction {
                path: path.clone(),
                last_written: last_written.clone(),
                reason: reason.clone(),
            },
            Self::Config {
                message,
            } => Self::Config {
                message: message.clone(),
            },
            // io::Error is not Clone, keep its rendering
            Self::Io(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps an [`UpkeepError`] and adds an optional suggestion and
/// details. When displayed, errors show:
/// 1. **Error**: the main error message in red
/// 2. **Details**: additional context in yellow (optional)
/// 3. **Suggestion**: actionable steps in green (optional)
///
/// # Examples
///
/// ```rust,no_run
/// use upkeep_cli::core::{ErrorContext, UpkeepError};
///
/// let context = ErrorContext::new(UpkeepError::Config {
///     message: "download_timeout_secs must be positive".to_string(),
/// })
/// .with_suggestion("Edit ~/.upkeep/config.toml");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpkeepError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpkeepError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// Unrecoverable errors get a bold banner so they cannot be mistaken for
    /// an ordinary failed update.
    pub fn display(&self) {
        if self.error.is_unrecoverable() {
            eprintln!("{}", "fatal: manual intervention required".red().bold().underline());
        }

        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`UpkeepError`] (anywhere in the error chain), [`std::io::Error`]
/// and [`toml::de::Error`]; everything else is rendered with its full cause
/// chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(upkeep_error) = cause.downcast_ref::<UpkeepError>() {
            return create_error_context(upkeep_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpkeepError::PermissionDenied {
            path: "unknown".to_string(),
            reason: io_error.to_string(),
        })
        .with_suggestion(
            "Run with elevated permissions (sudo/Administrator) or move the executable to a user-writable directory",
        );
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpkeepError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your upkeep configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpkeepError::Other {
        message,
    })
}

fn create_error_context(error: UpkeepError) -> ErrorContext {
    match &error {
        UpkeepError::VersionParse { .. } => ErrorContext::new(error)
            .with_suggestion("Use a semantic version such as '1.4.2' or 'v1.4.2'")
            .with_details("Both the running version and the release tag must be valid semantic versions"),

        UpkeepError::InvalidRepository { .. } => ErrorContext::new(error)
            .with_suggestion("Pass the repository as 'name' or 'owner/name'"),

        UpkeepError::Fetch { .. } => ErrorContext::new(error)
            .with_suggestion("Check your internet connection and that the repository has a published release. Set GITHUB_TOKEN if you are rate limited")
            .with_details("Nothing was modified; it is safe to retry"),

        UpkeepError::Timeout { .. } => ErrorContext::new(error)
            .with_suggestion("Retry on a faster connection or raise the timeout in the upkeep configuration")
            .with_details("Nothing was modified; it is safe to retry"),

        UpkeepError::AssetNotFound { os, arch, .. } => {
            let suggestion = format!(
                "No build is published for {os}/{arch}. Install the tool from source or ask the maintainers for a {os}/{arch} release"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        UpkeepError::ExecutableNotFound { .. } | UpkeepError::Archive { .. } => {
            ErrorContext::new(error)
                .with_suggestion("The release asset has an unexpected layout; report this to the tool maintainers")
        }

        UpkeepError::PermissionDenied { .. } => ErrorContext::new(error)
            .with_suggestion("Run with elevated permissions (sudo/Administrator) or move the executable to a user-writable directory")
            .with_details("The permission check runs before any download, so the executable was not modified"),

        UpkeepError::Apply { .. } => ErrorContext::new(error)
            .with_suggestion("The previous version was restored. Retry the update, or reinstall the tool manually")
            .with_details("The new executable could not be put in place"),

        UpkeepError::Rollback { path, .. } => {
            let suggestion = format!("Reinstall the tool manually; '{path}' may be missing or corrupted");
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("Both the update and the restoration of the previous executable failed")
        }

        UpkeepError::Extraction { .. } => ErrorContext::new(error)
            .with_suggestion("Fix the reported problem and re-run the extraction; files written before the failure were kept")
            .with_details("Extraction is not transactional: earlier entries remain on disk"),

        UpkeepError::Config { .. } => ErrorContext::new(error)
            .with_suggestion("Check your upkeep configuration file"),

        UpkeepError::Io(_) | UpkeepError::Other { .. } => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_is_unrecoverable() {
        let rollback = UpkeepError::Rollback {
            path: "/usr/local/bin/tool".to_string(),
            apply_error: "rename failed".to_string(),
            reason: "backup missing".to_string(),
        };
        assert!(rollback.is_unrecoverable());

        let apply = UpkeepError::Apply {
            path: "/usr/local/bin/tool".to_string(),
            reason: "rename failed".to_string(),
        };
        assert!(!apply.is_unrecoverable());
    }

    #[test]
    fn test_extraction_message_names_last_written() {
        let error = UpkeepError::Extraction {
            path: "bundle/http/cve.yaml".to_string(),
            last_written: Some(PathBuf::from("/tmp/templates/dns/a.yaml")),
            reason: "disk full".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("last written: /tmp/templates/dns/a.yaml"));

        let error = UpkeepError::Extraction {
            path: "bundle/a.yaml".to_string(),
            last_written: None,
            reason: "disk full".to_string(),
        };
        assert!(error.to_string().contains("nothing written"));
    }

    #[test]
    fn test_user_friendly_error_finds_wrapped_upkeep_error() {
        let error = anyhow::Error::from(UpkeepError::AssetNotFound {
            tool: "tool".to_string(),
            os: "linux".to_string(),
            arch: "arm64".to_string(),
        })
        .context("update failed");

        let context = user_friendly_error(error);
        assert!(matches!(context.error, UpkeepError::AssetNotFound { .. }));
        assert!(context.suggestion.unwrap().contains("linux/arm64"));
    }

    #[test]
    fn test_rollback_context_asks_for_manual_reinstall() {
        let error = anyhow::Error::from(UpkeepError::Rollback {
            path: "/opt/tool".to_string(),
            apply_error: "swap failed".to_string(),
            reason: "backup unreadable".to_string(),
        });
        let rendered = user_friendly_error(error).to_string();
        assert!(rendered.contains("Reinstall the tool manually"));
    }

    #[test]
    fn test_generic_error_includes_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let context = user_friendly_error(error);
        let rendered = context.to_string();
        assert!(rendered.contains("outer"));
        assert!(rendered.contains("Caused by"));
    }
}
