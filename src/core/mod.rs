//! Core types for upkeep
//!
//! Holds the error taxonomy shared by every module of the update core and the
//! helpers that turn those errors into user-facing messages.
//!
//! ```rust
//! use upkeep_cli::core::{UpkeepError, UpkeepResult};
//!
//! fn require_tool(name: &str) -> UpkeepResult<&str> {
//!     if name.is_empty() {
//!         return Err(UpkeepError::Config {
//!             message: "tool name must not be empty".to_string(),
//!         });
//!     }
//!     Ok(name)
//! }
//!
//! assert!(require_tool("").is_err());
//! ```

pub mod error;

pub use error::{ErrorContext, UpkeepError, UpkeepResult, user_friendly_error};
