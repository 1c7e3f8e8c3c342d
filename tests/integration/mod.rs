//! Integration test suite for upkeep
//!
//! End-to-end tests of the update core against an in-memory release source,
//! plus CLI behaviour through the compiled `upkeep` binary. None of them
//! reach the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update**: executable replacement, rollback, permission and timeout
//!   handling
//! - **extraction**: source bundle extraction and path safety
//! - **cli**: argument handling and error rendering of the binary

mod cli;
mod extraction;
mod update;
