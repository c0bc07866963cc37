//! netpharm Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the netpharm workspace.
//!
//! - **Error Handling**: the pipeline error taxonomy ([`NetpharmError`])
//! - **Types**: gene symbols, compounds, targets, pathways, interactions,
//!   enrichment terms and docking records
//! - **Checksums**: artifact integrity verification used on resume
//! - **Logging**: `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use netpharm_common::{GeneSymbol, Result};
//! use netpharm_common::checksum::compute_file_checksum;
//!
//! fn fingerprint(path: &str) -> Result<String> {
//!     let _gene = GeneSymbol::new("egfr")?;
//!     compute_file_checksum(path)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{NetpharmError, Result};
pub use types::GeneSymbol;
