//! netpharm Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Adapters for the external bioinformatics services used by the pipeline.
//!
//! # Supported Services
//!
//! - **PubChem**: compound identity and molecular attributes
//! - **Reactome**: pathway search, lookup and member proteins
//! - **STRING**: protein-protein association networks
//! - **g:Profiler**: functional enrichment (GO, KEGG, Reactome)
//! - **UniProt / AlphaFold DB**: accessions and predicted structures
//!
//! Each client implements one of the traits in [`sources`] and shares the
//! retrying HTTP client from [`http`].
//!
//! # Example
//!
//! ```no_run
//! use netpharm_ingest::http::{RetryPolicy, ServiceClient};
//! use netpharm_ingest::reactome::{ReactomeClient, DEFAULT_SPECIES};
//! use netpharm_ingest::sources::PathwaySource;
//! use netpharm_ingest::endpoints::REACTOME_BASE_URL;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> netpharm_common::Result<()> {
//!     let http = ServiceClient::new("Reactome", Duration::from_secs(30), RetryPolicy::default())?;
//!     let reactome = ReactomeClient::new(http, REACTOME_BASE_URL, DEFAULT_SPECIES);
//!     for pathway in reactome.search("apoptosis").await?.iter().take(5) {
//!         println!("{} {}", pathway.id, pathway.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod alphafold;
pub mod endpoints;
pub mod gprofiler;
pub mod http;
pub mod pubchem;
pub mod reactome;
pub mod sources;
pub mod string_db;

pub use http::{RetryPolicy, ServiceClient};
pub use sources::{CompoundSource, EnrichmentSource, InteractionSource, PathwaySource, StructureSource};
