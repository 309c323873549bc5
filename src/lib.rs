//! # NCBI Fetcher - Sequence Lookup MCP Server
//!
//! A Model Context Protocol (MCP) server that fetches nucleotide and protein
//! records from NCBI E-utilities. It can be used as a library for
//! programmatic access and as a standalone CLI binary.
//!
//! ## Features
//!
//! - **Sequence Fetching**: FASTA sequences by accession number
//! - **Record Metadata**: GenBank / GenPept flat files by accession number
//! - **Search**: Free-text search with one-line summaries per hit
//! - **Dual Transport**: Support for both STDIO and HTTP (SSE) transports
//!
//! ## Quick Start
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use ncbi_fetcher::{NcbiServer, ServerConfig, TransportType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = NcbiServer::new(ServerConfig::default())?;
//!     server.run(TransportType::Stdio).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Direct Tool Usage
//!
//! ```rust,no_run
//! use ncbi_fetcher::{AccessionResolver, NullSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = AccessionResolver::default();
//!     let fasta = resolver.nucleotide_sequence("NM_000546", &NullSink).await?;
//!     println!("{}", fasta);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`client`]: E-utilities request building and response decoding
//! - [`tools`]: Accession resolver, search summarizer and help text
//! - [`server`]: MCP server implementation with transport handling
//! - [`progress`]: Informational progress sinks handed to tools
//! - [`types`]: Common types, outcomes and schemas

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod progress;
pub mod server;
pub mod tools;
pub mod types;

// Re-export commonly used items at crate root
pub use client::{ClientConfig, EutilsClient};
pub use progress::{BufferedSink, NullSink, ProgressSink, TracingSink};
pub use server::{NcbiServer, ServerConfig, TransportType};
pub use tools::{AccessionResolver, QuerySummarizer};
pub use types::{
    Database, LookupOutcome, LookupRequest, NcbiError, NcbiResult, ReturnFormat, SearchOutcome,
    SummaryOutcome, SummaryRecord,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name for MCP protocol
pub const SERVER_NAME: &str = "ncbi-fetcher";

/// Server description
pub const SERVER_DESCRIPTION: &str = "NCBI Sequence Fetcher";
