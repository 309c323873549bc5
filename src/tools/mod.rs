//! Tool implementations for the fetcher.
//!
//! This module contains the actual implementations of the tools
//! exposed by the MCP server.

pub mod fetch;
pub mod help;
pub mod search;

pub use fetch::*;
pub use help::*;
pub use search::*;
