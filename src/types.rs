//! Common types and data structures used throughout the fetcher.
//!
//! This module contains all the shared types including:
//! - Database and return format selectors
//! - Tool arguments and their JSON schemas
//! - Lookup, search and summary outcomes
//! - Error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for fetcher operations
pub type NcbiResult<T> = Result<T, NcbiError>;

/// Errors that can occur while talking to E-utilities
#[derive(Error, Debug)]
pub enum NcbiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The remote service answered with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    StatusError {
        /// Endpoint that was called
        endpoint: String,
        /// Status code returned
        status: reqwest::StatusCode,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid arguments provided
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A named NCBI record collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Database {
    /// Nucleotide sequences (default)
    #[default]
    Nucleotide,
    /// Protein sequences
    Protein,
    /// Gene records
    Gene,
    /// Any other name, passed through verbatim (names are case-sensitive)
    Other(String),
}

impl Database {
    /// Entrez `db` parameter value
    pub fn as_str(&self) -> &str {
        match self {
            Database::Nucleotide => "nucleotide",
            Database::Protein => "protein",
            Database::Gene => "gene",
            Database::Other(name) => name,
        }
    }
}

impl From<String> for Database {
    fn from(name: String) -> Self {
        match name.as_str() {
            "nucleotide" => Database::Nucleotide,
            "protein" => Database::Protein,
            "gene" => Database::Gene,
            _ => Database::Other(name),
        }
    }
}

impl From<&str> for Database {
    fn from(name: &str) -> Self {
        Database::from(name.to_string())
    }
}

impl From<Database> for String {
    fn from(db: Database) -> Self {
        db.as_str().to_string()
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Database {
    type Err = NcbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(NcbiError::InvalidArguments(
                "Database name must not be empty".to_string(),
            ));
        }
        Ok(Database::from(trimmed))
    }
}

/// Format of the record text returned by a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFormat {
    /// FASTA sequence text
    Fasta,
    /// GenBank flat file (nucleotide)
    GenBank,
    /// GenPept flat file (protein)
    GenPept,
}

impl ReturnFormat {
    /// Entrez `rettype` parameter value
    pub fn rettype(&self) -> &'static str {
        match self {
            ReturnFormat::Fasta => "fasta",
            ReturnFormat::GenBank => "gb",
            ReturnFormat::GenPept => "gp",
        }
    }

    /// Flat-file metadata format for a database.
    ///
    /// Only `nucleotide` maps to GenBank; every other database gets GenPept.
    pub fn metadata_for(database: &Database) -> Self {
        match database {
            Database::Nucleotide => ReturnFormat::GenBank,
            _ => ReturnFormat::GenPept,
        }
    }
}

/// A single accession lookup, built per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Database to search
    pub database: Database,

    /// Accession (resolver) or free text (search)
    pub accession_or_query: String,

    /// Format of the fetched record
    pub return_format: ReturnFormat,
}

impl LookupRequest {
    /// Create a new lookup request
    pub fn new(
        database: Database,
        accession_or_query: impl Into<String>,
        return_format: ReturnFormat,
    ) -> Self {
        Self {
            database,
            accession_or_query: accession_or_query.into(),
            return_format,
        }
    }

    /// FASTA nucleotide sequence lookup
    pub fn nucleotide_sequence(accession: impl Into<String>) -> Self {
        Self::new(Database::Nucleotide, accession, ReturnFormat::Fasta)
    }

    /// FASTA protein sequence lookup
    pub fn protein_sequence(accession: impl Into<String>) -> Self {
        Self::new(Database::Protein, accession, ReturnFormat::Fasta)
    }

    /// GenBank/GenPept metadata lookup
    pub fn metadata(database: Database, accession: impl Into<String>) -> Self {
        let format = ReturnFormat::metadata_for(&database);
        Self::new(database, accession, format)
    }
}

/// Outcome of resolving an accession and fetching its record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Record text as returned by efetch
    Found(String),
    /// The accession matched no records
    NotFound {
        /// Database that was searched
        database: Database,
        /// Accession that was looked up
        accession: String,
    },
}

impl LookupOutcome {
    /// Whether a record was found
    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }

    /// Text handed back to the host
    pub fn into_text(self) -> String {
        match self {
            LookupOutcome::Found(text) => text,
            not_found => not_found.to_string(),
        }
    }
}

impl std::fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupOutcome::Found(text) => f.write_str(text),
            LookupOutcome::NotFound {
                database,
                accession,
            } => write!(f, "No {} record found for accession {}", database, accession),
        }
    }
}

/// Best-effort summary of one search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Entrez record identifier
    pub id: String,

    /// Accession, or "Unknown" when none could be extracted
    pub accession: String,

    /// Record title
    pub title: String,
}

impl std::fmt::Display for SummaryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ID: {}, Accession: {}, Title: {}",
            self.id, self.accession, self.title
        )
    }
}

/// Per-identifier result of summarization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Summary extracted
    Found(SummaryRecord),
    /// Extraction failed for this identifier only
    Failed {
        /// Identifier that failed
        id: String,
        /// Why it failed
        reason: String,
    },
}

impl SummaryOutcome {
    /// Identifier this outcome belongs to
    pub fn id(&self) -> &str {
        match self {
            SummaryOutcome::Found(record) => &record.id,
            SummaryOutcome::Failed { id, .. } => id,
        }
    }
}

impl std::fmt::Display for SummaryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryOutcome::Found(record) => record.fmt(f),
            SummaryOutcome::Failed { id, reason } => {
                write!(f, "Error processing ID {}: {}", id, reason)
            },
        }
    }
}

/// Outcome of a free-text search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The query matched nothing
    NoResults {
        /// Database that was searched
        database: Database,
        /// Query text
        query: String,
    },
    /// One outcome per identifier, in search order
    Results(Vec<SummaryOutcome>),
}

impl SearchOutcome {
    /// Number of result segments
    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::NoResults { .. } => 0,
            SearchOutcome::Results(outcomes) => outcomes.len(),
        }
    }

    /// Whether the search matched nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchOutcome::NoResults { database, query } => {
                write!(f, "No results found for '{}' in {} database", query, database)
            },
            SearchOutcome::Results(outcomes) => {
                for (i, outcome) in outcomes.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n\n")?;
                    }
                    write!(f, "{}", outcome)?;
                }
                Ok(())
            },
        }
    }
}

/// Arguments for the sequence tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessionArgs {
    /// NCBI accession number
    pub accession: String,
}

/// Arguments for the get_sequence_metadata tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceMetadataArgs {
    /// NCBI accession number
    pub accession: String,

    /// Database holding the record
    #[serde(default)]
    pub db: Database,
}

/// Arguments for the search_ncbi tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchNcbiArgs {
    /// Free-text search term
    pub query: String,

    /// Database to search
    #[serde(default)]
    pub db: Database,
}

/// JSON Schema for an accession-only tool
pub fn accession_args_schema(example: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "accession": {
                "type": "string",
                "description": format!("NCBI accession number (e.g., {})", example)
            }
        },
        "required": ["accession"]
    })
}

/// JSON Schema for get_sequence_metadata arguments
pub fn sequence_metadata_args_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "accession": {
                "type": "string",
                "description": "NCBI accession number"
            },
            "db": {
                "type": "string",
                "description": "Database to search (nucleotide or protein)",
                "default": "nucleotide"
            }
        },
        "required": ["accession"]
    })
}

/// JSON Schema for search_ncbi arguments
pub fn search_ncbi_args_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search term (e.g., \"BRCA1\", \"p53 tumor suppressor\")"
            },
            "db": {
                "type": "string",
                "description": "Database to search (nucleotide, protein, gene, etc.)",
                "default": "nucleotide"
            }
        },
        "required": ["query"]
    })
}

/// JSON Schema for tools without arguments
pub fn empty_args_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_parsing() {
        assert_eq!("nucleotide".parse::<Database>().unwrap(), Database::Nucleotide);
        assert_eq!("protein".parse::<Database>().unwrap(), Database::Protein);
        assert_eq!(" gene ".parse::<Database>().unwrap(), Database::Gene);
        assert_eq!(
            "Nucleotide".parse::<Database>().unwrap(),
            Database::Other("Nucleotide".to_string())
        );
        assert_eq!(
            "taxonomy".parse::<Database>().unwrap(),
            Database::Other("taxonomy".to_string())
        );
        assert!("  ".parse::<Database>().is_err());
    }

    #[test]
    fn test_database_serde() {
        let db: Database = serde_json::from_str("\"protein\"").unwrap();
        assert_eq!(db, Database::Protein);
        assert_eq!(serde_json::to_string(&Database::Gene).unwrap(), "\"gene\"");

        let args: SearchNcbiArgs = serde_json::from_str(r#"{"query": "BRCA1"}"#).unwrap();
        assert_eq!(args.db, Database::Nucleotide);
    }

    #[test]
    fn test_metadata_format() {
        assert_eq!(
            ReturnFormat::metadata_for(&Database::Nucleotide),
            ReturnFormat::GenBank
        );
        assert_eq!(
            ReturnFormat::metadata_for(&Database::Protein),
            ReturnFormat::GenPept
        );
        assert_eq!(
            ReturnFormat::metadata_for(&Database::from("Nucleotide")),
            ReturnFormat::GenPept
        );
        assert_eq!(
            LookupRequest::metadata(Database::Protein, "NP_000537")
                .return_format
                .rettype(),
            "gp"
        );
        assert_eq!(
            LookupRequest::nucleotide_sequence("NM_000546")
                .return_format
                .rettype(),
            "fasta"
        );
    }

    #[test]
    fn test_not_found_text() {
        let outcome = LookupOutcome::NotFound {
            database: Database::Nucleotide,
            accession: "XX999".to_string(),
        };
        assert!(!outcome.is_found());
        assert_eq!(
            outcome.into_text(),
            "No nucleotide record found for accession XX999"
        );
    }

    #[test]
    fn test_search_outcome_rendering() {
        let outcome = SearchOutcome::Results(vec![
            SummaryOutcome::Found(SummaryRecord {
                id: "1".to_string(),
                accession: "NM_000546.6".to_string(),
                title: "TP53".to_string(),
            }),
            SummaryOutcome::Failed {
                id: "2".to_string(),
                reason: "no summary returned".to_string(),
            },
        ]);

        assert_eq!(outcome.len(), 2);
        assert_eq!(
            outcome.to_string(),
            "ID: 1, Accession: NM_000546.6, Title: TP53\n\nError processing ID 2: no summary returned"
        );

        let empty = SearchOutcome::NoResults {
            database: Database::Gene,
            query: "nothing".to_string(),
        };
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "No results found for 'nothing' in gene database");
    }

    #[test]
    fn test_schemas() {
        assert!(accession_args_schema("NM_000546")["properties"]["accession"].is_object());
        assert_eq!(sequence_metadata_args_schema()["required"][0], "accession");
        assert!(search_ncbi_args_schema()["properties"]["query"].is_object());
        assert!(empty_args_schema().is_object());
    }
}
