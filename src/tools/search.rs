//! Free-text search with one-line summaries.
//!
//! A query is resolved to at most [`MAX_SEARCH_RESULTS`] identifiers, the
//! summaries for all of them are fetched in one esummary call, and an
//! accession and title are pulled out of each summary on a best-effort
//! basis. A summary that cannot be read only spoils its own line.

use crate::client::EutilsClient;
use crate::progress::ProgressSink;
use crate::types::{
    Database, NcbiResult, SearchNcbiArgs, SearchOutcome, SummaryOutcome, SummaryRecord,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

/// Cap on identifiers requested from esearch
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Accession used when none can be extracted
pub const UNKNOWN_ACCESSION: &str = "Unknown";

/// Title used when a summary has none
pub const DEFAULT_TITLE: &str = "No title available";

lazy_static! {
    /// Leading accession shape: 1-3 capitals, optional underscore, digits
    static ref ACCESSION_PATTERN: Regex = Regex::new(r"^[A-Z]{1,3}_?[0-9]+").unwrap();
}

type FieldValidator = fn(&str) -> bool;

/// Fields tried, in order, when no versioned accession is present
const ACCESSION_FALLBACKS: &[(&str, FieldValidator)] = &[
    ("caption", looks_like_accession),
    ("title", looks_like_accession),
    ("accession", looks_like_accession),
];

/// Runs searches and summarizes their hits
#[derive(Debug, Clone, Default)]
pub struct QuerySummarizer {
    client: EutilsClient,
}

impl QuerySummarizer {
    /// Create a new summarizer over the given client
    pub fn new(client: EutilsClient) -> Self {
        Self { client }
    }

    /// Search `database` for `query` and summarize each hit
    #[instrument(skip(self), fields(db = %database))]
    pub async fn search(&self, database: &Database, query: &str) -> NcbiResult<SearchOutcome> {
        let session = self.client.open_session()?;
        let db = database.as_str();

        let ids = session
            .search_ids(db, query, Some(MAX_SEARCH_RESULTS))
            .await?;

        if ids.is_empty() {
            info!("Search returned no identifiers");
            return Ok(SearchOutcome::NoResults {
                database: database.clone(),
                query: query.to_string(),
            });
        }

        let summary = session.summaries(db, &ids).await?;
        let outcomes = summarize_all(&summary, &ids);

        info!(result_count = outcomes.len(), "Search completed");

        Ok(SearchOutcome::Results(outcomes))
    }

    /// The search_ncbi tool: search and render as text
    pub async fn search_ncbi(
        &self,
        args: &SearchNcbiArgs,
        sink: &dyn ProgressSink,
    ) -> NcbiResult<String> {
        sink.info(&format!(
            "Searching NCBI {} database for: {}",
            args.db, args.query
        ));
        let outcome = self.search(&args.db, &args.query).await?;
        Ok(outcome.to_string())
    }
}

/// Summarize every identifier, keeping the identifier order
pub fn summarize_all(summary: &Value, ids: &[String]) -> Vec<SummaryOutcome> {
    ids.iter()
        .map(|id| match summarize_one(summary, id) {
            Ok(record) => SummaryOutcome::Found(record),
            Err(reason) => {
                warn!(id = %id, reason = %reason, "Could not summarize record");
                SummaryOutcome::Failed {
                    id: id.clone(),
                    reason,
                }
            },
        })
        .collect()
}

/// Summarize a single identifier from an esummary body
pub fn summarize_one(summary: &Value, id: &str) -> Result<SummaryRecord, String> {
    let result = summary
        .get("result")
        .ok_or_else(|| "summary response has no 'result' object".to_string())?;

    let doc = result
        .get(id)
        .ok_or_else(|| "no summary returned".to_string())?
        .as_object()
        .ok_or_else(|| "summary entry is not an object".to_string())?;

    let title = doc
        .get("title")
        .map(value_text)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    Ok(SummaryRecord {
        id: id.to_string(),
        accession: extract_accession(doc),
        title,
    })
}

/// Best-effort accession for a document summary.
///
/// Prefers the first `content` entry of a list-valued `accessionversion`,
/// then the first fallback field whose text looks like an accession.
pub fn extract_accession(doc: &Map<String, Value>) -> String {
    versioned_accession(doc)
        .or_else(|| fallback_accession(doc))
        .unwrap_or_else(|| UNKNOWN_ACCESSION.to_string())
}

fn versioned_accession(doc: &Map<String, Value>) -> Option<String> {
    doc.get("accessionversion")?
        .as_array()?
        .iter()
        .find_map(|item| item.as_object()?.get("content"))
        .filter(|content| is_present(content))
        .map(value_text)
        .filter(|acc| acc != UNKNOWN_ACCESSION)
}

/// Null, false, zero and empty values count as absent
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn fallback_accession(doc: &Map<String, Value>) -> Option<String> {
    ACCESSION_FALLBACKS.iter().find_map(|(field, is_valid)| {
        doc.get(*field)
            .and_then(Value::as_str)
            .filter(|candidate| is_valid(candidate))
            .map(str::to_string)
    })
}

/// Whether text starts with something shaped like an accession
pub fn looks_like_accession(candidate: &str) -> bool {
    ACCESSION_PATTERN.is_match(candidate)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Search the public E-utilities service
///
/// # Example
///
/// ```rust,no_run
/// use ncbi_fetcher::{Database, tools::search::perform_search};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let outcome = perform_search(&Database::Nucleotide, "BRCA1").await?;
///     println!("{}", outcome);
///     Ok(())
/// }
/// ```
pub async fn perform_search(database: &Database, query: &str) -> NcbiResult<SearchOutcome> {
    QuerySummarizer::default().search(database, query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_looks_like_accession() {
        assert!(looks_like_accession("NM_000546"));
        assert!(looks_like_accession("NM_000546.6"));
        assert!(looks_like_accession("U12345"));
        assert!(looks_like_accession("ABC123 trailing text"));
        assert!(!looks_like_accession("ABCD123"));
        assert!(!looks_like_accession("nm_000546"));
        assert!(!looks_like_accession("Homo sapiens tumor protein p53"));
        assert!(!looks_like_accession(""));
    }

    #[test]
    fn test_versioned_accession_preferred() {
        let summary = doc(json!({
            "accessionversion": ["plain", {"content": "NM_000546.6"}, {"content": "NM_1.1"}],
            "caption": "NM_000546"
        }));
        assert_eq!(extract_accession(&summary), "NM_000546.6");
    }

    #[test]
    fn test_caption_fallback() {
        let summary = doc(json!({
            "caption": "NM_000546",
            "title": "Homo sapiens tumor protein p53 (TP53)"
        }));
        assert_eq!(extract_accession(&summary), "NM_000546");
    }

    #[test]
    fn test_string_accessionversion_falls_back() {
        let summary = doc(json!({
            "accessionversion": "NM_000546.6",
            "caption": "lowercase",
            "title": "Homo sapiens",
            "accession": "XP_12345"
        }));
        assert_eq!(extract_accession(&summary), "XP_12345");
    }

    #[test]
    fn test_empty_content_falls_back() {
        let summary = doc(json!({
            "accessionversion": [{"content": ""}],
            "title": "AB123 partial cds"
        }));
        assert_eq!(extract_accession(&summary), "AB123 partial cds");
    }

    #[test]
    fn test_falsy_content_falls_back() {
        for content in [json!(null), json!(0), json!(false), json!([])] {
            let summary = doc(json!({
                "accessionversion": [{"content": content}],
                "caption": "NM_000546"
            }));
            assert_eq!(extract_accession(&summary), "NM_000546");
        }
    }

    #[test]
    fn test_unknown_accession() {
        let summary = doc(json!({"title": "Homo sapiens", "caption": 42}));
        assert_eq!(extract_accession(&summary), UNKNOWN_ACCESSION);
    }

    #[test]
    fn test_summarize_one() {
        let summary = json!({
            "result": {
                "uids": ["1"],
                "1": {"caption": "NM_000546", "title": "TP53 mRNA"}
            }
        });
        let record = summarize_one(&summary, "1").unwrap();
        assert_eq!(record.accession, "NM_000546");
        assert_eq!(record.title, "TP53 mRNA");

        let untitled = json!({"result": {"2": {}}});
        assert_eq!(summarize_one(&untitled, "2").unwrap().title, DEFAULT_TITLE);
    }

    #[test]
    fn test_summarize_all_isolates_failures() {
        let summary = json!({
            "result": {
                "1": {"caption": "NM_000546", "title": "first"},
                "2": "not an object",
                "4": {"caption": "NP_000537", "title": "fourth"}
            }
        });
        let ids: Vec<String> = ["1", "2", "3", "4"].iter().map(|s| s.to_string()).collect();
        let outcomes = summarize_all(&summary, &ids);

        assert_eq!(outcomes.len(), 4);
        let order: Vec<&str> = outcomes.iter().map(|o| o.id()).collect();
        assert_eq!(order, vec!["1", "2", "3", "4"]);
        assert!(matches!(outcomes[0], SummaryOutcome::Found(_)));
        assert!(matches!(outcomes[1], SummaryOutcome::Failed { .. }));
        assert!(matches!(outcomes[2], SummaryOutcome::Failed { .. }));
        assert!(outcomes[2].to_string().starts_with("Error processing ID 3"));
        assert_eq!(
            outcomes[3].to_string(),
            "ID: 4, Accession: NP_000537, Title: fourth"
        );
    }

    #[test]
    fn test_missing_result_fails_every_id() {
        let ids = vec!["7".to_string(), "8".to_string()];
        let outcomes = summarize_all(&json!({"header": {}}), &ids);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, SummaryOutcome::Failed { .. }))
        );
    }
}
