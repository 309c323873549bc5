//! Accession resolution and record fetching.
//!
//! An accession is first resolved to Entrez identifiers with an
//! accession-scoped esearch, then every identifier is fetched in one
//! efetch call and the record text is returned untouched.

use crate::client::{EutilsClient, EutilsSession};
use crate::progress::ProgressSink;
use crate::types::{Database, LookupOutcome, LookupRequest, NcbiResult};
use tracing::{info, instrument};

/// Resolves accessions and fetches their records
#[derive(Debug, Clone, Default)]
pub struct AccessionResolver {
    client: EutilsClient,
}

impl AccessionResolver {
    /// Create a new resolver over the given client
    pub fn new(client: EutilsClient) -> Self {
        Self { client }
    }

    /// Resolve an accession and fetch its record in the requested format.
    ///
    /// No match is reported as [`LookupOutcome::NotFound`] and no fetch is
    /// issued. When the search yields several identifiers they are all
    /// fetched together and the service concatenates the records.
    #[instrument(
        skip(self),
        fields(db = %request.database, accession = %request.accession_or_query)
    )]
    pub async fn resolve_and_fetch(&self, request: &LookupRequest) -> NcbiResult<LookupOutcome> {
        let session = self.client.open_session()?;
        resolve_with_session(&session, request).await
    }

    /// FASTA nucleotide sequence for an accession
    pub async fn nucleotide_sequence(
        &self,
        accession: &str,
        sink: &dyn ProgressSink,
    ) -> NcbiResult<String> {
        sink.info(&format!(
            "Fetching nucleotide sequence for accession: {}",
            accession
        ));
        let outcome = self
            .resolve_and_fetch(&LookupRequest::nucleotide_sequence(accession))
            .await?;
        Ok(outcome.into_text())
    }

    /// FASTA protein sequence for an accession
    pub async fn protein_sequence(
        &self,
        accession: &str,
        sink: &dyn ProgressSink,
    ) -> NcbiResult<String> {
        sink.info(&format!(
            "Fetching protein sequence for accession: {}",
            accession
        ));
        let outcome = self
            .resolve_and_fetch(&LookupRequest::protein_sequence(accession))
            .await?;
        Ok(outcome.into_text())
    }

    /// GenBank (nucleotide) or GenPept (anything else) record for an accession
    pub async fn sequence_metadata(
        &self,
        accession: &str,
        database: &Database,
        sink: &dyn ProgressSink,
    ) -> NcbiResult<String> {
        sink.info(&format!(
            "Fetching metadata for {} accession: {}",
            database, accession
        ));
        let outcome = self
            .resolve_and_fetch(&LookupRequest::metadata(database.clone(), accession))
            .await?;
        Ok(outcome.into_text())
    }
}

async fn resolve_with_session(
    session: &EutilsSession,
    request: &LookupRequest,
) -> NcbiResult<LookupOutcome> {
    let db = request.database.as_str();
    let term = accession_term(&request.accession_or_query);

    let ids = session.search_ids(db, &term, None).await?;

    if ids.is_empty() {
        info!(term = %term, "No records matched accession");
        return Ok(LookupOutcome::NotFound {
            database: request.database.clone(),
            accession: request.accession_or_query.clone(),
        });
    }

    let text = session
        .fetch_text(db, &ids, request.return_format.rettype())
        .await?;

    info!(ids = ids.len(), bytes = text.len(), "Record fetched");

    Ok(LookupOutcome::Found(text))
}

/// Search term restricting a match to the accession field
pub fn accession_term(accession: &str) -> String {
    format!("{}[accn]", accession)
}

/// Resolve and fetch against the public E-utilities service
///
/// # Example
///
/// ```rust,no_run
/// use ncbi_fetcher::{LookupRequest, tools::fetch::fetch_record};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let outcome = fetch_record(&LookupRequest::nucleotide_sequence("NM_000546")).await?;
///     println!("{}", outcome);
///     Ok(())
/// }
/// ```
pub async fn fetch_record(request: &LookupRequest) -> NcbiResult<LookupOutcome> {
    AccessionResolver::default().resolve_and_fetch(request).await
}
