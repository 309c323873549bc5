//! E-utilities HTTP client.
//!
//! Builds request URLs from a base address, an endpoint and query
//! parameters, issues a single GET and hands back either parsed JSON or
//! raw text. There is no retry: transport failures and non-success
//! statuses are returned to the caller as errors.

use crate::types::{NcbiError, NcbiResult};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Public E-utilities base address
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Default user agent for requests
const USER_AGENT: &str = concat!("ncbi-fetcher/", env!("CARGO_PKG_VERSION"));

/// E-utilities endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// esearch: term to identifier list
    Search,
    /// efetch: identifiers to record text
    Fetch,
    /// esummary: identifiers to document summaries
    Summary,
}

impl Endpoint {
    /// Path segment appended to the base address
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Search => "esearch.fcgi",
            Endpoint::Fetch => "efetch.fcgi",
            Endpoint::Summary => "esummary.fcgi",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Response mode requested through `retmode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetMode {
    /// Parse the body as JSON
    Json,
    /// Keep the body as text
    Text,
}

impl RetMode {
    fn as_str(&self) -> &'static str {
        match self {
            RetMode::Json => "json",
            RetMode::Text => "text",
        }
    }
}

/// Body of an E-utilities response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON (retmode=json)
    Json(Value),
    /// Raw text (retmode=text)
    Text(String),
}

impl ResponseBody {
    /// Take the JSON body, failing on a text body
    pub fn into_json(self) -> NcbiResult<Value> {
        match self {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(_) => Err(NcbiError::UnexpectedResponse(
                "expected a JSON body".to_string(),
            )),
        }
    }

    /// Take the text body, failing on a JSON body
    pub fn into_text(self) -> NcbiResult<String> {
        match self {
            ResponseBody::Text(text) => Ok(text),
            ResponseBody::Json(_) => Err(NcbiError::UnexpectedResponse(
                "expected a text body".to_string(),
            )),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address the endpoint names are joined to
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at another base address
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Factory for per-operation E-utilities sessions
#[derive(Debug, Clone, Default)]
pub struct EutilsClient {
    config: ClientConfig,
}

impl EutilsClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> NcbiResult<Self> {
        // Fail early on an unusable base address.
        Url::parse(&config.base_url)?;
        Ok(Self { config })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a session for one operation.
    ///
    /// The session owns its own connection pool, which is released when the
    /// session is dropped at the end of the operation.
    pub fn open_session(&self) -> NcbiResult<EutilsSession> {
        let mut builder = Client::builder()
            .user_agent(&self.config.user_agent)
            .gzip(true)
            .brotli(true);

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().map_err(NcbiError::HttpError)?;

        Ok(EutilsSession {
            http,
            base_url: self.config.base_url.clone(),
        })
    }
}

/// Connection scoped to a single operation
#[derive(Debug)]
pub struct EutilsSession {
    http: Client,
    base_url: String,
}

impl EutilsSession {
    /// Build the request URL for an endpoint
    pub fn build_url(
        &self,
        endpoint: Endpoint,
        mode: RetMode,
        params: &[(&str, String)],
    ) -> NcbiResult<Url> {
        let base = self.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, endpoint.path()))?;

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("retmode", mode.as_str());
        }

        Ok(url)
    }

    /// Issue one GET against an endpoint
    #[instrument(skip(self, params), fields(endpoint = %endpoint))]
    pub async fn call(
        &self,
        endpoint: Endpoint,
        mode: RetMode,
        params: &[(&str, String)],
    ) -> NcbiResult<ResponseBody> {
        let url = self.build_url(endpoint, mode, params)?;
        debug!(url = %url, "Sending E-utilities request");

        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!(status = %status, "E-utilities returned non-success status");
            return Err(NcbiError::StatusError {
                endpoint: endpoint.path().to_string(),
                status,
            });
        }

        let text = response.text().await?;

        match mode {
            RetMode::Json => Ok(ResponseBody::Json(serde_json::from_str(&text)?)),
            RetMode::Text => Ok(ResponseBody::Text(text)),
        }
    }

    /// esearch: identifiers matching `term`, in the order returned
    pub async fn search_ids(
        &self,
        database: &str,
        term: &str,
        retmax: Option<usize>,
    ) -> NcbiResult<Vec<String>> {
        let mut params = vec![("db", database.to_string()), ("term", term.to_string())];
        if let Some(retmax) = retmax {
            params.push(("retmax", retmax.to_string()));
        }

        let body = self
            .call(Endpoint::Search, RetMode::Json, &params)
            .await?
            .into_json()?;

        let ids = id_list(&body)?;
        debug!(count = ids.len(), "esearch returned identifiers");
        Ok(ids)
    }

    /// efetch: record text for identifiers in the given `rettype`
    pub async fn fetch_text(
        &self,
        database: &str,
        ids: &[String],
        rettype: &str,
    ) -> NcbiResult<String> {
        let params = [
            ("db", database.to_string()),
            ("id", ids.join(",")),
            ("rettype", rettype.to_string()),
        ];

        self.call(Endpoint::Fetch, RetMode::Text, &params)
            .await?
            .into_text()
    }

    /// esummary: document summaries for identifiers, as raw JSON
    pub async fn summaries(&self, database: &str, ids: &[String]) -> NcbiResult<Value> {
        let params = [("db", database.to_string()), ("id", ids.join(","))];

        self.call(Endpoint::Summary, RetMode::Json, &params)
            .await?
            .into_json()
    }
}

/// Pull `esearchresult.idlist` out of an esearch body.
///
/// A missing result block or list counts as no match.
pub fn id_list(body: &Value) -> NcbiResult<Vec<String>> {
    let Some(list) = body.get("esearchresult").and_then(|r| r.get("idlist")) else {
        return Ok(Vec::new());
    };

    match list {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()),
        other => Err(NcbiError::UnexpectedResponse(format!(
            "idlist is not a list: {}",
            other
        ))),
    }
}
