//! MCP server implementation for the fetcher.
//!
//! This module provides the core MCP server implementation that handles
//! tool requests and manages communication via STDIO or SSE transports.

use crate::client::{ClientConfig, EutilsClient};
use crate::progress::{BufferedSink, ProgressSink, TracingSink};
use crate::tools::{AccessionResolver, QuerySummarizer, help};
use crate::types::{
    AccessionArgs, NcbiError, NcbiResult, SearchNcbiArgs, SequenceMetadataArgs,
    accession_args_schema, empty_args_schema, search_ncbi_args_schema,
    sequence_metadata_args_schema,
};
use crate::{SERVER_NAME, VERSION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, instrument};

/// MCP Protocol version
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Transport type for the MCP server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportType {
    /// Standard input/output transport
    #[default]
    Stdio,
    /// Server-Sent Events over HTTP
    Sse {
        /// Port to listen on
        port: u16,
        /// Host to bind to
        host: [u8; 4],
    },
}

/// Configuration for the fetcher server
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// E-utilities client configuration
    pub client: ClientConfig,

    /// Whether to enable verbose logging
    pub verbose: bool,
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (None for notifications)
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Whether this message expects no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
            && (self.method == "initialized" || self.method.starts_with("notifications/"))
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Success result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create a tool result carrying text content
    pub fn tool_text(id: Option<Value>, text: String, is_error: bool) -> Self {
        Self::success(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }),
        )
    }

    fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}

/// JSON-RPC 2.0 Notification (server to client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Method parameters
    pub params: Value,
}

impl JsonRpcNotification {
    /// `notifications/message` log entry at info level
    pub fn log_message(message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "notifications/message".to_string(),
            params: json!({
                "level": "info",
                "logger": SERVER_NAME,
                "data": message
            }),
        }
    }
}

/// MCP Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: Option<String>,
    /// JSON Schema for input
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool handler implementation
#[derive(Clone)]
pub struct NcbiHandler {
    /// Accession resolver
    resolver: Arc<AccessionResolver>,

    /// Search summarizer
    summarizer: Arc<QuerySummarizer>,

    /// Initialization state
    initialized: Arc<RwLock<bool>>,
}

impl NcbiHandler {
    /// Create a new handler
    pub fn new(config: ServerConfig) -> NcbiResult<Self> {
        let client = EutilsClient::new(config.client)?;
        Ok(Self {
            resolver: Arc::new(AccessionResolver::new(client.clone())),
            summarizer: Arc::new(QuerySummarizer::new(client)),
            initialized: Arc::new(RwLock::new(false)),
        })
    }

    /// Get server information for initialization
    pub fn get_server_info(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "logging": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": VERSION
            }
        })
    }

    /// Whether `initialize` has been received
    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// List available tools
    pub fn list_tools(&self) -> Vec<McpTool> {
        vec![
            McpTool {
                name: "get_nucleotide_sequence".to_string(),
                description: Some(
                    "Fetch nucleotide sequence from NCBI by accession number. Returns FASTA format sequence data."
                        .to_string(),
                ),
                input_schema: accession_args_schema("NM_000546, NG_005905"),
            },
            McpTool {
                name: "get_protein_sequence".to_string(),
                description: Some(
                    "Fetch protein sequence from NCBI by accession number. Returns FASTA format protein sequence."
                        .to_string(),
                ),
                input_schema: accession_args_schema("NP_000537, P53_HUMAN"),
            },
            McpTool {
                name: "get_sequence_metadata".to_string(),
                description: Some(
                    "Get detailed metadata for a sequence in GenBank (nucleotide) or GenPept (protein) format."
                        .to_string(),
                ),
                input_schema: sequence_metadata_args_schema(),
            },
            McpTool {
                name: "search_ncbi".to_string(),
                description: Some(
                    "Search NCBI databases with a text query. Returns matching accession numbers and descriptions."
                        .to_string(),
                ),
                input_schema: search_ncbi_args_schema(),
            },
            McpTool {
                name: "help".to_string(),
                description: Some(
                    "Get help information about the NCBI Sequence Fetcher tools".to_string(),
                ),
                input_schema: empty_args_schema(),
            },
        ]
    }

    /// Handle a JSON-RPC request, reporting progress to the log
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        self.handle_request_with_sink(request, &TracingSink).await
    }

    /// Handle a JSON-RPC request, reporting progress to `sink`
    pub async fn handle_request_with_sink(
        &self,
        request: JsonRpcRequest,
        sink: &dyn ProgressSink,
    ) -> JsonRpcResponse {
        debug!(method = %request.method, "Handling request");

        match request.method.as_str() {
            "initialize" => {
                let mut initialized = self.initialized.write().await;
                *initialized = true;
                JsonRpcResponse::success(request.id, self.get_server_info())
            },

            "initialized" | "notifications/initialized" => {
                // Notification acknowledgment
                JsonRpcResponse::success(request.id, json!({}))
            },

            "tools/list" => {
                let tools = self.list_tools();
                JsonRpcResponse::success(request.id, json!({ "tools": tools }))
            },

            "tools/call" => {
                let params = match request.params {
                    Some(p) => p,
                    None => {
                        return JsonRpcResponse::error(
                            request.id,
                            -32602,
                            "Missing parameters".to_string(),
                        );
                    },
                };

                let tool_name = params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

                self.call_tool(request.id, tool_name, arguments, sink).await
            },

            "ping" => JsonRpcResponse::success(request.id, json!({})),

            _ => JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    /// Call a specific tool
    #[instrument(skip(self, id, arguments, sink))]
    async fn call_tool(
        &self,
        id: Option<Value>,
        name: &str,
        arguments: Value,
        sink: &dyn ProgressSink,
    ) -> JsonRpcResponse {
        info!(tool = %name, "Executing tool");

        let result = match name {
            "get_nucleotide_sequence" => match parse_args::<AccessionArgs>(name, arguments) {
                Ok(args) => {
                    self.resolver
                        .nucleotide_sequence(&args.accession, sink)
                        .await
                },
                Err(response) => return response.with_id(id),
            },

            "get_protein_sequence" => match parse_args::<AccessionArgs>(name, arguments) {
                Ok(args) => self.resolver.protein_sequence(&args.accession, sink).await,
                Err(response) => return response.with_id(id),
            },

            "get_sequence_metadata" => {
                match parse_args::<SequenceMetadataArgs>(name, arguments) {
                    Ok(args) => {
                        self.resolver
                            .sequence_metadata(&args.accession, &args.db, sink)
                            .await
                    },
                    Err(response) => return response.with_id(id),
                }
            },

            "search_ncbi" => match parse_args::<SearchNcbiArgs>(name, arguments) {
                Ok(args) => self.summarizer.search_ncbi(&args, sink).await,
                Err(response) => return response.with_id(id),
            },

            "help" => Ok(help().to_string()),

            _ => return JsonRpcResponse::error(id, -32601, format!("Unknown tool: {}", name)),
        };

        match result {
            Ok(text) => JsonRpcResponse::tool_text(id, text, false),
            Err(e) => {
                error!(tool = %name, error = %e, "Tool failed");
                JsonRpcResponse::tool_text(id, format!("{} failed: {}", name, e), true)
            },
        }
    }
}

/// Deserialize tool arguments, or build the invalid-params response
fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, JsonRpcResponse> {
    serde_json::from_value(arguments).map_err(|e| {
        JsonRpcResponse::error(
            None,
            -32602,
            format!("Invalid arguments for {}: {}", tool, e),
        )
    })
}

/// Main fetcher MCP server
pub struct NcbiServer {
    handler: NcbiHandler,
}

impl NcbiServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> NcbiResult<Self> {
        let handler = NcbiHandler::new(config)?;
        Ok(Self { handler })
    }

    /// Create a new server with default configuration
    pub fn with_defaults() -> NcbiResult<Self> {
        Self::new(ServerConfig::default())
    }

    /// Request handler used by the transports
    pub fn handler(&self) -> &NcbiHandler {
        &self.handler
    }

    /// Run the server with the specified transport
    #[instrument(skip(self))]
    pub async fn run(self, transport: TransportType) -> NcbiResult<()> {
        info!(
            server = SERVER_NAME,
            version = VERSION,
            "Starting NCBI fetcher MCP server"
        );

        match transport {
            TransportType::Stdio => self.run_stdio().await,
            TransportType::Sse { port, host } => self.run_sse(host, port).await,
        }
    }

    /// Run the server with STDIO transport.
    ///
    /// Each request runs on its own task, so a slow tool call does not hold
    /// up later requests. A request's progress notifications and its
    /// response reach stdout together, in that order.
    async fn run_stdio(self) -> NcbiResult<()> {
        info!("Starting STDIO transport");

        let mut reader = BufReader::new(tokio::io::stdin());
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let writer = tokio::spawn(write_batches(tokio::io::stdout(), rx));

        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            debug!(request = %String::from_utf8_lossy(&line), "Received request");

            // from_slice also rejects input that is not UTF-8
            let request: JsonRpcRequest = match serde_json::from_slice(&line) {
                Ok(r) => r,
                Err(e) => {
                    let error_response =
                        JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e));
                    send_batch(&tx, &[], Some(&error_response));
                    continue;
                },
            };

            let handler = self.handler.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let notification = request.is_notification();
                let sink = BufferedSink::new();
                let response = handler.handle_request_with_sink(request, &sink).await;

                let progress: Vec<JsonRpcNotification> = sink
                    .drain()
                    .iter()
                    .map(|message| JsonRpcNotification::log_message(message))
                    .collect();
                let response = (!notification).then_some(response);

                send_batch(&tx, &progress, response.as_ref());
            });
        }

        // The writer stops once every in-flight request has sent its batch
        drop(tx);
        writer
            .await
            .map_err(|e| NcbiError::ServerError(format!("stdout writer failed: {}", e)))??;

        info!("STDIO server stopped");
        Ok(())
    }

    /// Run the server with SSE transport
    async fn run_sse(self, host: [u8; 4], port: u16) -> NcbiResult<()> {
        use axum::{
            Json, Router,
            extract::State,
            response::sse::{Event, Sse},
            routing::{get, post},
        };
        use futures::stream::{self, Stream};
        use std::convert::Infallible;
        use tower_http::cors::CorsLayer;
        use tower_http::trace::TraceLayer;

        info!(host = ?host, port = port, "Starting SSE transport");

        let handler = Arc::new(self.handler);

        // Health check endpoint
        async fn health() -> &'static str {
            "OK"
        }

        // SSE endpoint for server-to-client messages
        async fn sse_handler() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
            let stream = stream::once(async { Ok(Event::default().data("connected")) });
            Sse::new(stream)
        }

        // JSON-RPC endpoint
        async fn rpc_handler(
            State(handler): State<Arc<NcbiHandler>>,
            Json(request): Json<JsonRpcRequest>,
        ) -> Json<JsonRpcResponse> {
            let response = handler.handle_request(request).await;
            Json(response)
        }

        let app = Router::new()
            .route("/health", get(health))
            .route("/sse", get(sse_handler))
            .route("/rpc", post(rpc_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(handler);

        let addr = std::net::SocketAddr::from((host, port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            NcbiError::ServerError(format!("Failed to bind to {}: {}", addr, e))
        })?;

        info!("SSE server listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| NcbiError::ServerError(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// Serialize notifications then an optional response, one per line
fn encode_batch(
    notifications: &[JsonRpcNotification],
    response: Option<&JsonRpcResponse>,
) -> NcbiResult<Vec<u8>> {
    let mut batch = Vec::new();
    for notification in notifications {
        serde_json::to_writer(&mut batch, notification)?;
        batch.push(b'\n');
    }
    if let Some(response) = response {
        serde_json::to_writer(&mut batch, response)?;
        batch.push(b'\n');
    }
    Ok(batch)
}

fn send_batch(
    tx: &mpsc::UnboundedSender<Vec<u8>>,
    notifications: &[JsonRpcNotification],
    response: Option<&JsonRpcResponse>,
) {
    match encode_batch(notifications, response) {
        Ok(batch) if batch.is_empty() => {},
        Ok(batch) => {
            if tx.send(batch).is_err() {
                error!("stdout writer is gone; dropping message");
            }
        },
        Err(e) => error!(error = %e, "Failed to encode message"),
    }
}

/// Drain batches to `writer` until every sender is dropped
async fn write_batches<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> NcbiResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(batch) = rx.recv().await {
        debug!(response = %String::from_utf8_lossy(&batch), "Sending messages");
        writer.write_all(&batch).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> NcbiHandler {
        NcbiHandler::new(ServerConfig::default()).unwrap()
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert!(!config.verbose);
        assert_eq!(config.client.base_url, crate::client::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_transport_type_default() {
        assert_eq!(TransportType::default(), TransportType::Stdio);
    }

    #[test]
    fn test_handler_rejects_bad_base_url() {
        let config = ServerConfig {
            client: ClientConfig::with_base_url("::not a url::"),
            verbose: false,
        };
        assert!(NcbiHandler::new(config).is_err());
    }

    #[test]
    fn test_list_tools() {
        let tools = handler().list_tools();

        assert_eq!(tools.len(), 5);
        for name in [
            "get_nucleotide_sequence",
            "get_protein_sequence",
            "get_sequence_metadata",
            "search_ncbi",
            "help",
        ] {
            assert!(tools.iter().any(|t| t.name == name), "missing {}", name);
        }
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response =
            JsonRpcResponse::error(Some(json!(1)), -32600, "Invalid request".to_string());
        assert_eq!(response.jsonrpc, "2.0");
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[test]
    fn test_notification_detection() {
        let mut req = request("notifications/initialized", None);
        assert!(!req.is_notification());
        req.id = None;
        assert!(req.is_notification());
        assert!(!JsonRpcRequest { id: None, ..request("tools/list", None) }.is_notification());
    }

    #[test]
    fn test_log_message_notification() {
        let note = JsonRpcNotification::log_message("Fetching");
        assert_eq!(note.method, "notifications/message");
        assert_eq!(note.params["level"], "info");
        assert_eq!(note.params["data"], "Fetching");
    }

    #[test]
    fn test_batch_puts_progress_before_response() {
        let progress = vec![
            JsonRpcNotification::log_message("first"),
            JsonRpcNotification::log_message("second"),
        ];
        let response = JsonRpcResponse::success(Some(json!(3)), json!({}));

        let batch = encode_batch(&progress, Some(&response)).unwrap();
        let lines: Vec<Value> = String::from_utf8(batch)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["params"]["data"], "first");
        assert_eq!(lines[1]["params"]["data"], "second");
        assert_eq!(lines[2]["id"], 3);
    }

    #[test]
    fn test_notification_batch_without_response() {
        assert!(encode_batch(&[], None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_batches_until_senders_drop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let pong = JsonRpcResponse::success(Some(json!(1)), json!({}));
        send_batch(&tx, &[], Some(&pong));
        send_batch(&tx, &[JsonRpcNotification::log_message("late")], None);
        drop(tx);

        let mut out = Vec::new();
        write_batches(&mut out, rx).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":1"));
        assert!(lines[1].contains("late"));
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let handler = handler();
        assert!(!handler.is_initialized().await);

        let response = handler.handle_request(request("initialize", None)).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(handler.is_initialized().await);
    }

    #[tokio::test]
    async fn test_handle_ping() {
        let response = handler().handle_request(request("ping", None)).await;
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_handle_unknown_method() {
        let response = handler().handle_request(request("unknown/method", None)).await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_help_tool_call() {
        let response = handler()
            .handle_request(request("tools/call", Some(json!({"name": "help"}))))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], help());
    }

    #[tokio::test]
    async fn test_tool_call_missing_params() {
        let response = handler().handle_request(request("tools/call", None)).await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tool_call_invalid_arguments() {
        let response = handler()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_protein_sequence", "arguments": {}})),
            ))
            .await;
        assert_eq!(response.id, Some(json!(1)));
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let response = handler()
            .handle_request(request("tools/call", Some(json!({"name": "blast"}))))
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }
}
