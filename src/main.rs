//! NCBI Fetcher CLI - Sequence Lookup MCP Server
//!
//! A command-line interface for the NCBI fetcher MCP server.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ncbi_fetcher::{
    AccessionResolver, ClientConfig, Database, EutilsClient, LookupRequest, NcbiResult,
    ProgressSink, QuerySummarizer, SERVER_DESCRIPTION, SERVER_NAME, SearchOutcome,
    SummaryOutcome, TracingSink, VERSION,
    client::DEFAULT_BASE_URL,
    server::{NcbiServer, ServerConfig, TransportType},
    tools::help,
    types::NcbiError,
};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

/// NCBI Fetcher - Sequence Lookup MCP Server
#[derive(Parser, Debug)]
#[command(
    name = "ncbi-fetcher",
    version = VERSION,
    about = "An MCP server for fetching sequences and metadata from NCBI",
    long_about = "ncbi-fetcher is a Model Context Protocol (MCP) server over NCBI E-utilities.\n\n\
                  It can be used as:\n\
                  - An MCP server (STDIO or SSE transport)\n\
                  - A CLI tool for direct sequence lookups and searches",
    disable_help_subcommand = true
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable all logging output (useful for stdio transport)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// E-utilities base URL
    #[arg(long, global = true, env = "NCBI_EUTILS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds (transport default when unset)
    #[arg(long, global = true, env = "NCBI_EUTILS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Pretty-printed human-readable output
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// Compact JSON output
    JsonCompact,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server
    Serve {
        /// Transport type to use
        #[arg(short, long, default_value = "stdio")]
        transport: TransportOption,

        /// Port for SSE transport (only used with --transport sse)
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to for SSE transport
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Fetch a nucleotide sequence in FASTA format
    Nucleotide {
        /// Accession number (e.g. NM_000546)
        accession: String,
    },

    /// Fetch a protein sequence in FASTA format
    Protein {
        /// Accession number (e.g. NP_000537)
        accession: String,
    },

    /// Fetch a GenBank/GenPept record
    Metadata {
        /// Accession number
        accession: String,

        /// Database holding the record
        #[arg(short, long, default_value = "nucleotide")]
        db: Database,
    },

    /// Search an NCBI database
    Search {
        /// Search query
        query: String,

        /// Database to search
        #[arg(short, long, default_value = "nucleotide")]
        db: Database,
    },

    /// Show the tool help text
    Help,

    /// Show server information
    Info,

    /// Validate configuration and connectivity
    Check,
}

/// Transport options for the serve command
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum TransportOption {
    /// Standard input/output (for MCP clients)
    #[default]
    Stdio,
    /// Server-Sent Events over HTTP
    Sse,
}

/// Set up logging with configurable output destination
///
/// # Arguments
/// * `level` - Default filter when neither verbose nor quiet
/// * `verbose` - Enable debug-level logging
/// * `use_stderr` - Write logs to stderr instead of stdout (required for stdio transport)
/// * `quiet` - Disable all logging output
fn setup_logging(level: &str, verbose: bool, use_stderr: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(level)
    };

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    // For stdio transport, logs MUST go to stderr to avoid corrupting the JSON-RPC stream
    if use_stderr {
        subscriber.with_writer(std::io::stderr).init();
    } else {
        subscriber.init();
    }
}

fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

fn print_info(label: &str, value: &str) {
    println!("  {} {}", format!("{}:", label).bright_blue(), value);
}

fn print_section(title: &str) {
    println!("\n{}", title.yellow().bold());
    println!("{}", "─".repeat(40).bright_black());
}

fn client_config(base_url: String, timeout_secs: Option<u64>) -> ClientConfig {
    ClientConfig {
        base_url,
        timeout: timeout_secs.map(Duration::from_secs),
        ..Default::default()
    }
}

fn print_json(value: &serde_json::Value, format: OutputFormat) -> NcbiResult<()> {
    match format {
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

async fn run_serve(
    transport: TransportOption,
    port: u16,
    host: String,
    client: ClientConfig,
    verbose: bool,
) -> NcbiResult<()> {
    let config = ServerConfig { client, verbose };

    let server = NcbiServer::new(config)?;

    let transport_type = match transport {
        TransportOption::Stdio => TransportType::Stdio,
        TransportOption::Sse => {
            let host_parts: Vec<u8> = host.split('.').filter_map(|s| s.parse().ok()).collect();

            if host_parts.len() != 4 {
                return Err(NcbiError::InvalidArguments(
                    "Invalid host format".to_string(),
                ));
            }

            TransportType::Sse {
                port,
                host: [host_parts[0], host_parts[1], host_parts[2], host_parts[3]],
            }
        },
    };

    server.run(transport_type).await
}

async fn run_lookup(
    request: LookupRequest,
    client: ClientConfig,
    format: OutputFormat,
    no_color: bool,
) -> NcbiResult<()> {
    let resolver = AccessionResolver::new(EutilsClient::new(client)?);
    TracingSink.info(&format!(
        "Fetching {} {} for accession: {}",
        request.database,
        request.return_format.rettype(),
        request.accession_or_query
    ));
    let outcome = resolver.resolve_and_fetch(&request).await?;

    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let value = json!({
                "database": request.database,
                "accession": request.accession_or_query,
                "rettype": request.return_format.rettype(),
                "found": outcome.is_found(),
                "text": outcome.to_string(),
            });
            print_json(&value, format)?;
        },
        OutputFormat::Pretty => {
            if outcome.is_found() || no_color {
                print!("{}", outcome);
                if !outcome.to_string().ends_with('\n') {
                    println!();
                }
            } else {
                println!("{}", outcome.to_string().yellow());
            }
        },
    }

    Ok(())
}

async fn run_search(
    query: String,
    db: Database,
    client: ClientConfig,
    format: OutputFormat,
    no_color: bool,
) -> NcbiResult<()> {
    let summarizer = QuerySummarizer::new(EutilsClient::new(client)?);
    let outcome = summarizer.search(&db, &query).await?;

    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let results: Vec<serde_json::Value> = match &outcome {
                SearchOutcome::NoResults { .. } => Vec::new(),
                SearchOutcome::Results(outcomes) => outcomes
                    .iter()
                    .map(|o| match o {
                        SummaryOutcome::Found(record) => json!(record),
                        SummaryOutcome::Failed { id, reason } => {
                            json!({ "id": id, "error": reason })
                        },
                    })
                    .collect(),
            };
            let value = json!({
                "query": query,
                "database": db,
                "result_count": results.len(),
                "results": results,
            });
            print_json(&value, format)?;
        },
        OutputFormat::Pretty => {
            if no_color {
                println!("\nSearch Results for: {} ({})", query, db);
                println!("{}", "=".repeat(50));
                println!("{}", outcome);
            } else {
                print_section(&format!("Search Results for: {} ({})", query.cyan(), db));
                match &outcome {
                    SearchOutcome::NoResults { .. } => {
                        println!("{}", outcome.to_string().yellow())
                    },
                    SearchOutcome::Results(outcomes) => {
                        for (i, o) in outcomes.iter().enumerate() {
                            let line = match o {
                                SummaryOutcome::Found(record) => format!(
                                    "{} {}\n   {}",
                                    record.accession.green().bold(),
                                    format!("(ID {})", record.id).bright_black(),
                                    record.title.white()
                                ),
                                SummaryOutcome::Failed { .. } => o.to_string().red().to_string(),
                            };
                            println!("{} {}\n", format!("{}.", i + 1).bright_black(), line);
                        }
                    },
                }
            }
        },
    }

    Ok(())
}

fn run_info(no_color: bool, base_url: &str) {
    let tools = [
        ("get_nucleotide_sequence", "Fetch a nucleotide sequence (FASTA)"),
        ("get_protein_sequence", "Fetch a protein sequence (FASTA)"),
        ("get_sequence_metadata", "Fetch a GenBank/GenPept record"),
        ("search_ncbi", "Search an NCBI database"),
        ("help", "Describe the available tools"),
    ];

    if no_color {
        println!("\n{} Information", SERVER_DESCRIPTION);
        println!("{}", "=".repeat(50));
        println!("  Name: {}", SERVER_NAME);
        println!("  Version: {}", VERSION);
        println!("  E-utilities: {}", base_url);
        println!();
        println!("Available Tools:");
        for (name, description) in tools {
            println!("  - {}: {}", name, description);
        }
        println!();
        println!("Supported Transports:");
        println!("  - stdio: Standard I/O for MCP clients");
        println!("  - sse: Server-Sent Events over HTTP");
    } else {
        print_section("Server Information");
        print_info("Name", SERVER_NAME);
        print_info("Version", VERSION);
        print_info("E-utilities", base_url);

        print_section("Available Tools");
        for (name, description) in tools {
            println!(
                "  {} {}",
                name.green(),
                format!("- {}", description).bright_black()
            );
        }

        print_section("Supported Transports");
        println!(
            "  {} {}",
            "stdio".cyan(),
            "- Standard I/O for MCP clients".bright_black()
        );
        println!(
            "  {} {}",
            "sse".cyan(),
            "- Server-Sent Events over HTTP".bright_black()
        );
    }
}

async fn run_check(no_color: bool, client: ClientConfig) -> NcbiResult<()> {
    if no_color {
        println!("\nChecking {} configuration...", SERVER_NAME);
    } else {
        print_section("Configuration Check");
    }

    let mut all_ok = true;

    let eutils = match EutilsClient::new(client).and_then(|c| c.open_session().map(|_| c)) {
        Ok(c) => {
            if no_color {
                println!("  [OK] E-utilities client initialized");
            } else {
                print_success("E-utilities client initialized");
            }
            Some(c)
        },
        Err(e) => {
            if no_color {
                println!("  [FAIL] E-utilities client: {}", e);
            } else {
                print_error(&format!("E-utilities client: {}", e));
            }
            all_ok = false;
            None
        },
    };

    if let Some(eutils) = eutils {
        if no_color {
            println!("\nTesting accession lookup...");
        } else {
            print_section("Connectivity Test");
        }

        let resolver = AccessionResolver::new(eutils);
        match resolver
            .resolve_and_fetch(&LookupRequest::nucleotide_sequence("NM_000546"))
            .await
        {
            Ok(outcome) if outcome.is_found() => {
                if no_color {
                    println!("  [OK] Lookup connectivity verified");
                } else {
                    print_success("Lookup connectivity verified");
                }
            },
            Ok(outcome) => {
                if no_color {
                    println!("  [WARN] {}", outcome);
                } else {
                    println!("  {} {}", "⚠".yellow(), outcome.to_string().yellow());
                }
            },
            Err(e) => {
                if no_color {
                    println!("  [FAIL] Lookup test: {}", e);
                } else {
                    print_error(&format!("Lookup test: {}", e));
                }
                all_ok = false;
            },
        }
    }

    println!();

    if all_ok {
        if no_color {
            println!("All checks passed!");
        } else {
            println!("{}", "✓ All checks passed!".green().bold());
        }
    } else {
        if no_color {
            println!("Some checks failed. See above for details.");
        } else {
            println!(
                "{}",
                "✗ Some checks failed. See above for details.".red().bold()
            );
        }
        std::process::exit(1);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // For stdio transport, logs MUST go to stderr to avoid corrupting the JSON-RPC stream.
    // Direct lookups print records on stdout, so their logs go to stderr too.
    match &cli.command {
        Commands::Serve { transport, .. } => {
            let use_stderr = matches!(transport, TransportOption::Stdio);
            setup_logging("info", cli.verbose, use_stderr, cli.quiet);
        },
        _ => setup_logging("warn", cli.verbose, true, cli.quiet),
    }

    let client = client_config(cli.base_url.clone(), cli.timeout_secs);

    let result = match cli.command {
        Commands::Serve {
            transport,
            port,
            host,
        } => run_serve(transport, port, host, client, cli.verbose).await,

        Commands::Nucleotide { accession } => {
            run_lookup(
                LookupRequest::nucleotide_sequence(accession),
                client,
                cli.format,
                cli.no_color,
            )
            .await
        },

        Commands::Protein { accession } => {
            run_lookup(
                LookupRequest::protein_sequence(accession),
                client,
                cli.format,
                cli.no_color,
            )
            .await
        },

        Commands::Metadata { accession, db } => {
            run_lookup(
                LookupRequest::metadata(db, accession),
                client,
                cli.format,
                cli.no_color,
            )
            .await
        },

        Commands::Search { query, db } => {
            run_search(query, db, client, cli.format, cli.no_color).await
        },

        Commands::Help => {
            print!("{}", help());
            Ok(())
        },

        Commands::Info => {
            run_info(cli.no_color, &cli.base_url);
            Ok(())
        },

        Commands::Check => run_check(cli.no_color, client).await,
    };

    if let Err(e) = result {
        if cli.no_color {
            eprintln!("Error: {}", e);
        } else {
            print_error(&e.to_string());
        }
        std::process::exit(1);
    }
}
