// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use openbox_runtime::cli::{self, list_cmd::ListArgs, output};
use openbox_runtime::config::{resolve_db_path, ScrapeOverrides};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "openbox",
    about = "Openbox — scrape an open-box listing into a local product catalog",
    version,
    after_help = "Run 'openbox <command> --help' for details on each command."
)]
struct Cli {
    /// Product database (default: $OPENBOX_DB, then ~/.openbox/products.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll the listing to the end, extract every product, and save it
    Scrape {
        /// Listing page to scrape (overrides OPENBOX_LISTING_URL)
        #[arg(long)]
        url: Option<String>,
        /// Overall time budget for acquisition, retries included, in seconds
        #[arg(long)]
        deadline: Option<u64>,
        /// Cap on scroll cycles
        #[arg(long)]
        max_cycles: Option<u32>,
        /// Acquisition attempts before giving up
        #[arg(long)]
        attempts: Option<u32>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// Also write the extracted records to this JSON file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Save a previously exported JSON snapshot
    Import {
        /// Snapshot file written by `scrape --output`
        file: PathBuf,
    },
    /// List stored products
    List {
        /// Only products with this exact grade
        #[arg(long)]
        grade: Option<String>,
        /// Case-insensitive name filter
        #[arg(long)]
        name: Option<String>,
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,
        /// Rows per page (1-500)
        #[arg(long, default_value = "50")]
        limit: u32,
        /// Sort column (created_at, name, price, grade)
        #[arg(long, default_value = "created_at")]
        sort: String,
        /// Sort order (asc, desc)
        #[arg(long, default_value = "desc")]
        order: String,
    },
    /// Serve the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Port to listen on
        #[arg(long, default_value = "3001")]
        port: u16,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(output::JSON_ENV, "1");
    }
    if cli.quiet {
        std::env::set_var(output::QUIET_ENV, "1");
    }
    if cli.no_color {
        std::env::set_var(output::NO_COLOR_ENV, "1");
    }

    init_tracing(&cli.log_level, cli.log_format);
    let db = resolve_db_path(cli.db, |key| std::env::var(key).ok());

    let result = match cli.command {
        Commands::Scrape {
            url,
            deadline,
            max_cycles,
            attempts,
            headful,
            output,
        } => {
            let overrides = ScrapeOverrides {
                listing_url: url,
                deadline_secs: deadline,
                max_cycles,
                max_attempts: attempts,
                headful,
            };
            cli::scrape_cmd::run(&db, &overrides, output.as_deref()).await
        }
        Commands::Import { file } => cli::import_cmd::run(&db, &file).await,
        Commands::List {
            grade,
            name,
            page,
            limit,
            sort,
            order,
        } => {
            let args = ListArgs {
                grade,
                name,
                page,
                limit,
                sort,
                order,
            };
            cli::list_cmd::run(&db, &args).await
        }
        Commands::Serve { host, port } => cli::serve_cmd::run(&db, host, port).await,
        Commands::Doctor => cli::doctor::run(&db).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "openbox", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !output::is_quiet() && !output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
