mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pagelens")]
#[command(about = "Accessibility snapshots and UID-addressed actions for live web pages", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a URL and print its snapshot
    Snapshot {
        /// Page to open
        url: String,

        /// Print only lines matching this query (e.g. "Submit|Log*")
        #[arg(short, long)]
        search: Option<String>,

        /// Context lines around each match (defaults to search.defaultContextLevels)
        #[arg(short, long)]
        context: Option<usize>,
    },

    /// List registered tools
    Tools,

    /// Execute a single tool with JSON params
    Run {
        /// Tool name
        tool_name: String,

        /// JSON parameters (e.g. '{"uid":"e3"}')
        #[arg(default_value = "{}")]
        params: String,

        /// Navigate here before running the tool
        #[arg(long)]
        url: Option<String>,
    },

    /// Read `tool_name {json}` lines from stdin and print each result
    Repl {
        /// Navigate here before the first command
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Snapshot { url, search, context } => {
            commands::snapshot::run(&url, search.as_deref(), context).await?;
        }
        Commands::Tools => {
            commands::tools_cmd::list().await?;
        }
        Commands::Run { tool_name, params, url } => {
            commands::run_cmd::tool(&tool_name, &params, url.as_deref()).await?;
        }
        Commands::Repl { url } => {
            commands::repl::run(url.as_deref()).await?;
        }
    }

    Ok(())
}
