use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tableau_mcp_runtime::{McpCommands, TableauArgs, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "tableau-mcp",
    version,
    about = "Tableau MCP server: read-only Tableau content tools over stdio"
)]
struct Cli {
    #[command(flatten)]
    tableau: TableauArgs,

    /// Defaults to `serve`
    #[command(subcommand)]
    command: Option<McpCommands>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tableau_mcp=info,tableau_mcp_runtime=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let code = run_mcp(cli.tableau, cli.command.unwrap_or(McpCommands::Serve)).await;
    std::process::exit(code);
}
