mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_intel=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(&cli.options)?;

    match cli.command {
        Commands::Scan => cli::scan(config).await?,
        Commands::Watch { debounce } => cli::watch(config, debounce).await?,
        Commands::Search { term } => cli::search(config, &term).await?,
        Commands::Tree => cli::tree(config).await?,
        Commands::File { path } => cli::file(config, &path).await?,
        Commands::Callgraph {
            path,
            no_recursive,
            max_files,
        } => cli::callgraph(config, path, !no_recursive, max_files).await?,
        Commands::Trace {
            qualified,
            max_depth,
        } => cli::trace(config, qualified, max_depth).await?,
        Commands::Capabilities => cli::capabilities(config)?,
        Commands::Status => cli::status(config).await?,
    }

    Ok(())
}
