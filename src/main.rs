use anyhow::Context;
use clap::{Parser, Subcommand};
use edumap::config::AppConfig;
use edumap::loader::HttpFetcher;
use edumap::pipeline::RenderedMap;
use edumap::server;
use edumap::session::MapSession;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the datasets and write the choropleth page
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Overrides `output.html` from the config
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Build the map and serve it with the hover API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config, output } => {
            println!("Generating map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(config)?;
            let output = output.clone().unwrap_or_else(|| app_config.output.html.clone());

            let rendered = build(app_config, Some(output.clone())).await?;

            println!(
                "Generation complete! {} counties written to {:?}",
                rendered.map.regions.len(),
                output
            );
        }
        Commands::Serve { config, port } => {
            println!("Serving map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(config)?;
            let port = port.unwrap_or(app_config.server.port);

            let rendered = build(app_config, None).await?;
            server::start_server(port, rendered).await?;
        }
    }

    Ok(())
}

/// Runs one map session to completion, tearing it down on Ctrl-C.
async fn build(config: AppConfig, output: Option<PathBuf>) -> anyhow::Result<RenderedMap> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.sources.timeout_secs))
        .context("Failed to build HTTP client")?;

    let mut session = MapSession::initialize(config, Arc::new(fetcher), output);
    let guard = session.guard();

    tokio::select! {
        result = session.finished() => result.context("Failed to build choropleth map"),
        _ = tokio::signal::ctrl_c() => {
            guard.teardown();
            anyhow::bail!("Interrupted before the map was built")
        }
    }
}
