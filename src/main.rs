use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedmerge::core::aggregate::SourceStatus;
use feedmerge::core::config::{AppConfig, CONFIG_ENV};
use feedmerge::core::importer::ImportFormat;

#[derive(Parser)]
#[command(name = "feedmerge")]
#[command(about = "Merges news feeds into one filtered, categorized, deduplicated feed")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, env = CONFIG_ENV, default_value = "feedmerge.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source and write the configured outputs
    Run,
    /// Convert a source list into [[sources]] tables
    Import {
        /// opml, urls or json
        #[arg(short, long, default_value = "opml")]
        format: ImportFormat,
        /// File to read the source list from
        file: PathBuf,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "feedmerge=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    let config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let summary = feedmerge::run_pipeline(&config)
                .await
                .context("aggregation run failed")?;
            for report in &summary.reports {
                if report.status == SourceStatus::Failed {
                    tracing::warn!(
                        source = %report.name,
                        error = report.error.as_deref().unwrap_or("unknown"),
                        "source contributed nothing"
                    );
                }
            }
            tracing::info!(
                published = summary.published,
                duplicates = summary.duplicates_removed,
                files = summary.written.len(),
                "run complete"
            );
        }
        Commands::Import { format, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let preview = feedmerge::preview_import(&config, format, &content)
                .with_context(|| format!("importing {}", file.display()))?;
            tracing::info!(
                new = preview.new_count,
                duplicates = preview.duplicate_count,
                "import parsed"
            );
            for source in &preview.duplicate_sources {
                tracing::info!(url = %source.url, "already configured, skipped");
            }
            print!("{}", preview.toml);
        }
        Commands::CheckConfig => {
            let taxonomy = config.taxonomy();
            println!(
                "{}: {} sources, {} taxonomy tags, outputs in {}",
                cli.config.display(),
                config.sources.len(),
                taxonomy.rules().len(),
                config.output.directory.display()
            );
        }
    }

    Ok(())
}
