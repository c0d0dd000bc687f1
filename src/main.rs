use anyhow::{anyhow, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use launch_recon::apis::{PayloadSource, SpacexApiAdapter, WikiTableAdapter};
use launch_recon::config::PipelineConfig;
use launch_recon::domain::Outcome;
use launch_recon::logging;
use launch_recon::pipeline::processing::ProximityIndex;
use launch_recon::pipeline::storage::{DatasetStore, FileDatasetStore, VersionSelector};
use launch_recon::pipeline::Pipeline;
use launch_recon::query::{LaunchQuery, QueryService};
use launch_recon::server;

#[derive(Parser)]
#[command(name = "launch_recon")]
#[command(about = "Reconciles launch records into a versioned feature dataset")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $LAUNCH_RECON_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch both sources, reconcile, derive features and commit a new version
    Run {
        /// Version tag; defaults to the current UTC timestamp
        #[arg(long)]
        tag: Option<String>,
        /// API payload location (file or URL), overrides the config
        #[arg(long)]
        api: Option<String>,
        /// Scraped table location (file or URL), overrides the config
        #[arg(long)]
        scrape: Option<String>,
    },
    /// List committed versions, oldest first
    Versions,
    /// Print matching launches as JSON rows
    Query {
        #[command(flatten)]
        filter: FilterArgs,
        /// Comma-separated columns (default: all)
        #[arg(long)]
        columns: Option<String>,
    },
    /// Per-site success statistics
    Sites {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Export the feature matrix for the outcome classifier
    Features {
        #[command(flatten)]
        filter: FilterArgs,
        /// Write JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve read-only JSON queries over committed versions
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Version tag or "latest"
    #[arg(long, default_value = "latest")]
    tag: String,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    /// success, failure or unknown
    #[arg(long, value_parser = parse_outcome)]
    outcome: Option<Outcome>,
    #[arg(long)]
    variant: Option<String>,
    #[arg(long)]
    site: Option<String>,
    #[arg(long)]
    payload_min_kg: Option<f64>,
    #[arg(long)]
    payload_max_kg: Option<f64>,
}

impl FilterArgs {
    fn selector(&self) -> VersionSelector {
        VersionSelector::parse(&self.tag)
    }

    fn query(&self) -> LaunchQuery {
        LaunchQuery {
            from: self.from,
            to: self.to,
            outcome: self.outcome,
            variant: self.variant.clone(),
            site: self.site.clone(),
            payload_min_kg: self.payload_min_kg,
            payload_max_kg: self.payload_max_kg,
        }
    }
}

fn parse_outcome(value: &str) -> Result<Outcome, String> {
    Outcome::parse(value).ok_or_else(|| format!("unknown outcome '{value}'"))
}

fn payload_location(flag: Option<String>, configured: Option<&String>, name: &str) -> anyhow::Result<PayloadSource> {
    flag.or_else(|| configured.cloned())
        .map(|loc| PayloadSource::parse(&loc))
        .ok_or_else(|| anyhow!("no {name} location: pass --{name} or set sources.{name}.location"))
}

async fn open_query(store: &dyn DatasetStore, filter: &FilterArgs) -> anyhow::Result<QueryService> {
    let selector = filter.selector();
    QueryService::open(store, &selector)
        .await
        .with_context(|| format!("Failed to open version '{selector}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = PipelineConfig::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config.logging.dir);
    launch_recon::metrics::init_metrics(config.metrics.resolved_addr().as_deref());

    let store = Arc::new(FileDatasetStore::new(&config.store.dir));

    match cli.command {
        Commands::Run { tag, api, scrape } => {
            let tag = tag.unwrap_or_else(|| Utc::now().format("%Y%m%dT%H%M%SZ").to_string());
            let api = SpacexApiAdapter::new(
                payload_location(api, config.sources.api.location.as_ref(), "api")?,
                &config.sources.api,
            )?;
            let scrape = WikiTableAdapter::new(payload_location(
                scrape,
                config.sources.scrape.location.as_ref(),
                "scrape",
            )?)?;
            let index = ProximityIndex::load(&config.proximity.reference_file, config.proximity.max_lookup_distance_m)
                .with_context(|| {
                    format!(
                        "Failed to load reference catalog '{}'",
                        config.proximity.reference_file.display()
                    )
                })?;

            let pipeline = Pipeline::from_config(&config)?;
            match pipeline.run_batch(&api, &scrape, &index, store.as_ref(), &tag).await {
                Ok(report) => {
                    info!(tag = %report.version.tag, "Batch finished");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Err(e) => {
                    error!("Batch failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Versions => {
            for v in store.versions().await? {
                println!(
                    "{:>4}  {:<24} {:>6} records  {}  {}",
                    v.sequence,
                    v.tag,
                    v.record_count,
                    v.committed_at.to_rfc3339(),
                    &v.content_checksum[..v.content_checksum.len().min(12)]
                );
            }
        }
        Commands::Query { filter, columns } => {
            let service = open_query(store.as_ref(), &filter).await?;
            let columns: Vec<String> = columns
                .map(|c| c.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            let rows = service.rows(&filter.query(), &columns)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Sites { filter } => {
            let service = open_query(store.as_ref(), &filter).await?;
            let summary = service.site_summary(&filter.query());
            for site in &summary.sites {
                println!(
                    "{:<32} total {:>4}  success {:>4}  failure {:>4}  {:>6.2}%",
                    site.site, site.total, site.successes, site.failures, site.success_ratio
                );
            }
            if let Some(best) = &summary.best_site {
                println!("best site: {best}");
            }
        }
        Commands::Features { filter, output } => {
            let service = open_query(store.as_ref(), &filter).await?;
            let matrix = service.feature_matrix(&filter.query());
            let json = serde_json::to_string_pretty(&matrix)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(rows = matrix.rows.len(), path = %path.display(), "Feature matrix written");
                }
                None => println!("{json}"),
            }
        }
        Commands::Serve { port } => {
            server::start_server(store, port).await?;
        }
    }
    Ok(())
}
