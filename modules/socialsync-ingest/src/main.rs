use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use ga4_client::Ga4Client;
use graph_client::GraphClient;
use socialsync_common::{load_config, AppConfig, DateRange};
use socialsync_ingest::pipeline::{Pipeline, RunSummary, Sources};
use socialsync_ingest::sources::{FixedOrigin, Ga4Source, GraphSource, OriginSource, TrafficSource};
use socialsync_warehouse::PgWarehouse;

#[derive(Parser)]
#[command(name = "socialsync", about = "Incremental social and web analytics ingestion")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "socialsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Page insights backfill, post refresh, then traffic backfill
    Run,
    /// Page insights backfill only
    Insights,
    /// Full post refresh only
    Posts,
    /// Traffic backfill only. Explicit dates override the watermark.
    Traffic {
        /// First day to fetch (inclusive)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Day to stop at (exclusive), defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match "socialsync=info".parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(summary) if summary.succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "socialsync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    info!("socialsync starting...");

    let app = AppConfig::from_env()?;
    let config = load_config(&cli.config)?;
    info!(
        config = %cli.config.display(),
        page_id = config.graph.page_id.as_str(),
        insights = %config.warehouse.insights(),
        posts = %config.warehouse.posts(),
        traffic = %config.warehouse.traffic(),
        "Config loaded"
    );

    let warehouse = PgWarehouse::connect(&app.database_url)
        .await
        .context("Failed to connect to warehouse")?;

    let graph = GraphClient::new(
        &config.graph.api_version,
        &config.graph.page_id,
        &app.fb_access_token,
    )
    .context("Failed to build Graph client")?;
    let graph = GraphSource::new(graph, config.graph.metrics.clone(), config.graph.page_size);

    let ga4 = match (&config.ga4, &app.ga4_access_token) {
        (Some(ga4), Some(token)) => {
            let mut client =
                Ga4Client::new(&ga4.property_id, token).context("Failed to build GA4 client")?;
            if let Some(base_url) = &ga4.base_url {
                client = client.with_base_url(base_url);
            }
            Some(Ga4Source::new(client))
        }
        (Some(_), None) => {
            info!("[ga4] configured but GA4_ACCESS_TOKEN is not set");
            None
        }
        _ => None,
    };
    let ga4_origin = config
        .ga4
        .as_ref()
        .and_then(|g| g.start_date)
        .map(FixedOrigin);

    let sources = Sources {
        insights: &graph,
        origin: Some(&graph as &dyn OriginSource),
        posts: &graph,
        traffic: ga4.as_ref().map(|s| s as &dyn TrafficSource),
        traffic_origin: ga4_origin.as_ref().map(|o| o as &dyn OriginSource),
    };
    let pipeline = Pipeline::new(&config, &warehouse, sources);
    let today = Utc::now().date_naive();

    let summary = match cli.command {
        Command::Run => pipeline.run(today).await,
        Command::Insights => RunSummary {
            stages: vec![pipeline.page_insights_stage(today).await],
        },
        Command::Posts => RunSummary {
            stages: vec![pipeline.posts_stage().await],
        },
        Command::Traffic { start, end } => {
            let window = match (start, end) {
                (None, None) => None,
                (Some(start), end) => Some(DateRange::new(start, end.unwrap_or(today))),
                (None, Some(_)) => anyhow::bail!("--end requires --start"),
            };
            RunSummary {
                stages: vec![pipeline.traffic_stage(today, window).await],
            }
        }
    };

    summary.log();
    Ok(summary)
}
