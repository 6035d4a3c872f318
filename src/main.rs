use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod binning;
mod color;
mod config;
mod cycle;
mod db;
mod display;
mod error;
mod flow;
mod layout;
mod models;
mod realtime;
mod render;
mod report;
mod settings;
mod store;

use crate::config::Config;
use crate::cycle::ResumePolicy;
use crate::layout::Viewport;
use crate::models::{ApprovedQuote, Attribute, ModerationDecision, ModerationStatus, Submission};
use crate::render::{Frame, Mode};
use crate::settings::{DataSource, DisplaySettings};

#[derive(Parser)]
#[command(name = "conference-pulse")]
#[command(about = "Conference survey collection, moderation and flow visualisation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a moderator and realistic test responses
    Seed,
    /// Import survey responses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Submit one survey from a JSON file
    Submit {
        #[arg(long)]
        json: PathBuf,
    },
    /// List statements waiting for moderation
    Queue,
    /// Approve or reject a pending statement
    Moderate {
        #[arg(long)]
        response_id: Uuid,
        /// approved or rejected
        #[arg(long)]
        status: ModerationStatus,
        #[arg(long)]
        moderator: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Print approved statements
    Quotes {
        #[arg(long)]
        test_data: bool,
    },
    /// Render one attribute pair to SVG
    Render {
        #[arg(long, default_value = "tenure")]
        source: Attribute,
        #[arg(long, default_value = "learning_style")]
        target: Attribute,
        #[arg(long, default_value = "alluvial")]
        mode: Mode,
        /// Source index to highlight
        #[arg(long)]
        highlight: Option<usize>,
        #[arg(long)]
        settings: Option<PathBuf>,
        #[arg(long)]
        test_data: bool,
        #[arg(long, default_value_t = 1100.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
        #[arg(long, default_value = "pulse.svg")]
        out: PathBuf,
    },
    /// Generate a markdown insight report for one attribute pair
    Report {
        #[arg(long, default_value = "tenure")]
        source: Attribute,
        #[arg(long, default_value = "learning_style")]
        target: Attribute,
        #[arg(long)]
        test_data: bool,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Run the auto-cycling display, redrawing an SVG file
    Play {
        #[arg(long, default_value = "tenure")]
        source: Attribute,
        #[arg(long, default_value = "learning_style")]
        target: Attribute,
        #[arg(long, default_value = "alluvial")]
        mode: Mode,
        #[arg(long)]
        settings: Option<PathBuf>,
        #[arg(long)]
        test_data: bool,
        /// Resume straight into the next highlight after a category switch
        #[arg(long)]
        direct: bool,
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
        #[arg(long, default_value = "pulse.svg")]
        out: PathBuf,
    },
}

fn load_settings(path: Option<&Path>, test_data: bool) -> anyhow::Result<DisplaySettings> {
    let mut settings = match path {
        Some(path) => DisplaySettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => DisplaySettings::default(),
    };
    if test_data {
        settings.data_source = DataSource::Test;
    }
    Ok(settings)
}

async fn quotes_or_empty(pool: &PgPool, source: DataSource) -> Vec<ApprovedQuote> {
    db::approved_quotes(pool, source).await.unwrap_or_else(|err| {
        warn!(error = %err, "failed to fetch approved quotes");
        Vec::new()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy(&config.database_url)
        .context("failed to configure Postgres pool")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
        Commands::Submit { json } => {
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("failed to read {}", json.display()))?;
            let submission: Submission =
                serde_json::from_str(&raw).context("submission JSON is malformed")?;
            let response_id = db::submit_survey(&pool, &submission).await?;
            println!("Thank you! Response {response_id} recorded.");
        }
        Commands::Queue => {
            let queue = db::moderation_queue(&pool).await?;
            if queue.is_empty() {
                println!("Nothing waiting for moderation.");
                return Ok(());
            }

            println!("Pending statements:");
            for item in queue {
                let name = match &item.last_name {
                    Some(last) => format!("{} {}", item.first_name, last),
                    None => item.first_name.clone(),
                };
                println!(
                    "- {} {} <{}> on {}: {}{}",
                    item.response_id,
                    name,
                    item.email.as_deref().unwrap_or("no email"),
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    item.unique_quality,
                    item.tag.map(|tag| format!(" [{tag}]")).unwrap_or_default()
                );
            }
        }
        Commands::Moderate {
            response_id,
            status,
            moderator,
            notes,
            tag,
        } => {
            let decision = ModerationDecision {
                response_id,
                status,
                notes,
                tag,
            };
            let record = db::moderate(&pool, &moderator, &decision).await?;
            println!(
                "Response {} marked {} by moderator {} at {} (decision {}).",
                record.response_id,
                record.status,
                record.moderator_id,
                record.updated_at.format("%Y-%m-%d %H:%M"),
                record.id
            );
            if let Some(notes) = record.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
                println!("Notes: {}", notes.trim());
            }
        }
        Commands::Quotes { test_data } => {
            let source = if test_data { DataSource::Test } else { DataSource::Live };
            let quotes = db::approved_quotes(&pool, source).await?;
            if quotes.is_empty() {
                println!("No approved quotes yet.");
                return Ok(());
            }
            for quote in quotes {
                println!("\"{}\" - {}", quote.text.trim(), quote.author());
            }
        }
        Commands::Render {
            source,
            target,
            mode,
            highlight,
            settings,
            test_data,
            width,
            height,
            out,
        } => {
            let settings = load_settings(settings.as_deref(), test_data)?;
            let set = store::load(&pool, settings.data_source).await;
            let graph = flow::aggregate(set.records(), source, target);
            let quotes = quotes_or_empty(&pool, settings.data_source).await;

            let frame = Frame {
                graph: &graph,
                settings: &settings,
                highlight,
                quote: quotes.first(),
                viewport: Viewport { width, height },
            };
            std::fs::write(&out, render::render(&frame, mode))?;
            println!("{} written to {}.", graph.view_label(), out.display());
        }
        Commands::Report {
            source,
            target,
            test_data,
            out,
        } => {
            let data_source = if test_data { DataSource::Test } else { DataSource::Live };
            let set = store::load(&pool, data_source).await;
            let graph = flow::aggregate(set.records(), source, target);
            let quotes = quotes_or_empty(&pool, data_source).await;
            let report = report::build_report(&graph, data_source, Utc::now(), &quotes, set.is_sample());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Play {
            source,
            target,
            mode,
            settings,
            test_data,
            direct,
            tick_ms,
            out,
        } => {
            let settings = load_settings(settings.as_deref(), test_data)?;
            let options = display::DisplayOptions {
                source,
                target,
                mode,
                out,
                tick: Duration::from_millis(tick_ms.max(10)),
                viewport: Viewport::default(),
                policy: if direct {
                    ResumePolicy::Direct
                } else {
                    ResumePolicy::FullOpacityPause
                },
            };
            display::run(&pool, &config.channel, settings, options).await?;
        }
    }

    Ok(())
}
