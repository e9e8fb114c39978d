//! idalloc - stable identifier allocation batch job
//!
//! Reconciles one round of gene-model curation against the prior
//! annotation: pulls the change events from the curation database,
//! allocates (or reuses) stable identifiers through the OSID authority,
//! persists the session records, rewrites the annotation file, and emits
//! the gene history file.

mod config;

use anyhow::Result;
use clap::Parser;
use idalloc_common::logging::{init_logging, LogConfig, LogLevel};
use idalloc_common::AllocError;
use idalloc_engine::collection::EventCollection;
use idalloc_engine::feature::CollisionMode;
use idalloc_engine::osid::OsidClient;
use idalloc_engine::output::{GffRewriter, HistoryWriter, SessionWriter};
use idalloc_engine::source::{DbEventSource, EventSource, GffEventSource};
use idalloc_engine::store::{DbSessionStore, SessionStore};
use sqlx::PgPool;
use tracing::info;

use config::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "idalloc")]
#[command(author, version, about = "Stable identifier allocation for annotation events")]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(short, long, default_value = "idalloc.toml")]
    config: std::path::PathBuf,

    /// Seed a brand new organism: read every gene from the input
    /// annotation file as a new-gene event instead of querying the
    /// curation database
    #[arg(long)]
    new_organism: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig::from_env().unwrap_or_default();
    let log_config = if cli.verbose {
        log_config.with_level(LogLevel::Debug)
    } else {
        log_config
    };
    init_logging(&log_config)?;

    let config = PipelineConfig::load(&cli.config)?;
    run(config, cli.new_organism).await
}

async fn run(config: PipelineConfig, new_organism: bool) -> Result<()> {
    info!(organism = %config.organism.name, new_organism, "Starting allocation run");

    let source: Box<dyn EventSource> = if new_organism {
        Box::new(GffEventSource::from_file(
            &config.files.input_gff,
            &GffEventSource::DEFAULT_GENE_TYPES,
        )?)
    } else {
        let events = config.events.as_ref().ok_or_else(|| {
            AllocError::config(
                "an [events] section with database_url is required unless --new-organism is set",
            )
        })?;
        let events_pool = PgPool::connect(&events.database_url).await?;
        Box::new(DbEventSource::new(events_pool))
    };
    let authority = OsidClient::new(config.osid.clone())?;

    let mode = if config.strict_index {
        CollisionMode::Reject
    } else {
        CollisionMode::Overwrite
    };

    let mut collection =
        EventCollection::create(&config.organism.name, source.as_ref(), &authority, mode).await?;
    info!(features = collection.index().len(), "Event collection built");

    let session_pool = PgPool::connect(&config.session.database_url).await?;
    let store = DbSessionStore::new(session_pool);

    let application_id = store
        .application_id(&config.pipeline.name, &config.pipeline.version)
        .await?
        .ok_or_else(|| AllocError::UnknownApplication {
            name: config.pipeline.name.clone(),
            version: config.pipeline.version.clone(),
        })?;

    let production_database_id = match store
        .production_database_id(&config.organism.production_database)
        .await?
    {
        Some(id) => id,
        None => {
            store
                .create_production_database(&config.organism.production_database)
                .await?
        },
    };

    let writer = SessionWriter::new(
        &store,
        application_id,
        production_database_id,
        config.pipeline.message.clone(),
    );
    let recorded = writer.write(&mut collection).await?;
    info!(recorded, "Session records written");

    let rewriter = GffRewriter::new();
    let rewritten = rewriter.rewrite(&collection, &config.files.input_gff, &config.files.output_gff)?;
    info!(rewritten, output = %config.files.output_gff.display(), "Annotation file rewritten");

    let records = HistoryWriter::write_file(&mut collection, &config.files.history)?;
    info!(records, history = %config.files.history.display(), "History file written");

    info!("Allocation run complete");
    Ok(())
}
