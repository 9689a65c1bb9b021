use crate::{commands::Commands, error::CliError};
use clap::Parser;
use connectors::sql::sqlite::source::SqliteSource;
use engine_config::settings::{DEFAULT_CONFIG_PATH, MigrationConfig, TargetConfig};
use engine_core::{
    metrics::Metrics,
    progress::StatusReport,
    state::{CheckpointStore, ResumeInfo},
};
use engine_runtime::{
    execution::{ResumeOutcome, factory},
    validation,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;

#[derive(Parser)]
#[command(
    name = "kvmigrate",
    version = "0.1.0",
    about = "Resumable relational to key-value migration tool"
)]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH, help = "Config file path")]
    config: PathBuf,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init {
            source_db,
            batch_size,
            table_prefix,
            force,
        } => init(&cli.config, source_db, batch_size, table_prefix, force)?,
        Commands::Migrate { force, groups } => {
            let config = MigrationConfig::load(&cli.config)?;
            let selection = (!groups.is_empty()).then_some(groups);
            migrate(&config, selection.as_deref(), force).await?;
        }
        Commands::Resume => {
            let config = MigrationConfig::load(&cli.config)?;
            resume(&config).await?;
        }
        Commands::Status { json } => {
            let config = MigrationConfig::load(&cli.config)?;
            let mut store = CheckpointStore::new(config.checkpoint_path());
            let report = StatusReport::from_run(store.load()?.as_ref());
            if json {
                output::print_json(&report)?;
            } else {
                print!("{}", output::render_status(&report));
            }
        }
        Commands::Validate { group, output } => {
            let config = MigrationConfig::load(&cli.config)?;
            validate(&config, group.as_deref(), output.as_deref()).await?;
        }
        Commands::Reset { confirm } => {
            if !confirm {
                return Err(CliError::ConfirmationRequired);
            }
            let config = MigrationConfig::load(&cli.config)?;
            let mut store = CheckpointStore::new(config.checkpoint_path());
            if store.reset()? {
                println!("Checkpoint {} removed", store.path().display());
            } else {
                println!("No checkpoint at {}", store.path().display());
            }
        }
        Commands::Pause => {
            let config = MigrationConfig::load(&cli.config)?;
            let mut store = CheckpointStore::new(config.checkpoint_path());
            let run = store.load()?.ok_or(CliError::NoRun)?;
            store.pause()?;
            println!("Run {} paused", run.id);
        }
        Commands::Info => {
            let config = MigrationConfig::load(&cli.config)?;
            info_report(&config).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn init(
    path: &Path,
    source_db: PathBuf,
    batch_size: Option<usize>,
    table_prefix: Option<String>,
    force: bool,
) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.display().to_string()));
    }

    let mut config = MigrationConfig::new(source_db)?;
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size;
    }
    if let Some(prefix) = table_prefix {
        config.table_prefix = prefix;
    }
    config.validate()?;
    config.save(path)?;

    info!(path = %path.display(), groups = config.groups.len(), "Configuration written");
    println!("Configuration written to {}", path.display());
    Ok(())
}

async fn migrate(
    config: &MigrationConfig,
    selection: Option<&[String]>,
    force: bool,
) -> Result<(), CliError> {
    if let Some(names) = selection
        && let Some(unknown) = names.iter().find(|name| config.group(name).is_none())
    {
        return Err(CliError::UnknownGroup(unknown.clone()));
    }

    let source = factory::create_source(config)?;
    let target = factory::create_target(config)?;
    let mut coordinator = factory::create_coordinator(config, source, target, Metrics::new())?;

    let summary = coordinator.start(selection, force).await?;
    print!("{}", output::render_summary(&summary));
    Ok(())
}

async fn resume(config: &MigrationConfig) -> Result<(), CliError> {
    if matches!(config.target, TargetConfig::Memory) {
        warn!("The memory target starts empty; completed groups will not be rewritten");
    }

    let source = factory::create_source(config)?;
    let target = factory::create_target(config)?;
    let mut coordinator = factory::create_coordinator(config, source, target, Metrics::new())?;

    match coordinator.resume().await? {
        ResumeOutcome::NothingToResume => println!("No migration run to resume"),
        ResumeOutcome::AlreadyComplete { run_id } => {
            println!("Run {run_id} is already complete")
        }
        ResumeOutcome::Resumed(summary) => print!("{}", output::render_summary(&summary)),
    }
    Ok(())
}

async fn validate(
    config: &MigrationConfig,
    group: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let targets: Vec<_> = factory::validation_targets(config)
        .into_iter()
        .filter(|t| group.is_none_or(|g| t.group == g))
        .collect();
    if let Some(g) = group
        && targets.is_empty()
    {
        return Err(CliError::UnknownGroup(g.to_string()));
    }

    let mut store = CheckpointStore::new(config.checkpoint_path());
    let run = store.load()?;
    let source = factory::create_source(config)?;
    let target = factory::create_target(config)?;

    let report =
        validation::validate(source.as_ref(), target.as_ref(), run.as_ref(), &targets).await?;

    match output_path {
        Some(path) => {
            output::write_json(&report, path).await?;
            println!("Validation report written to {}", path.display());
        }
        None => output::print_json(&report)?,
    }

    let failed = report.failed_groups().count();
    if failed > 0 {
        return Err(CliError::ValidationFailed(failed));
    }
    Ok(())
}

#[derive(Serialize)]
struct GroupInfo {
    name: String,
    collection: String,
    tables: Vec<String>,
    lookups: Vec<String>,
}

#[derive(Serialize)]
struct TableInfo {
    name: String,
    rows: u64,
    primary_keys: Vec<String>,
    references: Vec<String>,
}

#[derive(Serialize)]
struct InfoReport {
    source_db: PathBuf,
    target: TargetConfig,
    checkpoint: PathBuf,
    batch_size: usize,
    groups: Vec<GroupInfo>,
    tables: Vec<TableInfo>,
    resume: Option<ResumeInfo>,
}

async fn info_report(config: &MigrationConfig) -> Result<(), CliError> {
    let resume = CheckpointStore::new(config.checkpoint_path()).resume_info()?;
    let source = SqliteSource::open(&config.source_db, config.group_layouts())
        .map_err(engine_runtime::error::MigrationError::from)?;
    let tables = source
        .tables()
        .await
        .map_err(engine_runtime::error::MigrationError::from)?;

    let report = InfoReport {
        source_db: config.source_db.clone(),
        target: config.target.clone(),
        checkpoint: config.checkpoint_path(),
        batch_size: config.batch_size,
        groups: config
            .groups
            .iter()
            .map(|g| GroupInfo {
                name: g.name.clone(),
                collection: config.collection_name(g),
                tables: g.entity_tables(),
                lookups: g.lookups.clone(),
            })
            .collect(),
        tables: tables
            .iter()
            .map(|t| TableInfo {
                name: t.name.clone(),
                rows: t.row_count,
                primary_keys: t.primary_keys.clone(),
                references: t.referenced_tables(),
            })
            .collect(),
        resume,
    };

    output::print_json(&report)
}
