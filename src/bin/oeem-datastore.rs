//! # OEEM Datastore
//!
//! Command-line entry point: container startup, the application server,
//! management commands and the CI pipeline runner.
//!
//! ## Usage
//!
//! ```bash
//! # Container entrypoint: prepare, then exec the server
//! SETUP=1 oeem-datastore start
//!
//! # Run the server directly
//! oeem-datastore serve --bind 127.0.0.1:8000 --workers 2
//!
//! # Evaluate every project in a block and summarize it
//! oeem-datastore run-meters --block 1
//! oeem-datastore summarize-block 1
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use oeem_datastore::ci::{PipelineDefinition, PipelineRunner, ShellExecutor};
use oeem_datastore::config::{ConfigManager, DatastoreConfig};
use oeem_datastore::database::{run_migrations, DatabaseConnection};
use oeem_datastore::entrypoint::{Entrypoint, SystemActions};
use oeem_datastore::logging;
use oeem_datastore::meter::{
    import_stations, import_temperatures, import_zipcodes, MeterKind, MeterRunner, PgWeatherSource,
};
use oeem_datastore::models::{AccessToken, Project, ProjectBlock, ProjectOwner, User};
use oeem_datastore::server::{self, ServerOptions};
use oeem_datastore::staticfiles::collect_static;

#[derive(Parser)]
#[command(name = "oeem-datastore")]
#[command(about = "Energy efficiency project datastore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: config)
    #[arg(long, global = true, env = "DATASTORE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the container and exec the application server
    Start {
        /// Forwarded to the server
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run the application server
    Serve(ServeArgs),

    /// Apply pending database migrations
    Migrate,

    /// Copy static files into the static root
    Collectstatic {
        /// Accepted for compatibility; collection never prompts
        #[arg(long)]
        noinput: bool,
    },

    /// Follow every *.log file in a directory on stdout
    TailLogs { dir: PathBuf },

    /// Evaluate savings for a project or every project in a block
    RunMeters(RunMetersArgs),

    /// Sum the latest meter runs of a block by fuel type
    SummarizeBlock { block_id: i64 },

    /// Load weather stations from a JSON array
    ImportStations {
        #[arg(long)]
        file: PathBuf,
    },

    /// Load zipcode centroids from a JSON array
    ImportZipcodes {
        #[arg(long)]
        file: PathBuf,
    },

    /// Load daily temperatures for one station from a JSON array
    ImportTemperatures {
        #[arg(long)]
        station: String,
        #[arg(long)]
        file: PathBuf,
    },

    /// Create an API token, creating the user when needed
    CreateToken {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Space separated scopes
        #[arg(long, default_value = "read write")]
        scope: String,
        #[arg(long, default_value_t = 365)]
        days: i64,
    },

    /// Run the CI pipeline
    Ci {
        #[arg(long, default_value = "ci/travis.yml")]
        file: PathBuf,
        /// Runtime version; all declared versions when omitted
        #[arg(long)]
        version: Option<String>,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    bind: Option<String>,
    #[arg(long)]
    workers: Option<usize>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long)]
    log_level: Option<String>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long = "access-logfile")]
    access_logfile: Option<PathBuf>,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl ServeArgs {
    fn into_options(self, config: &DatastoreConfig) -> ServerOptions {
        let defaults = ServerOptions::from_config(config);
        ServerOptions {
            bind: self.bind.unwrap_or(defaults.bind),
            workers: self.workers.unwrap_or(defaults.workers),
            timeout_seconds: self.timeout.unwrap_or(defaults.timeout_seconds),
            log_level: self.log_level.unwrap_or(defaults.log_level),
            log_file: self.log_file.unwrap_or(defaults.log_file),
            access_log: self.access_logfile.unwrap_or(defaults.access_log),
            extra_args: self.args,
        }
    }
}

#[derive(Args)]
struct RunMetersArgs {
    #[arg(long, conflicts_with = "block", required_unless_present = "block")]
    project: Option<i64>,
    #[arg(long)]
    block: Option<i64>,
    /// residential or commercial
    #[arg(long, default_value = "residential")]
    meter_type: MeterKind,
    /// Evaluation start (RFC 3339); earliest record when omitted
    #[arg(long)]
    start: Option<DateTime<Utc>>,
    /// Evaluation end (RFC 3339); now when omitted
    #[arg(long)]
    end: Option<DateTime<Utc>>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let manager = ConfigManager::load_or_default(cli.config_dir.clone()).context("loading configuration")?;
    let config = manager.config().clone();

    if let Commands::Serve(args) = cli.command {
        let options = args.into_options(&config);
        server::run(options, config)?;
        return Ok(());
    }

    if installs_logging(&cli.command) {
        logging::init_structured_logging();
    }
    let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;

    let result = runtime.block_on(dispatch(cli.command, config, cli.config_dir));
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

/// `tail-logs` writes only the tailed lines to stdout
fn installs_logging(command: &Commands) -> bool {
    !matches!(command, Commands::TailLogs { .. })
}

async fn dispatch(command: Commands, config: DatastoreConfig, config_dir: Option<PathBuf>) -> anyhow::Result<()> {
    match command {
        Commands::Start { args } => start(config, config_dir, args).await,
        Commands::Serve(_) => bail!("serve builds its own runtime"),
        Commands::Migrate => {
            let db = DatabaseConnection::connect(&config.database).await?;
            run_migrations(db.pool()).await?;
            Ok(())
        }
        Commands::Collectstatic { noinput: _ } => {
            let copied = collect_static(&config.static_files)?;
            println!("{copied} static files copied to '{}'.", config.static_files.static_root.display());
            Ok(())
        }
        Commands::TailLogs { dir } => {
            oeem_datastore::logtail::tail_logs(&dir).await?;
            Ok(())
        }
        Commands::RunMeters(args) => run_meters(config, args).await,
        Commands::SummarizeBlock { block_id } => {
            let db = DatabaseConnection::connect(&config.database).await?;
            let block = ProjectBlock::find_by_id(db.pool(), block_id)
                .await?
                .with_context(|| format!("project block {block_id} not found"))?;
            let summaries = block.compute_summary_timeseries(db.pool()).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(())
        }
        Commands::ImportStations { file } => {
            let db = DatabaseConnection::connect(&config.database).await?;
            let count = import_stations(db.pool(), &file).await?;
            println!("Imported {count} weather stations");
            Ok(())
        }
        Commands::ImportZipcodes { file } => {
            let db = DatabaseConnection::connect(&config.database).await?;
            let count = import_zipcodes(db.pool(), &file).await?;
            println!("Imported {count} zipcode centroids");
            Ok(())
        }
        Commands::ImportTemperatures { station, file } => {
            let db = DatabaseConnection::connect(&config.database).await?;
            let count = import_temperatures(db.pool(), &station, &file).await?;
            println!("Imported {count} daily temperatures for {station}");
            Ok(())
        }
        Commands::CreateToken {
            username,
            email,
            scope,
            days,
        } => {
            if days <= 0 {
                bail!("--days must be positive");
            }
            let db = DatabaseConnection::connect(&config.database).await?;
            let user = User::find_or_create(db.pool(), &username, &email).await?;
            ProjectOwner::find_or_create_for_user(db.pool(), user.id).await?;
            let token = AccessToken::generate_token();
            AccessToken::create(db.pool(), user.id, &token, &scope, Duration::days(days)).await?;
            info!(user_id = user.id, scope = %scope, "Created access token");
            println!("{token}");
            Ok(())
        }
        Commands::Ci { file, version } => run_ci(&file, version).await,
    }
}

async fn start(config: DatastoreConfig, config_dir: Option<PathBuf>, args: Vec<String>) -> anyhow::Result<()> {
    // configuration is resolved again once the env file is sourced
    let mut actions = SystemActions::for_current_exe(config.clone())?.with_config_dir(config_dir);
    let program = std::env::current_exe().context("locating the running executable")?;

    let mut entrypoint = Entrypoint::new(config, program);
    let handoff = entrypoint.run(&mut actions, args).await?;

    // only returns when exec fails
    Err(handoff.exec().into())
}

async fn run_meters(config: DatastoreConfig, args: RunMetersArgs) -> anyhow::Result<()> {
    let db = DatabaseConnection::connect(&config.database).await?;
    let pool = db.pool().clone();
    let runner = MeterRunner::new(pool.clone(), PgWeatherSource::new(pool.clone()), config.meter);

    let runs = match (args.project, args.block) {
        (Some(project_id), _) => {
            let project = Project::find_by_id(&pool, project_id)
                .await?
                .with_context(|| format!("project {project_id} not found"))?;
            runner
                .run_project(&project, args.meter_type, args.start, args.end)
                .await?
        }
        (None, Some(block_id)) => {
            let block = ProjectBlock::find_by_id(&pool, block_id)
                .await?
                .with_context(|| format!("project block {block_id} not found"))?;
            block
                .run_meters(&runner, args.meter_type, args.start, args.end)
                .await?
        }
        (None, None) => bail!("one of --project or --block is required"),
    };

    println!("{}", serde_json::to_string_pretty(&runs)?);
    Ok(())
}

async fn run_ci(file: &std::path::Path, version: Option<String>) -> anyhow::Result<()> {
    let definition = PipelineDefinition::from_file(file)?;
    let runner = PipelineRunner::new(definition, ShellExecutor);

    let reports = match version {
        Some(version) => vec![runner.run_version(&version).await?],
        None => runner.run_all().await?,
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    if let Some(failed) = reports.iter().find(|r| !r.succeeded()) {
        process::exit(failed.exit_code());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_logs_installs_no_logging() {
        let cli = Cli::parse_from(["oeem-datastore", "tail-logs", "/srv/logs"]);
        assert!(!installs_logging(&cli.command));

        let cli = Cli::parse_from(["oeem-datastore", "migrate"]);
        assert!(installs_logging(&cli.command));
    }
}
