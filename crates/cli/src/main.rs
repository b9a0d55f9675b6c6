use crate::{
    error::CliError,
    options::OptionSet,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::{Commands, OptionArgs};
use engine_config::{WriteConfig, resolve};
use engine_processing::LoadWrite;
use engine_runtime::{LoadJob, execution::factory::create_client};
use model::{
    core::identifiers::JobId,
    records::{row::RowData, schema::Schema},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

mod commands;
mod error;
mod input;
mod options;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "bulkload",
    version = "0.1.0",
    about = "Bulk load rows into an analytical store over HTTP stream load"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(e) = engine_core::telemetry::init("info") {
        eprintln!("{e}");
    }

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(e) if e.is_shutdown() || shutdown.is_shutdown_requested() => {
            error!(error = %e, "Load stopped by shutdown request");
            ExitCode::ShutdownRequested
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::GeneralError
        }
    };
    code.into()
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Load {
            options,
            input,
            job_id,
            label,
            parallelism,
            output,
        } => {
            let config = write_config(&options)?;
            let rows = input::read_rows(&input)?;
            let schema = infer_schema(&config, rows.first());
            let write = LoadWrite::new(config, &schema)?;
            info!(
                write = %write.description(),
                rows = rows.len(),
                input = %input,
                "Starting load"
            );

            let job = LoadJob {
                job_id: JobId::new(
                    job_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
                ),
                label,
                default_parallelism: parallelism,
            };
            let client = create_client(write.load_properties())?;
            let summary =
                engine_runtime::run(&write, job, rows, client, shutdown.cancel_token()).await?;

            match output {
                Some(path) => output::write_report(&summary, &path).await?,
                None => output::print_report(&summary)?,
            }
        }
        Commands::Describe { options, input } => {
            let config = write_config(&options)?;
            let first = match input {
                Some(path) => input::read_rows(path)?.into_iter().next(),
                None => None,
            };
            let schema = infer_schema(&config, first.as_ref());
            let write = LoadWrite::new(config, &schema)?;

            output::print_report(&json!({
                "description": write.description(),
                "plan": write.plan(),
                "plan_hash": write.plan().hash(),
                "load_properties": &**write.load_properties(),
            }))?;
        }
    }

    Ok(())
}

fn write_config(args: &OptionArgs) -> Result<WriteConfig, CliError> {
    let mut options = OptionSet::new();
    if let Some(path) = &args.options_file {
        options.load_from_file(path)?;
    }
    for arg in &args.options {
        options.push_arg(arg)?;
    }

    let job_config = resolve(options.into_resolvable());
    debug!(options = ?job_config.redacted(), "Resolved options");
    Ok(job_config.as_write_config()?)
}

/// The declared column list wins; otherwise the first row's fields.
fn infer_schema(config: &WriteConfig, first: Option<&RowData>) -> Schema {
    match (config.columns(), first) {
        (Some(columns), _) => Schema::new(columns.iter().map(String::as_str)),
        (None, Some(row)) => Schema::from_row(row),
        (None, None) => Schema::default(),
    }
}
