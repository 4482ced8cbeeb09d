use crate::{
    error::CliError,
    job::JobFile,
    shutdown::{INTERRUPTED_EXIT, ShutdownSignal},
};
use clap::Parser;
use commands::Commands;
use connectors::vertica::VerticaClient;
use engine_config::settings::TaskConfig;
use engine_runtime::execution::TransactionOrchestrator;
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod job;
mod output;
mod producer;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "bulkline",
    version,
    about = "Parallel COPY loader for Vertica"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownSignal::listen();

    match run(cli.command, &shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if shutdown.is_requested() => {
            error!(error = %e, "Stopped by shutdown request");
            ExitCode::from(INTERRUPTED_EXIT)
        }
        Err(e) => {
            error!(error = %e, "bulkline failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, shutdown: &ShutdownSignal) -> Result<(), CliError> {
    let client = VerticaClient::new();

    match command {
        Commands::Load {
            config,
            create_table,
            output,
            inputs,
        } => {
            let job = JobFile::load(&config).await?;
            let partitions = inputs.len();
            info!(config = %config, partitions, "Loading input files");

            if create_table {
                let task = TaskConfig::from_options(job.options.clone(), partitions)?;
                conn::create_table(&client, &task, &job.columns).await?;
            }

            let schema = job.columns.clone();
            let (batch_size, has_headers) = (job.batch_size, job.has_headers);
            let outcome = TransactionOrchestrator::new(Arc::new(client))
                .with_cancel(shutdown.token())
                .execute(job.options, job.columns, partitions, move |dispatcher| {
                    producer::produce_files(dispatcher, inputs, schema, batch_size, has_headers)
                })
                .await?;

            match output {
                Some(path) => output::write_report(&outcome, &path).await?,
                None => output::print_report(&outcome)?,
            }
        }
        Commands::Ddl { config } => {
            let job = JobFile::load(&config).await?;
            let task = TaskConfig::from_options(job.options, 1)?;
            println!("{}", conn::create_table_statement(&task, &job.columns)?);
        }
        Commands::TestConn { config } => {
            let job = JobFile::load(&config).await?;
            let task = TaskConfig::from_options(job.options, 1)?;
            conn::test_connection(&client, &task).await?;
            info!(endpoint = %task.connection.endpoint(), "Connection OK");
        }
    }

    if shutdown.is_requested() {
        return Err(CliError::ShutdownRequested);
    }
    Ok(())
}
