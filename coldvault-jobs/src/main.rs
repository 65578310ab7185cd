//! COLDVAULT command line entry point.
//!
//! ```text
//! coldvault [run]     periodic archive task until Ctrl-C
//! coldvault sweep     one archive run, report printed as JSON
//! coldvault get <id>  read a record, falling back to the archive
//! ```

use std::sync::Arc;

use coldvault_core::{ColdVaultConfig, ColdVaultResult, ConfigError};
use coldvault_jobs::{
    archive_task, init_tracing, ArchiveTaskConfig, Archiver, FallbackReader, JobContext,
    TelemetryConfig,
};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Run,
    Sweep,
    Get(String),
}

impl Command {
    fn parse<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let command = match args.next().as_deref() {
            None | Some("run") => Command::Run,
            Some("sweep") => Command::Sweep,
            Some("get") => match args.next() {
                Some(id) if !id.is_empty() => Command::Get(id),
                _ => return Err(usage("get requires a record id")),
            },
            Some(other) => return Err(usage(&format!("unknown command {:?}", other))),
        };
        if let Some(extra) = args.next() {
            return Err(usage(&format!("unexpected argument {:?}", extra)));
        }
        Ok(command)
    }
}

fn usage(reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: "command".to_string(),
        value: std::env::args().skip(1).collect::<Vec<_>>().join(" "),
        reason: format!("{}; usage: coldvault [run | sweep | get <id>]", reason),
    }
}

#[tokio::main]
async fn main() -> ColdVaultResult<()> {
    let command = Command::parse(std::env::args().skip(1))?;

    let telemetry = TelemetryConfig::from_env()?;
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("Tracing subscriber not installed: {}", e);
    }

    let config = ColdVaultConfig::from_env()?;
    let context = JobContext::from_config(&config)?;

    match command {
        Command::Run => run(context, &config).await,
        Command::Sweep => {
            let report = Archiver::from_config(context, &config)
                .archive_old_records()
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Get(id) => {
            let read = FallbackReader::new(context).get_billing_record(&id).await?;
            println!("{}", String::from_utf8_lossy(&read.to_json_bytes()?));
            Ok(())
        }
    }
}

async fn run(context: JobContext, config: &ColdVaultConfig) -> ColdVaultResult<()> {
    let archiver = Arc::new(Archiver::from_config(context, config));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(archive_task(
        archiver,
        ArchiveTaskConfig::from(config),
        shutdown_rx,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    } else {
        tracing::info!("Shutdown signal received");
    }

    let _ = shutdown_tx.send(true);
    match handle.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                runs = snapshot.runs,
                records_archived = snapshot.records_archived,
                "Archive task stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Archive task panicked"),
    }
    Ok(())
}
