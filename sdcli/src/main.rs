mod cli;
mod config;
mod logging;
mod report;

use clap::Parser;
use cli::Args;
use config::{config_path, get_default_config_toml, ConfigError};
use console::style;
use libsubdomain_storm::{Discovery, DiscoveryError, SourceStatus};
use std::{io, process::ExitCode, time::Duration};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to set up discovery: {0}")]
    Setup(#[from] DiscoveryError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// 2 for anything rejected before the scan starts, 1 otherwise.
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Upper bound on waiting for leftover runtime tasks, such as blocking
/// address lookups, once the results are in.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let prefix = match e {
                CliError::Config(_) => "[!] Configuration error:",
                _ => "[!]",
            };
            eprintln!("{} {}", style(prefix).red().bold().for_stderr(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    if args.print_default_config {
        println!("{}", get_default_config_toml());
        return Ok(());
    }

    if args.write_default_config {
        let Some(path) = config_path() else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "could not determine config path").into());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, get_default_config_toml())?;
        println!("Default config written to: {}", path.display());
        return Ok(());
    }

    logging::init(args.verbose);

    let file_config = config::load_config()?;
    let run_config = config::resolve(&args, &file_config)?;
    let output = report::open_output(&run_config.output)?;

    info!("Starting subdomain discovery for: {}", run_config.domain);
    info!("Output file: {}", run_config.output.display());
    info!("Concurrency limit: {}", run_config.scan.concurrency);

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let discovery = Discovery::with_config(run_config.scan.clone())?;
        let interrupted = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => warn!("Execution interrupted by user, keeping partial results"),
                Err(_) => std::future::pending::<()>().await,
            }
        };
        Ok::<_, CliError>(discovery.run_until(&run_config.domain, interrupted).await)
    });
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    let result = result?;

    for (source, summary) in &result.sources {
        if let SourceStatus::Failed(reason) = &summary.status {
            error!("[{}] Source failed: {}", source, reason);
        }
    }

    report::write_subdomains(output, &result.subdomains)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        report::print_summary(&result, &report::display_path(&run_config.output));
    }

    Ok(())
}
