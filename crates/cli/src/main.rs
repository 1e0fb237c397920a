mod args;
mod output;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use figment::providers::Serialized;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ebookbatch_core::converter::{locate_converter, ConverterConfig, EbookConvert};
use ebookbatch_core::{
    build_converter, metrics, settings_figment, ConfigError, RunConfig, RunController,
    RunStatus, Settings,
};

use args::{CheckArgs, Cli, Command, LogFormat, RunArgs};

/// How often the progress line is refreshed.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Some jobs failed, or the run was cancelled.
const EXIT_INCOMPLETE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Check(args) => check(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn load_run_config(args: &RunArgs) -> Result<RunConfig> {
    let config_path = args.config_path();
    if let Some(ref path) = config_path {
        info!("Loading configuration from {:?}", path);
    }

    let settings: Settings = settings_figment(config_path.as_deref())?
        .merge(Serialized::defaults(args.overrides()))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
        .context("Failed to load configuration")?;

    RunConfig::from_settings(settings).context("Configuration validation failed")
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = load_run_config(&args)?;
    if let Some(ref path) = config.converter_path {
        info!("Using converter at {:?}", path);
    }

    let converter = build_converter(&config);
    let controller = Arc::new(RunController::new(config, converter));

    // Subscribe before starting so no job line is missed
    let printer = tokio::spawn(output::print_events(controller.subscribe()));

    if let Err(e) = controller.start().await {
        printer.abort();
        return Err(e).context("Run could not start");
    }

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut interrupted = false;
    let report = loop {
        tokio::select! {
            report = controller.wait() => break report?,
            _ = ticker.tick() => output::print_progress(&controller.snapshot()),
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("Failed to listen for Ctrl-C")?;
                interrupted = true;
                warn!("Interrupted; letting running conversions finish");
                if let Err(e) = controller.cancel() {
                    warn!("Could not cancel: {}", e);
                }
            }
        }
    };

    // Clear the progress line, then let the printer catch up
    output::print_progress(&report.summary);
    eprintln!();
    if printer.await.is_err() {
        warn!("Event printer stopped early");
    }

    println!("{}", report.render_text());

    if let Some(ref path) = args.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        info!("Report written to {:?}", path);
    }

    if args.metrics {
        print!("{}", metrics::render());
    }

    Ok(match report.status {
        _ if report.is_success() => ExitCode::SUCCESS,
        RunStatus::FatalAborted => ExitCode::FAILURE,
        _ => ExitCode::from(EXIT_INCOMPLETE),
    })
}

async fn check(args: CheckArgs) -> Result<ExitCode> {
    let path = locate_converter(args.converter.as_deref()).ok_or_else(|| match args.converter {
        Some(ref path) => anyhow!("Converter not found at {:?}", path),
        None => anyhow!("ebook-convert not found on PATH or in the usual install locations"),
    })?;

    let version = EbookConvert::new(ConverterConfig::with_path(path.clone()))
        .version()
        .await
        .with_context(|| format!("{:?} is not usable", path))?;

    println!("{}: {}", path.display(), version);
    Ok(ExitCode::SUCCESS)
}
