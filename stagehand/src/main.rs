//! stagehand - Entry Point
//!
//! Triggers a staging release on the platform, polls it to a terminal state
//! and reports the outcome on the originating pull request.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use stagehand::app::options::AppOptions;
use stagehand::app::run::run;
use stagehand::logs::{init_logging, parse_level, LogOptions};
use stagehand::storage::settings::Settings;
use stagehand::utils::version_info;

use tracing::level_filters::LevelFilter;
use tracing::{error, info};

/// Exit code for configuration and startup errors
const EXIT_SETUP_ERROR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    let settings = match Settings::load(&cli_args, |key| env::var(key).ok()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::from(EXIT_SETUP_ERROR);
        }
    };

    // Initialize logging, the guard flushes the file sink on exit
    let log_options = LogOptions {
        log_level: parse_level(&settings.log_level).unwrap_or(LevelFilter::INFO),
        json_format: settings.log_json,
        log_dir: settings.log_dir.as_ref().map(PathBuf::from),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match AppOptions::from_settings(&settings) {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(EXIT_SETUP_ERROR);
        }
    };

    info!("Running stagehand {} with options: {:?}", version_info().version, options);
    let report = match run(&options, await_shutdown_signal()).await {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to run the deploy: {e}");
            return ExitCode::from(EXIT_SETUP_ERROR);
        }
    };

    println!("{}", report.colored_summary());
    ExitCode::from(report.exit_code() as u8)
}

/// Resolves when the orchestrator cancels this run
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, cancellation disabled");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling deploy...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, cancelling deploy...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to listen for Ctrl+C, cancellation disabled");
            return std::future::pending().await;
        }
        info!("Ctrl+C received, cancelling deploy...");
    }
}
