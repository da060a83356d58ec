//! Diagrammer CLI entry point.

use std::{env, process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use diagrammer_cli::{Args, report::reports};

fn main() {
    // Install miette's pretty panic hook early for better panic reports
    miette::set_panic_hook();

    let args = Args::parse();

    // The flag wins over the environment
    let requested = args
        .log_level
        .clone()
        .or_else(|| env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let log_level = LevelFilter::from_str(&requested).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {requested}. Using 'warn' instead.");
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:? = log_level; "Starting Diagrammer");
    debug!(args:? = args; "Parsed arguments");

    match diagrammer_cli::run(&args) {
        Ok(outcome) => {
            match outcome.to_json() {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    error!(err = err.to_string(); "Failed to encode output");
                    process::exit(1);
                }
            }
            if !outcome.is_success() {
                process::exit(1);
            }
        }
        Err(err) => {
            let reporter = miette::GraphicalReportHandler::new();

            // Render each diagnostic independently
            for report in reports(&err) {
                let mut writer = String::new();
                if reporter.render_report(&mut writer, &report).is_err() {
                    writer = report.to_string();
                }
                error!("{writer}");
            }

            process::exit(1);
        }
    }

    info!("Completed successfully");
}
