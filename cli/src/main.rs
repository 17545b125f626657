//! Tether CLI - binary entry point.
//!
//! # Architecture
//!
//! ```text
//! main() -> ShellConfig::load() -> CounterCore + Capabilities::reqwest()
//!        -> tether_engine::start()  (StartWatch dispatched)
//!        -> presenter::run()        (stdin actions, view updates, faults)
//!        -> Runtime::stop()
//! ```
//!
//! Logs go to `~/.tether/logs/tether.log`, never to stdout, which belongs to
//! the presenter.

mod presenter;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tether_core::{CounterCore, DEFAULT_API_BASE};
use tether_engine::ShellConfig;
use tether_engine::tether_providers::Capabilities;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_tether_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_tether_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in tether_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn tether_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.tether/logs/tether.log
    if let Some(config_path) = ShellConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("tether.log"));
    }

    // Fallback: ./.tether/logs/tether.log
    candidates.push(PathBuf::from(".tether").join("logs").join("tether.log"));

    candidates
}

fn load_config() -> ShellConfig {
    match ShellConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("{err}; using defaults");
            ShellConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config();
    let api_base = config
        .api_base()
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let capabilities = Capabilities::reqwest(&config.http_settings(), &config.connect_policy())
        .context("failed to build HTTP clients")?;

    tracing::info!(api_base = %api_base, "Starting shell");
    let core = CounterCore::new(api_base);
    let mut runtime = tether_engine::start(Box::new(core), capabilities, &config.dispatch())
        .await
        .context("failed to start dispatch loop")?;

    let result = tokio::select! {
        result = presenter::run(
            &mut runtime,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        ) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    if let Err(err) = runtime.stop().await {
        tracing::error!("Dispatch loop did not stop cleanly: {err}");
    }
    tracing::info!("Shell exited");

    result
}
