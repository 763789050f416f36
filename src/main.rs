//! pvchd - Private Channel Daemon
//!
//! Reads commands from stdin, one per line, and runs the expiry sweep in the
//! background until interrupted.

use pvchd::clock::{Clock, SystemClock};
use pvchd::commands::{CommandContext, parse_command};
use pvchd::config::{self, Config, LogFormat, PlatformBackend};
use pvchd::platform::PlatformClient;
use pvchd::platform::discord::DiscordPlatform;
use pvchd::platform::memory::MemoryPlatform;
use pvchd::scheduler::spawn_sweep_task;
use pvchd::state::{DeleteConfirmations, LifecycleHandle, LifecycleSettings};
use pvchd::{http, metrics, persistence};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load {config_path}: {e}"))?;

    init_tracing(config.server.log_format);

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {config_path}",
            errors.len()
        ));
    }

    info!(
        guild = config.guild.id,
        policy = ?config.lifecycle.policy,
        backend = ?config.platform.backend,
        "Starting pvchd"
    );

    // Metrics are optional; port 0 disables the HTTP endpoint.
    if config.server.metrics_port != 0 {
        metrics::init();
        info!("Metrics initialized");
    } else {
        info!("Metrics disabled");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let platform: Arc<dyn PlatformClient> = match config.platform.backend {
        PlatformBackend::Memory => {
            warn!("Using the in-memory platform; channels are not real");
            Arc::new(MemoryPlatform::new(clock.clone()).with_auto_members())
        }
        PlatformBackend::Discord => {
            let token = config.platform.token.as_deref().unwrap_or_default();
            Arc::new(DiscordPlatform::connect(&config.platform.api_base, token, config.guild.id).await?)
        }
    };

    let settings = Arc::new(LifecycleSettings::from_config(&config));

    // Restore the registry from the last checkpoint
    let store = persistence::open(&config.persistence).await?;
    let registry = persistence::restore(
        store.as_ref(),
        platform.as_ref(),
        &settings.policy,
        clock.now(),
    )
    .await?;
    info!(count = registry.len(), "Registry restored");

    let handle = LifecycleHandle::spawn(
        registry,
        Arc::clone(&platform),
        store,
        settings,
        clock.clone(),
    );

    if config.server.metrics_port != 0 {
        let port = config.server.metrics_port;
        let handle = handle.clone();
        tokio::spawn(async move {
            http::run_http_server(port, handle).await;
        });
        info!(port, "HTTP server started");
    }

    let confirmations = Arc::new(DeleteConfirmations::new(
        config.lifecycle.confirm_ttl(),
        clock,
    ));
    let sweep = spawn_sweep_task(
        handle.clone(),
        Arc::clone(&confirmations),
        Duration::from_secs(config.scheduler.sweep_interval_secs),
    );

    let commands = CommandContext::new(handle, platform, confirmations);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Ready; reading commands from stdin (type `help`)");

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(command) = parse_command(&line) {
                        println!("{}", commands.execute(command).await);
                    }
                }
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read command");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    sweep.abort();
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
