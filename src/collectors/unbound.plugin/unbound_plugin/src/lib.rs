//! Netdata collector for the Unbound DNS resolver.
//!
//! Every cycle the plugin runs `unbound-control stats_noreset`, folds the
//! `key=value` output into a map kept across cycles, and writes the values
//! of a fixed set of charts to stdout using the Netdata plugin protocol.

use std::future::Future;
use std::io::Write;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub mod collector;
pub mod control;
pub mod error;
pub mod job;
pub mod netdata_env;
pub mod output;
pub mod plugin_config;
pub mod projector;
pub mod schema;
pub mod stats;
mod tracing_setup;

pub use collector::{Collector, CollectorState};
pub use control::{StatsSource, UnboundControl};
pub use error::CollectorError;
pub use job::{Job, JobSettings, TickOutcome};
pub use netdata_env::NetdataEnv;
pub use plugin_config::PluginConfig;
pub use tracing_setup::init_tracing;

/// Entry point for unbound-plugin
///
/// # Arguments
/// * `args` - Command-line arguments, including argv[0]
///
/// # Returns
/// Exit code (0 for success, non-zero for errors)
pub fn run(args: Vec<String>) -> i32 {
    let env = NetdataEnv::from_environment();
    init_tracing(&env, "info");

    // Collection cycles run one after another, a single thread is enough.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(run_internal(&env, args)) {
        Ok(()) => {
            info!("plugin stopped");
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

async fn run_internal(env: &NetdataEnv, args: Vec<String>) -> Result<()> {
    let config =
        PluginConfig::load(env, args).context("failed to initialize plugin configuration")?;
    info!(
        "configuration loaded: name={}, update_every={}s, retries={}, priority={}, command_timeout={:?}",
        config.name, config.update_every, config.retries, config.priority, config.command_timeout
    );

    let mut control = UnboundControl::new(config.command_timeout);
    if let Some(path) = &config.binary_path {
        control = control.with_binary_path(path);
    }

    let job = Job::new(
        Collector::new(control, schema::CHARTS),
        JobSettings::from(&config),
    );

    run_job(job, &mut std::io::stdout(), shutdown_signal()).await
}

/// Start `job` and tick it every `update_every` until `shutdown` resolves.
///
/// Protocol output is flushed to `out` after start and after every tick.
/// Returns an error once the job is disabled, after its `DISABLE` line was
/// written.
pub async fn run_job<S, W, F>(mut job: Job<S>, out: &mut W, shutdown: F) -> Result<()>
where
    S: StatsSource,
    W: Write,
    F: Future<Output = ()>,
{
    let started = job.start().await;
    job.flush_to(out).context("failed to write chart definitions")?;
    started.with_context(|| format!("job '{}' disabled", job.settings().name))?;

    let mut interval = tokio::time::interval(job.settings().update_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                let outcome = job.tick(SystemTime::now()).await;
                job.flush_to(out).context("failed to write chart data")?;

                if outcome == TickOutcome::Disabled {
                    anyhow::bail!(
                        "job '{}' disabled after {} failed collections",
                        job.settings().name,
                        job.settings().retries
                    );
                }
            }
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
