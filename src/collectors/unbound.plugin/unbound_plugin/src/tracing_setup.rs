//! Tracing configuration.
//!
//! Logs go to the systemd journal when the agent provides one
//! (`NETDATA_SYSTEMD_JOURNAL_PATH`), and to stderr otherwise. Stdout is
//! reserved for the plugin protocol.

use tracing_subscriber::{EnvFilter, prelude::*};

use crate::netdata_env::NetdataEnv;

/// Output destination for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Journal,
    Stderr,
}

impl LogOutput {
    fn detect(env: &NetdataEnv) -> Self {
        if env.systemd_journal_path.is_some() {
            LogOutput::Journal
        } else {
            LogOutput::Stderr
        }
    }
}

/// Initialize tracing.
///
/// Respects RUST_LOG, otherwise uses `default_filter`. Falls back to stderr
/// when the journal cannot be reached.
pub fn init_tracing(env: &NetdataEnv, default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    let mut output = LogOutput::detect(env);
    let journald_layer = match output {
        LogOutput::Journal => match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_syslog_identifier(String::from("unbound.plugin"))),
            Err(e) => {
                eprintln!("failed to connect to journald, logging to stderr: {}", e);
                output = LogOutput::Stderr;
                None
            }
        },
        LogOutput::Stderr => None,
    };

    match journald_layer {
        Some(layer) => registry.with(layer).init(),
        None => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false);
            registry.with(fmt_layer).init();
        }
    }

    tracing::info!(
        output = ?output,
        "tracing initialized with filter '{}'",
        default_filter,
    );
}
