use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::netdata_env::NetdataEnv;

/// Name of the configuration file looked up in the agent's config dirs.
pub const CONFIG_FILE: &str = "unbound.yaml";

/// Parse a duration string for clap (e.g., "5s", "500ms", "1m")
fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| {
        format!(
            "Invalid duration format: '{}'. Use formats like '5s', '500ms', '1m'. Error: {}",
            s, e
        )
    })
}

fn default_name() -> String {
    String::from("unbound")
}

fn default_update_every() -> u64 {
    1
}

fn default_retries() -> u32 {
    60
}

fn default_priority() -> i64 {
    60000
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Parser, Clone, Serialize, Deserialize)]
#[command(name = "unbound-plugin")]
#[command(about = "Unbound DNS resolver statistics collector.")]
#[command(version)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Job name, used as the type part of every chart id
    #[arg(long, default_value = "unbound")]
    #[serde(default = "default_name")]
    pub name: String,

    /// Collection interval in seconds
    #[arg(long = "update-every", default_value_t = 1)]
    #[serde(default = "default_update_every")]
    pub update_every: u64,

    /// Consecutive failed collections before the job is disabled
    #[arg(long, default_value_t = 60)]
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Priority of the first chart, the others follow in order
    #[arg(long, default_value_t = 60000)]
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Deadline for one run of the control utility (e.g. "5s", "500ms")
    #[arg(long = "command-timeout", default_value = "5s", value_parser = parse_duration)]
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Path to unbound-control, skips the directory search
    #[arg(long = "binary-path")]
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Collection interval passed by the agent
    #[arg(hide = true)]
    #[serde(skip)]
    pub update_frequency: Option<u64>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            update_every: default_update_every(),
            retries: default_retries(),
            priority: default_priority(),
            command_timeout: default_command_timeout(),
            binary_path: None,
            update_frequency: None,
        }
    }
}

impl PluginConfig {
    /// Load configuration from YAML when running under the agent, from CLI
    /// flags otherwise.
    ///
    /// The interval given by the agent (positional argument or
    /// `NETDATA_UPDATE_EVERY`) is a lower bound for `update_every`.
    pub fn load<I, T>(env: &NetdataEnv, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Self::try_parse_from(args).context("failed to parse command line")?;

        let mut config = if env.running_under_netdata() {
            let mut loaded = None;
            for path in env.config_candidates(CONFIG_FILE) {
                if !path.exists() {
                    continue;
                }
                match Self::from_yaml_file(&path) {
                    Ok(config) => {
                        tracing::info!("loaded configuration from {}", path.display());
                        loaded = Some(config);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("{:#}, trying next location", e);
                    }
                }
            }
            loaded.unwrap_or_default()
        } else {
            cli.clone()
        };

        if let Some(agent_every) = cli.update_frequency.or(env.update_every) {
            config.update_every = config.update_every.max(agent_every);
        }
        config.update_frequency = cli.update_frequency;

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: PluginConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config file: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("name must not be empty");
        }

        if self.name.contains(|c: char| c.is_whitespace() || c == '.') {
            anyhow::bail!("name must not contain whitespace or dots, got: {}", self.name);
        }

        if self.update_every == 0 {
            anyhow::bail!("update_every must be greater than 0");
        }

        if self.retries == 0 {
            anyhow::bail!("retries must be greater than 0");
        }

        if self.command_timeout.is_zero() {
            anyhow::bail!("command_timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_every)
    }
}
