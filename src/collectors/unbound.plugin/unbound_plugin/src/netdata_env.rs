use std::env;
use std::path::PathBuf;

/// The subset of the agent's environment this plugin cares about.
#[derive(Debug, Clone, Default)]
pub struct NetdataEnv {
    pub user_config_dir: Option<PathBuf>,
    pub stock_config_dir: Option<PathBuf>,
    pub plugins_dir: Option<PathBuf>,
    pub update_every: Option<u64>,
    pub invocation_id: Option<String>,
    pub systemd_journal_path: Option<PathBuf>,
}

impl NetdataEnv {
    pub fn from_environment() -> Self {
        Self {
            user_config_dir: env::var("NETDATA_USER_CONFIG_DIR").ok().map(PathBuf::from),
            stock_config_dir: env::var("NETDATA_STOCK_CONFIG_DIR").ok().map(PathBuf::from),
            plugins_dir: env::var("NETDATA_PLUGINS_DIR").ok().map(PathBuf::from),
            update_every: env::var("NETDATA_UPDATE_EVERY")
                .ok()
                .and_then(|s| s.parse().ok()),
            invocation_id: env::var("NETDATA_INVOCATION_ID").ok(),
            systemd_journal_path: env::var("NETDATA_SYSTEMD_JOURNAL_PATH")
                .ok()
                .map(PathBuf::from),
        }
    }

    pub fn running_under_netdata(&self) -> bool {
        self.user_config_dir.is_some()
            || self.stock_config_dir.is_some()
            || self.plugins_dir.is_some()
            || self.invocation_id.is_some()
    }

    /// Candidate config files, user directory first.
    pub fn config_candidates(&self, file_name: &str) -> Vec<PathBuf> {
        [&self.user_config_dir, &self.stock_config_dir]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(file_name))
            .collect()
    }
}
