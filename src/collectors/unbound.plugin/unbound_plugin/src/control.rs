//! Discovery and invocation of `unbound-control`.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{CollectorError, Result};

/// Name of the resolver's control utility.
pub const CONTROL_BINARY: &str = "unbound-control";

/// Control command printing statistics without resetting the counters.
pub const STATS_COMMAND: &str = "stats_noreset";

/// Prefix used to run the control utility with elevated privileges.
pub const ELEVATION_PREFIX: &str = "sudo";

/// Installation directories searched after `PATH`.
const STANDARD_DIRS: &[&str] = &[
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];

/// Something that produces raw statistics text on demand.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Resolve whatever the source needs before the first fetch.
    fn locate(&mut self) -> Result<()>;

    /// Fetch the current statistics output.
    async fn fetch(&self) -> Result<String>;
}

/// Directories searched for the control binary: `PATH` first, then the
/// standard installation directories. Duplicates are dropped.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default();
    dirs.extend(STANDARD_DIRS.iter().map(PathBuf::from));

    let mut seen = std::collections::HashSet::new();
    dirs.retain(|dir| !dir.as_os_str().is_empty() && seen.insert(dir.clone()));
    dirs
}

/// First executable regular file called `name` in `dirs`.
pub fn find_binary<P: AsRef<Path>>(name: &str, dirs: &[P]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.as_ref().join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Runs `[sudo] unbound-control stats_noreset` and captures its output.
#[derive(Debug, Clone)]
pub struct UnboundControl {
    binary_name: String,
    search_dirs: Vec<PathBuf>,
    explicit_path: Option<PathBuf>,
    elevation: Option<String>,
    timeout: Duration,
    resolved: Option<PathBuf>,
}

impl UnboundControl {
    /// Search the default directories for `unbound-control`, elevated with `sudo`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary_name: String::from(CONTROL_BINARY),
            search_dirs: search_dirs(),
            explicit_path: None,
            elevation: Some(String::from(ELEVATION_PREFIX)),
            timeout,
            resolved: None,
        }
    }

    /// Use this path instead of searching for the binary.
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Search these directories instead of the default ones.
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Run the binary without an elevation prefix.
    pub fn without_elevation(mut self) -> Self {
        self.elevation = None;
        self
    }

    /// The binary found by [`StatsSource::locate`], if any.
    pub fn binary(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    /// The full command line, for logs and error messages.
    pub fn command_line(&self) -> String {
        let binary = self
            .resolved
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.binary_name.clone());

        match &self.elevation {
            Some(prefix) => format!("{} {} {}", prefix, binary, STATS_COMMAND),
            None => format!("{} {}", binary, STATS_COMMAND),
        }
    }

    fn command(&self, binary: &Path) -> Command {
        let mut cmd = match &self.elevation {
            Some(prefix) => {
                let mut cmd = Command::new(prefix);
                cmd.arg(binary);
                cmd
            }
            None => Command::new(binary),
        };

        cmd.arg(STATS_COMMAND)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl StatsSource for UnboundControl {
    fn locate(&mut self) -> Result<()> {
        let found = match &self.explicit_path {
            Some(path) if is_executable(path) => Some(path.clone()),
            Some(_) => None,
            None => find_binary(&self.binary_name, &self.search_dirs),
        };

        let Some(path) = found else {
            return Err(CollectorError::BinaryNotFound {
                name: self
                    .explicit_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.binary_name.clone()),
            });
        };

        info!("found control binary at {}", path.display());
        self.resolved = Some(path);
        Ok(())
    }

    async fn fetch(&self) -> Result<String> {
        let binary = self
            .resolved
            .as_deref()
            .ok_or_else(|| CollectorError::BinaryNotFound {
                name: self.binary_name.clone(),
            })?;

        let command = self.command_line();
        debug!("running {}", command);

        let child = self
            .command(binary)
            .spawn()
            .map_err(|source| CollectorError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CollectorError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CollectorError::Timeout {
                    command,
                    after: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(CollectorError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| CollectorError::InvalidOutput { command })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, mode: u32) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_find_binary_skips_non_executable() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(&first, CONTROL_BINARY, 0o644);
        let expected = touch(&second, CONTROL_BINARY, 0o755);

        let found = find_binary(CONTROL_BINARY, &[first.path(), second.path()]);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_find_binary_skips_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(CONTROL_BINARY)).unwrap();

        assert_eq!(find_binary(CONTROL_BINARY, &[dir.path()]), None);
    }

    #[test]
    fn test_search_dirs_include_standard_dirs() {
        let dirs = search_dirs();
        for dir in STANDARD_DIRS {
            assert!(dirs.contains(&PathBuf::from(dir)), "{}", dir);
        }

        let unique: std::collections::HashSet<_> = dirs.iter().collect();
        assert_eq!(unique.len(), dirs.len());
    }

    #[test]
    fn test_locate_missing_binary() {
        let dir = TempDir::new().unwrap();
        let mut control = UnboundControl::new(Duration::from_secs(1))
            .with_search_dirs(vec![dir.path().to_path_buf()]);

        let err = control.locate().unwrap_err();
        assert!(matches!(err, CollectorError::BinaryNotFound { .. }));
        assert!(control.binary().is_none());
    }

    #[test]
    fn test_command_line_has_elevation_prefix() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, CONTROL_BINARY, 0o755);

        let mut control = UnboundControl::new(Duration::from_secs(1))
            .with_search_dirs(vec![dir.path().to_path_buf()]);
        control.locate().unwrap();

        assert_eq!(
            control.command_line(),
            format!("sudo {} stats_noreset", path.display())
        );
        assert_eq!(
            control.without_elevation().command_line(),
            format!("{} stats_noreset", path.display())
        );
    }

    #[tokio::test]
    async fn test_fetch_captures_stdout() {
        // echo prints its arguments, so the output is the stats command itself
        let mut control = UnboundControl::new(Duration::from_secs(5))
            .with_binary_path("/bin/echo")
            .without_elevation();
        control.locate().unwrap();

        let output = control.fetch().await.unwrap();
        assert_eq!(output.trim(), STATS_COMMAND);
    }

    #[tokio::test]
    async fn test_fetch_reports_exit_status() {
        let mut control = UnboundControl::new(Duration::from_secs(5))
            .with_binary_path("/bin/false")
            .without_elevation();
        control.locate().unwrap();

        let err = control.fetch().await.unwrap_err();
        assert!(matches!(err, CollectorError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_before_locate() {
        let control = UnboundControl::new(Duration::from_secs(5));
        assert!(control.fetch().await.is_err());
    }
}
