// Environment configuration for the daemon
// Platform-specific paths for the socket, PID lock and data, plus user settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::automation::manager::ActionManagerConfig;
use crate::sessions::manager::SessionManagerConfig;
use crate::time_tracking::TimeTrackingConfig;

/// Overrides both the runtime and the state directory.
pub const DAEMON_DIR_ENV: &str = "TASKBOARD_DAEMON_DIR";

/// Configuration for daemon paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime files (socket, PID lock)
    pub runtime_dir: PathBuf,
    /// Directory for durable state (collections, settings, scripts)
    pub state_dir: PathBuf,
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Path to the daemon PID lock file
    pub pid_file: PathBuf,
}

impl Config {
    /// Create configuration using default paths
    pub fn default_paths() -> Self {
        Self::rooted(Self::default_runtime_dir(), Self::default_state_dir())
    }

    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        if let Ok(override_dir) = std::env::var(DAEMON_DIR_ENV) {
            let base = PathBuf::from(override_dir);
            return Self::rooted(base.clone(), base);
        }

        Self::default_paths()
    }

    /// Every path under one directory. Used by tests and `TASKBOARD_DAEMON_DIR`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::rooted(dir.to_path_buf(), dir.to_path_buf())
    }

    fn rooted(runtime_dir: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            socket_path: runtime_dir.join("daemon.sock"),
            pid_file: runtime_dir.join("daemon.pid"),
            runtime_dir,
            state_dir,
        }
    }

    fn default_runtime_dir() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            // Prefer XDG_RUNTIME_DIR, else share the state dir
            if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
                PathBuf::from(runtime_dir).join("taskboard")
            } else {
                Self::default_state_dir()
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            Self::default_state_dir()
        }
    }

    fn default_state_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".taskboard"))
            .unwrap_or_else(|| PathBuf::from("/tmp/taskboard"))
    }

    /// JSON collections (boards, actions, projects, time logs)
    pub fn data_dir(&self) -> PathBuf {
        self.state_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.state_dir.join("settings.json")
    }

    /// Default location for automation scripts
    pub fn scripts_dir(&self) -> PathBuf {
        self.state_dir.join("scripts")
    }

    /// Ensure both directories exist; the runtime dir is owner-only
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        std::fs::create_dir_all(&self.runtime_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.runtime_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }

    pub fn remove_socket(&self) -> std::io::Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
        } else {
            Ok(())
        }
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    pub fn load_settings(&self) -> Result<Settings> {
        Settings::load(&self.settings_file())
    }
}

// ============================================================================
// User settings
// ============================================================================

/// Contents of `settings.json`. Every field is optional on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session_tracking: SessionTrackingSettings,
    pub actions: ActionSettings,
    pub time_tracking: TimeTrackingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTrackingSettings {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// Only "tmux" is supported; anything else disables session tracking.
    pub tracker: String,
    pub git_sync: GitSyncSettings,
}

impl Default for SessionTrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 5,
            tracker: "tmux".to_string(),
            git_sync: GitSyncSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSyncSettings {
    pub enabled: bool,
    pub auto_sync_branches: bool,
    pub watch_for_changes: bool,
}

impl Default for GitSyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_sync_branches: true,
            watch_for_changes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSettings {
    pub enabled: bool,
    pub check_interval_secs: u64,
    pub notifications_enabled: bool,
    pub scripts_enabled: bool,
    /// Defaults to `<state dir>/scripts`.
    pub scripts_dir: Option<PathBuf>,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 60,
            notifications_enabled: true,
            scripts_enabled: true,
            scripts_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeTrackingSettings {
    pub enabled: bool,
    pub auto_track: bool,
    pub poll_interval_secs: u64,
}

impl Default for TimeTrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_track: true,
            poll_interval_secs: 5,
        }
    }
}

impl Settings {
    /// Missing file means defaults; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl SessionTrackingSettings {
    pub fn uses_tmux(&self) -> bool {
        self.tracker.eq_ignore_ascii_case("tmux")
    }

    /// Branch sync runs only when both git switches are on.
    pub fn syncs_branches(&self) -> bool {
        self.git_sync.enabled && self.git_sync.auto_sync_branches
    }

    pub fn manager_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            enabled: self.enabled,
            poll_interval: secs(self.poll_interval_secs, 5),
            watch_for_changes: self.syncs_branches() && self.git_sync.watch_for_changes,
        }
    }
}

impl ActionSettings {
    pub fn manager_config(&self) -> ActionManagerConfig {
        ActionManagerConfig {
            enabled: self.enabled,
            check_interval: secs(self.check_interval_secs, 60),
        }
    }
}

impl TimeTrackingSettings {
    pub fn manager_config(&self) -> TimeTrackingConfig {
        TimeTrackingConfig {
            enabled: self.enabled,
            auto_track: self.auto_track,
            poll_interval: secs(self.poll_interval_secs, 5),
        }
    }
}

// Zero would spin the loop
fn secs(value: u64, fallback: u64) -> Duration {
    Duration::from_secs(if value == 0 { fallback } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_from_env() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var(DAEMON_DIR_ENV, temp_dir.path());

        let config = Config::from_env();
        assert_eq!(config.runtime_dir, temp_dir.path());
        assert_eq!(config.state_dir, temp_dir.path());
        assert_eq!(config.socket_path, temp_dir.path().join("daemon.sock"));
        assert_eq!(config.pid_file, temp_dir.path().join("daemon.pid"));

        std::env::remove_var(DAEMON_DIR_ENV);
    }

    #[test]
    fn test_state_paths_use_state_dir() {
        let config = Config {
            runtime_dir: PathBuf::from("/test/runtime"),
            state_dir: PathBuf::from("/test/state"),
            socket_path: PathBuf::from("/test/runtime/daemon.sock"),
            pid_file: PathBuf::from("/test/runtime/daemon.pid"),
        };

        assert_eq!(config.data_dir(), PathBuf::from("/test/state/data"));
        assert_eq!(config.settings_file(), PathBuf::from("/test/state/settings.json"));
        assert_eq!(config.scripts_dir(), PathBuf::from("/test/state/scripts"));
        assert!(config.socket_path.starts_with(&config.runtime_dir));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_runtime_dir_follows_xdg() {
        std::env::set_var("XDG_RUNTIME_DIR", "/run/user/1000");
        let config = Config::default_paths();
        assert_eq!(config.runtime_dir, PathBuf::from("/run/user/1000/taskboard"));
        assert!(config.state_dir.ends_with(".taskboard"));

        std::env::remove_var("XDG_RUNTIME_DIR");
        let config = Config::default_paths();
        assert_eq!(config.runtime_dir, config.state_dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_dirs_creates_runtime_dir_with_0700() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            runtime_dir: temp_dir.path().join("runtime"),
            state_dir: temp_dir.path().join("state"),
            socket_path: temp_dir.path().join("runtime/daemon.sock"),
            pid_file: temp_dir.path().join("runtime/daemon.pid"),
        };

        config.ensure_dirs().unwrap();

        let mode = std::fs::metadata(&config.runtime_dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700, "runtime_dir should have 0700 permissions");
        assert!(config.state_dir.exists());
    }

    #[test]
    fn test_missing_settings_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Config::in_dir(temp_dir.path()).load_settings().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.session_tracking.uses_tmux());
        assert_eq!(settings.actions.manager_config().check_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_partial_settings_keep_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::in_dir(temp_dir.path());
        std::fs::write(
            config.settings_file(),
            r#"{"session_tracking": {"poll_interval_secs": 2, "git_sync": {"watch_for_changes": false}},
                "actions": {"scripts_enabled": false}}"#,
        )
        .unwrap();

        let settings = config.load_settings().unwrap();
        let sessions = settings.session_tracking.manager_config();
        assert_eq!(sessions.poll_interval, Duration::from_secs(2));
        assert!(!sessions.watch_for_changes);
        assert!(settings.session_tracking.syncs_branches());
        assert!(!settings.actions.scripts_enabled);
        assert!(settings.actions.notifications_enabled);
        assert!(settings.time_tracking.auto_track);
    }

    #[test]
    fn test_disabled_git_sync_disables_watching() {
        let mut settings = SessionTrackingSettings::default();
        settings.git_sync.auto_sync_branches = false;
        assert!(!settings.syncs_branches());
        assert!(!settings.manager_config().watch_for_changes);
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::in_dir(temp_dir.path());
        std::fs::write(config.settings_file(), "{not json").unwrap();
        let err = config.load_settings().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }
}
