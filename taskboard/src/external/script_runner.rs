// Runs user scripts for script actions

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::domain::action_type::ScriptRunner;
use crate::domain::{DomainError, DomainResult};

pub struct ShellScriptRunner {
    scripts_dir: PathBuf,
    enabled: bool,
}

impl ShellScriptRunner {
    pub fn new(scripts_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            enabled,
        }
    }

    /// Relative paths live under the scripts dir.
    fn resolve(&self, script_path: &str) -> DomainResult<PathBuf> {
        let path = Path::new(script_path);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.scripts_dir.join(path)
        };
        let meta = std::fs::metadata(&path)
            .map_err(|_| DomainError::external(format!("script not found: {}", path.display())))?;
        if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
            return Err(DomainError::external(format!(
                "script is not executable: {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

impl ScriptRunner for ShellScriptRunner {
    fn run_script(&self, script_path: &str, env: &HashMap<String, String>) -> DomainResult<String> {
        if !self.enabled {
            return Err(DomainError::external("script execution is disabled"));
        }
        let path = self.resolve(script_path)?;
        let output = Command::new(&path)
            .envs(env)
            .current_dir(path.parent().unwrap_or(self.scripts_dir.as_path()))
            .output()
            .map_err(|e| DomainError::external(format!("failed to run script {}: {e}", path.display())))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(DomainError::external(format!(
                "script {} failed ({}): {}",
                path.display(),
                output.status,
                combined.trim()
            )));
        }
        info!(script = %path.display(), "Script completed");
        Ok(combined)
    }
}
