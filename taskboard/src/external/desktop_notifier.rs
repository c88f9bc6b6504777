// Desktop notifications: notify-send on Linux, osascript on macOS

use std::collections::HashMap;
use std::process::Command;
use tracing::debug;

use crate::domain::action_type::Notifier;
use crate::domain::{DomainError, DomainResult};

pub struct DesktopNotifier {
    app_name: String,
    enabled: bool,
}

impl DesktopNotifier {
    pub fn new(app_name: &str, enabled: bool) -> Self {
        Self {
            app_name: app_name.to_string(),
            enabled,
        }
    }
}

/// Escape for an AppleScript string literal.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(target_os = "macos")]
fn platform_command(_app_name: &str, title: &str, message: &str) -> Option<Command> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(message),
        escape_applescript(title)
    );
    let mut command = Command::new("osascript");
    command.args(["-e", &script]);
    Some(command)
}

#[cfg(target_os = "linux")]
fn platform_command(app_name: &str, title: &str, message: &str) -> Option<Command> {
    let mut command = Command::new("notify-send");
    command.args(["-u", "normal", "-a", app_name, title, message]);
    Some(command)
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_command(_app_name: &str, _title: &str, _message: &str) -> Option<Command> {
    None
}

impl Notifier for DesktopNotifier {
    fn send_notification(&self, title: &str, message: &str, _metadata: &HashMap<String, String>) -> DomainResult<()> {
        if !self.enabled {
            debug!(title, "Notifications disabled, dropping");
            return Ok(());
        }
        let mut command =
            platform_command(&self.app_name, title, message).ok_or(DomainError::NotifierNotAvailable)?;
        let output = command
            .output()
            .map_err(|e| DomainError::external(format!("failed to send notification: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DomainError::external(format!(
                "failed to send notification: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_silent() {
        let notifier = DesktopNotifier::new("taskboard", false);
        assert!(notifier.send_notification("t", "m", &HashMap::new()).is_ok());
    }

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
