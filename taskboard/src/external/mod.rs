// Adapters for the world outside the daemon: git, tmux, the filesystem,
// desktop notifications and user scripts

pub mod desktop_notifier;
pub mod git;
pub mod script_runner;
pub mod tmux;
pub mod watcher;

pub use desktop_notifier::DesktopNotifier;
pub use git::GitCli;
pub use script_runner::ShellScriptRunner;
pub use tmux::TmuxTracker;
pub use watcher::NotifyChangeWatcher;
