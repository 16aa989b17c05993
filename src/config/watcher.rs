//! Hot reload of the configuration file.
//!
//! The file's parent directory is watched rather than the file itself, so
//! editors that save by writing a new file and renaming it over the old one
//! are still seen. Each relevant event re-reads and validates the file; only
//! a valid configuration that differs from the last one forwarded goes out on
//! the update channel.

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::IntakeConfig;

/// Forwards validated edits of one configuration file.
pub struct ConfigWatcher {
    path: PathBuf,
    current: IntakeConfig,
    update_tx: mpsc::UnboundedSender<IntakeConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration already loaded from `path`.
    pub fn new(path: &Path, current: IntakeConfig) -> (Self, mpsc::UnboundedReceiver<IntakeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Events stop once the returned handle is dropped.
    pub fn run(mut self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watched_dir(&self.path);
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    self.handle(&event);
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }

    /// React to one filesystem event. Returns whether an update was sent.
    fn handle(&mut self, event: &Event) -> bool {
        if !(event.kind.is_modify() || event.kind.is_create()) || !self.concerns(event) {
            return false;
        }

        match load_config(&self.path) {
            Ok(next) if next == self.current => {
                tracing::debug!(path = ?self.path, "Config file touched without changes");
                false
            }
            Ok(next) => {
                tracing::info!(path = ?self.path, "Config file changed, forwarding update");
                self.current = next.clone();
                self.update_tx.send(next).is_ok()
            }
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Rejected config reload, keeping current configuration");
                false
            }
        }
    }

    fn concerns(&self, event: &Event) -> bool {
        let name = self.path.file_name();
        event.paths.iter().any(|p| p.file_name() == name)
    }
}

fn watched_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Fields that differ between `current` and `next` but only take effect on restart.
pub fn restart_only_changes(current: &IntakeConfig, next: &IntakeConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.listener != next.listener {
        changed.push("listener");
    }
    if current.upload.max_upload_bytes != next.upload.max_upload_bytes {
        changed.push("upload.max_upload_bytes");
    }
    if current.upload.upload_dir != next.upload.upload_dir {
        changed.push("upload.upload_dir");
    }
    if current.upload.field_name != next.upload.field_name {
        changed.push("upload.field_name");
    }
    if current.upload.read_idle_timeout_secs != next.upload.read_idle_timeout_secs {
        changed.push("upload.read_idle_timeout_secs");
    }
    if current.rate_limit.enabled != next.rate_limit.enabled {
        changed.push("rate_limit.enabled");
    }
    if current.rate_limit.trust_forwarded_for != next.rate_limit.trust_forwarded_for {
        changed.push("rate_limit.trust_forwarded_for");
    }
    if current.rate_limit.sweep_interval_secs != next.rate_limit.sweep_interval_secs {
        changed.push("rate_limit.sweep_interval_secs");
    }
    if current.timeouts != next.timeouts {
        changed.push("timeouts");
    }
    if current.observability != next.observability {
        changed.push("observability");
    }
    if current.security != next.security {
        changed.push("security");
    }
    changed
}
