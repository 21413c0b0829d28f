use anyhow::Result;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use physics::WorldConfig;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use tracing::{info, warn};

/// Reads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<WorldConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(WorldConfig::from_json(&text)?)
}

/// Keeps the watcher alive alongside the channel it feeds.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    updates: Receiver<WorldConfig>,
}

impl ConfigWatcher {
    /// The most recent configuration written since the last call, if any.
    pub fn latest(&self) -> Option<WorldConfig> {
        self.updates.try_iter().last()
    }
}

/// Watches the configuration file and sends every version that parses and
/// validates. Broken edits are logged and skipped.
pub fn start(path: &Path) -> Result<ConfigWatcher> {
    let target: PathBuf = path.canonicalize()?;
    let (sender, updates) = channel();

    let watched = target.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }
            if !event.paths.iter().any(|p| p == &watched) {
                return;
            }
            match load_config(&watched) {
                Ok(config) => {
                    info!(path = %watched.display(), "configuration changed");
                    // The receiver only goes away on shutdown
                    let _ = sender.send(config);
                }
                Err(e) => warn!(path = %watched.display(), "ignoring configuration edit: {e:#}"),
            }
        }
        Err(e) => tracing::error!("Error watching configuration file: {e:?}"),
    })?;

    // Editors often replace the file, so watch the directory
    let directory = target.parent().unwrap_or(target.as_path());
    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    info!(path = %target.display(), "watching configuration");
    Ok(ConfigWatcher {
        _watcher: watcher,
        updates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_config_reads_partial_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "substeps": 3, "thread_count": 2 }}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.substeps, 3);
        assert_eq!(config.thread_count, 2);
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "substeps": 0 }}"#).unwrap();
        assert!(load_config(file.path()).is_err());
        assert!(load_config(Path::new("does/not/exist.json")).is_err());
    }
}
