//! Hot reload of the configuration and its preset bank
//!
//! Both the YAML file and the bank file it points to are watched through
//! their parent directories, so editors that save by rename are still seen.
//! Whenever either file changes the configuration is re-read and the bank
//! path re-resolved; a reload that fails to parse keeps the previous state.

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Quiet period after a change before files are re-read
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Which file caused a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTrigger {
    Config,
    Bank,
}

impl ReloadTrigger {
    /// Combine triggers seen within one debounce window, config first
    fn merge(self, other: Self) -> Self {
        if self == Self::Config || other == Self::Config {
            Self::Config
        } else {
            Self::Bank
        }
    }
}

/// Freshly loaded configuration, emitted on every successful reload
#[derive(Debug, Clone)]
pub struct Reload {
    pub trigger: ReloadTrigger,
    pub config: AppConfig,
}

/// Watches the configuration file and the preset bank it references
pub struct ConfigWatcher {
    rx: mpsc::Receiver<Reload>,
}

/// Absolute form of `path`, resolved through its (existing) parent directory
fn watch_target(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let dir = std::fs::canonicalize(dir)
        .with_context(|| format!("Failed to resolve directory of {}", path.display()))?;
    Ok(dir.join(name))
}

fn trigger_for(path: &Path, config_file: &Path, bank_file: Option<&Path>) -> Option<ReloadTrigger> {
    if path == config_file {
        Some(ReloadTrigger::Config)
    } else if bank_file == Some(path) {
        Some(ReloadTrigger::Bank)
    } else {
        None
    }
}

fn parent(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

/// Directory watches for the config file plus the current bank file
struct Watches {
    watcher: RecommendedWatcher,
    config_file: PathBuf,
    bank_file: Option<PathBuf>,
}

impl Watches {
    fn watch_bank(&mut self, bank_path: &Path) {
        let target = match watch_target(bank_path) {
            Ok(target) => target,
            Err(e) => {
                warn!("Preset bank is not watched: {:#}", e);
                self.unwatch_bank();
                return;
            }
        };
        if self.bank_file.as_deref() == Some(target.as_path()) {
            return;
        }
        self.unwatch_bank();

        let dir = parent(&target);
        if dir != parent(&self.config_file) {
            if let Err(e) = self.watcher.watch(dir, RecursiveMode::NonRecursive) {
                warn!("Failed to watch preset bank directory {}: {}", dir.display(), e);
                return;
            }
        }
        info!("Preset bank watcher started for: {}", target.display());
        self.bank_file = Some(target);
    }

    fn unwatch_bank(&mut self) {
        if let Some(old) = self.bank_file.take() {
            let dir = parent(&old);
            if dir != parent(&self.config_file) {
                if let Err(e) = self.watcher.unwatch(dir) {
                    debug!("Unwatch {} failed: {}", dir.display(), e);
                }
            }
        }
    }

    fn trigger_for(&self, path: &Path) -> Option<ReloadTrigger> {
        trigger_for(path, &self.config_file, self.bank_file.as_deref())
    }
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it and its preset bank
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        // notify callbacks run on their own OS thread; only paths cross over
        let (path_tx, mut path_rx) = mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                for path in event.paths {
                    let _ = path_tx.send(path);
                }
            }
            Ok(_) => {}
            Err(e) => error!("Watch error: {}", e),
        })?;

        let config_file = watch_target(Path::new(&config_path))?;
        watcher
            .watch(parent(&config_file), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;
        info!("Config file watcher started for: {}", config_path);

        let mut watches = Watches {
            watcher,
            config_file,
            bank_file: None,
        };
        watches.watch_bank(&initial_config.presets_path(Path::new(&config_path)));

        let (tx, rx) = mpsc::channel(10);
        tokio::spawn(async move {
            while let Some(path) = path_rx.recv().await {
                let Some(mut trigger) = watches.trigger_for(&path) else {
                    continue;
                };
                debug!("{:?} file changed: {}", trigger, path.display());

                tokio::time::sleep(DEBOUNCE).await;
                while let Ok(path) = path_rx.try_recv() {
                    if let Some(next) = watches.trigger_for(&path) {
                        trigger = trigger.merge(next);
                    }
                }

                let config = match AppConfig::load(&config_path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Failed to reload config (keeping old config): {:#}", e);
                        continue;
                    }
                };
                watches.watch_bank(&config.presets_path(Path::new(&config_path)));

                if tx.send(Reload { trigger, config }).await.is_err() {
                    break;
                }
            }
            debug!("Config watcher stopped");
        });

        Ok((Self { rx }, Arc::new(initial_config)))
    }

    /// Wait for the next successful reload; `None` once the watcher stopped
    pub async fn next_reload(&mut self) -> Option<Reload> {
        self.rx.recv().await
    }
}
