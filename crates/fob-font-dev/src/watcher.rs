//! File system watcher feeding source and font changes into a session.
//!
//! Watches the project directory and filters changes down to script modules
//! and font files, ignoring node_modules, build output and hidden paths.

use crate::SharedSession;
use crate::error::{DevError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

/// Directories that never hold font sources.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["node_modules", "dist", "target", ".next"];

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Watches a directory recursively and sends change events through a channel.
///
/// Repeated events for the same path inside the debounce window are dropped.
pub struct FontWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FontWatcher {
    /// Start watching `root`.
    ///
    /// # Errors
    ///
    /// Returns error if watcher cannot be created or directory doesn't exist
    pub fn new(
        root: PathBuf,
        ignore_patterns: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(DevError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(100);

        let debounce_duration = Duration::from_millis(debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if should_ignore(path, &watch_root, &ignore_patterns) || !is_relevant(path) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce_duration {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // Receiver gone means the dev loop shut down
                let _ = tx.blocking_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    /// Watch with [`DEFAULT_IGNORE_PATTERNS`] and a 50ms debounce.
    pub fn with_defaults(root: PathBuf) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let patterns = DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect();
        Self::new(root, patterns, 50)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Paths outside `root`, matching an ignore pattern or hidden are skipped.
///
/// Patterns starting with `*` match a suffix, anything else matches a
/// leading path or directory name.
pub fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };
    let path_str = rel_path.to_string_lossy();

    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if path_str.ends_with(suffix) {
                return true;
            }
        } else if path_str.starts_with(pattern.as_str())
            || path_str.contains(&format!("/{}", pattern))
        {
            return true;
        }
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn is_font_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| FONT_EXTENSIONS.contains(&ext))
}

fn is_script(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

fn is_relevant(path: &Path) -> bool {
    is_font_file(path) || is_script(path)
}

/// Apply one change to the session. Returns the stylesheet specifiers that
/// have to be loaded again.
pub fn apply_change(session: &SharedSession, change: &FileChange) -> Vec<String> {
    let path = change.path();
    if is_font_file(path) {
        return session.invalidate_font_file(path);
    }
    if !is_script(path) {
        return Vec::new();
    }

    let id = path.to_string_lossy();
    match change {
        FileChange::Removed(_) => session.remove_module(&id),
        FileChange::Modified(_) | FileChange::Created(_) => session.invalidate_module(&id),
    }
}

/// Drain watcher events into the session until the watcher is dropped.
pub async fn run(session: SharedSession, mut changes: mpsc::Receiver<FileChange>) {
    while let Some(change) = changes.recv().await {
        let specifiers = apply_change(&session, &change);
        if specifiers.is_empty() {
            continue;
        }
        tracing::info!(
            path = %change.path().display(),
            stylesheets = specifiers.len(),
            "Fonts invalidated"
        );
    }
    tracing::debug!("Font watcher stopped");
}
