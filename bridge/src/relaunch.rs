use std::path::{Path, PathBuf};

/// Filename marker signaling that an in-place page reload suffices.
///
/// Matched as a suffix directly before a resolvable extension, so both
/// `foo.reload.js` and `preload.js` qualify.
pub const RELOAD_MARKER: &str = "reload";

/// Decision produced after a quiet period following a burst of artifact writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaunchAction {
    /// Every artifact in the burst carried the reload marker; ask the dev
    /// server to refresh the page.
    Reload,
    /// At least one artifact requires restarting the application process.
    Restart,
}

/// Accumulates artifact filenames between debounce firings and classifies
/// each batch into a [`RelaunchAction`]. Timing lives in the serve session;
/// this type is pure state.
pub struct RelaunchGate {
    /// Resolvable extensions the reload marker is matched against.
    extensions: Vec<String>,
    pending: Vec<PathBuf>,
}

impl RelaunchGate {
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            pending: Vec::new(),
        }
    }

    /// Records one written artifact.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.push(path);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Classifies the accumulated batch and clears it.
    /// Returns `None` when nothing was recorded since the last flush.
    pub fn flush(&mut self) -> Option<RelaunchAction> {
        if self.pending.is_empty() {
            return None;
        }
        let all_reload = self.pending.iter().all(|p| self.is_reload_artifact(p));
        self.pending.clear();
        Some(if all_reload {
            RelaunchAction::Reload
        } else {
            RelaunchAction::Restart
        })
    }

    fn is_reload_artifact(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|ext| name.ends_with(&format!("{RELOAD_MARKER}{ext}")))
    }
}
