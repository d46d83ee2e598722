//! Seam for the external bundling library.
//!
//! The actual module-graph resolution, transformation, and bundling happen in
//! an external library; the bridge only hands it a normalized configuration
//! and holds on to the watch session it returns. Bundler failures propagate
//! to the caller unhandled.

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Normalized configuration handed to the external bundler, produced by
/// [`Configuration::normalize`](crate::Configuration::normalize).
#[derive(Debug, Clone, PartialEq)]
pub struct BundleConfig {
    /// Entry files or directories to bundle.
    pub entries: Vec<String>,
    /// Directory artifacts are written into.
    pub out_dir: PathBuf,
    /// Resolvable source extensions, leading dot included.
    pub extensions: Vec<String>,
}

pub trait Bundler: Send + Sync + 'static {
    /// One-shot production build.
    fn build(&self, config: &BundleConfig) -> Result<()>;

    /// Starts an incremental watch session writing artifacts into
    /// `config.out_dir`, rebuilding as sources change.
    fn watch(&self, config: &BundleConfig) -> Result<WatchHandle>;
}

/// Disposable handle to a running bundler watch session.
///
/// The bridge closes the previous handle before starting a replacement when
/// the dev server restarts. [`close`](WatchHandle::close) is idempotent.
pub struct WatchHandle {
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Handle backed by a stop signal and the background task driving the
    /// watch session.
    pub fn new(stop_tx: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Handle for bundlers whose watch session needs no background task of
    /// its own (e.g. the bundler manages its threads internally).
    pub fn detached() -> Self {
        Self {
            stop_tx: None,
            task: None,
        }
    }

    /// Signals the watch session to stop and waits for it to wind down.
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
