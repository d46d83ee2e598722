use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::event::BridgeEvent;

/// Returns true for notify events that represent an artifact being written.
pub(crate) fn is_artifact_write(kind: &notify::EventKind) -> bool {
    matches!(
        kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    )
}

/// Installs a watcher on the bundler output directory and spawns the task
/// forwarding every written artifact to the session event loop.
///
/// The OS-level watch is installed before this returns, so a caller that
/// starts the bundler afterwards cannot miss its writes — including the
/// initial bundle. The directory is watched recursively: bundlers routinely
/// write nested artifact trees (chunks, sourcemaps, copied assets).
pub(crate) fn start(
    out_dir: &Path,
    tx: mpsc::Sender<BridgeEvent>,
    stop_rx: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let (watch_tx, watch_rx) = mpsc::channel::<notify::Event>(64);

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create artifact watcher")?;

    watcher
        .watch(out_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", out_dir.display()))?;

    Ok(tokio::spawn(forward_events(watcher, watch_rx, tx, stop_rx)))
}

/// Runs until the stop signal fires or either channel closes. Owns the
/// watcher so the OS-level watch stays alive for the task's lifetime.
async fn forward_events(
    _watcher: RecommendedWatcher,
    mut watch_rx: mpsc::Receiver<notify::Event>,
    tx: mpsc::Sender<BridgeEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            event = watch_rx.recv() => {
                let Some(event) = event else { break };
                if !is_artifact_write(&event.kind) {
                    continue;
                }
                for path in event.paths {
                    if path.is_dir() {
                        continue;
                    }
                    if tx.send(BridgeEvent::ArtifactWritten(path)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
