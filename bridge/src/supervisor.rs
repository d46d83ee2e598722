//! Application process supervisor.
//!
//! Owns the single tracked child process representing the running desktop
//! application. Spawning always kills the previous child first, so at most
//! one tracked process is ever alive. A child killed by the supervisor is
//! reaped silently; only a child that exits on its own reports
//! [`BridgeEvent::AppExited`].

use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::event::BridgeEvent;

/// Environment variable carrying the dev-server URL to the spawned app.
pub const DEV_SERVER_URL_ENV: &str = "DEV_SERVER_URL";

pub struct Supervisor {
    app: AppConfig,
    /// Extra environment exported to every spawned child.
    env: Vec<(String, String)>,
    events: mpsc::Sender<BridgeEvent>,
    current: Option<TrackedChild>,
}

struct TrackedChild {
    pid: Option<u32>,
    kill_tx: watch::Sender<bool>,
    waiter: JoinHandle<()>,
}

impl Supervisor {
    pub fn new(app: AppConfig, events: mpsc::Sender<BridgeEvent>) -> Self {
        Self {
            app,
            env: Vec::new(),
            events,
            current: None,
        }
    }

    /// Sets (or replaces) an environment variable for future spawns.
    pub fn set_env(&mut self, key: &str, value: &str) {
        match self.env.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.env.push((key.to_string(), value.to_string())),
        }
    }

    /// OS process ID of the tracked child, if one has been spawned.
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(|c| c.pid)
    }

    pub fn has_tracked_child(&self) -> bool {
        self.current.is_some()
    }

    /// Spawns a fresh application process, killing the previous one first.
    ///
    /// The child inherits the parent's standard I/O streams and environment,
    /// plus anything recorded via [`set_env`](Supervisor::set_env).
    pub async fn spawn(&mut self) -> Result<()> {
        self.teardown().await;

        let mut cmd = Command::new(&self.app.command);
        cmd.args(&self.app.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            // If the parent dies without a clean teardown, the runtime drops
            // the child handle and the OS kills the process.
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn app process '{}'", self.app.command))?;
        let pid = child.id();

        let (kill_tx, mut kill_rx) = watch::channel(false);
        let events = self.events.clone();
        let waiter = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => {
                        let _ = events.send(BridgeEvent::AppExited(status)).await;
                    }
                    Err(e) => eprintln!("[app] Failed to wait on app process: {e}"),
                },
                _ = kill_rx.changed() => {
                    // Deliberate kill: reap the child without reporting an exit.
                    if let Err(e) = child.kill().await {
                        eprintln!("[app] Failed to kill app process: {e}");
                    }
                }
            }
        });

        eprintln!("[app] Started '{}' (pid {:?})", self.app.command, pid);
        self.current = Some(TrackedChild { pid, kill_tx, waiter });
        Ok(())
    }

    /// Kills and forgets the tracked child, waiting until it is reaped.
    /// Safe to call repeatedly; the child is killed exactly once and never
    /// reports [`BridgeEvent::AppExited`].
    pub async fn teardown(&mut self) {
        if let Some(tracked) = self.current.take() {
            let _ = tracked.kill_tx.send(true);
            let _ = tracked.waiter.await;
        }
    }
}
