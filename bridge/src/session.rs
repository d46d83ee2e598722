//! Serve-session wiring.
//!
//! A [`ServeSession`] runs while the host dev server is up. It owns the
//! bundler watch handle, the artifact watcher, the debounce/event loop, and
//! the application supervisor. Artifact writes flow in, get coalesced by the
//! debounce window, and come out as a single page reload or app restart.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::artifacts;
use crate::bundler::WatchHandle;
use crate::config::Configuration;
use crate::event::BridgeEvent;
use crate::host::DevServerHandle;
use crate::relaunch::{RelaunchAction, RelaunchGate};
use crate::supervisor::{Supervisor, DEV_SERVER_URL_ENV};

/// A running dev session: bundler watch + artifact debounce + app supervisor.
pub struct ServeSession {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    bundle_watch: WatchHandle,
}

impl ServeSession {
    /// Starts the session against a freshly listening dev server.
    /// `out_dir` must already exist.
    ///
    /// The artifact watch on `out_dir` is installed before this returns, so
    /// the session must be started before the bundler: the first bundle's
    /// writes are what bring the application up, and they may land the moment
    /// the bundler starts.
    pub fn start(
        config: &Configuration,
        server: DevServerHandle,
        out_dir: &Path,
        extensions: Vec<String>,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel::<BridgeEvent>(64);
        let mut handles = Vec::new();

        // ── Artifact watcher ──────────────────────────────────────────────────
        handles.push(artifacts::start(out_dir, event_tx.clone(), stop_rx.clone())?);

        // ── Ctrl+C → Shutdown ─────────────────────────────────────────────────
        {
            let tx = event_tx.clone();
            let mut stop_rx = stop_rx.clone();
            handles.push(tokio::spawn(async move {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if res.is_ok() {
                            let _ = tx.send(BridgeEvent::Shutdown).await;
                        }
                    }
                    _ = stop_rx.changed() => {}
                }
            }));
        }

        // ── Event loop ────────────────────────────────────────────────────────
        let mut supervisor = Supervisor::new(config.app.clone(), event_tx);
        supervisor.set_env(DEV_SERVER_URL_ENV, &server.local_url());

        handles.push(tokio::spawn(run_loop(
            event_rx,
            stop_rx,
            supervisor,
            RelaunchGate::new(extensions),
            server,
            config.effective_debounce(),
            config.exit_on_app_close,
        )));

        Ok(Self {
            stop_tx,
            handles,
            bundle_watch: WatchHandle::detached(),
        })
    }

    /// Hands the session the bundler watch handle so teardown can close it.
    /// Called once the bundler has been started against the watched out dir.
    pub fn adopt_bundle_watch(&mut self, handle: WatchHandle) {
        self.bundle_watch = handle;
    }

    /// Stops the session: closes the bundler watch, kills the app, and waits
    /// for all tasks to finish.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        self.bundle_watch.close().await;
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_loop(
    mut events: mpsc::Receiver<BridgeEvent>,
    mut stop_rx: watch::Receiver<bool>,
    mut supervisor: Supervisor,
    mut gate: RelaunchGate,
    server: DevServerHandle,
    debounce: Duration,
    exit_on_app_close: bool,
) {
    // Armed while at least one artifact write is pending; every further write
    // pushes the deadline out again.
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                match gate.flush() {
                    Some(RelaunchAction::Reload) => {
                        eprintln!("[serve] Reloading page");
                        if !server.request_reload() {
                            eprintln!("[serve] Dev server is gone; reload dropped");
                        }
                    }
                    Some(RelaunchAction::Restart) => {
                        eprintln!("[serve] Restarting app");
                        if let Err(e) = supervisor.spawn().await {
                            eprintln!("[serve] Failed to start app: {e}");
                        }
                    }
                    None => {}
                }
            }

            evt = events.recv() => match evt {
                Some(BridgeEvent::ArtifactWritten(path)) => {
                    gate.record(path);
                    deadline = Some(Instant::now() + debounce);
                }
                Some(BridgeEvent::AppExited(status)) => {
                    eprintln!("[app] App exited with {status}");
                    if exit_on_app_close {
                        std::process::exit(status.code().unwrap_or(0));
                    }
                    break;
                }
                Some(BridgeEvent::Shutdown) | None => break,
            },
        }
    }

    supervisor.teardown().await;
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::net::SocketAddr;

    fn test_config(out_dir: &Path, log: &Path) -> Configuration {
        let mut config = Configuration::default();
        config.output_dir = out_dir.to_path_buf();
        config.debounce_ms = 200;
        config.exit_on_app_close = false;
        config.app = AppConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), format!("echo started >> {}", log.display())],
        };
        config
    }

    fn server() -> (DevServerHandle, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:5173".parse().unwrap();
        (DevServerHandle::new(addr, tx), rx)
    }

    /// Polls until `log` holds at least one line, failing after 5s.
    async fn wait_for_start(log: &Path) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if std::fs::read_to_string(log).map(|s| s.lines().count() >= 1).unwrap_or(false) {
                return;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "app was not started within 5s"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    fn start_session(config: &Configuration, server: DevServerHandle, out_dir: &Path) -> ServeSession {
        ServeSession::start(config, server, out_dir, vec![".js".to_string()]).unwrap()
    }

    #[tokio::test]
    async fn burst_of_writes_restarts_app_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("dist");
        std::fs::create_dir_all(&out_dir).unwrap();
        let log = dir.path().join("starts.log");
        let config = test_config(&out_dir, &log);
        let (server, _reload_rx) = server();

        let session = start_session(&config, server, &out_dir);

        // The watch is installed before start() returns; no settling delay.
        for name in ["main.js", "util.js", "preload.js"] {
            std::fs::write(out_dir.join(name), "x").unwrap();
        }
        wait_for_start(&log).await;

        // Give a trailing flush every chance to fire spuriously.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let starts = std::fs::read_to_string(&log).unwrap();
        assert_eq!(starts.lines().count(), 1, "expected exactly one app start");

        session.stop().await;
    }

    #[tokio::test]
    async fn reload_marked_writes_reload_instead_of_restart() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("dist");
        std::fs::create_dir_all(&out_dir).unwrap();
        let log = dir.path().join("starts.log");
        let config = test_config(&out_dir, &log);
        let (server, mut reload_rx) = server();

        let session = start_session(&config, server, &out_dir);

        std::fs::write(out_dir.join("foo.reload.js"), "x").unwrap();
        std::fs::write(out_dir.join("preload.js"), "x").unwrap();

        tokio::time::timeout(Duration::from_secs(5), reload_rx.recv())
            .await
            .expect("no page reload within 5s")
            .expect("reload channel closed");
        assert!(!log.exists(), "reload must not spawn the app");

        session.stop().await;
    }

    #[tokio::test]
    async fn stop_without_activity_returns() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("dist");
        std::fs::create_dir_all(&out_dir).unwrap();
        let log = dir.path().join("starts.log");
        let config = test_config(&out_dir, &log);
        let (server, _reload_rx) = server();

        let session = start_session(&config, server, &out_dir);

        tokio::time::timeout(Duration::from_secs(5), session.stop())
            .await
            .expect("session did not stop");
    }

    #[tokio::test]
    async fn start_fails_when_out_dir_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("missing");
        let log = dir.path().join("starts.log");
        let config = test_config(&out_dir, &log);
        let (server, _reload_rx) = server();

        assert!(ServeSession::start(&config, server, &out_dir, vec![".js".to_string()]).is_err());
    }
}
