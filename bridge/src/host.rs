//! Host-runtime interface.
//!
//! The bridge is driven by whichever dev server / bundler hosts it. Instead of
//! binding to one host's callback registration style, the host state is modeled
//! as plain values handed to the named lifecycle methods on [`Bridge`], and the
//! captured snapshot is re-exposed to downstream code through [`HostApi`].
//!
//! [`Bridge`]: crate::Bridge

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Extensions considered resolvable when the host does not report its own.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Development server with incremental rebuilds.
    Serve,
    /// One-shot production build.
    Build,
}

/// Host configuration as seen before resolution. The bridge may fill gaps
/// (e.g. defaulting `base`) but never overwrites values the user set.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Project root directory.
    pub root: Option<PathBuf>,
    /// Public base path that served/built artifacts are resolved against.
    pub base: Option<String>,
}

/// Snapshot of the host configuration after the host finished resolving it.
#[derive(Debug, Clone)]
pub struct ResolvedHostConfig {
    pub command: HostCommand,
    pub root: PathBuf,
    /// Resolvable source extensions, leading dot included (e.g. ".js").
    pub extensions: Vec<String>,
}

impl ResolvedHostConfig {
    pub fn new(command: HostCommand, root: PathBuf) -> Self {
        Self {
            command,
            root,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Handle to the host's running dev server.
///
/// Constructed by the host from the bound address and a channel on which the
/// host listens for page-reload requests.
#[derive(Debug, Clone)]
pub struct DevServerHandle {
    addr: SocketAddr,
    reload_tx: mpsc::UnboundedSender<()>,
}

impl DevServerHandle {
    pub fn new(addr: SocketAddr, reload_tx: mpsc::UnboundedSender<()>) -> Self {
        Self { addr, reload_tx }
    }

    /// URL the spawned application should load during development,
    /// e.g. `http://localhost:5173`.
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.addr.port())
    }

    /// Asks the host to perform a lightweight page reload.
    /// Returns `false` if the host side of the channel is gone.
    pub fn request_reload(&self) -> bool {
        self.reload_tx.send(()).is_ok()
    }
}

/// Captured host state, re-exposed to downstream code (bundler plugins,
/// user scripts) that wants to inspect the resolved config or talk to the
/// dev server.
#[derive(Debug, Clone, Default)]
pub struct HostApi {
    user_config: Option<HostConfig>,
    resolved: Option<ResolvedHostConfig>,
    server: Option<DevServerHandle>,
}

impl HostApi {
    // The fill_* setters only set absent fields: a value stored earlier
    // (possibly by the embedding host itself) wins over a later capture.

    pub fn fill_user_config(&mut self, config: HostConfig) {
        if self.user_config.is_none() {
            self.user_config = Some(config);
        }
    }

    pub fn fill_resolved(&mut self, resolved: ResolvedHostConfig) {
        if self.resolved.is_none() {
            self.resolved = Some(resolved);
        }
    }

    pub fn fill_server(&mut self, server: DevServerHandle) {
        if self.server.is_none() {
            self.server = Some(server);
        }
    }

    pub fn user_config(&self) -> Option<&HostConfig> {
        self.user_config.as_ref()
    }

    pub fn resolved(&self) -> Option<&ResolvedHostConfig> {
        self.resolved.as_ref()
    }

    pub fn server(&self) -> Option<&DevServerHandle> {
        self.server.as_ref()
    }

    /// Project root, preferring the resolved config over the raw user config.
    pub fn root(&self) -> Option<PathBuf> {
        self.resolved
            .as_ref()
            .map(|r| r.root.clone())
            .or_else(|| self.user_config.as_ref().and_then(|c| c.root.clone()))
    }

    /// Resolvable extensions reported by the host, or [`DEFAULT_EXTENSIONS`].
    pub fn extensions(&self) -> Vec<String> {
        match &self.resolved {
            Some(r) => r.extensions.clone(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}
