//! skiff-bridge — drives a desktop application process from a web bundler's
//! dev/build lifecycle.
//!
//! The host runtime (dev server / bundler) calls the named lifecycle methods
//! on [`Bridge`]. During `serve`, artifact writes from the external bundler
//! are debounced into a single decision per burst: a lightweight page reload
//! when every artifact carries the reload marker, otherwise a full restart of
//! the application child process. During `build`, the bridge forwards a
//! one-shot build to the bundler.

mod artifacts;
mod bundler;
mod config;
mod event;
mod host;
mod relaunch;
mod session;
mod supervisor;

pub use bundler::{BundleConfig, Bundler, WatchHandle};
pub use config::{AppConfig, Configuration};
pub use event::BridgeEvent;
pub use host::{
    DevServerHandle, HostApi, HostCommand, HostConfig, ResolvedHostConfig, DEFAULT_EXTENSIONS,
};
pub use relaunch::{RelaunchAction, RelaunchGate, RELOAD_MARKER};
pub use session::ServeSession;
pub use supervisor::{Supervisor, DEV_SERVER_URL_ENV};

use anyhow::{Context, Result};

/// Integration context binding a [`Configuration`] and a [`Bundler`] to the
/// host's lifecycle. One `Bridge` lives for the whole host process and owns
/// every piece of cross-hook state: the captured host snapshot, the running
/// serve session, and the bundler itself.
pub struct Bridge<B: Bundler> {
    config: Configuration,
    bundler: B,
    api: HostApi,
    session: Option<ServeSession>,
}

impl<B: Bundler> Bridge<B> {
    pub fn new(config: Configuration, bundler: B) -> Self {
        Self {
            config,
            bundler,
            api: HostApi::default(),
            session: None,
        }
    }

    /// Captured host state, re-exposed for downstream code.
    pub fn api(&self) -> &HostApi {
        &self.api
    }

    /// Host `config` hook: runs while the host config is still mutable.
    ///
    /// Defaults `base` to `"./"` so the built app can load artifacts from
    /// relative file paths, then captures the user config.
    pub fn config(&mut self, host: &mut HostConfig) {
        if host.base.is_none() {
            host.base = Some("./".to_string());
        }
        self.api.fill_user_config(host.clone());
    }

    /// Host `configResolved` hook: captures the resolved snapshot.
    pub fn config_resolved(&mut self, resolved: ResolvedHostConfig) {
        self.api.fill_resolved(resolved);
    }

    /// Host dev-server-listening hook.
    ///
    /// Tears down any previous watch session (the dev server may restart),
    /// then starts the serve session and hands it the bundler watch. The
    /// session comes up first so its artifact watcher is already installed
    /// when the bundler's initial writes land; nothing from the first bundle
    /// is missed. The dev-server URL reaches the spawned app via the
    /// [`DEV_SERVER_URL_ENV`] environment variable.
    pub async fn server_listening(&mut self, server: DevServerHandle) -> Result<()> {
        self.api.fill_server(server.clone());

        if let Some(previous) = self.session.take() {
            previous.stop().await;
        }

        let bundle_config = self.config.normalize(&self.api);
        // The artifact watcher needs the directory to exist before it can
        // attach to it.
        std::fs::create_dir_all(&bundle_config.out_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                bundle_config.out_dir.display()
            )
        })?;

        let mut session = ServeSession::start(
            &self.config,
            server,
            &bundle_config.out_dir,
            bundle_config.extensions.clone(),
        )?;

        match self.bundler.watch(&bundle_config) {
            Ok(handle) => {
                session.adopt_bundle_watch(handle);
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                session.stop().await;
                Err(e)
            }
        }
    }

    /// Host `closeBundle` hook: one-shot production build.
    pub fn close_bundle(&self) -> Result<()> {
        self.bundler.build(&self.config.normalize(&self.api))
    }

    /// Stops the running serve session, if any.
    pub async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
        }
    }
}

/// One-shot build with `config` normalized against the captured host state.
pub fn build<B: Bundler>(bundler: &B, config: &Configuration, api: &HostApi) -> Result<()> {
    bundler.build(&config.normalize(api))
}

/// Starts a bundler watch session with `config` normalized against the
/// captured host state. The caller owns the returned handle.
pub fn watch<B: Bundler>(
    bundler: &B,
    config: &Configuration,
    api: &HostApi,
) -> Result<WatchHandle> {
    bundler.watch(&config.normalize(api))
}
