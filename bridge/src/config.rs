use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bundler::BundleConfig;
use crate::host::HostApi;

pub const MIN_DEBOUNCE_MS: u64 = 50;
pub const MAX_DEBOUNCE_MS: u64 = 2_000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_OUTPUT_DIR: &str = "dist-app";
pub const DEFAULT_APP_COMMAND: &str = "electron";

/// Caller-supplied bridge options. Constructed in code by the embedding host
/// or deserialized from a `skiff.toml` next to the project.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Entry files or directories handed to the external bundler.
    #[serde(default)]
    pub include: Vec<String>,
    /// Directory the bundler writes artifacts into. Relative paths are
    /// resolved against the host project root during normalization.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Quiet period in milliseconds before a burst of artifact writes is
    /// collapsed into a single reload/restart decision. Clamped to [50, 2000].
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub app: AppConfig,
    /// When true (the default), the parent process exits as soon as the
    /// spawned application exits on its own.
    #[serde(default = "default_exit_on_app_close")]
    pub exit_on_app_close: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            output_dir: default_output_dir(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            app: AppConfig::default(),
            exit_on_app_close: true,
        }
    }
}

/// How to launch the desktop application process.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Executable to spawn (e.g. "electron").
    #[serde(default = "default_app_command")]
    pub command: String,
    /// Arguments passed to the executable. The defaults launch the project
    /// directory with the runtime sandbox disabled.
    #[serde(default = "default_app_args")]
    pub args: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command: default_app_command(),
            args: default_app_args(),
        }
    }
}

impl Configuration {
    /// Returns the debounce window, clamped to the supported range.
    pub fn effective_debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS))
    }

    /// Loads the configuration at `path`, returning `Configuration::default()`
    /// if the file does not exist. Returns an error if the file exists but
    /// cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Configuration> {
        if !path.exists() {
            return Ok(Configuration::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Merges these options with the host state captured in `api` into the
    /// shape the external bundler expects. Caller-supplied values always win;
    /// host-derived values only fill the gaps (project root, extensions).
    pub fn normalize(&self, api: &HostApi) -> BundleConfig {
        let root = api.root().unwrap_or_else(|| PathBuf::from("."));
        let out_dir = if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            root.join(&self.output_dir)
        };
        BundleConfig {
            entries: self.include.clone(),
            out_dir,
            extensions: api.extensions(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_app_command() -> String {
    DEFAULT_APP_COMMAND.to_string()
}

fn default_app_args() -> Vec<String> {
    vec![".".to_string(), "--no-sandbox".to_string()]
}

fn default_exit_on_app_close() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCommand, ResolvedHostConfig, DEFAULT_EXTENSIONS};

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn default_values() {
        let c = Configuration::default();
        assert!(c.include.is_empty());
        assert_eq!(c.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(c.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(c.exit_on_app_close);
    }

    #[test]
    fn default_app_launch_arguments() {
        let app = AppConfig::default();
        assert_eq!(app.command, DEFAULT_APP_COMMAND);
        assert_eq!(app.args, vec![".".to_string(), "--no-sandbox".to_string()]);
    }

    // ── effective_debounce ────────────────────────────────────────────────────

    #[test]
    fn effective_debounce_passes_through_in_range() {
        let mut c = Configuration::default();
        c.debounce_ms = 500;
        assert_eq!(c.effective_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn effective_debounce_clamps_below_min() {
        let mut c = Configuration::default();
        c.debounce_ms = 0;
        assert_eq!(c.effective_debounce(), Duration::from_millis(MIN_DEBOUNCE_MS));
    }

    #[test]
    fn effective_debounce_clamps_above_max() {
        let mut c = Configuration::default();
        c.debounce_ms = 60_000;
        assert_eq!(c.effective_debounce(), Duration::from_millis(MAX_DEBOUNCE_MS));
    }

    // ── load_or_default ───────────────────────────────────────────────────────

    #[test]
    fn load_or_default_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.toml");
        let config = Configuration::load_or_default(&path).unwrap();
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(config.include.is_empty());
    }

    #[test]
    fn load_or_default_parses_valid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skiff.toml");
        std::fs::write(
            &path,
            r#"
include = ["app", "app/preload.ts"]
output_dir = "dist-desktop"
debounce_ms = 150

[app]
command = "my-shell"
args = ["--dev"]
"#,
        )
        .unwrap();

        let config = Configuration::load_or_default(&path).unwrap();
        assert_eq!(config.include, vec!["app", "app/preload.ts"]);
        assert_eq!(config.output_dir, PathBuf::from("dist-desktop"));
        assert_eq!(config.debounce_ms, 150);
        assert_eq!(config.app.command, "my-shell");
        assert_eq!(config.app.args, vec!["--dev"]);
    }

    #[test]
    fn load_or_default_partial_toml_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skiff.toml");
        std::fs::write(&path, "debounce_ms = 100\n").unwrap();

        let config = Configuration::load_or_default(&path).unwrap();
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.app.command, DEFAULT_APP_COMMAND);
        assert!(config.exit_on_app_close);
    }

    #[test]
    fn load_or_default_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skiff.toml");
        std::fs::write(&path, "this is not valid toml ][[[").unwrap();
        assert!(Configuration::load_or_default(&path).is_err());
    }

    // ── normalize ─────────────────────────────────────────────────────────────

    fn api_with_root(root: &str) -> HostApi {
        let mut api = HostApi::default();
        api.fill_resolved(ResolvedHostConfig::new(
            HostCommand::Serve,
            PathBuf::from(root),
        ));
        api
    }

    #[test]
    fn normalize_resolves_out_dir_against_host_root() {
        let config = Configuration::default();
        let bundle = config.normalize(&api_with_root("/project"));
        assert_eq!(bundle.out_dir, PathBuf::from("/project").join(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn normalize_absolute_out_dir_ignores_host_root() {
        let mut config = Configuration::default();
        config.output_dir = PathBuf::from("/elsewhere/dist");
        let bundle = config.normalize(&api_with_root("/project"));
        assert_eq!(bundle.out_dir, PathBuf::from("/elsewhere/dist"));
    }

    #[test]
    fn normalize_without_host_state_uses_cwd_root_and_default_extensions() {
        let config = Configuration::default();
        let bundle = config.normalize(&HostApi::default());
        assert_eq!(bundle.out_dir, PathBuf::from(".").join(DEFAULT_OUTPUT_DIR));
        assert_eq!(
            bundle.extensions,
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn normalize_copies_entries_from_include() {
        let mut config = Configuration::default();
        config.include = vec!["app".to_string(), "app/preload.ts".to_string()];
        let bundle = config.normalize(&HostApi::default());
        assert_eq!(bundle.entries, config.include);
    }

    #[test]
    fn normalize_takes_extensions_from_resolved_host() {
        let mut api = HostApi::default();
        let mut resolved = ResolvedHostConfig::new(HostCommand::Serve, PathBuf::from("/p"));
        resolved.extensions = vec![".ts".to_string()];
        api.fill_resolved(resolved);

        let bundle = Configuration::default().normalize(&api);
        assert_eq!(bundle.extensions, vec![".ts"]);
    }

    #[test]
    fn normalize_does_not_mutate_configuration() {
        let config = Configuration::default();
        let before = format!("{config:?}");
        let _ = config.normalize(&api_with_root("/project"));
        assert_eq!(format!("{config:?}"), before);
    }
}
