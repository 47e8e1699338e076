//! Project configuration module.
//!
//! Handles loading, validating, and merging `flightdeck.toml`. Stock defaults
//! are serialized to a TOML table, the user's file is layered on top, and the
//! merged value is deserialized with unknown keys rejected.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! app_dir = "app"            # Route tree root, relative to the project root
//! out_dir = "out"            # Generation output root
//! public_dir = "public"      # Copied verbatim into the HTML subtree
//!
//! [build]
//! page_extensions = ["tsx", "ts", "jsx", "js", "mdx"]
//! client_dirs = ["components"]   # Searched for "use client" modules
//! asset_prefix = "/_flight/static"
//!
//! [serve]
//! flight_query = "_rsc"      # ?_rsc returns the chunk stream instead of HTML
//! # default_revalidate = 60  # Applied to pages without a revalidate export
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::types::Revalidate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file in the project root.
pub const CONFIG_FILENAME: &str = "flightdeck.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `flightdeck.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlightConfig {
    /// Route tree root, relative to the project root.
    pub app_dir: String,
    /// Output root for HTML documents, chunk streams, and manifests.
    pub out_dir: String,
    /// Static files copied into the HTML subtree unchanged.
    pub public_dir: String,
    pub build: BuildConfig,
    pub serve: ServeConfig,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            app_dir: "app".to_string(),
            out_dir: "out".to_string(),
            public_dir: "public".to_string(),
            build: BuildConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

/// Build-time settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Extensions recognized for `page`, `layout`, and the other route files.
    pub page_extensions: Vec<String>,
    /// Directories (relative to the project root) searched for client modules.
    pub client_dirs: Vec<String>,
    /// URL prefix under which client module scripts are served.
    pub asset_prefix: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            page_extensions: ["tsx", "ts", "jsx", "js", "mdx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            client_dirs: vec!["components".to_string()],
            asset_prefix: "/_flight/static".to_string(),
        }
    }
}

/// Request-time settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// Query parameter that selects the chunk stream over the HTML document.
    pub flight_query: String,
    /// Applied to pages that do not export `revalidate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_revalidate: Option<Revalidate>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            flight_query: "_rsc".to_string(),
            default_revalidate: None,
        }
    }
}

impl FlightConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.page_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "build.page_extensions must not be empty".into(),
            ));
        }
        if let Some(ext) = self
            .build
            .page_extensions
            .iter()
            .find(|e| e.is_empty() || e.contains('.'))
        {
            return Err(ConfigError::Validation(format!(
                "build.page_extensions entries are bare extensions, got {ext:?}"
            )));
        }
        if !self.build.asset_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "build.asset_prefix must start with '/'".into(),
            ));
        }
        let query = &self.serve.flight_query;
        if query.is_empty()
            || !query
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Validation(
                "serve.flight_query must be a non-empty URL-safe name".into(),
            ));
        }
        if self.serve.default_revalidate == Some(Revalidate::Seconds(0)) {
            return Err(ConfigError::Validation(
                "serve.default_revalidate must be a positive number of seconds or false".into(),
            ));
        }
        Ok(())
    }

    pub fn app_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.app_dir)
    }

    pub fn out_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.out_dir)
    }

    pub fn public_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.public_dir)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(FlightConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `flightdeck.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<FlightConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FlightConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `flightdeck.toml` in the project root.
pub fn load_config(root: &Path) -> Result<FlightConfig, ConfigError> {
    resolve_config(load_raw_config(root)?)
}

/// Returns a fully-commented stock `flightdeck.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# flightdeck configuration
# ========================
#
# Every key is optional. Values shown are the defaults.

# Route tree root. Each directory is one URL segment:
#   blog/          static segment
#   (marketing)/   route group, elided from the URL
#   [slug]/        dynamic segment
#   [...parts]/    catch-all segment
app_dir = "app"

# Generation output: html/, flight/, prerender-manifest.json
out_dir = "out"

# Copied verbatim into out/html/
public_dir = "public"

[build]
# Extensions recognized for page, layout, loading, error, not-found and
# global-error files.
page_extensions = ["tsx", "ts", "jsx", "js", "mdx"]

# Extra directories searched for modules that start with "use client".
client_dirs = ["components"]

# URL prefix for client module scripts preloaded by generated documents.
asset_prefix = "/_flight/static"

[serve]
# A request carrying ?_rsc receives the chunk stream instead of the document.
flight_query = "_rsc"

# Revalidation window (seconds, or false) for pages that do not export one.
# default_revalidate = 60
"##
}
