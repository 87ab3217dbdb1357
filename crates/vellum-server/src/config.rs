// File: src/config.rs
// Purpose: Configuration parsing from vellum.toml and per-render options

use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    /// Arbitrary runtime configuration handed to every render invocation.
    #[serde(default)]
    pub runtime: JsonValue,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

/// Build output layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build output directory, relative to the project root (default: ".next")
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,

    /// Public static directory, relative to the project root (default: "static")
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

/// Serve behavior flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Whether the generic catch-all page route is registered. When false,
    /// only the asset and reserved namespaces are routed.
    #[serde(default = "default_true")]
    pub use_filesystem_public_routes: bool,

    /// Whether document responses carry a content-hash etag.
    #[serde(default = "default_true")]
    pub generate_etags: bool,

    /// Whether pages render hydratable markup (vs fully static).
    #[serde(default = "default_true")]
    pub hydratable: bool,

    /// Whether AMP rendering may be requested via the `amp` query flag.
    #[serde(default = "default_false")]
    pub amp_enabled: bool,
}

// Default values
fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_dist_dir() -> String {
    ".next".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            use_filesystem_public_routes: true,
            generate_etags: true,
            hydratable: true,
            amp_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from a toml file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./vellum.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("vellum.toml")
    }
}

/// Configuration threaded through every render invocation.
///
/// Immutable per server instance except `asset_prefix`, a startup-only
/// hook expected to be set at most once before traffic begins.
#[derive(Debug)]
pub struct RenderOptions {
    pub build_id: String,
    pub hydratable: bool,
    pub amp_enabled: bool,
    pub generate_etags: bool,
    pub runtime_config: JsonValue,
    asset_prefix: RwLock<String>,
}

impl RenderOptions {
    pub fn from_config(config: &Config, build_id: String) -> Self {
        Self {
            build_id,
            hydratable: config.serve.hydratable,
            amp_enabled: config.serve.amp_enabled,
            generate_etags: config.serve.generate_etags,
            runtime_config: config.runtime.clone(),
            asset_prefix: RwLock::new(String::new()),
        }
    }

    pub fn asset_prefix(&self) -> String {
        self.asset_prefix
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Startup-only configuration hook; not meant for use under traffic.
    pub fn set_asset_prefix(&self, prefix: impl Into<String>) {
        *self
            .asset_prefix
            .write()
            .unwrap_or_else(PoisonError::into_inner) = prefix.into();
    }
}
