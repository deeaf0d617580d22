//! System configuration shared by the server and the client flows.
//!
//! Loaded from TOML. Every section and field is optional; anything missing
//! takes the value from [`crate::defaults`].
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//! public_base_url = "https://links.example.com"
//!
//! [stores]
//! ios = "https://apps.apple.com/app/id123456789"
//! android = "https://play.google.com/store/apps/details?id=com.example"
//!
//! [app]
//! scheme = "example"
//! aasa_app_ids = ["ABCDE12345.com.example.app"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::defaults::*;
use crate::paths::{default_links_path, default_relay_path};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Canonical configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeeplinkerConfig {
    pub server: ServerConfig,
    pub routes: RouteConfig,
    pub stores: StoreUrls,
    pub app: AppConfig,
    pub handoff: HandoffConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// Absolute origin used to rebuild request URLs and web fallbacks
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Path segment for resolution (`/l/<slug>`)
    pub canonical_prefix: String,
    /// Alias segment rewritten onto the canonical one (`/d/<slug>`)
    pub short_prefix: String,
    /// Path of the client-side smart-redirect flow
    pub smart_redirect_path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            canonical_prefix: DEFAULT_CANONICAL_PREFIX.to_string(),
            short_prefix: DEFAULT_SHORT_PREFIX.to_string(),
            smart_redirect_path: DEFAULT_SMART_REDIRECT_PATH.to_string(),
        }
    }
}

impl RouteConfig {
    /// Path patterns advertised to the OS for universal/app links.
    pub fn manifest_paths(&self) -> Vec<String> {
        vec![
            format!("/{}/*", self.canonical_prefix),
            format!("/{}/*", self.short_prefix),
        ]
    }
}

/// App store listing per mobile platform. Absent means no smart redirect for
/// that platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreUrls {
    pub ios: Option<String>,
    pub android: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// URL scheme the mobile app registers (`<scheme>://<slug>`)
    pub scheme: String,
    /// Apple app ids for the AASA manifest (TEAMID.bundle.id)
    pub aasa_app_ids: Vec<String>,
    /// Android packages for assetlinks.json
    pub asset_links: Vec<AssetLinkTarget>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_APP_SCHEME.to_string(),
            aasa_app_ids: Vec::new(),
            asset_links: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLinkTarget {
    pub package_name: String,
    pub sha256_cert_fingerprint: String,
}

/// Timer constants for the client flows, in abstract time units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Length of one time unit in milliseconds
    pub unit_ms: u64,
    pub countdown_start: u32,
    /// Units from entry until the app-scheme attempt
    pub app_attempt_delay: u64,
    /// Units from the app-scheme attempt until the store fallback
    pub store_fallback_delay: u64,
    /// Units from post-install entry until the recovered attempt
    pub recovery_attempt_delay: u64,
    /// Units from the recovered attempt until the web fallback
    pub recovery_fallback_delay: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            unit_ms: DEFAULT_TIME_UNIT_MS,
            countdown_start: DEFAULT_COUNTDOWN_START,
            app_attempt_delay: DEFAULT_APP_ATTEMPT_DELAY,
            store_fallback_delay: DEFAULT_STORE_FALLBACK_DELAY,
            recovery_attempt_delay: DEFAULT_RECOVERY_ATTEMPT_DELAY,
            recovery_fallback_delay: DEFAULT_RECOVERY_FALLBACK_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub links_file: Option<PathBuf>,
    pub relay_file: Option<PathBuf>,
}

impl StorageConfig {
    pub fn links_path(&self) -> PathBuf {
        self.links_file.clone().unwrap_or_else(default_links_path)
    }

    pub fn relay_path(&self) -> PathBuf {
        self.relay_file.clone().unwrap_or_else(default_relay_path)
    }
}

impl DeeplinkerConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(path, &contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Request URLs are rebuilt on this origin before the query merge.
        match url::Url::parse(&self.server.public_base_url) {
            Ok(base) if matches!(base.scheme(), "http" | "https") && base.has_host() => {}
            Ok(_) | Err(_) => {
                return Err(ConfigError::Invalid {
                    field: "server.public_base_url",
                    message: format!(
                        "expected an absolute http(s) URL, got '{}'",
                        self.server.public_base_url
                    ),
                });
            }
        }
        for (field, prefix) in [
            ("routes.canonical_prefix", &self.routes.canonical_prefix),
            ("routes.short_prefix", &self.routes.short_prefix),
        ] {
            if prefix.is_empty() || prefix.contains('/') {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("expected a single path segment, got '{}'", prefix),
                });
            }
        }
        if self.routes.canonical_prefix == self.routes.short_prefix {
            return Err(ConfigError::Invalid {
                field: "routes.short_prefix",
                message: "must differ from routes.canonical_prefix".to_string(),
            });
        }
        if !self.routes.smart_redirect_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "routes.smart_redirect_path",
                message: "must start with '/'".to_string(),
            });
        }
        if self.app.scheme.is_empty() {
            return Err(ConfigError::Invalid {
                field: "app.scheme",
                message: "must not be empty".to_string(),
            });
        }
        if self.handoff.unit_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "handoff.unit_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Configured AASA ids, capped at the manifest slot limit.
    pub fn aasa_app_ids(&self) -> &[String] {
        let len = self.app.aasa_app_ids.len().min(MAX_MANIFEST_ENTRIES);
        &self.app.aasa_app_ids[..len]
    }

    /// Configured asset-link targets, capped at the manifest slot limit.
    pub fn asset_links(&self) -> &[AssetLinkTarget] {
        let len = self.app.asset_links.len().min(MAX_MANIFEST_ENTRIES);
        &self.app.asset_links[..len]
    }
}
