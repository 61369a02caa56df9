//! Engine configuration
//!
//! Loaded from `config.toml` in the root folder (or an explicit `--config`
//! path). Every section is optional; missing keys fall back to the defaults
//! below.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5790"
//!
//! [auth]
//! shared_secret = "s3cret"
//! allowed_callers = ["main-window"]
//!
//! [rate_limit]
//! max_requests = 30
//! window_ms = 1000
//!
//! [performance]
//! slow_threshold_ms = 1000
//!
//! [[schema]]
//! channel = "validation:run"
//! required = ["validationName"]
//! ```

use importcheck_common::config::load_toml;
use importcheck_common::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::channels;
use crate::middleware::SchemaRule;

pub const DEFAULT_BIND: &str = "127.0.0.1:5790";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub performance: PerformanceConfig,
    pub schema: Vec<SchemaRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            performance: PerformanceConfig::default(),
            schema: default_schema_rules(),
        }
    }
}

impl EngineConfig {
    /// Load `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            load_toml(path)
        } else {
            info!("No configuration at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Overrides `<root>/importcheck.db`
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token callers present to be treated as authenticated; unset disables the check
    pub shared_secret: Option<String>,
    /// When non-empty, only these caller ids pass the auth stage
    pub allowed_callers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub slow_threshold_ms: u64,
}

impl PerformanceConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: 1000,
        }
    }
}

/// Required payload fields per channel when no `[[schema]]` is configured
pub fn default_schema_rules() -> Vec<SchemaRule> {
    vec![
        SchemaRule::new(channels::RUN, ["validationName"]),
        SchemaRule::new(channels::PREVIEW, ["validationName"]),
        SchemaRule::new(channels::RUN_ALL, ["ou"]),
    ]
}
