//! `~/.tether/config.toml`.
//!
//! ```toml
//! [core]
//! api_base = "https://crux-counter.fly.dev"
//!
//! [http]
//! connect_timeout_secs = 30
//! pool_idle_timeout_secs = 90
//!
//! [sse]
//! connect_attempts = 5
//! connect_timeout_secs = 5
//! keep_alive_secs = 5
//!
//! [dispatch]
//! queue_capacity = 256
//! ```
//!
//! Every key is optional. `TETHER_API_BASE` overrides `[core] api_base`.

use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use tether_providers::{ConnectPolicy, HttpSettings};

const CONFIG_ENV: &str = "TETHER_CONFIG";
const API_BASE_ENV: &str = "TETHER_API_BASE";

const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Default, Deserialize)]
pub struct ShellConfig {
    pub core: Option<CoreConfig>,
    pub http: Option<HttpConfig>,
    pub sse: Option<SseConfig>,
    pub dispatch: Option<DispatchSection>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CoreConfig {
    /// Counter server the Core builds request URLs against.
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: Option<u64>,
    pub pool_idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SseConfig {
    /// Total attempts to establish a stream, including the first.
    pub connect_attempts: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
    pub keep_alive_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchSection {
    /// Commands buffered ahead of the dispatch loop before senders wait.
    pub queue_capacity: Option<usize>,
}

/// Resolved dispatch loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ShellConfig {
    /// Load from `TETHER_CONFIG` or `~/.tether/config.toml`.
    ///
    /// A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Configured API base, with `TETHER_API_BASE` taking precedence.
    #[must_use]
    pub fn api_base(&self) -> Option<String> {
        let configured = self.core.as_ref().and_then(|c| c.api_base.as_deref());
        resolve_api_base(env::var(API_BASE_ENV).ok(), configured)
    }

    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        let mut settings = HttpSettings::default();
        if let Some(http) = &self.http {
            if let Some(secs) = http.connect_timeout_secs {
                settings.connect_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = http.pool_idle_timeout_secs {
                settings.pool_idle_timeout = Duration::from_secs(secs);
            }
        }
        settings
    }

    #[must_use]
    pub fn connect_policy(&self) -> ConnectPolicy {
        let mut policy = ConnectPolicy::default();
        if let Some(sse) = &self.sse {
            if let Some(attempts) = sse.connect_attempts {
                policy.max_attempts = attempts.max(1);
            }
            if let Some(secs) = sse.connect_timeout_secs {
                policy.connect_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = sse.keep_alive_secs {
                policy.keep_alive = Duration::from_secs(secs);
            }
        }
        policy
    }

    #[must_use]
    pub fn dispatch(&self) -> DispatchConfig {
        let queue_capacity = self
            .dispatch
            .as_ref()
            .and_then(|d| d.queue_capacity)
            .map_or(DEFAULT_QUEUE_CAPACITY, |n| n.max(1));
        DispatchConfig { queue_capacity }
    }
}

fn resolve_api_base(from_env: Option<String>, configured: Option<&str>) -> Option<String> {
    from_env
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            configured
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        })
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".tether").join("config.toml"))
}
