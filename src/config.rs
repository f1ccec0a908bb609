//! Application-level configuration loading, including join-code settings and
//! the catalog collaborator endpoint.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CINEMATCH_BACK_CONFIG_PATH";
/// Environment variable carrying the catalog API key.
const CATALOG_API_KEY_ENV: &str = "TMDB_API_KEY";

const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 16;
const DEFAULT_SSE_CAPACITY: usize = 16;
const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_HEALTH_POLL_MS: u64 = 5_000;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_CATALOG_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_CATALOG_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    code_length: usize,
    max_code_attempts: u32,
    sse_capacity: usize,
    open_join_default: bool,
    supervisor: SupervisorConfig,
    catalog: CatalogConfig,
}

#[derive(Debug, Clone)]
/// Backoff and polling settings for the storage supervisor.
pub struct SupervisorConfig {
    /// First delay between failed connection or reconnection attempts.
    pub retry_initial_delay: Duration,
    /// Ceiling the exponential backoff saturates at.
    pub retry_max_delay: Duration,
    /// Interval between health probes of an installed store.
    pub health_poll_interval: Duration,
    /// In-place reconnects tried before the connection is rebuilt.
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_initial_delay: Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            retry_max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            health_poll_interval: Duration::from_millis(DEFAULT_HEALTH_POLL_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
/// Endpoint settings for the external movie catalog.
pub struct CatalogConfig {
    /// Base URL of the catalog API.
    pub base_url: String,
    /// Base URL prepended to poster paths.
    pub image_base_url: String,
    /// API key; lookups degrade to empty results when absent.
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if config.catalog.api_key.is_none() {
            config.catalog.api_key = env::var(CATALOG_API_KEY_ENV).ok();
        }

        config
    }

    /// Length of generated join codes.
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// How many collisions the code generator tolerates before reporting
    /// exhaustion.
    pub fn max_code_attempts(&self) -> u32 {
        self.max_code_attempts
    }

    /// Broadcast channel capacity of each per-room fan-out hub.
    pub fn sse_capacity(&self) -> usize {
        self.sse_capacity
    }

    /// Whether rooms accept votes from non-members unless the host opts out.
    pub fn open_join_default(&self) -> bool {
        self.open_join_default
    }

    /// Storage supervisor backoff and polling settings.
    pub fn supervisor(&self) -> &SupervisorConfig {
        &self.supervisor
    }

    /// Catalog endpoint settings.
    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    /// Override the code generator settings; used by tests that exercise the
    /// exhaustion path.
    pub fn with_code_settings(mut self, length: usize, max_attempts: u32) -> Self {
        self.code_length = length;
        self.max_code_attempts = max_attempts;
        self
    }

    /// Override the supervisor settings; used by tests that exercise the
    /// reconnect loop without real-time delays.
    pub fn with_supervisor_settings(mut self, settings: SupervisorConfig) -> Self {
        self.supervisor = settings;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            open_join_default: true,
            supervisor: SupervisorConfig::default(),
            catalog: CatalogConfig {
                base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
                image_base_url: DEFAULT_CATALOG_IMAGE_BASE_URL.to_string(),
                api_key: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    code_length: Option<usize>,
    max_code_attempts: Option<u32>,
    sse_capacity: Option<usize>,
    open_join_default: Option<bool>,
    supervisor: Option<RawSupervisorConfig>,
    catalog: Option<RawCatalogConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSupervisorConfig {
    retry_initial_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    health_poll_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogConfig {
    base_url: Option<String>,
    image_base_url: Option<String>,
    api_key: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let catalog = value.catalog.unwrap_or(RawCatalogConfig {
            base_url: None,
            image_base_url: None,
            api_key: None,
        });
        let supervisor = value.supervisor.unwrap_or_default();

        Self {
            code_length: value.code_length.unwrap_or(defaults.code_length),
            max_code_attempts: value
                .max_code_attempts
                .unwrap_or(defaults.max_code_attempts),
            sse_capacity: value.sse_capacity.unwrap_or(defaults.sse_capacity),
            open_join_default: value
                .open_join_default
                .unwrap_or(defaults.open_join_default),
            supervisor: SupervisorConfig {
                retry_initial_delay: supervisor
                    .retry_initial_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.supervisor.retry_initial_delay),
                retry_max_delay: supervisor
                    .retry_max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.supervisor.retry_max_delay),
                health_poll_interval: supervisor
                    .health_poll_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.supervisor.health_poll_interval),
                max_reconnect_attempts: supervisor
                    .max_reconnect_attempts
                    .unwrap_or(defaults.supervisor.max_reconnect_attempts),
            },
            catalog: CatalogConfig {
                base_url: catalog.base_url.unwrap_or(defaults.catalog.base_url),
                image_base_url: catalog
                    .image_base_url
                    .unwrap_or(defaults.catalog.image_base_url),
                api_key: catalog.api_key,
            },
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
