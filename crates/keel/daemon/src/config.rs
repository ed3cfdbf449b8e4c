//! Configuration for keeld

use keel_controller::{ControllerConfig, LicenseClientConfig, PlannerOptions};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Reconcile loop tuning
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Licensing authority client
    #[serde(default)]
    pub license: LicenseClientConfig,

    /// Shape of the objects generated for LicensedServers
    #[serde(default)]
    pub planner: PlannerOptions,

    #[serde(default)]
    pub manifests: ManifestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Serve the REST API; controllers run either way
    #[serde(default = "default_true")]
    pub api_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_enabled: true,
        }
    }
}

/// Manifests applied at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Directory of `.yaml`/`.yml` files, each possibly multi-document
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Environment variable naming the manifest directory; it maps onto
/// `manifests.dir` through the `KEEL_` source as well
pub const MANIFESTS_DIR_ENV: &str = "KEEL_MANIFESTS__DIR";

impl DaemonConfig {
    /// Layer built-in defaults, the optional file, then `KEEL_` environment
    /// variables (`KEEL_SERVER__LISTEN_ADDR`, `KEEL_LICENSE__TIMEOUT_SECS`, ...)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        Self::load_from(path, None)
    }

    /// As [`DaemonConfig::load`], reading variables from `env` instead of the
    /// process environment when given
    pub fn load_from(
        path: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KEEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        builder.build()?.try_deserialize()
    }
}
