//! # Station Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PTL_CONTROLLER__HOST=10.0.0.20                                     │
//! │     PTL_PICKING__CONFIRM_TIMEOUT_SECS=45                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ptl-station.toml (or the path given on the command line)           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     127.0.0.1:5000, 30 s confirm timeout, ...                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [controller]
//! host = "127.0.0.1"
//! port = 5000
//! connect_timeout_ms = 5000
//! ack_timeout_ms = 3000
//! reconnect_delay_secs = 10
//! poll_interval_ms = 50
//!
//! [picking]
//! confirm_timeout_secs = 30
//! settle_delay_ms = 1000
//!
//! [limits]
//! file = "data/limits.csv"
//! barcode_column = 0
//! limit_column = 1
//! has_header = true
//! wait_interval_secs = 5
//!
//! [report]
//! directory = "report"
//!
//! [[carts]]
//! id = "1"
//!
//! [[carts.baskets]]
//! id = "1"
//! address = 1
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ptl_core::{Basket, Cart, CartContainer, ModuleAddress};
use ptl_data::LimitsConfig;
use ptl_link::LinkSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::picking::PickingSettings;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "ptl-station.toml";

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "PTL";

// =============================================================================
// Controller
// =============================================================================

/// Light controller connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Wait for the controller's reply to one command.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Fixed wait between reconnect attempts.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Button event polling interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_ack_timeout_ms() -> u64 {
    3000
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// =============================================================================
// Picking
// =============================================================================

/// Picking operation timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingConfig {
    /// Bound on one operation, from assignment to settle.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,

    /// Pause after confirmation before the lights go off.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_confirm_timeout_secs() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for PickingConfig {
    fn default() -> Self {
        PickingConfig {
            confirm_timeout_secs: default_confirm_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

// =============================================================================
// Limits & Report
// =============================================================================

/// Barcode limit file settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsFileConfig {
    #[serde(default = "default_limits_file")]
    pub file: PathBuf,

    #[serde(default)]
    pub barcode_column: usize,

    #[serde(default = "default_limit_column")]
    pub limit_column: usize,

    #[serde(default = "default_true")]
    pub has_header: bool,

    /// Check interval while the file is missing at startup.
    #[serde(default = "default_wait_interval_secs")]
    pub wait_interval_secs: u64,
}

fn default_limits_file() -> PathBuf {
    PathBuf::from("data/limits.csv")
}

fn default_limit_column() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_wait_interval_secs() -> u64 {
    5
}

impl Default for LimitsFileConfig {
    fn default() -> Self {
        LimitsFileConfig {
            file: default_limits_file(),
            barcode_column: 0,
            limit_column: default_limit_column(),
            has_header: true,
            wait_interval_secs: default_wait_interval_secs(),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_directory")]
    pub directory: PathBuf,
}

fn default_report_directory() -> PathBuf {
    PathBuf::from("report")
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            directory: default_report_directory(),
        }
    }
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketConfig {
    pub id: String,
    pub address: ModuleAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    pub id: String,
    #[serde(default)]
    pub baskets: Vec<BasketConfig>,
}

// =============================================================================
// Station Config
// =============================================================================

/// Complete station configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub picking: PickingConfig,

    #[serde(default)]
    pub limits: LimitsFileConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub carts: Vec<CartConfig>,
}

impl StationConfig {
    /// Loads configuration from defaults, the TOML file and the environment.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (missing file is fine)
    /// 3. `PTL_*` environment variables, `__` between section and key
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            info!(path = %path.display(), "Loading station config from file");
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults and environment");
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: StationConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;

        let config: StationConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.host.trim().is_empty() {
            return Err(ConfigError::Invalid("controller.host must not be empty".into()));
        }
        if self.controller.port == 0 {
            return Err(ConfigError::Invalid("controller.port must be greater than 0".into()));
        }

        let timeouts = [
            ("controller.connect_timeout_ms", self.controller.connect_timeout_ms),
            ("controller.ack_timeout_ms", self.controller.ack_timeout_ms),
            ("controller.poll_interval_ms", self.controller.poll_interval_ms),
            ("picking.confirm_timeout_secs", self.picking.confirm_timeout_secs),
            ("limits.wait_interval_secs", self.limits.wait_interval_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }

        if self.limits.barcode_column == self.limits.limit_column {
            return Err(ConfigError::Invalid(
                "limits.barcode_column and limits.limit_column must differ".into(),
            ));
        }

        if self.carts.is_empty() {
            return Err(ConfigError::Invalid("at least one [[carts]] entry is required".into()));
        }

        let mut addresses = HashSet::new();
        for cart in &self.carts {
            if cart.baskets.is_empty() {
                return Err(ConfigError::Invalid(format!("cart {} has no baskets", cart.id)));
            }
            for basket in &cart.baskets {
                if !addresses.insert(basket.address) {
                    return Err(ConfigError::Invalid(format!(
                        "module address {} is used by more than one basket",
                        basket.address
                    )));
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    /// Builds the cart container from `[[carts]]`.
    pub fn build_carts(&self) -> Result<CartContainer, ConfigError> {
        let carts = self
            .carts
            .iter()
            .map(|cart| {
                Cart::new(
                    cart.id.clone(),
                    cart.baskets
                        .iter()
                        .map(|b| Basket::new(b.id.clone(), b.address))
                        .collect(),
                )
            })
            .collect();
        Ok(CartContainer::new(carts)?)
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings::default()
            .connect_timeout(Duration::from_millis(self.controller.connect_timeout_ms))
            .ack_timeout(Duration::from_millis(self.controller.ack_timeout_ms))
            .reconnect_delay(Duration::from_secs(self.controller.reconnect_delay_secs))
            .poll_interval(Duration::from_millis(self.controller.poll_interval_ms))
    }

    pub fn picking_settings(&self) -> PickingSettings {
        PickingSettings {
            confirm_timeout: Duration::from_secs(self.picking.confirm_timeout_secs),
            settle_delay: Duration::from_millis(self.picking.settle_delay_ms),
        }
    }

    pub fn limits_config(&self) -> LimitsConfig {
        LimitsConfig::new(&self.limits.file)
            .columns(self.limits.barcode_column, self.limits.limit_column)
            .has_header(self.limits.has_header)
    }

    pub fn limits_wait_interval(&self) -> Duration {
        Duration::from_secs(self.limits.wait_interval_secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
