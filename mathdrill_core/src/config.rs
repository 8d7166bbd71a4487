//! Configuration file support for mathdrill.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/mathdrill/config.toml`.

use crate::achievements::{AchievementPolicy, RainbowRule};
use crate::countdown::DEFAULT_RAINBOW_SECONDS;
use crate::{DrillConfig, Error, Result, DEFAULT_BASE_NUMBER, DEFAULT_RANGE_MAX, DEFAULT_RANGE_MIN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File holding every stored key inside the data directory
pub const STORAGE_FILE: &str = "profiles.json";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub drill: DrillDefaults,

    #[serde(default)]
    pub achievements: AchievementsConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }
}

/// Values used while a drill is only partly configured
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DrillDefaults {
    #[serde(default = "default_base_number")]
    pub base_number: i64,

    #[serde(default = "default_range_min")]
    pub range_min: i64,

    #[serde(default = "default_range_max")]
    pub range_max: i64,
}

impl Default for DrillDefaults {
    fn default() -> Self {
        Self {
            base_number: default_base_number(),
            range_min: default_range_min(),
            range_max: default_range_max(),
        }
    }
}

impl DrillDefaults {
    /// Unconfigured drill seeded with these defaults
    pub fn to_drill_config(&self) -> DrillConfig {
        DrillConfig {
            operation: None,
            base_number: self.base_number,
            range_min: self.range_min,
            range_max: self.range_max,
            is_square_numbers: false,
        }
    }
}

/// Achievement rules
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AchievementsConfig {
    #[serde(default)]
    pub rainbow_rule: RainbowRule,

    #[serde(default = "default_rainbow_seconds")]
    pub rainbow_seconds: i64,
}

impl Default for AchievementsConfig {
    fn default() -> Self {
        Self {
            rainbow_rule: RainbowRule::default(),
            rainbow_seconds: default_rainbow_seconds(),
        }
    }
}

impl AchievementsConfig {
    pub fn policy(&self) -> AchievementPolicy {
        AchievementPolicy::new(self.rainbow_rule)
    }

    pub fn rainbow_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rainbow_seconds.max(1))
    }
}

// Default value functions
fn home_dir_or_cwd() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir_or_cwd().join(".local/share"));
    base.join("mathdrill")
}

fn default_base_number() -> i64 {
    DEFAULT_BASE_NUMBER
}

fn default_range_min() -> i64 {
    DEFAULT_RANGE_MIN
}

fn default_range_max() -> i64 {
    DEFAULT_RANGE_MAX
}

fn default_rainbow_seconds() -> i64 {
    DEFAULT_RAINBOW_SECONDS
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_or_cwd().join(".config"));
        base.join("mathdrill").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
