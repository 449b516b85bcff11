//! vhcictl configuration management

use anyhow::{Context, Result, anyhow};
use common::LOG_LEVELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vhci::{DEFAULT_CONTROLLER_PATH, DEFAULT_USB_DEVICES_PATH};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VhciConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub sysfs: SysfsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysfsSettings {
    /// Directory of the first controller (`vhci_hcd.0`)
    pub controller_path: String,
    /// Directory holding one entry per local USB device
    pub usb_devices_path: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for SysfsSettings {
    fn default() -> Self {
        Self {
            controller_path: DEFAULT_CONTROLLER_PATH.to_string(),
            usb_devices_path: DEFAULT_USB_DEVICES_PATH.to_string(),
        }
    }
}

impl SysfsSettings {
    /// Controller path with `~` expanded
    pub fn controller_path(&self) -> PathBuf {
        expand(&self.controller_path)
    }

    /// USB devices path with `~` expanded
    pub fn usb_devices_path(&self) -> PathBuf {
        expand(&self.usb_devices_path)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl VhciConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/vhcictl/config.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: VhciConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                // Print to stderr since logging might not be initialized yet
                eprintln!("Config: {:#}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("vhcictl").join("config.toml")
        } else {
            PathBuf::from(".config/vhcictl/config.toml")
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if self.sysfs.controller_path.trim().is_empty() {
            return Err(anyhow!("sysfs.controller_path must not be empty"));
        }
        if self.sysfs.usb_devices_path.trim().is_empty() {
            return Err(anyhow!("sysfs.usb_devices_path must not be empty"));
        }

        Ok(())
    }
}
