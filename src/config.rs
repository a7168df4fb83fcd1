//! Configuration for the nwm host
//!
//! Loads configuration from TOML file at `~/.config/nwm/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::SessionOptions;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub keybindings: Vec<KeyBindingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
            keybindings: vec![KeyBindingConfig {
                keysym: 0xff0d, // Return
                modifiers: vec!["super".to_string()],
            }],
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::parse(&content)?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        // Surface bad modifier names at load time
        config.key_bindings()?;
        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("nwm");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;
        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            pointer_drag: self.session.pointer_drag,
            revert_focus: self.session.revert_focus,
        }
    }

    /// Bindings as (keysym, modifier mask) pairs, in file order
    pub fn key_bindings(&self) -> Result<Vec<(u32, u16)>> {
        self.keybindings
            .iter()
            .map(|binding| Ok((binding.keysym, binding.modifier_mask()?)))
            .collect()
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// X display to connect to; `$DISPLAY` when unset
    pub display: Option<String>,
    /// Report pointer drags on managed windows
    pub pointer_drag: bool,
    /// Revert focus taken by clients without being asked
    pub revert_focus: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display: None,
            pointer_drag: false,
            revert_focus: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "nwm=debug,info".to_string(),
        }
    }
}

/// A hotkey: numeric keysym plus modifier names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindingConfig {
    pub keysym: u32,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

impl KeyBindingConfig {
    pub fn modifier_mask(&self) -> Result<u16> {
        self.modifiers
            .iter()
            .try_fold(0u16, |mask, name| Ok(mask | modifier_bit(name)?))
    }
}

/// X modifier bit for a modifier name
fn modifier_bit(name: &str) -> Result<u16> {
    let bit = match name.to_ascii_lowercase().as_str() {
        "shift" => 1 << 0,
        "lock" => 1 << 1,
        "control" | "ctrl" => 1 << 2,
        "mod1" | "alt" => 1 << 3,
        "mod2" => 1 << 4,
        "mod3" => 1 << 5,
        "mod4" | "super" => 1 << 6,
        "mod5" => 1 << 7,
        _ => bail!("Unknown modifier {:?}", name),
    };
    Ok(bit)
}
