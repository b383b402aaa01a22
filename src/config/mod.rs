//! Configuration management for the AMIDIFX gateway
//!
//! Handles loading, validating, saving, and hot-reloading of the YAML
//! configuration file. The preset bank lives in its own CSV file, referenced
//! from here.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::preset::{DescriptorSyntax, MAX_CHANNEL};

pub use watcher::{ConfigWatcher, Reload, ReloadTrigger};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub presets: PresetConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sound_modules: Vec<SoundModuleConfig>,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// MIDI device preferences
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Keyboard port name (substring match, empty = first port)
    #[serde(default)]
    pub input_device: String,
    /// Sound module port name (substring match, empty = first port)
    #[serde(default)]
    pub output_device: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Preset bank and selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresetConfig {
    /// Bank file, relative to the configuration file
    pub file: String,
    /// Active preset index
    #[serde(default)]
    pub active: u8,
    /// Keyboard input channel the active preset applies to (1-16)
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default)]
    pub descriptor_syntax: DescriptorSyntax,
}

/// Sound module entry; its position in the list is the module index
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SoundModuleConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Demo sequence playback
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoConfig {
    #[serde(default = "default_tempo")]
    pub tempo_bpm: f32,
    #[serde(default = "default_replay")]
    pub replay: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: default_tempo(),
            replay: default_replay(),
        }
    }
}

impl SoundModuleConfig {
    /// Module name, with its patch file when one is configured
    pub fn describe(&self) -> String {
        match &self.file {
            Some(file) => format!("{} ({})", self.name, file),
            None => self.name.clone(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.client_name.is_empty() {
            anyhow::bail!("MIDI client_name cannot be empty");
        }

        if self.presets.file.is_empty() {
            anyhow::bail!("Preset file cannot be empty");
        }
        if self.presets.channel == 0 || self.presets.channel > MAX_CHANNEL {
            anyhow::bail!(
                "Preset channel {} is invalid (must be 1-{})",
                self.presets.channel,
                MAX_CHANNEL
            );
        }

        for (idx, module) in self.sound_modules.iter().enumerate() {
            if module.name.is_empty() {
                anyhow::bail!("Sound module {} name cannot be empty", idx);
            }
        }

        if !(self.demo.tempo_bpm.is_finite() && self.demo.tempo_bpm > 0.0) {
            anyhow::bail!("Demo tempo {} is invalid (must be > 0)", self.demo.tempo_bpm);
        }

        Ok(())
    }

    /// Resolve the preset bank path against the configuration file location
    pub fn presets_path(&self, config_path: &Path) -> PathBuf {
        let file = Path::new(&self.presets.file);
        if file.is_absolute() {
            return file.to_path_buf();
        }
        config_path
            .parent()
            .map(|dir| dir.join(file))
            .unwrap_or_else(|| file.to_path_buf())
    }

    /// Sound module by module index
    pub fn sound_module(&self, index: u8) -> Option<&SoundModuleConfig> {
        self.sound_modules.get(index as usize)
    }
}

// Default value functions
fn default_client_name() -> String { "AMIDIFX-GW".to_string() }
fn default_channel() -> u8 { 13 }
fn default_tempo() -> f32 { 144.0 }
fn default_replay() -> u32 { 1 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
midi:
  input_device: "Seaboard RISE 49"
  output_device: "Deebach-Blackbox"

presets:
  file: "presets.csv"
  active: 2
  descriptor_syntax: tokens

sound_modules:
  - name: "Deebach Blackbox"
    file: "deebach.csv"
  - name: "Integra 7"
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config: AppConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.midi.client_name, "AMIDIFX-GW");
        assert_eq!(config.presets.active, 2);
        assert_eq!(config.presets.channel, 13);
        assert_eq!(config.presets.descriptor_syntax, DescriptorSyntax::Tokens);
        assert_eq!(config.demo.tempo_bpm, 144.0);
        assert_eq!(config.demo.replay, 1);

        assert_eq!(config.sound_module(1).map(|m| m.name.as_str()), Some("Integra 7"));
        assert_eq!(config.sound_module(0).and_then(|m| m.file.as_deref()), Some("deebach.csv"));
        assert!(config.sound_module(2).is_none());
        assert_eq!(config.sound_module(0).map(|m| m.describe()).as_deref(), Some("Deebach Blackbox (deebach.csv)"));
        assert_eq!(config.sound_module(1).map(|m| m.describe()).as_deref(), Some("Integra 7"));
    }

    #[test]
    fn test_minimal_config() {
        let config: AppConfig = serde_yaml::from_str("midi: {}\npresets:\n  file: p.csv\n").unwrap();
        config.validate().unwrap();

        assert!(config.midi.input_device.is_empty());
        assert_eq!(config.presets.descriptor_syntax, DescriptorSyntax::Digits);
        assert!(config.sound_modules.is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_channel() {
        let mut config: AppConfig = serde_yaml::from_str(CONFIG).unwrap();

        config.presets.channel = 0;
        assert!(config.validate().is_err());

        config.presets.channel = 17;
        assert!(config.validate().is_err());

        config.presets.channel = 16;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_demo_tempo() {
        let mut config: AppConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.demo.tempo_bpm = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_path_is_relative_to_config() {
        let config: AppConfig = serde_yaml::from_str(CONFIG).unwrap();

        assert_eq!(
            config.presets_path(Path::new("/etc/amidifx/config.yaml")),
            PathBuf::from("/etc/amidifx/presets.csv")
        );
        assert_eq!(config.presets_path(Path::new("config.yaml")), PathBuf::from("presets.csv"));
    }

    #[tokio::test]
    async fn test_save_and_reload() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        let path = path.to_string_lossy().to_string();

        let config: AppConfig = serde_yaml::from_str(CONFIG)?;
        config.save(&path).await?;

        let reloaded = AppConfig::load(&path).await?;
        assert_eq!(reloaded.midi.output_device, "Deebach-Blackbox");
        assert_eq!(reloaded.presets.active, 2);
        assert_eq!(reloaded.sound_modules.len(), 2);
        Ok(())
    }
}
