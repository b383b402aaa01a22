//! Preset bank file loading
//!
//! The bank is a comma-separated file with one preset per line:
//!
//! ```text
//! # preset, channel, channel out, octave, module, patch, name
//! 0, 13, 1|2|3, 0, 0, 8, Klaus sein Sax
//! ```
//!
//! Lines that fail to parse are rejected one by one; the rest of the bank
//! still loads.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

use super::parser::{parse_preset, DescriptorSyntax, PresetFields};
use super::PresetMap;
use crate::error::ConfigError;

/// A preset line that was not loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPreset {
    pub line: u64,
    pub error: ConfigError,
}

/// All presets loaded from one bank file
#[derive(Debug, Clone, Default)]
pub struct PresetBank {
    presets: Vec<Arc<PresetMap>>,
    rejected: Vec<RejectedPreset>,
}

impl PresetBank {
    /// Load a bank file
    pub async fn load(path: impl AsRef<Path>, syntax: DescriptorSyntax) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)
            .await
            .with_context(|| format!("Failed to read preset file: {}", path.display()))?;

        let bank = Self::from_reader(contents.as_slice(), syntax)
            .with_context(|| format!("Failed to parse preset file: {}", path.display()))?;

        debug!(
            "Loaded {} presets from {} ({} rejected)",
            bank.len(),
            path.display(),
            bank.rejected.len()
        );
        Ok(bank)
    }

    /// Parse a bank from any CSV source
    pub fn from_reader<R: Read>(reader: R, syntax: DescriptorSyntax) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut bank = Self::default();
        for record in csv.records() {
            let record = record.context("Malformed CSV record")?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.iter().all(str::is_empty) {
                continue;
            }

            match parse_record(&record, syntax) {
                Ok(map) => bank.presets.push(Arc::new(map)),
                Err(error) => {
                    warn!("Rejected preset on line {}: {}", line, error);
                    bank.rejected.push(RejectedPreset { line, error });
                }
            }
        }

        Ok(bank)
    }

    /// Find the preset for `preset_index` on 1-based `input_channel`
    pub fn get(&self, preset_index: u8, input_channel: u8) -> Option<Arc<PresetMap>> {
        self.presets
            .iter()
            .find(|p| p.preset_index() == preset_index && p.input_channel() == input_channel)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PresetMap>> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn rejected(&self) -> &[RejectedPreset] {
        &self.rejected
    }
}

fn parse_record(record: &csv::StringRecord, syntax: DescriptorSyntax) -> Result<PresetMap, ConfigError> {
    if record.len() < 6 {
        return Err(ConfigError::Field {
            field: "line",
            reason: format!("expected at least 6 fields, got {}", record.len()),
        });
    }

    // Names may contain commas of their own
    let name = if record.len() > 6 {
        Some(record.iter().skip(6).collect::<Vec<_>>().join(", "))
    } else {
        None
    };

    let fields = PresetFields {
        preset_index: number(record, 0, "presetIndex")?,
        input_channel: number(record, 1, "channelIndex")?,
        channel_out: &record[2],
        octave_transpose: number(record, 3, "octaveTranspose")?,
        module_index: number(record, 4, "moduleIndex")?,
        patch_index: number(record, 5, "patchIndex")?,
        name: name.as_deref(),
    };

    parse_preset(&fields, syntax)
}

fn number<T: std::str::FromStr>(record: &csv::StringRecord, index: usize, field: &'static str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    record[index].parse::<T>().map_err(|e| ConfigError::Field {
        field,
        reason: format!("'{}': {}", &record[index], e),
    })
}
