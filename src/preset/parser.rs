//! Preset descriptor parsing
//!
//! A channel-out descriptor lists the output channel of each layer in order,
//! for example `"1|2|3"`. Every layer of a preset uses the preset's module.

use serde::{Deserialize, Serialize};

use super::{PresetMap, PresetMapBuilder, MAX_CHANNEL};
use crate::error::ConfigError;

/// Separator between channel entries
pub const SEPARATOR: char = '|';

/// How channel values are read from a descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorSyntax {
    /// Every digit character is one channel (0-9); separators are skipped.
    /// `"13"` is two layers, channel 1 and channel 3.
    #[default]
    Digits,
    /// Separator-delimited decimal numbers (0-16). `"13|14"` is two layers,
    /// channel 13 and channel 14.
    Tokens,
}

/// Already-split fields of one preset line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetFields<'a> {
    pub preset_index: u8,
    pub input_channel: u8,
    pub channel_out: &'a str,
    pub octave_transpose: i8,
    pub module_index: u8,
    pub patch_index: u8,
    pub name: Option<&'a str>,
}

/// Build a [`PresetMap`] from one preset's fields.
///
/// Fails without producing a partial table if the descriptor holds more
/// layers than the table can store or contains anything other than digits
/// and separators.
pub fn parse_preset(fields: &PresetFields<'_>, syntax: DescriptorSyntax) -> Result<PresetMap, ConfigError> {
    let mut builder = PresetMap::builder(fields.preset_index, fields.input_channel)
        .octave_transpose(fields.octave_transpose)
        .default_module(fields.module_index)
        .patch(fields.patch_index);

    if let Some(name) = fields.name {
        builder = builder.name(name.trim());
    }

    builder = match syntax {
        DescriptorSyntax::Digits => parse_digits(builder, fields.channel_out, fields.module_index)?,
        DescriptorSyntax::Tokens => parse_tokens(builder, fields.channel_out, fields.module_index)?,
    };

    builder.build()
}

fn parse_digits(mut builder: PresetMapBuilder, descriptor: &str, module: u8) -> Result<PresetMapBuilder, ConfigError> {
    for (position, ch) in descriptor.chars().enumerate() {
        if ch == SEPARATOR {
            continue;
        }
        let value = ch
            .to_digit(10)
            .ok_or(ConfigError::UnrecognizedCharacter { ch, position })?;
        builder = builder.layer(module, value as u8)?;
    }
    Ok(builder)
}

fn parse_tokens(mut builder: PresetMapBuilder, descriptor: &str, module: u8) -> Result<PresetMapBuilder, ConfigError> {
    if descriptor.is_empty() {
        return Ok(builder);
    }

    let mut position = 0;
    for token in descriptor.split(SEPARATOR) {
        if token.is_empty() {
            return Err(ConfigError::EmptyToken { position });
        }

        let mut value: u32 = 0;
        for (offset, ch) in token.chars().enumerate() {
            let digit = ch.to_digit(10).ok_or(ConfigError::UnrecognizedCharacter {
                ch,
                position: position + offset,
            })?;
            value = value.saturating_mul(10).saturating_add(digit);
        }

        if value > MAX_CHANNEL as u32 {
            return Err(ConfigError::LayerChannelOutOfRange { value, position });
        }

        builder = builder.layer(module, value as u8)?;
        position += token.chars().count() + 1;
    }
    Ok(builder)
}
