//! Preset layer tables
//!
//! A [`PresetMap`] describes how note events from one keyboard channel fan out
//! to (sound module, output channel) pairs. Tables are immutable once built
//! and are swapped as a whole when the active preset changes.

pub mod bank;
pub mod parser;

pub use bank::PresetBank;
pub use parser::{parse_preset, DescriptorSyntax, PresetFields};

use crate::error::ConfigError;

/// Number of layer slots in a preset table
pub const LAYER_CAPACITY: usize = 10;

/// Size of the table shared with the downstream hardware controller
pub const WIRE_LEN: usize = 2 + LAYER_CAPACITY * 2 + 1;

/// Highest valid 1-based MIDI channel
pub const MAX_CHANNEL: u8 = 16;

/// One (module, channel) layer entry. Channel 0 terminates the layer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerSlot {
    pub module_index: u8,
    pub output_channel: u8,
}

/// How the router must treat a slot's channel value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerChannel {
    /// End of the layer list
    Terminator,
    /// Valid channel, 0-based
    Channel(u8),
    /// Out-of-range value; aborts the scan
    Invalid(u8),
}

impl LayerSlot {
    pub fn new(module_index: u8, output_channel: u8) -> Self {
        Self { module_index, output_channel }
    }

    pub fn channel(&self) -> LayerChannel {
        match self.output_channel {
            0 => LayerChannel::Terminator,
            ch @ 1..=MAX_CHANNEL => LayerChannel::Channel(ch - 1),
            ch => LayerChannel::Invalid(ch),
        }
    }
}

/// Immutable layer table for one preset on one input channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetMap {
    preset_index: u8,
    input_channel: u8,
    octave_transpose: i8,
    default_module_index: u8,
    patch_index: u8,
    name: Option<String>,
    layers: [LayerSlot; LAYER_CAPACITY],
}

impl PresetMap {
    /// Start building a table for `preset_index` on 1-based `input_channel`
    pub fn builder(preset_index: u8, input_channel: u8) -> PresetMapBuilder {
        PresetMapBuilder {
            map: PresetMap {
                preset_index,
                input_channel,
                octave_transpose: 0,
                default_module_index: 0,
                patch_index: 0,
                name: None,
                layers: [LayerSlot::default(); LAYER_CAPACITY],
            },
            len: 0,
        }
    }

    /// Table with every slot set to the terminator. Routes nothing.
    pub fn muted(preset_index: u8, input_channel: u8) -> Self {
        Self::builder(preset_index, input_channel).build_unchecked()
    }

    pub fn preset_index(&self) -> u8 {
        self.preset_index
    }

    pub fn input_channel(&self) -> u8 {
        self.input_channel
    }

    pub fn octave_transpose(&self) -> i8 {
        self.octave_transpose
    }

    pub fn default_module_index(&self) -> u8 {
        self.default_module_index
    }

    pub fn patch_index(&self) -> u8 {
        self.patch_index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// All slots, including those after the terminator
    pub fn slots(&self) -> &[LayerSlot; LAYER_CAPACITY] {
        &self.layers
    }

    pub fn slot(&self, index: usize) -> Option<&LayerSlot> {
        self.layers.get(index)
    }

    /// Slots up to (not including) the first terminator
    pub fn active_layers(&self) -> impl Iterator<Item = &LayerSlot> {
        self.layers.iter().take_while(|slot| slot.output_channel != 0)
    }

    /// Encode into the 23-byte table layout understood by the hardware
    /// controller: preset index, input channel, ten (module, channel) pairs,
    /// one reserved byte.
    pub fn to_wire(&self) -> [u8; WIRE_LEN] {
        let mut wire = [0u8; WIRE_LEN];
        wire[0] = self.preset_index;
        wire[1] = self.input_channel;
        for (i, slot) in self.layers.iter().enumerate() {
            wire[2 + i * 2] = slot.module_index;
            wire[3 + i * 2] = slot.output_channel;
        }
        wire
    }

    /// Decode a hardware table. Slot values are taken as-is; out-of-range
    /// channels are kept and surface when the router scans them.
    pub fn from_wire(wire: &[u8]) -> Result<Self, ConfigError> {
        if wire.len() != WIRE_LEN {
            return Err(ConfigError::WireLength { expected: WIRE_LEN, actual: wire.len() });
        }

        let mut builder = Self::builder(wire[0], wire[1]);
        for pair in wire[2..2 + LAYER_CAPACITY * 2].chunks_exact(2) {
            builder = builder.layer(pair[0], pair[1])?;
        }
        builder.build()
    }
}

/// Validating builder for [`PresetMap`].
///
/// Layers are appended in order; appending past [`LAYER_CAPACITY`] fails
/// instead of truncating.
#[derive(Debug, Clone)]
pub struct PresetMapBuilder {
    map: PresetMap,
    len: usize,
}

impl PresetMapBuilder {
    pub fn octave_transpose(mut self, octave_transpose: i8) -> Self {
        self.map.octave_transpose = octave_transpose;
        self
    }

    pub fn default_module(mut self, module_index: u8) -> Self {
        self.map.default_module_index = module_index;
        self
    }

    pub fn patch(mut self, patch_index: u8) -> Self {
        self.map.patch_index = patch_index;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.map.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Append one layer slot
    pub fn layer(mut self, module_index: u8, output_channel: u8) -> Result<Self, ConfigError> {
        let slot = self
            .map
            .layers
            .get_mut(self.len)
            .ok_or(ConfigError::TableOverflow { capacity: LAYER_CAPACITY })?;
        *slot = LayerSlot::new(module_index, output_channel);
        self.len += 1;
        Ok(self)
    }

    /// Number of slots appended so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn build(self) -> Result<PresetMap, ConfigError> {
        if !(1..=MAX_CHANNEL).contains(&self.map.input_channel) {
            return Err(ConfigError::InputChannelOutOfRange(self.map.input_channel));
        }
        Ok(self.map)
    }

    fn build_unchecked(self) -> PresetMap {
        self.map
    }
}
