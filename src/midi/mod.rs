//! MIDI utilities and message types
//!
//! Provides message classification for the router, decoding for the console
//! monitor, and the checked encoder used to build layered note messages.

pub mod classify;

use std::fmt;

use crate::error::EncodeError;

pub use classify::{classify, Category};

/// Note Off command nibble
pub const NOTE_OFF: u8 = 0x80;
/// Note On command nibble
pub const NOTE_ON: u8 = 0x90;

/// Decoded MIDI message, used for display only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (0-15), note (0-127), pressure (0-127)
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },

    /// Begin System Exclusive (payload is not interpreted)
    SysExStart { len: usize },

    /// End of System Exclusive
    SysExEnd,

    /// MIDI Time Code Quarter Frame
    MidiTimeCode { data: u8 },

    /// Song Position Pointer
    SongPosition { position: u16 },

    /// Song Select
    SongSelect { song: u8 },

    /// Tune Request
    TuneRequest,

    /// Timing Clock
    TimingClock,

    /// Start
    Start,

    /// Continue
    Continue,

    /// Stop
    Stop,

    /// Active Sensing
    ActiveSensing,

    /// System Reset
    SystemReset,
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is never produced by midir
        if status < 0x80 {
            return None;
        }

        if status < 0xF0 {
            let channel = status & 0x0F;
            let d1 = rest.first().map(|b| b & 0x7F);
            let d2 = rest.get(1).map(|b| b & 0x7F);

            return match status & 0xF0 {
                NOTE_OFF => Some(MidiMessage::NoteOff {
                    channel,
                    note: d1?,
                    velocity: d2?,
                }),
                NOTE_ON => {
                    let (note, velocity) = (d1?, d2?);
                    // Velocity 0 is a Note Off
                    if velocity == 0 {
                        Some(MidiMessage::NoteOff { channel, note, velocity })
                    } else {
                        Some(MidiMessage::NoteOn { channel, note, velocity })
                    }
                }
                0xA0 => Some(MidiMessage::PolyPressure {
                    channel,
                    note: d1?,
                    pressure: d2?,
                }),
                0xB0 => Some(MidiMessage::ControlChange {
                    channel,
                    cc: d1?,
                    value: d2?,
                }),
                0xC0 => Some(MidiMessage::ProgramChange { channel, program: d1? }),
                0xD0 => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
                0xE0 => Some(MidiMessage::PitchBend {
                    channel,
                    value: convert::from_7bit_pair(d2?, d1?),
                }),
                _ => None,
            };
        }

        match status {
            0xF0 => Some(MidiMessage::SysExStart { len: data.len() }),
            0xF1 => Some(MidiMessage::MidiTimeCode { data: *rest.first()? }),
            0xF2 => Some(MidiMessage::SongPosition {
                position: convert::from_7bit_pair(*rest.get(1)?, *rest.first()?),
            }),
            0xF3 => Some(MidiMessage::SongSelect { song: rest.first()? & 0x7F }),
            0xF6 => Some(MidiMessage::TuneRequest),
            0xF7 => Some(MidiMessage::SysExEnd),
            0xF8 => Some(MidiMessage::TimingClock),
            0xFA => Some(MidiMessage::Start),
            0xFB => Some(MidiMessage::Continue),
            0xFC => Some(MidiMessage::Stop),
            0xFE => Some(MidiMessage::ActiveSensing),
            0xFF => Some(MidiMessage::SystemReset),
            _ => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} n:{} p:{}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
            MidiMessage::SysExStart { len } => write!(f, "SysEx begin ({} bytes)", len),
            MidiMessage::SysExEnd => write!(f, "SysEx end"),
            MidiMessage::MidiTimeCode { data } => write!(f, "MTC quarter frame {}", data),
            MidiMessage::SongPosition { position } => write!(f, "SongPosition {}", position),
            MidiMessage::SongSelect { song } => write!(f, "SongSelect {}", song),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Build a three-byte note message for one output layer.
///
/// Only Note On / Note Off commands are accepted. Values are checked, never
/// masked: a note pushed past 127 by the origin offset is an error.
pub fn encode_note(command: u8, channel: u8, note: u16, velocity: u8) -> Result<[u8; 3], EncodeError> {
    if command != NOTE_ON && command != NOTE_OFF {
        return Err(EncodeError::Command(command));
    }
    if channel > 0x0F {
        return Err(EncodeError::Channel(channel));
    }
    if note > 0x7F {
        return Err(EncodeError::Data { field: "note", value: note });
    }
    if velocity > 0x7F {
        return Err(EncodeError::Data { field: "velocity", value: velocity as u16 });
    }

    Ok([command | channel, note as u8, velocity])
}

/// MIDI value conversion utilities
pub mod convert {
    /// Combine two 7-bit bytes into a 14-bit value
    pub fn from_7bit_pair(msb: u8, lsb: u8) -> u16 {
        (((msb & 0x7F) as u16) << 7) | ((lsb & 0x7F) as u16)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
