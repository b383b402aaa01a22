//! Error types for preset loading and event routing
//!
//! Routing errors are always local to one incoming event: the router reports
//! them and keeps running. Configuration errors reject a single preset.

use thiserror::Error;

/// Preset descriptor or table construction failure.
///
/// A preset that fails with one of these is rejected as a whole; whatever
/// preset was active before stays active.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("channel descriptor yields more than {capacity} layers")]
    TableOverflow { capacity: usize },

    #[error("unrecognized character {ch:?} at position {position} in channel descriptor")]
    UnrecognizedCharacter { ch: char, position: usize },

    #[error("empty channel token at position {position} in channel descriptor")]
    EmptyToken { position: usize },

    #[error("layer channel {value} at position {position} is out of range (0-16)")]
    LayerChannelOutOfRange { value: u32, position: usize },

    #[error("input channel {0} is out of range (must be 1-16)")]
    InputChannelOutOfRange(u8),

    #[error("wire table must be {expected} bytes, got {actual}")]
    WireLength { expected: usize, actual: usize },

    #[error("invalid preset field '{field}': {reason}")]
    Field { field: &'static str, reason: String },
}

/// Failure to build one outgoing channel-voice message
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("command 0x{0:02X} is not a channel-voice command")]
    Command(u8),

    #[error("channel {0} is out of range (0-15)")]
    Channel(u8),

    #[error("data byte {value} exceeds 127 ({field})")]
    Data { field: &'static str, value: u16 },
}

/// Non-fatal condition reported while routing one event
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    #[error("malformed note event: expected 3 bytes, got {len}")]
    MalformedEvent { len: usize },

    #[error("invalid layer channel {channel} in slot {slot}")]
    InvalidLayerChannel { slot: usize, channel: u8 },

    #[error("failed to encode layer message: {0}")]
    EventEncoding(#[from] EncodeError),
}
