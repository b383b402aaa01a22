//! AMIDIFX gateway
//!
//! Routes a musical keyboard to one or more sound module channels, layering
//! each key press according to the active preset.

pub mod config;
pub mod demo;
pub mod error;
pub mod midi;
pub mod monitor;
pub mod ports;
pub mod preset;
pub mod router;

pub use error::{ConfigError, EncodeError, RouteError};
pub use preset::{PresetBank, PresetMap};
pub use router::{ChannelRouter, OutputSink, Routed, RouterState};
