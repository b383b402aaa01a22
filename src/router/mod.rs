//! Channel router - per-event layering engine
//!
//! The router sits between the keyboard input and the sound module output:
//! - Note On / Note Off events fan out to every layer of the active preset
//! - All other channel-voice and system messages pass through unchanged
//! - System Exclusive data passes through untouched until its end marker
//!
//! One event is routed completely before the next one is accepted. The active
//! preset can only be replaced through `&mut self`, so a swap never overlaps
//! an in-flight `route` call.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::error::RouteError;
use crate::midi::{classify, encode_note, format_hex, Category};
use crate::preset::{LayerChannel, PresetMap, LAYER_CAPACITY};

/// Semitone offset applied to the origin layer only
pub const ORIGIN_NOTE_OFFSET: u16 = 4;

const SYSEX_END: u8 = 0xF7;

/// Destination for routed messages.
///
/// `send` is fire-and-forget: the router never waits on it and never learns
/// whether delivery succeeded.
pub trait OutputSink {
    fn send(&mut self, message: &[u8], timestamp: u64);
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn send(&mut self, message: &[u8], timestamp: u64) {
        (**self).send(message, timestamp)
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn send(&mut self, message: &[u8], timestamp: u64) {
        (**self).send(message, timestamp)
    }
}

/// Passthrough state of the router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouterState {
    #[default]
    Normal,
    InSystemExclusive,
}

/// What happened to one incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Forwarded unchanged
    Forwarded,
    /// Note event layered onto `voices` output messages
    Layered { voices: usize },
    /// Layer scan stopped early; the first `voices` messages were sent
    Aborted { voices: usize, reason: RouteError },
    /// Nothing was sent
    Dropped(RouteError),
}

impl Routed {
    /// Number of messages handed to the sink
    pub fn sent(&self) -> usize {
        match *self {
            Routed::Forwarded => 1,
            Routed::Layered { voices } | Routed::Aborted { voices, .. } => voices,
            Routed::Dropped(_) => 0,
        }
    }

    pub fn error(&self) -> Option<RouteError> {
        match *self {
            Routed::Aborted { reason, .. } => Some(reason),
            Routed::Dropped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Layering router for one keyboard input
pub struct ChannelRouter<S: OutputSink> {
    preset: Arc<PresetMap>,
    state: RouterState,
    sink: S,
}

impl<S: OutputSink> ChannelRouter<S> {
    /// Create a router emitting into `sink` under `preset`
    pub fn new(preset: Arc<PresetMap>, sink: S) -> Self {
        Self {
            preset,
            state: RouterState::Normal,
            sink,
        }
    }

    pub fn preset(&self) -> &Arc<PresetMap> {
        &self.preset
    }

    /// Replace the active preset, returning the previous one
    pub fn set_preset(&mut self, preset: Arc<PresetMap>) -> Arc<PresetMap> {
        debug!(
            "Active preset {} -> {} (input ch:{})",
            self.preset.preset_index(),
            preset.preset_index(),
            preset.input_channel()
        );
        std::mem::replace(&mut self.preset, preset)
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Route one incoming message
    pub fn route(&mut self, message: &[u8], timestamp: u64) -> Routed {
        if self.state == RouterState::InSystemExclusive {
            self.sink.send(message, timestamp);
            if message.first() == Some(&SYSEX_END) || message.last() == Some(&SYSEX_END) {
                trace!("SysEx passthrough ended");
                self.state = RouterState::Normal;
            }
            return Routed::Forwarded;
        }

        let Some(&status) = message.first() else {
            warn!("Dropping empty MIDI message");
            return Routed::Dropped(RouteError::MalformedEvent { len: 0 });
        };

        match classify(status) {
            Category::SystemExclusiveStart => {
                self.sink.send(message, timestamp);
                // A complete F0..F7 message needs no passthrough mode
                if message.len() < 2 || message.last() != Some(&SYSEX_END) {
                    trace!("SysEx passthrough started");
                    self.state = RouterState::InSystemExclusive;
                }
                Routed::Forwarded
            }
            Category::SystemExclusiveEnd
            | Category::RealtimeTiming
            | Category::Other
            | Category::OtherChannelVoice => {
                self.sink.send(message, timestamp);
                Routed::Forwarded
            }
            Category::NoteEvent => self.layer(message, timestamp),
        }
    }

    /// Fan a note event out to the active preset's layers
    fn layer(&mut self, message: &[u8], timestamp: u64) -> Routed {
        let &[status, note, velocity] = message else {
            warn!("Unable to layer malformed note message: {}", format_hex(message));
            return Routed::Dropped(RouteError::MalformedEvent { len: message.len() });
        };

        let command = status & 0xF0;
        let Self { preset, sink, .. } = self;
        let mut voices = 0;

        for slot_index in 0..LAYER_CAPACITY {
            let offset = if slot_index == 0 { ORIGIN_NOTE_OFFSET } else { 0 };
            let slot = preset.slots()[slot_index];

            let channel = match slot.channel() {
                // An unassigned origin layer is muted, later ones end the list
                LayerChannel::Terminator if slot_index == 0 => continue,
                LayerChannel::Terminator => break,
                LayerChannel::Invalid(channel) => {
                    let reason = RouteError::InvalidLayerChannel { slot: slot_index, channel };
                    warn!("Layer scan aborted: {}", reason);
                    return Routed::Aborted { voices, reason };
                }
                LayerChannel::Channel(channel) => channel,
            };

            match encode_note(command, channel, note as u16 + offset, velocity) {
                Ok(out) => {
                    sink.send(&out, timestamp);
                    voices += 1;
                    trace!("Layer[{}] -> ch:{} {}", slot_index, channel + 1, format_hex(&out));
                }
                Err(e) => {
                    let reason = RouteError::from(e);
                    warn!("Invalid channel layer message on slot {}: {}", slot_index, reason);
                    return Routed::Aborted { voices, reason };
                }
            }
        }

        debug!("Layered {} onto {} voices", format_hex(message), voices);
        Routed::Layered { voices }
    }
}
