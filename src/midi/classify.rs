//! Status-byte classification
//!
//! Decides which router handler an incoming message goes to.

/// Router-facing category of an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Note On / Note Off (Note On with velocity 0 included)
    NoteEvent,
    /// Poly pressure, control change, program change, channel pressure, pitch bend
    OtherChannelVoice,
    /// 0xF0
    SystemExclusiveStart,
    /// 0xF7
    SystemExclusiveEnd,
    /// Timing clock (0xF8) and active sensing (0xFE)
    RealtimeTiming,
    /// Remaining system common / realtime messages
    Other,
}

/// Classify a message by its status byte.
///
/// System messages (0xF0-0xFF) are matched individually, everything else by
/// its high nibble.
pub fn classify(status: u8) -> Category {
    match status {
        0xF0 => Category::SystemExclusiveStart,
        0xF7 => Category::SystemExclusiveEnd,
        0xF8 | 0xFE => Category::RealtimeTiming,
        0xF1..=0xFF => Category::Other,
        _ => match status & 0xF0 {
            0x80 | 0x90 => Category::NoteEvent,
            0xA0..=0xE0 => Category::OtherChannelVoice,
            // Data byte in status position
            _ => Category::Other,
        },
    }
}
