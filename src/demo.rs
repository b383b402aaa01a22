//! Demo sequence playback
//!
//! Plays "Mary Had a Little Lamb" straight to the sound module, useful for
//! checking the output port without a keyboard attached.

use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::info;

use crate::config::DemoConfig;
use crate::midi::{NOTE_OFF, NOTE_ON};
use crate::router::OutputSink;

/// Sequence resolution
pub const TICKS_PER_QUARTER: u32 = 4;

/// Pause before and after playback so the first and last notes are not clipped
const LEAD: Duration = Duration::from_millis(200);

/// One timed message of the demo sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEvent {
    pub tick: u32,
    pub message: [u8; 3],
}

/// The demo melody on channel 1, ordered by tick
pub fn demo_sequence() -> Vec<SequenceEvent> {
    const CHANNEL: u8 = 0;
    const VELOCITY: u8 = 64;
    const NOTE: u8 = 61;

    // (note, start tick, length in ticks)
    let melody = [
        (NOTE, 0, 3),
        (NOTE - 2, 4, 3),
        (NOTE - 4, 8, 3),
        (NOTE - 2, 12, 3),
        (NOTE, 16, 3),
        (NOTE, 20, 3),
        (NOTE, 24, 7),
    ];

    melody
        .iter()
        .flat_map(|&(note, start, length)| {
            [
                SequenceEvent { tick: start, message: [NOTE_ON | CHANNEL, note, VELOCITY] },
                SequenceEvent { tick: start + length, message: [NOTE_OFF | CHANNEL, note, 0] },
            ]
        })
        .collect()
}

/// Duration of one tick at `tempo_bpm`
pub fn tick_duration(tempo_bpm: f32) -> Duration {
    Duration::from_secs_f64(60.0 / (tempo_bpm as f64 * TICKS_PER_QUARTER as f64))
}

/// Play the demo sequence `config.replay` times into `sink`
pub async fn play_demo<S: OutputSink>(sink: &mut S, config: &DemoConfig) {
    let sequence = demo_sequence();
    let tick = tick_duration(config.tempo_bpm);

    for round in 0..config.replay {
        info!("Starting demo sequence play: {}", round + 1);

        sleep(LEAD).await;
        let start = Instant::now();
        for event in &sequence {
            sleep_until(start + tick * event.tick).await;
            sink.send(&event.message, start.elapsed().as_micros() as u64);
        }
        sleep(LEAD).await;
    }
}
