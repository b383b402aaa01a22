//! Tests for Router module

use super::*;
use crate::error::EncodeError;
use crate::preset::PresetMap;
use proptest::prelude::*;

#[derive(Debug, Default)]
struct RecordingSink {
    sent: Vec<(Vec<u8>, u64)>,
}

impl OutputSink for RecordingSink {
    fn send(&mut self, message: &[u8], timestamp: u64) {
        self.sent.push((message.to_vec(), timestamp));
    }
}

impl RecordingSink {
    fn messages(&self) -> Vec<Vec<u8>> {
        self.sent.iter().map(|(m, _)| m.clone()).collect()
    }
}

/// Preset on input channel 13 with the given output channels, module 0
fn make_test_preset(channels: &[u8]) -> Arc<PresetMap> {
    let mut builder = PresetMap::builder(0, 13);
    for &ch in channels {
        builder = builder.layer(0, ch).unwrap();
    }
    Arc::new(builder.build().unwrap())
}

fn make_router(channels: &[u8]) -> ChannelRouter<RecordingSink> {
    ChannelRouter::new(make_test_preset(channels), RecordingSink::default())
}

#[test]
fn test_note_on_three_layers() {
    let mut router = make_router(&[13, 14, 15]);

    let routed = router.route(&[0x90, 60, 100], 1234);
    assert_eq!(routed, Routed::Layered { voices: 3 });

    assert_eq!(
        router.sink().messages(),
        vec![vec![0x9C, 64, 100], vec![0x9D, 60, 100], vec![0x9E, 60, 100]]
    );
    assert!(router.sink().sent.iter().all(|(_, ts)| *ts == 1234));
}

#[test]
fn test_note_off_uses_same_layers() {
    let mut router = make_router(&[13, 14, 15]);

    router.route(&[0x80, 60, 0], 0);
    assert_eq!(
        router.sink().messages(),
        vec![vec![0x8C, 64, 0], vec![0x8D, 60, 0], vec![0x8E, 60, 0]]
    );
}

#[test]
fn test_note_on_velocity_zero_is_layered() {
    let mut router = make_router(&[1, 2]);

    assert_eq!(router.route(&[0x90, 60, 0], 0), Routed::Layered { voices: 2 });
    assert_eq!(router.sink().messages(), vec![vec![0x90, 64, 0], vec![0x91, 60, 0]]);
}

#[test]
fn test_incoming_channel_is_replaced() {
    let mut router = make_router(&[2]);

    router.route(&[0x9F, 60, 90], 0);
    assert_eq!(router.sink().messages(), vec![vec![0x91, 64, 90]]);
}

#[test]
fn test_invalid_slot_aborts_remaining_layers() {
    let mut router = make_router(&[13, 17, 15]);

    let routed = router.route(&[0x90, 60, 100], 0);
    assert_eq!(
        routed,
        Routed::Aborted {
            voices: 1,
            reason: RouteError::InvalidLayerChannel { slot: 1, channel: 17 },
        }
    );
    assert_eq!(router.sink().messages(), vec![vec![0x9C, 64, 100]]);
}

#[test]
fn test_invalid_origin_slot_emits_nothing() {
    let mut router = make_router(&[20, 2]);

    let routed = router.route(&[0x90, 60, 100], 0);
    assert_eq!(routed.sent(), 0);
    assert_eq!(routed.error(), Some(RouteError::InvalidLayerChannel { slot: 0, channel: 20 }));
    assert!(router.sink().sent.is_empty());
}

#[test]
fn test_terminator_stops_scan() {
    let mut router = make_router(&[13, 14, 0, 15]);

    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 2 });
    assert_eq!(router.sink().messages(), vec![vec![0x9C, 64, 100], vec![0x9D, 60, 100]]);
}

#[test]
fn test_muted_origin_still_plays_other_layers() {
    let mut router = make_router(&[0, 5, 6]);

    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 2 });
    assert_eq!(router.sink().messages(), vec![vec![0x94, 60, 100], vec![0x95, 60, 100]]);
}

#[test]
fn test_empty_preset_emits_nothing() {
    let mut router = make_router(&[]);

    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 0 });
    assert!(router.sink().sent.is_empty());
}

#[test]
fn test_full_table_emits_ten_voices() {
    let channels: Vec<u8> = (1..=10).collect();
    let mut router = make_router(&channels);

    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 10 });
    let sent = router.sink().messages();
    assert_eq!(sent[0], vec![0x90, 64, 100]);
    assert_eq!(sent[9], vec![0x99, 60, 100]);
}

#[test]
fn test_duplicate_channels_are_each_sent() {
    let mut router = make_router(&[3, 3, 3]);

    router.route(&[0x90, 60, 100], 0);
    assert_eq!(
        router.sink().messages(),
        vec![vec![0x92, 64, 100], vec![0x92, 60, 100], vec![0x92, 60, 100]]
    );
}

#[test]
fn test_origin_offset_overflow_aborts() {
    let mut router = make_router(&[1, 2]);

    let routed = router.route(&[0x90, 125, 100], 0);
    assert_eq!(
        routed,
        Routed::Aborted {
            voices: 0,
            reason: RouteError::EventEncoding(EncodeError::Data { field: "note", value: 129 }),
        }
    );
    assert!(router.sink().sent.is_empty());
}

#[test]
fn test_invalid_velocity_aborts_on_origin_layer() {
    let mut router = make_router(&[1, 2, 3]);

    // Velocity is not a valid data byte, so the origin layer fails first
    let routed = router.route(&[0x90, 60, 0x80], 0);
    assert_eq!(
        routed,
        Routed::Aborted {
            voices: 0,
            reason: RouteError::EventEncoding(EncodeError::Data { field: "velocity", value: 0x80 }),
        }
    );
    assert!(router.sink().sent.is_empty());
}

#[test]
fn test_invalid_velocity_aborts_after_muted_origin() {
    let mut router = make_router(&[0, 2, 3]);

    // Origin is skipped, the scan fails on the first assigned layer
    let routed = router.route(&[0x90, 60, 0x80], 0);
    assert_eq!(
        routed,
        Routed::Aborted {
            voices: 0,
            reason: RouteError::EventEncoding(EncodeError::Data { field: "velocity", value: 0x80 }),
        }
    );
    assert!(router.sink().sent.is_empty());

    // The same layers still play a valid note
    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 2 });
    assert_eq!(router.sink().messages(), vec![vec![0x91, 60, 100], vec![0x92, 60, 100]]);
}

#[test]
fn test_control_change_passthrough() {
    let mut router = make_router(&[13, 14, 15]);

    for message in [[0xB0u8, 7, 100], [0xB5, 64, 127], [0xE3, 0x00, 0x40], [0xA1, 60, 20]] {
        assert_eq!(router.route(&message, 0), Routed::Forwarded);
    }
    router.route(&[0xC2, 5], 0);
    router.route(&[0xD4, 33], 0);

    assert_eq!(
        router.sink().messages(),
        vec![
            vec![0xB0, 7, 100],
            vec![0xB5, 64, 127],
            vec![0xE3, 0x00, 0x40],
            vec![0xA1, 60, 20],
            vec![0xC2, 5],
            vec![0xD4, 33],
        ]
    );
}

#[test]
fn test_realtime_and_system_passthrough() {
    let mut router = make_router(&[1]);

    for message in [vec![0xF8u8], vec![0xFE], vec![0xFA], vec![0xF2, 1, 2], vec![0xFF]] {
        assert_eq!(router.route(&message, 0), Routed::Forwarded);
    }
    assert_eq!(router.sink().sent.len(), 5);
    assert_eq!(router.state(), RouterState::Normal);
}

#[test]
fn test_sysex_passthrough_mode() {
    let mut router = make_router(&[13, 14, 15]);

    assert_eq!(router.route(&[0xF0, 0x43, 0x10], 0), Routed::Forwarded);
    assert_eq!(router.state(), RouterState::InSystemExclusive);

    // Note events are not layered while inside SysEx
    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Forwarded);
    assert_eq!(router.route(&[0x4C, 0x00], 0), Routed::Forwarded);
    assert_eq!(router.state(), RouterState::InSystemExclusive);

    assert_eq!(router.route(&[0xF7], 0), Routed::Forwarded);
    assert_eq!(router.state(), RouterState::Normal);

    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 3 });
    assert_eq!(
        router.sink().messages(),
        vec![
            vec![0xF0, 0x43, 0x10],
            vec![0x90, 60, 100],
            vec![0x4C, 0x00],
            vec![0xF7],
            vec![0x9C, 64, 100],
            vec![0x9D, 60, 100],
            vec![0x9E, 60, 100],
        ]
    );
}

#[test]
fn test_complete_sysex_message_stays_normal() {
    let mut router = make_router(&[1]);

    assert_eq!(router.route(&[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7], 0), Routed::Forwarded);
    assert_eq!(router.state(), RouterState::Normal);
}

#[test]
fn test_empty_message_forwarded_during_sysex() {
    let mut router = make_router(&[1]);

    router.route(&[0xF0, 0x41, 0x10], 0);
    assert_eq!(router.route(&[], 7), Routed::Forwarded);
    assert_eq!(router.state(), RouterState::InSystemExclusive);

    router.route(&[0xF7], 8);
    assert_eq!(router.route(&[], 9), Routed::Dropped(RouteError::MalformedEvent { len: 0 }));

    assert_eq!(
        router.sink().sent,
        vec![(vec![0xF0, 0x41, 0x10], 0), (vec![], 7), (vec![0xF7], 8)]
    );
}

#[test]
fn test_malformed_note_is_dropped() {
    let mut router = make_router(&[13, 14, 15]);

    assert_eq!(
        router.route(&[0x90, 60], 0),
        Routed::Dropped(RouteError::MalformedEvent { len: 2 })
    );
    assert_eq!(
        router.route(&[0x90, 60, 100, 61, 100], 0),
        Routed::Dropped(RouteError::MalformedEvent { len: 5 })
    );
    assert_eq!(router.route(&[], 0), Routed::Dropped(RouteError::MalformedEvent { len: 0 }));
    assert!(router.sink().sent.is_empty());
}

#[test]
fn test_preset_swap_between_events() {
    let mut router = make_router(&[1]);

    router.route(&[0x90, 60, 100], 0);
    let previous = router.set_preset(make_test_preset(&[5, 6]));
    assert_eq!(previous.active_layers().count(), 1);
    router.route(&[0x90, 60, 100], 0);

    assert_eq!(
        router.sink().messages(),
        vec![vec![0x90, 64, 100], vec![0x94, 64, 100], vec![0x95, 60, 100]]
    );
}

#[test]
fn test_router_with_wire_table() {
    let mut wire = [0u8; crate::preset::WIRE_LEN];
    wire[1] = 13;
    wire[2..8].copy_from_slice(&[0, 13, 0, 17, 0, 15]);
    let preset = Arc::new(PresetMap::from_wire(&wire).unwrap());

    let mut router = ChannelRouter::new(preset, RecordingSink::default());
    let routed = router.route(&[0x90, 60, 100], 0);

    assert_eq!(routed.sent(), 1);
    assert_eq!(router.into_sink().messages(), vec![vec![0x9C, 64, 100]]);
}

#[test]
fn test_boxed_sink() {
    let sink: Box<dyn OutputSink> = Box::new(RecordingSink::default());
    let mut router = ChannelRouter::new(make_test_preset(&[1]), sink);

    assert_eq!(router.route(&[0x90, 60, 100], 0), Routed::Layered { voices: 1 });
}

proptest! {
    #[test]
    fn prop_routing_is_idempotent(
        channels in proptest::collection::vec(0u8..=20, 0..=10),
        status in 0x80u8..=0xEF,
        data1 in 0u8..=127,
        data2 in 0u8..=127,
    ) {
        let preset = make_test_preset(&channels);
        let message = [status, data1, data2];

        let mut first = ChannelRouter::new(preset.clone(), RecordingSink::default());
        let mut second = ChannelRouter::new(preset, RecordingSink::default());

        let a = first.route(&message, 7);
        let b = second.route(&message, 7);
        let c = first.route(&message, 7);

        prop_assert_eq!(a, b);
        prop_assert_eq!(a, c);
        prop_assert_eq!(second.sink().messages(), first.sink().messages()[..a.sent()].to_vec());
        prop_assert_eq!(first.sink().sent.len(), a.sent() * 2);
    }

    #[test]
    fn prop_layered_voices_never_exceed_capacity(
        channels in proptest::collection::vec(0u8..=16, 0..=10),
        note in 0u8..=123,
    ) {
        let mut router = ChannelRouter::new(make_test_preset(&channels), RecordingSink::default());
        let routed = router.route(&[0x90, note, 100], 0);

        prop_assert!(routed.sent() <= LAYER_CAPACITY);
        prop_assert!(routed.error().is_none());
    }
}
