//! MIDI monitor for checking keyboard input
//!
//! Prints every incoming message as hex plus its decoded form. Timing clock
//! and active sensing are hidden; System Exclusive data is shown raw until
//! its end marker.

use anyhow::Result;
use colored::*;
use std::fmt;
use tokio::sync::mpsc;

use crate::config::MidiConfig;
use crate::midi::{classify, format_hex, Category, MidiMessage};
use crate::ports;

/// Color group of a monitor line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    NoteOn,
    NoteOff,
    Control,
    SysEx,
    System,
    Unknown,
}

/// One formatted monitor line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorLine {
    pub timestamp_ms: u64,
    pub hex: String,
    pub parsed: Option<String>,
    pub kind: LineKind,
}

impl fmt::Display for MonitorLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:08}ms] {}", self.timestamp_ms, self.hex)?;
        if let Some(parsed) = &self.parsed {
            write!(f, " => {}", parsed)?;
        }
        Ok(())
    }
}

impl MonitorLine {
    fn print(&self) {
        let hex = match self.kind {
            LineKind::NoteOn => self.hex.bright_green(),
            LineKind::NoteOff => self.hex.bright_red(),
            LineKind::Control => self.hex.bright_yellow(),
            LineKind::SysEx => self.hex.bright_magenta(),
            LineKind::System => self.hex.normal(),
            LineKind::Unknown => self.hex.bright_black(),
        };
        let parsed = self
            .parsed
            .as_ref()
            .map(|p| format!(" => {}", p.bright_blue()))
            .unwrap_or_default();

        println!("[{}ms] {}{}", format!("{:08}", self.timestamp_ms).dimmed(), hex, parsed);
    }
}

/// Decodes a message stream for display
#[derive(Debug, Default)]
pub struct Monitor {
    in_sysex: bool,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe one message; `None` for messages that are not shown
    pub fn observe(&mut self, timestamp_us: u64, data: &[u8]) -> Option<MonitorLine> {
        let timestamp_ms = timestamp_us / 1000;
        let status = *data.first()?;

        if self.in_sysex {
            if status == 0xF7 || data.last() == Some(&0xF7) {
                self.in_sysex = false;
            }
            return Some(MonitorLine {
                timestamp_ms,
                hex: format_hex(data),
                parsed: None,
                kind: LineKind::SysEx,
            });
        }

        let category = classify(status);
        if category == Category::RealtimeTiming {
            return None;
        }
        if category == Category::SystemExclusiveStart && data.last() != Some(&0xF7) {
            self.in_sysex = true;
        }

        let message = MidiMessage::parse(data);
        let kind = match (&message, category) {
            (Some(MidiMessage::NoteOn { .. }), _) => LineKind::NoteOn,
            (Some(MidiMessage::NoteOff { .. }), _) => LineKind::NoteOff,
            (Some(_), Category::OtherChannelVoice) => LineKind::Control,
            (Some(_), Category::SystemExclusiveStart | Category::SystemExclusiveEnd) => LineKind::SysEx,
            (Some(_), _) => LineKind::System,
            (None, _) => LineKind::Unknown,
        };

        Some(MonitorLine {
            timestamp_ms,
            hex: format_hex(data),
            parsed: message.map(|m| m.to_string()),
            kind,
        })
    }
}

/// Connect the keyboard port and print its traffic until Ctrl+C
pub async fn run_monitor(config: &MidiConfig) -> Result<()> {
    println!("{}", "=== MIDI Monitor ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (tx, mut rx) = mpsc::channel(1000);
    let input = ports::connect_input(config, tx)?;

    println!("{} {}", "Monitoring".green(), input.port_name().bright_white());
    println!("{}", "Format: [timestamp] HEX => PARSED".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());

    let mut monitor = Monitor::new();
    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                if let Some(line) = monitor.observe(event.timestamp, &event.bytes) {
                    line.print();
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{}", "Monitor stopped".yellow());
    Ok(())
}
