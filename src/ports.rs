//! MIDI port discovery and connections
//!
//! Keyboard and sound module ports are chosen by case-insensitive substring
//! match against the configured device names. When nothing matches, the
//! first available port is used.

use anyhow::{anyhow, Result};
use colored::*;
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MidiConfig;
use crate::router::OutputSink;

/// Information about a MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub is_virtual: bool,
}

/// Message received from the keyboard port
#[derive(Debug, Clone)]
pub struct InputEvent {
    /// Microseconds, as reported by the platform backend
    pub timestamp: u64,
    pub bytes: Vec<u8>,
}

fn is_virtual(name: &str) -> bool {
    name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC") || name.contains("Through")
}

fn port_infos<T: MidiIO>(io: &T) -> Vec<PortInfo> {
    io.ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            io.port_name(port).ok().map(|name| PortInfo {
                index,
                is_virtual: is_virtual(&name),
                name,
            })
        })
        .collect()
}

/// Discover input ports
pub fn discover_input_ports(client_name: &str) -> Result<Vec<PortInfo>> {
    let midi_in = MidiInput::new(&format!("{}-Discovery", client_name))?;
    Ok(port_infos(&midi_in))
}

/// Discover output ports
pub fn discover_output_ports(client_name: &str) -> Result<Vec<PortInfo>> {
    let midi_out = MidiOutput::new(&format!("{}-Discovery", client_name))?;
    Ok(port_infos(&midi_out))
}

/// Pick a port by name preference, falling back to the first one
pub fn select_port<'a>(ports: &'a [PortInfo], preferred: &str) -> Option<&'a PortInfo> {
    if !preferred.is_empty() {
        let pattern = preferred.to_lowercase();
        if let Some(port) = ports.iter().find(|p| p.name.to_lowercase().contains(&pattern)) {
            return Some(port);
        }
        warn!("No MIDI port matches '{}', using first available", preferred);
    }
    ports.first()
}

fn find_port<T: MidiIO>(io: &T, preferred: &str) -> Option<(T::Port, String)> {
    let infos = port_infos(io);
    let selected = select_port(&infos, preferred)?;
    let port = io.ports().into_iter().nth(selected.index)?;
    debug!("Found port '{}' for preference '{}'", selected.name, preferred);
    Some((port, selected.name.clone()))
}

/// Open keyboard input, forwarding every message into `tx`
pub fn connect_input(config: &MidiConfig, tx: mpsc::Sender<InputEvent>) -> Result<KeyboardInput> {
    let midi_in = MidiInput::new(&format!("{}-In", config.client_name))?;

    let (port, port_name) = find_port(&midi_in, &config.input_device)
        .ok_or_else(|| anyhow!("No MIDI input ports found"))?;

    let connection = midi_in
        .connect(
            &port,
            &format!("{}-keyboard", config.client_name),
            move |timestamp, data, _| {
                let event = InputEvent {
                    timestamp,
                    bytes: data.to_vec(),
                };
                if let Err(e) = tx.try_send(event) {
                    warn!("Dropping keyboard message: {}", e);
                }
            },
            (),
        )
        .map_err(|e| anyhow!("Failed to open input port '{}': {}", port_name, e))?;

    info!("Keyboard input connected: '{}'", port_name);
    Ok(KeyboardInput {
        _connection: connection,
        port_name,
    })
}

/// Open sound module output
pub fn open_output(config: &MidiConfig) -> Result<MidiPortSink> {
    let midi_out = MidiOutput::new(&format!("{}-Out", config.client_name))?;

    let (port, port_name) = find_port(&midi_out, &config.output_device)
        .ok_or_else(|| anyhow!("No MIDI output ports found"))?;

    let connection = midi_out
        .connect(&port, &format!("{}-module", config.client_name))
        .map_err(|e| anyhow!("Failed to open output port '{}': {}", port_name, e))?;

    info!("Sound module output connected: '{}'", port_name);
    Ok(MidiPortSink {
        connection,
        port_name,
    })
}

/// Open keyboard connection; closes when dropped
pub struct KeyboardInput {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl KeyboardInput {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Sound module output port; closes when dropped
pub struct MidiPortSink {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidiPortSink {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl OutputSink for MidiPortSink {
    fn send(&mut self, message: &[u8], _timestamp: u64) {
        // midir sends immediately; the input timestamp is not replayed
        if let Err(e) = self.connection.send(message) {
            warn!("MIDI send to '{}' failed: {}", self.port_name, e);
        }
    }
}

/// List all ports in a formatted way
pub fn print_ports(client_name: &str) {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let sections = [
        ("Input Ports:", discover_input_ports(client_name)),
        ("Output Ports:", discover_output_ports(client_name)),
    ];

    for (title, ports) in sections {
        println!("\n{}", title.bold());
        match ports {
            Ok(ports) if ports.is_empty() => println!("  {}", "No ports found".dimmed()),
            Ok(ports) => {
                for port in ports {
                    let marker = if port.is_virtual {
                        "[VIRTUAL]".yellow()
                    } else {
                        "[PHYSICAL]".green()
                    };
                    println!("  {}: {} {}", port.index, marker, port.name);
                }
            }
            Err(e) => println!("  {}", format!("Port discovery failed: {}", e).red()),
        }
    }

    println!();
}
