//! AMIDIFX gateway
//!
//! Layers a musical keyboard onto sound module channels according to the
//! active preset.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amidifx_gw::config::{AppConfig, ConfigWatcher, ReloadTrigger};
use amidifx_gw::ports::{self, InputEvent};
use amidifx_gw::{demo, monitor, ChannelRouter, PresetBank, PresetMap, Routed};

/// AMIDIFX Gateway - keyboard to sound module layering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Override the active preset index from the configuration
    #[arg(short, long)]
    preset: Option<u8>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print decoded keyboard messages instead of routing them
    #[arg(long)]
    monitor: bool,

    /// Play the demo sequence on the sound module and exit
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting AMIDIFX gateway...");

    if args.list_ports {
        ports::print_ports("AMIDIFX-GW");
        return Ok(());
    }

    info!("Configuration file: {}", args.config);
    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    let config = (*initial_config).clone();

    if args.monitor {
        return monitor::run_monitor(&config.midi).await;
    }

    if args.demo {
        let mut output = ports::open_output(&config.midi)?;
        demo::play_demo(&mut output, &config.demo).await;
        info!("Demo sequence finished");
        return Ok(());
    }

    run_app(&args, config, config_watcher).await?;

    info!("AMIDIFX gateway shutdown complete");
    Ok(())
}

async fn run_app(args: &Args, config: AppConfig, mut config_watcher: ConfigWatcher) -> Result<()> {
    let config_path = Path::new(&args.config);

    let preset = match load_active_preset(&config, config_path, args.preset).await {
        Ok(preset) => preset,
        Err(e) => {
            warn!("No active preset ({:#}), keyboard is muted until a preset loads", e);
            Arc::new(PresetMap::muted(
                args.preset.unwrap_or(config.presets.active),
                config.presets.channel,
            ))
        }
    };
    describe_preset(&config, &preset);

    let output = ports::open_output(&config.midi)?;
    let mut router = ChannelRouter::new(preset, output);

    let (event_tx, mut event_rx) = mpsc::channel::<InputEvent>(1000);
    let input = ports::connect_input(&config.midi, event_tx)?;

    info!(
        "Play on your musical keyboard ('{}' -> '{}')",
        input.port_name(),
        router.sink().port_name()
    );

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match router.route(&event.bytes, event.timestamp) {
                    Routed::Forwarded | Routed::Layered { .. } => {}
                    routed => debug!("Routing fault: {:?}", routed),
                }
            }

            // Preset changes happen here, between two routed events
            Some(reload) = config_watcher.next_reload() => {
                match reload.trigger {
                    ReloadTrigger::Config => info!("Configuration file changed, reloading preset..."),
                    ReloadTrigger::Bank => info!("Preset bank changed, reloading preset..."),
                }

                match load_active_preset(&reload.config, config_path, args.preset).await {
                    Ok(preset) => {
                        describe_preset(&reload.config, &preset);
                        router.set_preset(preset);
                    }
                    Err(e) => {
                        warn!("Failed to load preset (keeping current preset): {:#}", e);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    drop(input);
    Ok(())
}

/// Load the bank and pick the configured preset
async fn load_active_preset(config: &AppConfig, config_path: &Path, preset_override: Option<u8>) -> Result<Arc<PresetMap>> {
    let path = config.presets_path(config_path);
    let bank = PresetBank::load(&path, config.presets.descriptor_syntax).await?;

    let index = preset_override.unwrap_or(config.presets.active);
    let channel = config.presets.channel;

    info!(
        "Loaded {} presets from {} ({} rejected)",
        bank.len(),
        path.display(),
        bank.rejected().len()
    );

    bank.get(index, channel)
        .with_context(|| format!("Preset {} for channel {} not found in {}", index, channel, path.display()))
}

fn describe_preset(config: &AppConfig, preset: &PresetMap) {
    let module = match config.sound_module(preset.default_module_index()) {
        Some(module) => module.describe(),
        None => format!("unknown module {}", preset.default_module_index()),
    };

    let layers: Vec<String> = preset
        .active_layers()
        .map(|slot| slot.output_channel.to_string())
        .collect();

    info!(
        "Preset {} '{}' on ch:{} -> {} [{}]",
        preset.preset_index(),
        preset.name().unwrap_or("unnamed"),
        preset.input_channel(),
        module,
        layers.join(", ")
    );
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
