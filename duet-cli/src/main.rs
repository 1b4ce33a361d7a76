use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Select;
use duet_client::analytics::JsonFileRecordStore;
use duet_client::media::SyntheticMediaBackend;
use duet_client::{AlertSeverity, CallConfig, CallDeps, CallHandle, CallSession, SessionEvent};
use duet_core::{ConnectionStatus, MediaDeviceInfo, OverallStatus, RoomId};
use duet_server::ServerConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duet", version, about = "Two-party audio/video calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the rendezvous server.
    Serve {
        #[arg(long, env = "DUET_BIND")]
        bind: Option<SocketAddr>,

        /// Enables `/api/ice-servers` behind this key.
        #[arg(long, env = "DUET_API_KEY")]
        api_key: Option<String>,

        /// JSON server configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Joins a room as a headless participant with synthetic media.
    Call {
        room: String,

        /// Base websocket URL of the rendezvous server.
        #[arg(long, env = "DUET_SIGNALING_URL")]
        server: Option<String>,

        /// JSON call configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Choose camera and microphone interactively before joining.
        #[arg(long)]
        pick_devices: bool,

        /// Directory receiving the call record when the call ends.
        #[arg(long)]
        record_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            api_key,
            config,
        } => serve(bind, api_key, config).await,
        Commands::Call {
            room,
            server,
            config,
            pick_devices,
            record_dir,
        } => call(room, server, config, pick_devices, record_dir).await,
    }
}

async fn serve(
    bind: Option<SocketAddr>,
    api_key: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => ServerConfig::from_json_file(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if api_key.is_some() {
        config.api_key = api_key;
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    println!(
        "{} {}",
        "Rendezvous server on".green().bold(),
        format!("ws://{}/ws/<peer-id>", config.bind).cyan()
    );
    duet_server::serve(listener, config).await
}

async fn call(
    room: String,
    server: Option<String>,
    config: Option<PathBuf>,
    pick_devices: bool,
    record_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => CallConfig::from_json_file(&path)?,
        None => CallConfig::default(),
    };
    if let Some(server) = server {
        config.signaling_url = server;
    }

    let mut deps = CallDeps::webrtc(Arc::new(SyntheticMediaBackend::with_default_devices()));
    if let Some(dir) = record_dir {
        deps = deps.with_record_store(Arc::new(JsonFileRecordStore::new(dir)));
    }

    println!("{} {}", "Joining room".green().bold(), room.cyan());
    let (handle, mut events) = CallSession::start(config, RoomId::new(room), deps)
        .await
        .context("Could not start the call")?;
    println!("   peer id: {}", handle.local_peer());

    if pick_devices && let Err(e) = pick(&handle).await {
        eprintln!("{} {:#}", "Device selection failed:".yellow(), e);
    }

    let mut status = handle.watch_status();
    let mut status_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Hanging up...".yellow());
                handle.end().await;
            }
            changed = status.changed(), if status_open => {
                if changed.is_err() {
                    status_open = false;
                    continue;
                }
                let current = *status.borrow_and_update();
                print_status(&current);
            }
            event = events.recv() => match event {
                Some(SessionEvent::Ended(reason)) => {
                    println!("{} {:?}", "Call ended:".bold(), reason);
                    break;
                }
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    Ok(())
}

/// Lets the user choose camera and microphone from the enumerated devices.
async fn pick(handle: &CallHandle) -> Result<()> {
    let devices = handle.enumerate_devices().await?;

    if let Some(id) = choose("Camera", devices.video_inputs).await? {
        handle.replace_video_device(id).await?;
    }
    if let Some(id) = choose("Microphone", devices.audio_inputs).await? {
        handle.replace_audio_device(id).await?;
    }
    Ok(())
}

async fn choose(prompt: &'static str, devices: Vec<MediaDeviceInfo>) -> Result<Option<String>> {
    if devices.len() < 2 {
        return Ok(None);
    }
    tokio::task::spawn_blocking(move || -> Result<Option<String>> {
        let labels: Vec<String> = devices
            .iter()
            .map(|d| {
                if d.label.is_empty() {
                    d.device_id.clone()
                } else {
                    format!("{} ({})", d.label, d.device_id)
                }
            })
            .collect();
        let index = Select::new()
            .with_prompt(prompt)
            .items(labels.as_slice())
            .default(0)
            .interact()?;
        Ok(Some(devices[index].device_id.clone()))
    })
    .await?
}

fn print_status(status: &ConnectionStatus) {
    let headline = match status.overall {
        OverallStatus::Idle => "idle".normal(),
        OverallStatus::WaitingForPeer => "waiting for the other participant".cyan(),
        OverallStatus::Connecting => "connecting".yellow(),
        OverallStatus::Connected => "connected".green().bold(),
        OverallStatus::Reconnecting => "reconnecting".yellow().bold(),
        OverallStatus::Ended => "ended".dimmed(),
    };
    println!(
        "[status] {} (signaling {:?}, peer {:?}, ice {:?}, remote media {})",
        headline,
        status.signaling_channel,
        status.peer,
        status.ice,
        if status.remote_media { "yes" } else { "no" }
    );
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::RemoteStream(stream) => println!(
            "{} {} ({} tracks)",
            "Remote media:".green(),
            stream.stream_id,
            stream.tracks.len()
        ),
        SessionEvent::Alert(alert) => {
            let tag = match alert.severity {
                AlertSeverity::Info => "info".blue(),
                AlertSeverity::Warning => "warning".yellow(),
                AlertSeverity::Fatal => "error".red().bold(),
            };
            println!("[{}] {}", tag, alert.message);
        }
        SessionEvent::Emotion(emotion) => println!(
            "[emotion] {:?}: {} ({:.0}%)",
            emotion.source,
            emotion.emotion,
            emotion.confidence * 100.0
        ),
        SessionEvent::Ended(reason) => println!("Call ended: {:?}", reason),
    }
}
