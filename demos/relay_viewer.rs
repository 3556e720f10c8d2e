//! MJPEG relay viewer example
//!
//! Run with: cargo run --example relay_viewer SERVER [STORAGE_ROOT]
//!
//! Connects to SERVER:8000 and reads recording commands from stdin, one per
//! line (`start`, `stop`, `true`, `false`, `recording_start`,
//! `recording_stop`). Segments land in STORAGE_ROOT/<server>/ (default
//! `Data/cam`). Use `--ffmpeg` to record MP4 through ffmpeg instead of Y4M.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use mjpeg_relay::control::{ControlEvent, RecordingCommand};
use mjpeg_relay::recorder::WriterKind;
use mjpeg_relay::{RecorderConfig, RecorderRegistry, SourceId, ViewerConfig, ViewerSupervisor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_ffmpeg = args.iter().any(|a| a == "--ffmpeg");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let Some(server) = positional.first().map(|s| s.to_string()) else {
        eprintln!("Usage: relay_viewer SERVER [STORAGE_ROOT] [--ffmpeg]");
        std::process::exit(1);
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_relay=info".parse()?)
                .add_directive("relay_viewer=info".parse()?),
        )
        .init();

    let mut recorder_config = match positional.get(1) {
        Some(root) => RecorderConfig::with_storage_root(PathBuf::from(root)),
        None => RecorderConfig::default(),
    };
    if use_ffmpeg {
        recorder_config = recorder_config.writer(WriterKind::ffmpeg());
    }

    let registry = Arc::new(RecorderRegistry::new(recorder_config));
    registry
        .observe_all(Arc::new(|recording: bool, source: &SourceId| {
            println!("[{}] recording: {}", source, recording);
        }))
        .await;

    let supervisor = ViewerSupervisor::new(ViewerConfig::default(), Arc::clone(&registry));
    let (events, rx) = mpsc::channel(16);
    let supervisor_task = tokio::spawn(supervisor.run(rx));

    events.send(ControlEvent::ServerDiscovered(server)).await?;
    println!("Type start/stop and press enter. Ctrl+C to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(command) = RecordingCommand::parse(&line) {
                        events.send(ControlEvent::Recording(command)).await?;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    // Closing the channel stops viewers and finalizes recordings
    drop(events);
    supervisor_task.await?;
    Ok(())
}
