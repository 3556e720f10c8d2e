//! MJPEG relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR] [CAPTURE COMMAND...]
//!
//! Examples:
//!   cargo run --example relay_server                         # 0.0.0.0:8000, libcamera-vid
//!   cargo run --example relay_server 127.0.0.1:8001
//!   cargo run --example relay_server 0.0.0.0:8000 ffmpeg -f v4l2 -i /dev/video0 -f mjpeg -
//!
//! Then point a viewer at it:
//!   cargo run --example relay_viewer <server-ip>

use std::net::{SocketAddr, ToSocketAddrs};

use mjpeg_relay::capture::CaptureConfig;
use mjpeg_relay::control::reachable_ip;
use mjpeg_relay::{RelayServer, ServerConfig};

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR] [CAPTURE COMMAND...]");
    eprintln!();
    eprintln!("BIND_ADDR defaults to 0.0.0.0:8000. The capture command must write");
    eprintln!("an MJPEG elementary stream to stdout.");
}

fn parse_bind_addr(s: &str) -> Result<SocketAddr, String> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let with_port = if s.contains(':') { s.to_string() } else { format!("{}:8000", s) };
    with_port
        .to_socket_addrs()
        .map_err(|e| format!("Invalid bind address '{}': {}", s, e))?
        .next()
        .ok_or_else(|| format!("No address found for '{}'", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_relay=info".parse()?)
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Some(addr) = args.get(1) {
        match parse_bind_addr(addr) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                print_usage();
                std::process::exit(1);
            }
        }
    }
    if args.len() > 2 {
        config = config.capture(CaptureConfig::new(&args[2]).args(&args[3..]));
    }

    // What a discovery responder would announce
    let announce = reachable_ip("8.8.8.8:80".parse()?).await;
    println!("Relay listening on {} (announce as {})", config.bind_addr, announce);
    println!("Capture: {}", config.capture.command_line());

    let server = RelayServer::new(config);
    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    let stats = server.stats();
    println!(
        "Stats: connections={} published={} sent={} bytes={} uptime={:?}",
        stats.total_connections,
        stats.frames_published,
        stats.frames_sent,
        stats.bytes_sent,
        stats.uptime
    );

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
