//! Relay server example
//!
//! Run with: cargo run --example relay_server [CHANNEL:PORT]...
//!
//! Examples:
//!   cargo run --example relay_server                  # channel 1 on port 9000
//!   cargo run --example relay_server 1:9001 2:9002    # two channels
//!
//! ## Publishing (send stream)
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.mp4 -c copy -f mpegts -method POST http://localhost:9000/stream
//!
//! ## Playing (receive stream)
//!
//! With ffplay:
//!   ffplay http://localhost:9000/stream
//!
//! With VLC:
//!   vlc http://localhost:9000/stream.ts

use stream_relay::{ChannelId, RelayConfig, RelayEvent, RelayRegistry};

fn parse_channel(arg: &str) -> Result<(ChannelId, u16), String> {
    let (id, port) = arg
        .split_once(':')
        .ok_or_else(|| format!("Expected CHANNEL:PORT, got '{}'", arg))?;

    if id.is_empty() {
        return Err(format!("Missing channel id in '{}'", arg));
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| format!("Invalid port '{}'", port))?;

    Ok((ChannelId::new(id), port))
}

fn print_usage() {
    eprintln!("Usage: relay_server [CHANNEL:PORT]...");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  CHANNEL:PORT    Channel id and the port its relay listens on (default: 1:9000)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  relay_server                    # channel 1 on port 9000");
    eprintln!("  relay_server 1:9001 2:9002      # channels 1 and 2");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let channels = if args.is_empty() {
        vec![(ChannelId::new("1"), 9000)]
    } else {
        match args.iter().map(|a| parse_channel(a)).collect::<Result<Vec<_>, _>>() {
            Ok(channels) => channels,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stream_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let registry = RelayRegistry::new(RelayConfig::default());
    let mut events = registry.subscribe();

    for (channel_id, port) in channels {
        let started = registry.start_relay(channel_id, port).await?;
        println!("Channel {} ready", started.channel_id);
        println!("  push: curl --data-binary @- -H 'Transfer-Encoding: chunked' {}", started.stream_url);
        println!("  play: ffplay {}", started.stream_url);
    }
    println!();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RelayEvent::StreamStarted { channel_id }) => {
                    println!("[{}] Stream started", channel_id);
                }
                Ok(RelayEvent::StreamEnded { channel_id }) => {
                    println!("[{}] Stream ended", channel_id);
                }
                Ok(RelayEvent::StreamError { channel_id, error }) => {
                    println!("[{}] Stream error: {}", channel_id, error);
                }
                Ok(RelayEvent::ClientConnected { channel_id, consumer_count }) => {
                    println!("[{}] Viewer joined ({} watching)", channel_id, consumer_count);
                }
                Ok(RelayEvent::ClientDisconnected { channel_id, consumer_count }) => {
                    println!("[{}] Viewer left ({} watching)", channel_id, consumer_count);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed = missed, "Event listener lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    registry.stop_all_relays().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel() {
        assert_eq!(parse_channel("1:9000"), Ok((ChannelId::new("1"), 9000)));
        assert!(parse_channel("9000").is_err());
        assert!(parse_channel(":9000").is_err());
        assert!(parse_channel("1:notaport").is_err());
    }
}
