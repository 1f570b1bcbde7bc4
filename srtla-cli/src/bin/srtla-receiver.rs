//! SRTLA Receiver - Multi-path stream receiver
//!
//! Accepts one SRT stream bonded across several client UDP uplinks and
//! forwards it to a downstream SRT server, relaying the server's feedback
//! back over every surviving uplink.

use anyhow::Context;
use clap::Parser;
use srtla_cli::config::{ReceiverConfig, DEFAULT_SRTLA_PORT, DEFAULT_SRT_HOST};
use srtla_relay::{resolve_downstream, SrtlaReceiver};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "srtla-receiver")]
#[command(about = "SRTLA link-aggregation receiver", long_about = None)]
struct Args {
    /// TOML configuration file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SRTLA listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Downstream SRT server host
    #[arg(long)]
    srt_host: Option<String>,

    /// Downstream SRT server port
    #[arg(long, required_unless_present = "config")]
    srt_port: Option<u16>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file = args
        .config
        .as_ref()
        .map(ReceiverConfig::from_file)
        .transpose()
        .context("failed to load configuration file")?;

    let srtla_port = args
        .port
        .or(file.as_ref().map(|c| c.srtla_port))
        .unwrap_or(DEFAULT_SRTLA_PORT);
    let srt_host = args
        .srt_host
        .clone()
        .or(file.as_ref().map(|c| c.srt_host.clone()))
        .unwrap_or_else(|| DEFAULT_SRT_HOST.to_string());
    let srt_port = args
        .srt_port
        .or(file.as_ref().map(|c| c.srt_port))
        .context("--srt-port or a configuration file is required")?;
    let verbose = args.verbose || file.as_ref().is_some_and(|c| c.verbose);

    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    tracing::info!("SRTLA receiver starting...");

    let srt_addr = resolve_downstream(&srt_host, srt_port)
        .with_context(|| format!("could not resolve downstream SRT server {srt_host}:{srt_port}"))?;
    tracing::info!("Downstream SRT server {}", srt_addr);

    // Dual-stack listen: IPv4 and IPv6 uplinks on the same port
    let listen = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), srtla_port);
    let receiver = SrtlaReceiver::bind(listen, srt_addr)
        .with_context(|| format!("failed to listen on UDP port {srtla_port}"))?;
    tracing::info!("Listening on {}", receiver.local_addr()?);

    receiver.spawn_janitor();
    receiver.run();

    Ok(())
}
