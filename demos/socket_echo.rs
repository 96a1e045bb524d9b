//! Duplex connection echo demo.
//!
//! Demonstrates:
//! - Spawning a relay and opening a named connection
//! - Sending messages and receiving events
//! - Offline mode for running without a server
//!
//! Usage:
//!   cargo run --example socket_echo                  (offline simulation)
//!   cargo run --example socket_echo -- ws://127.0.0.1:9001
//!   cargo run --example socket_echo -- --debug ws://127.0.0.1:9001

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use relink::{Relay, Result, SocketEvent};

// ============================================================================
// Constants
// ============================================================================

const OFFLINE_URL: &str = "wss://offline.invalid/echo";
const MESSAGES: &[&str] = &["one", "two", "three"];

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Socket Echo ===\n");

    // Without a server argument, fall back to the simulated transport.
    let offline = args.offline || args.rest.is_empty();
    let url = args.rest.first().map_or(OFFLINE_URL, String::as_str);

    // ========================================================================
    // Spawn Relay
    // ========================================================================

    println!("[1] Spawning relay...");
    println!("    Endpoint: {url}");
    println!("    Offline:  {offline}");

    let (relay, mut events) = Relay::builder().url(url).offline(offline).spawn()?;
    println!("    ✓ Relay running\n");

    // ========================================================================
    // Open Connection
    // ========================================================================

    println!("[2] Opening connection `echo`...");
    relay.open("echo", url).await?;

    while let Some(event) = events.recv().await {
        if let SocketEvent::Connected { key, .. } = &event {
            println!("    ✓ {key} connected");
            if key.as_str() == "echo" {
                break;
            }
        }
    }
    println!();

    // ========================================================================
    // Send and Receive
    // ========================================================================

    println!("[3] Sending {} messages...", MESSAGES.len());
    for message in MESSAGES {
        relay.send("echo", *message).await?;
        println!("    → {message}");
    }

    let mut received = 0usize;
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Message { key, message } => {
                println!("    ← {key}: {message}");
                received += 1;
                if received == MESSAGES.len() {
                    break;
                }
            }
            SocketEvent::Closed {
                key,
                reason,
                expected,
                ..
            } => {
                println!("    ✗ {key} closed ({reason}, expected: {expected})");
            }
            SocketEvent::Error(error) => {
                println!("    ✗ error: {error}");
            }
            _ => {}
        }
    }
    println!("    ✓ {received} messages echoed back\n");

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("[4] Closing...");
    relay.close("echo").await?;
    relay.shutdown();
    println!("    ✓ Done\n");

    Ok(())
}
