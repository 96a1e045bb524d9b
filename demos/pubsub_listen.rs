//! Topic subscription demo.
//!
//! Demonstrates:
//! - Declaring topic subscriptions with callbacks
//! - Receiving published events
//! - Subscriptions surviving reconnects
//!
//! Usage:
//!   cargo run --example pubsub_listen -- wss://host/pubsub
//!   cargo run --example pubsub_listen -- wss://host/pubsub ticker/prices ticker/trades
//!   cargo run --example pubsub_listen -- --debug wss://host/pubsub

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::Args;
use relink::{EventCallback, Relay, Result, SocketEvent};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_TOPIC: &str = "demo/ticks";

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
    println!("=== Pubsub Listen ===\n");

    let Some(url) = args.rest.first().cloned() else {
        eprintln!("usage: pubsub_listen [--debug] <ws-url> [topic...]");
        std::process::exit(2);
    };
    let topics: Vec<String> = if args.rest.len() > 1 {
        args.rest[1..].to_vec()
    } else {
        vec![DEFAULT_TOPIC.to_string()]
    };

    // ========================================================================
    // Spawn Relay
    // ========================================================================

    println!("[1] Spawning relay...");
    println!("    Endpoint: {url}");

    let (relay, mut events) = Relay::builder()
        .url(url.as_str())
        .offline(args.offline)
        .spawn()?;
    println!("    ✓ Relay running\n");

    // ========================================================================
    // Subscribe
    // ========================================================================

    println!("[2] Subscribing to {} topic(s)...", topics.len());

    let seen = Arc::new(AtomicUsize::new(0));
    for topic in &topics {
        let counter = Arc::clone(&seen);
        let callback: EventCallback = Arc::new(move |topic, data| {
            counter.fetch_add(1, Ordering::Relaxed);
            println!("    ← {topic}: {data}");
        });
        relay.subscribe(topic.as_str(), callback).await?;
        println!("    ✓ {topic}");
    }

    // ========================================================================
    // Listen
    // ========================================================================

    println!("\n[3] Listening (Ctrl+C to exit)...\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            event = events.recv() => {
                match event {
                    Some(SocketEvent::Connected { key, .. }) => {
                        println!("    ✓ {key} connected");
                    }
                    Some(SocketEvent::Closed { key, reason, expected, .. }) => {
                        println!("    ✗ {key} closed ({reason}), reconnecting: {}", !expected);
                    }
                    Some(SocketEvent::Error(error)) => {
                        println!("    ✗ {error}");
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[4] Shutting down ({} event(s) seen)...", seen.load(Ordering::Relaxed));
    relay.shutdown();
    println!("    ✓ Done\n");

    Ok(())
}
