//! Fibermesh demo node
//!
//! Starts a single fiber, registers one entity, and prints every status
//! event and delivered envelope.
//!
//! ## Usage
//!
//! ```bash
//! # Terminal 1
//! fibermesh-node --publish-address 127.0.0.1:7001 \
//!     --peer 127.0.0.1:7001 --peer 127.0.0.1:7002 \
//!     --entity task-board --monitor
//!
//! # Terminal 2: send a greeting to the entity on node 1
//! fibermesh-node --publish-address 127.0.0.1:7002 \
//!     --peer 127.0.0.1:7001 --peer 127.0.0.1:7002 \
//!     --entity reporter --monitor \
//!     --send-to task-board --send-body '{"foo": "foo"}'
//! ```

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use fibermesh_core::{FiberConfig, PeerAddr, PubSubFiber, SendOptions};

/// Fibermesh - address-routed pub/sub messaging fibers
#[derive(Parser)]
#[command(name = "fibermesh-node")]
#[command(version = "0.1.0")]
#[command(about = "Run a fibermesh node")]
struct Cli {
    /// Address to bind the publish endpoint on
    #[arg(long)]
    publish_address: String,

    /// Peer address list, own publish address included (repeatable)
    #[arg(long = "peer", required = true)]
    peers: Vec<String>,

    /// Seconds between peer-list refreshes
    #[arg(long, default_value_t = 5)]
    refresh_secs: u64,

    /// Confirm peer connections and report them as status events
    #[arg(long)]
    monitor: bool,

    /// Entity name to register on this node
    #[arg(long, default_value = "echo")]
    entity: String,

    /// Send one envelope to this entity after starting
    #[arg(long)]
    send_to: Option<String>,

    /// JSON body for --send-to
    #[arg(long, default_value = "{}")]
    send_body: String,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fibermesh={0},fibermesh_core={0}", default_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let peers: Vec<PeerAddr> = cli.peers.iter().map(PeerAddr::new).collect();
    let refresh_peers = peers.clone();
    let config = FiberConfig::builder()
        .publish_address(cli.publish_address.as_str())
        .addresses(peers)
        .refresh_addresses(move || {
            let peers = refresh_peers.clone();
            Box::pin(async move { Ok(peers) })
        })
        .refresh_interval(Duration::from_secs(cli.refresh_secs))
        .scheduler(tokio::runtime::Handle::current())
        .monitor_connections(cli.monitor)
        .build()?;

    let fiber = PubSubFiber::new(config);
    let mut inbox = fiber.register_entity(cli.entity.as_str());
    let mut status = fiber.status_channel();

    fiber.start().await?;
    println!("{} up, entity '{}' registered", fiber, cli.entity);

    if let Some(to) = &cli.send_to {
        let body: serde_json::Value = serde_json::from_str(&cli.send_body)?;
        let msg_id = fiber.send(SendOptions::new(cli.entity.as_str(), to.as_str(), body))?;
        println!("sent {} to '{}'", msg_id, to);
    }

    loop {
        tokio::select! {
            event = status.recv() => match event {
                Ok(event) => println!("status: {:?}", event),
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("status stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            envelope = inbox.recv() => match envelope {
                Some(envelope) => {
                    println!(
                        "{} <- {} [{}]: {}",
                        envelope.to, envelope.from, envelope.msg_id, envelope.body
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("shutting down");
                break;
            }
        }
    }

    fiber.dispose().await;
    Ok(())
}
