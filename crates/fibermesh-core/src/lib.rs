//! Fibermesh Core Library
//!
//! Address-routed pub/sub messaging fibers over TCP.
//!
//! ## Overview
//!
//! A fiber is a process-local messaging endpoint participating in a
//! larger addressable-entity space. Each fiber binds a publish endpoint
//! at its own address and subscribes to every peer in a dynamically
//! discovered address list. Envelopes addressed to entities registered on
//! the local fiber are delivered in-process, skipping the network
//! entirely; everything else is broadcast to all connected peers.
//!
//! Topology changes are hidden from callers: a periodic discovery task
//! fetches the latest peer list, and when it really differs from the
//! active set the fiber rebuilds only its subscribe side and reconnects.
//! Connection readiness is observable through the status channel.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fibermesh_core::{FiberConfig, PubSubFiber, SendOptions};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let peers = vec!["127.0.0.1:7001".into(), "127.0.0.1:7002".into()];
//!     let refresh_peers = peers.clone();
//!     let config = FiberConfig::builder()
//!         .publish_address("127.0.0.1:7001")
//!         .addresses(peers)
//!         .refresh_addresses(move || {
//!             let peers = refresh_peers.clone();
//!             Box::pin(async move { Ok(peers) })
//!         })
//!         .refresh_interval(Duration::from_secs(5))
//!         .scheduler(tokio::runtime::Handle::current())
//!         .build()?;
//!
//!     let fiber = PubSubFiber::new(config);
//!     let mut inbox = fiber.register_entity("greeter");
//!     fiber.start().await?;
//!
//!     fiber.send(SendOptions::new("greeter", "remote-entity", json!({"hello": "world"})))?;
//!
//!     while let Some(envelope) = inbox.recv().await {
//!         println!("{} -> {}: {}", envelope.from, envelope.to, envelope.body);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod fiber;
pub mod lifecycle;
pub mod net;
pub mod registry;
pub mod types;

// Re-exports
pub use config::{FiberConfig, FiberConfigBuilder, RefreshFn, DEFAULT_MONITOR_INTERVAL};
pub use envelope::{Envelope, EnvelopeCodec, JsonCodec, PostcardCodec};
pub use error::{FiberError, FiberResult};
pub use fiber::{PubSubFiber, SendOptions};
pub use lifecycle::FiberBase;
pub use net::{ConfirmLatch, FiberDebugInfo, FiberStatus, Readiness, ReadyFlags};
pub use registry::{EntityMailbox, EntityRegistry};
pub use types::{EntityId, FiberId, MessageId, PeerAddr};
