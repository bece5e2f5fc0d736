//! Shared network state for one fiber
//!
//! [`NetContext`] carries the immutable collaborators every endpoint task
//! needs; [`Endpoints`] owns the mutable half: the live endpoint
//! incarnations and the two peer-set snapshots. `Endpoints` sits behind
//! one async mutex in the fiber, which is what serializes `start`/`stop`
//! against the discovery worker.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::envelope::{Envelope, EnvelopeCodec};
use crate::error::{FiberError, FiberResult};
use crate::net::events::FiberStatus;
use crate::net::pub_endpoint::PubEndpoint;
use crate::net::readiness::{Readiness, ReadyFlags};
use crate::net::sub_endpoint::SubEndpoint;
use crate::registry::EntityRegistry;
use crate::types::PeerAddr;

/// Immutable collaborators shared with every endpoint task
pub(crate) struct NetContext {
    pub publish_address: PeerAddr,
    pub codec: Arc<dyn EnvelopeCodec>,
    pub scheduler: Handle,
    pub ready: Arc<ReadyFlags>,
    pub registry: EntityRegistry,
    pub status_tx: broadcast::Sender<FiberStatus>,
    pub egress_tx: broadcast::Sender<Envelope>,
    pub monitor_connections: bool,
    pub monitor_interval: Duration,
}

/// Mutable endpoint state: live endpoints plus the peer-set snapshots
///
/// `current_addresses` changes only as a side effect of a successful
/// reconciliation (or initial adoption at start); `next_addresses` only
/// as a side effect of a discovery result.
pub(crate) struct Endpoints {
    pub publish: Option<PubEndpoint>,
    pub subscribe: Option<SubEndpoint>,
    pub current_addresses: Vec<PeerAddr>,
    pub next_addresses: Vec<PeerAddr>,
    pub sub_cycles: u64,
}

impl Endpoints {
    pub(crate) fn new(initial: Vec<PeerAddr>) -> Self {
        Self {
            publish: None,
            subscribe: None,
            current_addresses: initial.clone(),
            next_addresses: initial,
            sub_cycles: 0,
        }
    }

    /// Tear down and rebuild the publish endpoint
    pub(crate) fn cycle_pub(&mut self, ctx: &NetContext) {
        debug!("Cycling publish endpoint");
        if let Some(old) = self.publish.take() {
            old.close();
        }
        ctx.ready.unapply(Readiness::Publish);
        self.publish = Some(PubEndpoint::cycle(ctx));
    }

    /// Bind the publish endpoint to the configured address
    pub(crate) async fn bind_pub(&mut self, ctx: &NetContext) -> FiberResult<SocketAddr> {
        let endpoint = self
            .publish
            .as_mut()
            .ok_or_else(|| FiberError::Bind("Publish endpoint was not cycled before bind".to_string()))?;
        endpoint.bind(ctx, &ctx.publish_address).await
    }

    /// Tear down and rebuild the subscribe endpoint
    pub(crate) fn cycle_sub(&mut self, ctx: &NetContext) {
        debug!("Cycling subscribe endpoint");
        if let Some(old) = self.subscribe.take() {
            old.close();
        }
        ctx.ready.unapply(Readiness::Subscribe);
        self.subscribe = Some(SubEndpoint::cycle());
        self.sub_cycles += 1;
    }

    /// Connect the subscribe endpoint to the current peer set
    pub(crate) fn connect_subs(&mut self, ctx: &NetContext) -> FiberResult<()> {
        let peers = self.current_addresses.clone();
        let endpoint = self.subscribe.as_mut().ok_or_else(|| {
            FiberError::Reconcile("Subscribe endpoint was not cycled before connect".to_string())
        })?;
        endpoint.connect_all(&peers, ctx);
        Ok(())
    }

    /// Evaluate a discovery result and cycle the subscribe endpoint on a
    /// real change
    ///
    /// Returns `Ok(false)` when the reported set equals the active one
    /// (no side effects), `Ok(true)` after a completed cycle. The publish
    /// endpoint is never touched.
    pub(crate) fn reconcile(&mut self, ctx: &NetContext, next: Vec<PeerAddr>) -> FiberResult<bool> {
        self.next_addresses = next;
        if same_address_set(&self.current_addresses, &self.next_addresses) {
            return Ok(false);
        }

        info!(
            from = self.current_addresses.len(),
            to = self.next_addresses.len(),
            "Peer address set changed"
        );
        self.current_addresses = self.next_addresses.clone();
        self.cycle_sub(ctx);
        self.connect_subs(ctx)?;
        Ok(true)
    }

    /// Tear down both endpoints and unapply both readiness flags
    ///
    /// Idempotent; tearing down absent endpoints is a no-op.
    pub(crate) fn teardown(&mut self, ctx: &NetContext) {
        if let Some(publish) = self.publish.take() {
            debug!("Closing publish endpoint");
            publish.close();
        }
        ctx.ready.unapply(Readiness::Publish);

        if let Some(subscribe) = self.subscribe.take() {
            debug!("Closing subscribe endpoint");
            subscribe.close();
        }
        ctx.ready.unapply(Readiness::Subscribe);
    }
}

/// Order-insensitive equality of two address lists
pub(crate) fn same_address_set(a: &[PeerAddr], b: &[PeerAddr]) -> bool {
    let a: HashSet<&PeerAddr> = a.iter().collect();
    let b: HashSet<&PeerAddr> = b.iter().collect();
    a == b
}
