//! The pub/sub fiber: lifecycle, routing, and status reporting
//!
//! A [`PubSubFiber`] is a process-local messaging endpoint. It binds a
//! publish endpoint at its own address, connects a subscribe endpoint to
//! every peer in a dynamically discovered address list, and routes each
//! outbound envelope either to a local entity mailbox (skipping the
//! network entirely) or onto the egress channel for broadcast.
//!
//! ## Lifecycle
//!
//! `start` rebuilds the publish endpoint, rebuilds the subscribe
//! endpoint, binds publish, then connects subscribe, in that order, so
//! the fiber is never subscribe-ready before it is publish-ready. A
//! periodic discovery worker refreshes the peer list; on a real change it
//! rebuilds only the subscribe side. `stop` tears both endpoints down
//! unconditionally and can be followed by a fresh `start`. `dispose` is
//! terminal and idempotent.
//!
//! ## Routing
//!
//! `send` is synchronous: it classifies the destination, enqueues the
//! envelope for the dispatch worker, and returns the message id
//! immediately. Actual delivery always happens on the worker task, never
//! inside the caller's stack.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, trace};

use crate::config::{FiberConfig, RefreshFn};
use crate::envelope::Envelope;
use crate::error::{FiberError, FiberResult};
use crate::lifecycle::FiberBase;
use crate::net::discovery::DiscoveryWorker;
use crate::net::events::{FiberDebugInfo, FiberStatus};
use crate::net::readiness::{Readiness, ReadyFlags};
use crate::net::state::{Endpoints, NetContext};
use crate::registry::EntityMailbox;
use crate::types::{EntityId, FiberId, MessageId, PeerAddr};

/// Capacity of the status broadcast channel
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the egress broadcast channel
const EGRESS_CHANNEL_CAPACITY: usize = 256;

/// Options for [`PubSubFiber::send`]
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Sending entity
    pub from: EntityId,
    /// Destination entity
    pub to: EntityId,
    /// Application payload
    pub body: Value,
    /// Message id; generated when absent
    pub msg_id: Option<MessageId>,
    /// Optional application-level type tag
    pub message_type: Option<String>,
    /// Message this one replies to
    pub in_reply_to: Option<MessageId>,
}

impl SendOptions {
    /// Minimal options: sender, destination, payload
    pub fn new(from: impl Into<EntityId>, to: impl Into<EntityId>, body: Value) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            body,
            msg_id: None,
            message_type: None,
            in_reply_to: None,
        }
    }

    /// Tag the message with an application-level type
    pub fn message_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    /// Mark this message as a reply
    pub fn in_reply_to(mut self, msg_id: MessageId) -> Self {
        self.in_reply_to = Some(msg_id);
        self
    }

    /// Supply the message id instead of generating one
    pub fn msg_id(mut self, msg_id: MessageId) -> Self {
        self.msg_id = Some(msg_id);
        self
    }
}

/// Routed envelope awaiting dispatch on the worker task
enum Dispatch {
    Local(Envelope),
    Egress(Envelope),
}

/// A process-local pub/sub messaging endpoint
pub struct PubSubFiber {
    base: FiberBase,
    ctx: Arc<NetContext>,
    endpoints: Arc<Mutex<Endpoints>>,
    refresh: RefreshFn,
    refresh_interval: Duration,
    discovery: parking_lot::Mutex<Option<DiscoveryWorker>>,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    dispatch_task: JoinHandle<()>,
}

impl PubSubFiber {
    /// Create a fiber from a validated config
    ///
    /// Nothing touches the network until [`start`](Self::start).
    pub fn new(config: FiberConfig) -> Self {
        let base = FiberBase::new();
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (egress_tx, _) = broadcast::channel(EGRESS_CHANNEL_CAPACITY);

        let ctx = Arc::new(NetContext {
            publish_address: config.publish_address.clone(),
            codec: config.codec.clone(),
            scheduler: config.scheduler.clone(),
            ready: Arc::new(ReadyFlags::new()),
            registry: base.registry().clone(),
            status_tx,
            egress_tx: egress_tx.clone(),
            monitor_connections: config.monitor_connections,
            monitor_interval: config.monitor_interval,
        });

        let endpoints = Arc::new(Mutex::new(Endpoints::new(config.addresses.clone())));

        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel();
        let registry = base.registry().clone();
        let dispatch_task = config.scheduler.spawn(async move {
            while let Some(dispatch) = dispatch_rx.recv().await {
                match dispatch {
                    Dispatch::Local(envelope) => {
                        registry.deliver(envelope);
                    }
                    Dispatch::Egress(envelope) => {
                        // With no live publish writer subscribed, the send
                        // fails and the envelope is dropped, never queued.
                        let _ = egress_tx.send(envelope);
                    }
                }
            }
        });

        Self {
            base,
            ctx,
            endpoints,
            refresh: config.refresh_addresses,
            refresh_interval: config.refresh_interval,
            discovery: parking_lot::Mutex::new(None),
            dispatch_tx,
            dispatch_task,
        }
    }

    /// This fiber's identity
    pub fn id(&self) -> FiberId {
        self.base.id()
    }

    /// The configured publish address
    pub fn publish_address(&self) -> &PeerAddr {
        &self.ctx.publish_address
    }

    /// Register an entity on this fiber, returning its mailbox
    ///
    /// Envelopes addressed to a registered entity are delivered
    /// in-process without touching the network.
    pub fn register_entity(&self, id: impl Into<EntityId>) -> EntityMailbox {
        self.base.registry().register(id)
    }

    /// Remove an entity registration
    pub fn unregister_entity(&self, id: &EntityId) {
        self.base.registry().unregister(id);
    }

    /// Whether an entity is registered locally
    pub fn has_entity(&self, id: &EntityId) -> bool {
        self.base.registry().has_entity(id)
    }

    /// Subscribe to the fiber's status event stream
    pub fn status_channel(&self) -> broadcast::Receiver<FiberStatus> {
        self.ctx.status_tx.subscribe()
    }

    /// Start the fiber
    ///
    /// Begins periodic address discovery, then sequentially rebuilds the
    /// publish endpoint, rebuilds the subscribe endpoint, binds publish,
    /// and connects subscribe to all known peers.
    ///
    /// # Errors
    ///
    /// [`FiberError::Disposed`] after disposal; [`FiberError::Bind`] when
    /// the publish address cannot be bound (the fiber is left
    /// publish-unready, and a later `start` may retry).
    pub async fn start(&self) -> FiberResult<()> {
        self.base.deny_disposed()?;
        info!(fiber = %self, "Starting fiber");

        {
            let mut discovery = self.discovery.lock();
            if discovery.is_none() {
                *discovery = Some(DiscoveryWorker::spawn(
                    self.ctx.clone(),
                    self.endpoints.clone(),
                    self.refresh.clone(),
                    self.refresh_interval,
                ));
            }
        }

        let mut endpoints = self.endpoints.lock().await;
        endpoints.cycle_pub(&self.ctx);
        endpoints.cycle_sub(&self.ctx);
        endpoints.bind_pub(&self.ctx).await?;
        endpoints.connect_subs(&self.ctx)?;
        Ok(())
    }

    /// Stop the fiber
    ///
    /// Stops discovery and tears down both endpoints unconditionally,
    /// unapplying both readiness flags. A stopped fiber can be started
    /// again.
    pub async fn stop(&self) {
        info!(fiber = %self, "Stopping fiber");

        if let Some(worker) = self.discovery.lock().take() {
            worker.stop();
        }

        let mut endpoints = self.endpoints.lock().await;
        endpoints.teardown(&self.ctx);
    }

    /// Route an envelope toward its destination
    ///
    /// Destinations registered locally are delivered in-process; all
    /// others go to the network egress path. Dispatch is deferred to the
    /// dispatch worker and never runs inside the caller's stack; the
    /// message id is returned immediately, fire-and-forget.
    ///
    /// # Errors
    ///
    /// [`FiberError::Disposed`] after disposal.
    pub fn send(&self, opts: SendOptions) -> FiberResult<MessageId> {
        self.base.deny_disposed()?;

        let msg_id = opts.msg_id.unwrap_or_default();
        let envelope = Envelope {
            from: opts.from,
            to: opts.to,
            body: opts.body,
            msg_id,
            message_type: opts.message_type,
            in_reply_to: opts.in_reply_to,
            origin_fiber: self.base.id(),
        };

        // Local dispatch skips the network round-trip entirely.
        let dispatch = if self.base.registry().has_entity(&envelope.to) {
            trace!(to = %envelope.to, "Routing envelope to local delivery");
            Dispatch::Local(envelope)
        } else {
            trace!(to = %envelope.to, "Routing envelope to network egress");
            Dispatch::Egress(envelope)
        };

        self.dispatch_tx
            .send(dispatch)
            .map_err(|_| FiberError::Disposed)?;
        Ok(msg_id)
    }

    /// Diagnostic snapshot of the fiber's network state
    pub async fn debug_info(&self) -> FiberDebugInfo {
        let endpoints = self.endpoints.lock().await;
        FiberDebugInfo {
            current_addresses: endpoints.current_addresses.clone(),
            next_addresses: endpoints.next_addresses.clone(),
            publish_ready: self.ctx.ready.is_applied(Readiness::Publish),
            subscribe_ready: self.ctx.ready.is_applied(Readiness::Subscribe),
            connected_peers: endpoints
                .subscribe
                .as_ref()
                .map(|sub| sub.connected_addresses())
                .unwrap_or_default(),
            sub_cycles: endpoints.sub_cycles,
        }
    }

    /// The socket address the publish endpoint is actually bound to
    ///
    /// Differs from the configured address when binding to port 0.
    pub async fn bound_address(&self) -> Option<SocketAddr> {
        let endpoints = self.endpoints.lock().await;
        endpoints.publish.as_ref().and_then(|p| p.local_addr())
    }

    /// Dispose of the fiber
    ///
    /// Terminal: stops discovery, tears down both endpoints, clears all
    /// entity registrations, and shuts the dispatch worker down. Further
    /// `send`/`start` calls fail with [`FiberError::Disposed`].
    /// Idempotent.
    pub async fn dispose(&self) {
        if !self.base.dispose() {
            return;
        }
        info!(fiber = %self, "Disposing fiber");

        if let Some(worker) = self.discovery.lock().take() {
            worker.stop();
        }

        {
            let mut endpoints = self.endpoints.lock().await;
            endpoints.teardown(&self.ctx);
        }

        self.dispatch_task.abort();
    }
}

impl std::fmt::Display for PubSubFiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PubSubFiber[id={}, publish_address={}]",
            self.base.id(),
            self.ctx.publish_address
        )
    }
}
