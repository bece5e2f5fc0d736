//! Subscribe side of the fiber's transport
//!
//! One outbound connection task per peer address (self excluded), each
//! running a framed read loop that decodes inbound envelopes and hands
//! them to local delivery while `Readiness::Subscribe` is applied.
//!
//! Connect monitoring, when enabled, is a polling task: connection tasks
//! record their address in a shared set on success, and the monitor
//! samples that set at the configured interval, feeding observations to
//! a [`ConfirmLatch`]. The latch dedupes per address, so re-observing a
//! connected peer on every poll never double-counts. When the latch
//! completes the monitor disarms itself and then emits a single
//! `SubsConnected` status event.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tracing::{debug, trace, warn};

use crate::error::{FiberError, FiberResult};
use crate::net::events::FiberStatus;
use crate::net::latch::ConfirmLatch;
use crate::net::readiness::Readiness;
use crate::net::state::NetContext;
use crate::types::PeerAddr;

/// Delay between transport-level connect attempts to one peer
///
/// A pub/sub connect is not a one-shot operation: a peer's publish side
/// may bind after we start dialing it, and may come back after dropping
/// us. The connection task keeps dialing at this cadence until the
/// endpoint is torn down or reconciliation drops the address.
const CONNECT_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// One incarnation of the subscribe endpoint
///
/// Built by a cycle, torn down whole on the next cycle or on stop.
pub(crate) struct SubEndpoint {
    conn_tasks: Vec<JoinHandle<()>>,
    monitor_task: Option<JoinHandle<()>>,
    connected: Arc<Mutex<HashSet<PeerAddr>>>,
}

impl SubEndpoint {
    /// Allocate a fresh, unconnected endpoint
    pub(crate) fn cycle() -> Self {
        Self {
            conn_tasks: Vec::new(),
            monitor_task: None,
            connected: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Connect to every peer except self and apply `Readiness::Subscribe`
    ///
    /// Each connect runs in its own task, fire-and-forget: a failed
    /// connect is logged and affects only that address. When monitoring
    /// is enabled it is armed before any connect is initiated.
    pub(crate) fn connect_all(&mut self, peers: &[PeerAddr], ctx: &NetContext) {
        let others: Vec<PeerAddr> = peers
            .iter()
            .filter(|addr| **addr != ctx.publish_address)
            .cloned()
            .collect();

        debug!(peers = others.len(), "Connecting subscribe endpoint");

        if ctx.monitor_connections {
            self.arm_monitor(others.clone(), ctx);
        }

        for addr in others {
            self.conn_tasks.push(spawn_peer_connection(addr, ctx, self.connected.clone()));
        }

        ctx.ready.apply(Readiness::Subscribe);
    }

    /// Start the confirmation monitor for this connect cycle
    fn arm_monitor(&mut self, expected: Vec<PeerAddr>, ctx: &NetContext) {
        let connected = self.connected.clone();
        let status_tx = ctx.status_tx.clone();
        let interval = ctx.monitor_interval;

        self.monitor_task = Some(ctx.scheduler.spawn(async move {
            let mut latch = ConfirmLatch::new(expected.iter().cloned());
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                {
                    let snapshot = connected.lock();
                    for addr in snapshot.iter() {
                        latch.observe(addr);
                    }
                }
                if latch.is_complete() {
                    break;
                }
                trace!(remaining = latch.remaining(), "Awaiting peer connections");
            }

            // The loop has exited: monitoring is disarmed before the
            // confirmation is announced.
            debug!(peers = expected.len(), "All expected peers connected");
            let _ = status_tx.send(FiberStatus::SubsConnected { addresses: expected });
        }));
    }

    /// Addresses with a currently-live connection
    pub(crate) fn connected_addresses(&self) -> Vec<PeerAddr> {
        self.connected.lock().iter().cloned().collect()
    }

    /// Tear the endpoint down: disarm monitoring and drop every peer
    /// connection
    pub(crate) fn close(self) {
        if let Some(task) = self.monitor_task {
            task.abort();
        }
        for task in self.conn_tasks {
            task.abort();
        }
    }
}

/// One transport-level connect attempt
async fn connect_peer(addr: &PeerAddr) -> FiberResult<TcpStream> {
    TcpStream::connect(addr.socket_addr())
        .await
        .map_err(|e| FiberError::Connect(format!("Failed to connect to {}: {}", addr, e)))
}

/// Connect to one peer and run its read loop until the connection ends
fn spawn_peer_connection(
    addr: PeerAddr,
    ctx: &NetContext,
    connected: Arc<Mutex<HashSet<PeerAddr>>>,
) -> JoinHandle<()> {
    let ready = ctx.ready.clone();
    let codec = ctx.codec.clone();
    let registry = ctx.registry.clone();

    ctx.scheduler.spawn(async move {
        let mut attempts: u32 = 0;
        loop {
            let stream = match connect_peer(&addr).await {
                Ok(stream) => stream,
                Err(e) => {
                    attempts += 1;
                    if attempts == 1 {
                        warn!(peer = %addr, error = %e, "Failed to connect to peer; retrying");
                    } else {
                        trace!(peer = %addr, error = %e, attempts, "Connect attempt failed");
                    }
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                    continue;
                }
            };
            attempts = 0;
            debug!(peer = %addr, "Connected to peer");
            connected.lock().insert(addr.clone());

            let mut frames = FramedRead::new(stream, LengthDelimitedCodec::new());
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(bytes) => {
                        if !ready.is_applied(Readiness::Subscribe) {
                            trace!(peer = %addr, "Dropping inbound frame while subscribe unready");
                            continue;
                        }
                        match codec.deserialize(&bytes) {
                            Ok(envelope) => {
                                trace!(peer = %addr, to = %envelope.to, "Received envelope");
                                registry.deliver(envelope);
                            }
                            Err(e) => {
                                warn!(peer = %addr, error = %e, "Failed to decode inbound envelope");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(peer = %addr, error = %e, "Read error on peer connection");
                        break;
                    }
                }
            }

            debug!(peer = %addr, "Peer connection closed");
            connected.lock().remove(&addr);
            tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
        }
    })
}
