//! Publish side of the fiber's transport
//!
//! A bound `TcpListener` plus two background tasks: an accept loop that
//! collects subscriber connections, and a writer that drains the egress
//! channel, frames each envelope, and fans it out to every live
//! subscriber. Both are gated on `Readiness::Publish`.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use tracing::{debug, trace, warn};

use crate::error::{FiberError, FiberResult};
use crate::net::readiness::Readiness;
use crate::net::state::NetContext;
use crate::types::PeerAddr;

type SubscriberSink = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// One incarnation of the publish endpoint
///
/// Built by a cycle, torn down whole on the next cycle or on stop.
pub(crate) struct PubEndpoint {
    subscribers: Arc<Mutex<Vec<SubscriberSink>>>,
    writer_task: JoinHandle<()>,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl PubEndpoint {
    /// Allocate a fresh endpoint and subscribe its writer to the egress
    /// channel
    ///
    /// The writer only observes envelopes published after this call, so a
    /// cycle never replays egress buffered before it.
    pub(crate) fn cycle(ctx: &NetContext) -> Self {
        let subscribers: Arc<Mutex<Vec<SubscriberSink>>> = Arc::new(Mutex::new(Vec::new()));

        let mut egress_rx = ctx.egress_tx.subscribe();
        let ready = ctx.ready.clone();
        let codec = ctx.codec.clone();
        let subs = subscribers.clone();

        let writer_task = ctx.scheduler.spawn(async move {
            loop {
                match egress_rx.recv().await {
                    Ok(envelope) => {
                        if !ready.is_applied(Readiness::Publish) {
                            trace!("Dropping egress envelope while publish unready");
                            continue;
                        }
                        let frame = match codec.serialize(&envelope) {
                            Ok(bytes) => Bytes::from(bytes),
                            Err(e) => {
                                warn!(error = %e, "Failed to encode egress envelope");
                                continue;
                            }
                        };
                        trace!(to = %envelope.to, len = frame.len(), "Publishing envelope");

                        let mut sinks = subs.lock().await;
                        let mut healthy = Vec::with_capacity(sinks.len());
                        for mut sink in sinks.drain(..) {
                            match sink.send(frame.clone()).await {
                                Ok(()) => healthy.push(sink),
                                Err(e) => {
                                    debug!(error = %e, "Dropping failed subscriber connection");
                                }
                            }
                        }
                        *sinks = healthy;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Egress writer lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            subscribers,
            writer_task,
            accept_task: None,
            local_addr: None,
        }
    }

    /// Bind the listener and start accepting subscribers
    ///
    /// Applies `Readiness::Publish` on success. On failure the flag stays
    /// unapplied and the endpoint keeps its fresh-but-unbound state.
    pub(crate) async fn bind(&mut self, ctx: &NetContext, address: &PeerAddr) -> FiberResult<SocketAddr> {
        let listener = TcpListener::bind(address.socket_addr())
            .await
            .map_err(|e| FiberError::Bind(format!("Failed to bind {}: {}", address, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| FiberError::Bind(format!("Failed to resolve bound address: {}", e)))?;

        debug!(%local_addr, "Publish endpoint bound");

        let subs = self.subscribers.clone();
        self.accept_task = Some(ctx.scheduler.spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        debug!(%remote, "Subscriber connected");
                        let (_read_half, write_half) = stream.into_split();
                        subs.lock()
                            .await
                            .push(FramedWrite::new(write_half, LengthDelimitedCodec::new()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to accept subscriber connection");
                    }
                }
            }
        }));

        self.local_addr = Some(local_addr);
        ctx.ready.apply(Readiness::Publish);
        Ok(local_addr)
    }

    /// The bound socket address, once bound
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Tear the endpoint down: stop accepting and writing, drop all
    /// subscriber connections
    pub(crate) fn close(self) {
        if let Some(task) = self.accept_task {
            task.abort();
        }
        self.writer_task.abort();
    }
}
