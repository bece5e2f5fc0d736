//! Fiber configuration
//!
//! All required options are checked when the builder runs, so a
//! misconfigured fiber fails at construction rather than at first use.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::envelope::{EnvelopeCodec, JsonCodec};
use crate::error::{FiberError, FiberResult};
use crate::types::PeerAddr;

/// Default interval for polling connect monitoring
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(250);

/// Discovery callback: produces the latest full peer address list
///
/// Invoked on every refresh tick. Failures are reported through the
/// returned `Result`; the fiber logs them and keeps its current peer set.
pub type RefreshFn =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Vec<PeerAddr>>> + Send + Sync>;

/// Configuration for a [`PubSubFiber`](crate::fiber::PubSubFiber)
#[derive(Clone)]
pub struct FiberConfig {
    /// Address this fiber's publish endpoint binds to
    pub publish_address: PeerAddr,

    /// Initial peer address list (the publish address itself is a member,
    /// used only for self-exclusion)
    pub addresses: Vec<PeerAddr>,

    /// Discovery callback producing the latest peer list
    pub refresh_addresses: RefreshFn,

    /// Interval between discovery polls
    pub refresh_interval: Duration,

    /// Runtime handle all background tasks are spawned on
    pub scheduler: Handle,

    /// Envelope wire codec
    pub codec: Arc<dyn EnvelopeCodec>,

    /// Whether to confirm peer connections and emit a status event
    pub monitor_connections: bool,

    /// Polling cadence for connect monitoring
    pub monitor_interval: Duration,
}

impl FiberConfig {
    /// Start building a config
    pub fn builder() -> FiberConfigBuilder {
        FiberConfigBuilder::default()
    }
}

impl std::fmt::Debug for FiberConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiberConfig")
            .field("publish_address", &self.publish_address)
            .field("addresses", &self.addresses)
            .field("refresh_interval", &self.refresh_interval)
            .field("monitor_connections", &self.monitor_connections)
            .field("monitor_interval", &self.monitor_interval)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FiberConfig`]
#[derive(Default)]
pub struct FiberConfigBuilder {
    publish_address: Option<PeerAddr>,
    addresses: Option<Vec<PeerAddr>>,
    refresh_addresses: Option<RefreshFn>,
    refresh_interval: Option<Duration>,
    scheduler: Option<Handle>,
    codec: Option<Arc<dyn EnvelopeCodec>>,
    monitor_connections: bool,
    monitor_interval: Option<Duration>,
}

impl FiberConfigBuilder {
    /// Set the publish bind address (required)
    pub fn publish_address(mut self, addr: impl Into<PeerAddr>) -> Self {
        self.publish_address = Some(addr.into());
        self
    }

    /// Set the initial peer address list (required)
    pub fn addresses(mut self, addrs: impl IntoIterator<Item = impl Into<PeerAddr>>) -> Self {
        self.addresses = Some(addrs.into_iter().map(Into::into).collect());
        self
    }

    /// Set the discovery callback (required)
    pub fn refresh_addresses(
        mut self,
        f: impl Fn() -> BoxFuture<'static, anyhow::Result<Vec<PeerAddr>>> + Send + Sync + 'static,
    ) -> Self {
        self.refresh_addresses = Some(Arc::new(f));
        self
    }

    /// Set the interval between discovery polls (required)
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Set the runtime handle used for background tasks (required)
    pub fn scheduler(mut self, handle: Handle) -> Self {
        self.scheduler = Some(handle);
        self
    }

    /// Override the envelope codec (default: JSON)
    pub fn codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Enable connect monitoring (default: off)
    pub fn monitor_connections(mut self, enabled: bool) -> Self {
        self.monitor_connections = enabled;
        self
    }

    /// Override the monitor polling interval (default: 250ms)
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = Some(interval);
        self
    }

    /// Validate and produce the config
    ///
    /// # Errors
    ///
    /// Returns [`FiberError::Config`] naming the first missing required
    /// option.
    pub fn build(self) -> FiberResult<FiberConfig> {
        let publish_address = self
            .publish_address
            .ok_or_else(|| FiberError::Config("publish_address is required".to_string()))?;
        let addresses = self
            .addresses
            .ok_or_else(|| FiberError::Config("addresses is required".to_string()))?;
        let refresh_addresses = self
            .refresh_addresses
            .ok_or_else(|| FiberError::Config("refresh_addresses is required".to_string()))?;
        let refresh_interval = self
            .refresh_interval
            .ok_or_else(|| FiberError::Config("refresh_interval is required".to_string()))?;
        let scheduler = self
            .scheduler
            .ok_or_else(|| FiberError::Config("scheduler is required".to_string()))?;

        Ok(FiberConfig {
            publish_address,
            addresses,
            refresh_addresses,
            refresh_interval,
            scheduler,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            monitor_connections: self.monitor_connections,
            monitor_interval: self.monitor_interval.unwrap_or(DEFAULT_MONITOR_INTERVAL),
        })
    }
}
