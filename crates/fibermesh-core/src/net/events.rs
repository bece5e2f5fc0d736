//! Status events emitted on the fiber's status channel

use crate::types::PeerAddr;

/// Events observable on [`PubSubFiber::status_channel`](crate::fiber::PubSubFiber::status_channel)
#[derive(Debug, Clone, PartialEq)]
pub enum FiberStatus {
    /// Every expected peer reported a successful low-level connect
    ///
    /// Emitted at most once per connect cycle, and only when connect
    /// monitoring is enabled.
    SubsConnected {
        /// The peer addresses that were confirmed (self excluded)
        addresses: Vec<PeerAddr>,
    },
}

/// Diagnostic snapshot of a fiber's network state
///
/// Intended for debug surfaces and tests; not part of the wire contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiberDebugInfo {
    /// Peer set the subscribe endpoint is currently connected to
    pub current_addresses: Vec<PeerAddr>,
    /// Most recent peer set reported by discovery
    pub next_addresses: Vec<PeerAddr>,
    /// Whether the publish endpoint is bound and ready
    pub publish_ready: bool,
    /// Whether the subscribe endpoint is connected and ready
    pub subscribe_ready: bool,
    /// Peers with a currently-live inbound connection
    pub connected_peers: Vec<PeerAddr>,
    /// How many times the subscribe endpoint has been rebuilt
    pub sub_cycles: u64,
}
