//! Networking layer: pub/sub transport endpoints and peer reconciliation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  PubEndpoint (one per cycle)                                    │
//! │  ├── TcpListener accept loop → subscriber connections           │
//! │  └── writer task: egress channel → frame → fan out              │
//! │                                                                 │
//! │  SubEndpoint (one per cycle)                                    │
//! │  ├── connect task per peer → framed read loop → delivery        │
//! │  └── monitor task: poll connected set → ConfirmLatch → status   │
//! │                                                                 │
//! │  DiscoveryWorker                                                │
//! │  └── interval tick → refresh fn → Endpoints::reconcile          │
//! │                                                                 │
//! │  ReadyFlags gate all socket I/O on both endpoints               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod events;
pub mod latch;
pub mod readiness;

pub(crate) mod discovery;
pub(crate) mod pub_endpoint;
pub(crate) mod state;
pub(crate) mod sub_endpoint;

pub use events::{FiberDebugInfo, FiberStatus};
pub use latch::ConfirmLatch;
pub use readiness::{Readiness, ReadyFlags};
