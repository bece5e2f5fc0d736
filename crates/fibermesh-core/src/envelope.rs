//! The envelope message unit and its wire codecs
//!
//! Every message a fiber sends, locally or over the network, travels as an
//! [`Envelope`]. Envelopes are immutable once constructed; the router stamps
//! the originating fiber's id on each one.
//!
//! ## Wire Format
//!
//! One envelope per transport frame. The default codec is lossless JSON
//! using the short wire field names (`msgId`, `mT`, `rMsgId`, `oFib`);
//! optional fields are omitted entirely when absent. [`PostcardCodec`]
//! offers a compact binary alternative, and anything implementing
//! [`EnvelopeCodec`] may be substituted through the fiber config.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FiberError, FiberResult};
use crate::types::{EntityId, FiberId, MessageId};

/// The structured message unit exchanged between fibers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sending entity
    pub from: EntityId,

    /// Destination entity
    pub to: EntityId,

    /// Application payload
    pub body: Value,

    /// Unique id of this message
    #[serde(rename = "msgId")]
    pub msg_id: MessageId,

    /// Optional application-level message type tag
    #[serde(rename = "mT", skip_serializing_if = "Option::is_none", default)]
    pub message_type: Option<String>,

    /// Id of the message this one replies to, if any
    #[serde(rename = "rMsgId", skip_serializing_if = "Option::is_none", default)]
    pub in_reply_to: Option<MessageId>,

    /// The fiber that originated this envelope
    #[serde(rename = "oFib")]
    pub origin_fiber: FiberId,
}

/// Pluggable envelope serializer/deserializer
///
/// Implementations must be lossless: `deserialize(serialize(e)) == e`.
pub trait EnvelopeCodec: Send + Sync {
    /// Encode an envelope into wire bytes
    fn serialize(&self, envelope: &Envelope) -> FiberResult<Vec<u8>>;

    /// Decode an envelope from wire bytes
    fn deserialize(&self, bytes: &[u8]) -> FiberResult<Envelope>;
}

/// Default textual codec (JSON)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn serialize(&self, envelope: &Envelope) -> FiberResult<Vec<u8>> {
        serde_json::to_vec(envelope)
            .map_err(|e| FiberError::Serialization(format!("Failed to encode envelope: {}", e)))
    }

    fn deserialize(&self, bytes: &[u8]) -> FiberResult<Envelope> {
        serde_json::from_slice(bytes)
            .map_err(|e| FiberError::Serialization(format!("Failed to decode envelope: {}", e)))
    }
}

/// Compact binary codec (postcard)
///
/// Postcard is not self-describing, so the free-form body cannot travel
/// as a raw JSON value; it is embedded as its JSON text inside an
/// otherwise fully binary envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardCodec;

/// Postcard wire shape; the body field holds the payload's JSON text
#[derive(Serialize, Deserialize)]
struct PostcardEnvelope {
    from: EntityId,
    to: EntityId,
    body: String,
    msg_id: MessageId,
    message_type: Option<String>,
    in_reply_to: Option<MessageId>,
    origin_fiber: FiberId,
}

impl EnvelopeCodec for PostcardCodec {
    fn serialize(&self, envelope: &Envelope) -> FiberResult<Vec<u8>> {
        let body = serde_json::to_string(&envelope.body)
            .map_err(|e| FiberError::Serialization(format!("Failed to encode body: {}", e)))?;
        let wire = PostcardEnvelope {
            from: envelope.from.clone(),
            to: envelope.to.clone(),
            body,
            msg_id: envelope.msg_id,
            message_type: envelope.message_type.clone(),
            in_reply_to: envelope.in_reply_to,
            origin_fiber: envelope.origin_fiber,
        };
        postcard::to_allocvec(&wire)
            .map_err(|e| FiberError::Serialization(format!("Failed to encode envelope: {}", e)))
    }

    fn deserialize(&self, bytes: &[u8]) -> FiberResult<Envelope> {
        let wire: PostcardEnvelope = postcard::from_bytes(bytes)
            .map_err(|e| FiberError::Serialization(format!("Failed to decode envelope: {}", e)))?;
        let body = serde_json::from_str(&wire.body)
            .map_err(|e| FiberError::Serialization(format!("Failed to decode body: {}", e)))?;
        Ok(Envelope {
            from: wire.from,
            to: wire.to,
            body,
            msg_id: wire.msg_id,
            message_type: wire.message_type,
            in_reply_to: wire.in_reply_to,
            origin_fiber: wire.origin_fiber,
        })
    }
}
