use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::Message;

/// Wire unit exchanged over the socket: `{"type": ..., "payload": ...}`.
///
/// The same object shape is used for inbound and outbound frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("frame has an empty message type")]
    EmptyType,
    #[error("failed to encode {kind} payload: {source}")]
    Encode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn from_message<M: Message>(message: &M) -> Result<Self, EnvelopeError> {
        let payload = serde_json::to_value(message).map_err(|source| EnvelopeError::Encode {
            kind: M::TYPE.to_string(),
            source,
        })?;
        Ok(Self::new(M::TYPE, payload))
    }

    pub fn decode(frame: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(frame).map_err(EnvelopeError::Malformed)?;
        if envelope.kind.is_empty() {
            return Err(EnvelopeError::EmptyType);
        }
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        if self.kind.is_empty() {
            return Err(EnvelopeError::EmptyType);
        }
        serde_json::to_string(self).map_err(|source| EnvelopeError::Encode {
            kind: self.kind.clone(),
            source,
        })
    }

    pub fn is<M: Message>(&self) -> bool {
        self.kind == M::TYPE
    }

    pub fn payload_as<M: Message>(&self) -> Result<M, EnvelopeError> {
        M::deserialize(&self.payload).map_err(|source| EnvelopeError::Payload {
            kind: self.kind.clone(),
            source,
        })
    }
}
