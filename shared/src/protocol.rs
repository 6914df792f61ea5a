//! Relay application protocol and relay system-channel messages
//!
//! Application messages travel as ASCII JSON of the shape
//! `{"op": "<name>", "data": {...}}`. Decoding is strict about that shape but
//! treats an unknown `op` as a no-op so newer peers can add operations.

use crate::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay-assigned network id of a peer in the room.
pub type PeerId = u8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not ASCII")]
    NotAscii,
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Relay channels, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    HighPriority1,
    HighPriority2,
    Normal,
    Low,
}

impl Channel {
    pub fn id(self) -> u8 {
        match self {
            Channel::HighPriority1 => 0,
            Channel::HighPriority2 => 1,
            Channel::Normal => 2,
            Channel::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    AllPlayers,
    Peer(PeerId),
}

/// How a message is handed to the relay transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub reliable: bool,
    pub flush_immediate: bool,
    pub channel: Channel,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "op", content = "data", rename_all = "lowercase")]
pub enum RelayMessage {
    Move(Position),
    Shockwave(Position),
}

#[derive(Deserialize)]
struct Envelope {
    op: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl RelayMessage {
    /// Moves are latest-value-wins and may be lost; shockwaves must arrive.
    pub fn delivery(&self) -> Delivery {
        match self {
            RelayMessage::Move(_) => Delivery {
                reliable: false,
                flush_immediate: true,
                channel: Channel::HighPriority1,
            },
            RelayMessage::Shockwave(_) => Delivery {
                reliable: true,
                flush_immediate: false,
                channel: Channel::HighPriority2,
            },
        }
    }

    pub fn target(&self) -> Target {
        Target::AllPlayers
    }

    pub fn op(&self) -> &'static str {
        match self {
            RelayMessage::Move(_) => "move",
            RelayMessage::Shockwave(_) => "shockwave",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Returns `Ok(None)` for well-formed messages with an unknown `op`.
    pub fn decode(payload: &[u8]) -> Result<Option<Self>, CodecError> {
        if !payload.is_ascii() {
            return Err(CodecError::NotAscii);
        }

        let envelope: Envelope = serde_json::from_slice(payload)?;
        let message = match envelope.op.as_str() {
            "move" => RelayMessage::Move(serde_json::from_value(envelope.data)?),
            "shockwave" => RelayMessage::Shockwave(serde_json::from_value(envelope.data)?),
            _ => return Ok(None),
        };

        Ok(Some(message))
    }
}

/// Messages the relay server itself sends on the system channel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "op")]
pub enum SystemMessage {
    #[serde(rename = "CONNECT")]
    Connect {
        #[serde(rename = "profileId")]
        profile_id: String,
    },
    #[serde(rename = "DISCONNECT")]
    Disconnect {
        #[serde(rename = "profileId")]
        profile_id: String,
    },
    #[serde(other)]
    Other,
}

impl SystemMessage {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
