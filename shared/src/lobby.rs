//! Lobby service event payloads
//!
//! A lobby event carries two independent things: an optional full membership
//! snapshot, and a lifecycle operation (STARTING, ROOM_READY, DISBANDED...).
//! Consumers must look at both on every event.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyOperation {
    MemberJoin,
    MemberLeft,
    MemberUpdate,
    SettingsUpdate,
    Starting,
    RoomReady,
    Disbanded,
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LobbyEvent {
    pub operation: LobbyOperation,
    pub data: LobbyEventData,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbyEventData {
    pub lobby_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby: Option<LobbySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DisbandReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_data: Option<ConnectData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
}

impl LobbyEventData {
    pub fn new(lobby_id: impl Into<String>) -> Self {
        Self {
            lobby_id: lobby_id.into(),
            lobby: None,
            reason: None,
            connect_data: None,
            passcode: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct LobbySnapshot {
    #[serde(default)]
    pub members: Vec<MemberSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub extra: MemberExtra,
}

/// Per-member metadata. Only `colorIndex` is interpreted; other keys are kept
/// as-is so they survive being echoed back to the lobby service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MemberExtra {
    #[serde(
        rename = "colorIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub color_index: Option<usize>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl MemberExtra {
    pub fn with_color(color_index: usize) -> Self {
        Self {
            color_index: Some(color_index),
            other: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DisbandReason {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConnectData {
    pub address: String,
    #[serde(default)]
    pub ports: PortMap,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PortMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<u16>,
}

/// Where and how to reach the relay room allocated for a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub address: String,
    pub port: u16,
    pub passcode: String,
    pub lobby_id: String,
}

impl ServerDescriptor {
    /// Extracts the descriptor from a ROOM_READY payload. The websocket port
    /// is the one this client speaks.
    pub fn from_room_ready(data: &LobbyEventData) -> Option<Self> {
        let connect_data = data.connect_data.as_ref()?;
        let port = connect_data.ports.ws?;
        let passcode = data.passcode.clone()?;

        Some(Self {
            address: connect_data.address.clone(),
            port,
            passcode,
            lobby_id: data.lobby_id.clone(),
        })
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (lobby {})", self.address, self.port, self.lobby_id)
    }
}

impl LobbyEvent {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn disband_reason_code(&self) -> Option<i32> {
        if self.operation != LobbyOperation::Disbanded {
            return None;
        }
        self.data.reason.as_ref().map(|reason| reason.code)
    }
}
