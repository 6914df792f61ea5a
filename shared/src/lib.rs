use serde::{Deserialize, Serialize};

pub mod lobby;
pub mod protocol;

pub use lobby::{
    ConnectData, DisbandReason, LobbyEvent, LobbyEventData, LobbyOperation, LobbySnapshot,
    MemberExtra, MemberSnapshot, PortMap, ServerDescriptor,
};
pub use protocol::{Channel, CodecError, Delivery, PeerId, RelayMessage, SystemMessage, Target};

pub const GAME_TYPE: &str = "CursorParty";
pub const COLOR_PREFERENCE_KEY: &str = "color";
pub const DEFAULT_COLOR_INDEX: usize = 7;
pub const EFFECT_LIFETIME_MS: u64 = 1000;
pub const STATUS_OK: u16 = 200;
/// Reason code on a DISBANDED lobby event when the relay room has been allocated.
pub const ROOM_READY_REASON_CODE: i32 = 80101;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const COLORS: [Color; 8] = [
    Color::rgb(255, 68, 68),
    Color::rgb(255, 160, 40),
    Color::rgb(255, 230, 60),
    Color::rgb(80, 220, 100),
    Color::rgb(60, 200, 230),
    Color::rgb(70, 110, 255),
    Color::rgb(190, 90, 255),
    Color::rgb(255, 255, 255),
];

pub fn is_valid_color_index(index: usize) -> bool {
    index < COLORS.len()
}

/// Out-of-range indices fall back to the default color.
pub fn color_for(index: usize) -> Color {
    COLORS
        .get(index)
        .copied()
        .unwrap_or(COLORS[DEFAULT_COLOR_INDEX])
}
