//! Session configuration
//!
//! Everything here has a default matching the live game; the binary
//! overrides selected fields from command line arguments.

use serde::Serialize;
use shared::{
    COLOR_PREFERENCE_KEY, DEFAULT_COLOR_INDEX, EFFECT_LIFETIME_MS, GAME_TYPE,
    ROOM_READY_REASON_CODE,
};
use std::time::Duration;

/// Matchmaking search strategy sent with find-or-create requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchAlgorithm {
    pub strategy: String,
    pub alignment: String,
    pub ranges: Vec<u32>,
}

impl Default for MatchAlgorithm {
    fn default() -> Self {
        Self {
            strategy: "ranged-absolute".to_string(),
            alignment: "center".to_string(),
            ranges: vec![1000],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub game_type: String,
    pub rating: u32,
    pub max_steps: u32,
    pub algorithm: MatchAlgorithm,
    pub team_code: String,
    /// Passed as the remember flag on authentication.
    pub remember_me: bool,
    pub color_preference_key: String,
    pub default_color_index: usize,
    pub room_ready_reason_code: i32,
    pub effect_lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_type: GAME_TYPE.to_string(),
            rating: 0,
            max_steps: 1,
            algorithm: MatchAlgorithm::default(),
            team_code: "all".to_string(),
            remember_me: true,
            color_preference_key: COLOR_PREFERENCE_KEY.to_string(),
            default_color_index: DEFAULT_COLOR_INDEX,
            room_ready_reason_code: ROOM_READY_REASON_CODE,
            effect_lifetime: Duration::from_millis(EFFECT_LIFETIME_MS),
        }
    }
}

impl SessionConfig {
    pub fn with_game_type(mut self, game_type: impl Into<String>) -> Self {
        self.game_type = game_type.into();
        self
    }

    pub fn with_effect_lifetime(mut self, lifetime: Duration) -> Self {
        self.effect_lifetime = lifetime;
        self
    }
}
