//! Session failures. The `Display` text is what the user gets to see.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to login")]
    AuthFailure { status: u16 },

    #[error("Failed to enable RTT")]
    ChannelEnableFailure(String),

    #[error("RTT Disconnected")]
    ChannelDisconnect(String),

    #[error("Failed to find lobby")]
    MatchmakingRequestFailure { status: u16 },

    #[error("Lobby disbanded (reason {reason_code:?})")]
    LobbyDisbandedAbnormally { reason_code: Option<i32> },

    #[error("Failed to connect to server, msg: no server info received")]
    MissingServerDescriptor,

    #[error("Failed to connect to server, msg: {0}")]
    RelayConnectFailure(String),
}

impl SessionError {
    /// Whether this failure ends the whole session (back to login) rather
    /// than just the current lobby.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::LobbyDisbandedAbnormally { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_messages() {
        assert_eq!(
            SessionError::AuthFailure { status: 403 }.to_string(),
            "Failed to login"
        );
        assert_eq!(
            SessionError::ChannelEnableFailure("timeout".into()).to_string(),
            "Failed to enable RTT"
        );
        assert_eq!(
            SessionError::RelayConnectFailure("refused".into()).to_string(),
            "Failed to connect to server, msg: refused"
        );
    }

    #[test]
    fn test_terminal_classification() {
        assert!(SessionError::MatchmakingRequestFailure { status: 500 }.is_terminal());
        assert!(SessionError::MissingServerDescriptor.is_terminal());
        assert!(!SessionError::LobbyDisbandedAbnormally {
            reason_code: Some(1)
        }
        .is_terminal());
    }
}
