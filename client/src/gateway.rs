//! Connection gateway: the contract between the session controller and the
//! remote services it drives
//!
//! Every service call returns immediately. Calls that complete later are
//! given a [`Ticket`], and the implementation reports the outcome as a
//! [`GatewayEvent`] carrying that same ticket on the channel it was built
//! with. The controller tracks live tickets in a [`SubscriptionSet`], so a
//! completion that arrives after its subscription was torn down is simply
//! dropped.

use crate::config::{MatchAlgorithm, SessionConfig};
use serde::Serialize;
use shared::{Delivery, LobbyEvent, MemberExtra, PeerId, ServerDescriptor, Target};
use std::collections::HashMap;
use thiserror::Error;

/// Correlates an outbound request or subscription with the events it produces.
pub type Ticket = u64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("relay is not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub remember: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: u16,
    pub profile_id: String,
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindLobbyRequest {
    pub lobby_type: String,
    pub rating: u32,
    pub max_steps: u32,
    pub algo: MatchAlgorithm,
    pub filter_json: serde_json::Map<String, serde_json::Value>,
    pub other_user_cx_ids: Vec<String>,
    pub settings: serde_json::Map<String, serde_json::Value>,
    pub is_ready: bool,
    pub extra_json: MemberExtra,
    pub team_code: String,
}

impl FindLobbyRequest {
    pub fn new(config: &SessionConfig, color_index: usize) -> Self {
        Self {
            lobby_type: config.game_type.clone(),
            rating: config.rating,
            max_steps: config.max_steps,
            algo: config.algorithm.clone(),
            filter_json: serde_json::Map::new(),
            other_user_cx_ids: Vec::new(),
            settings: serde_json::Map::new(),
            is_ready: false,
            extra_json: MemberExtra::with_color(color_index),
            team_code: config.team_code.clone(),
        }
    }
}

/// Asynchronous outcomes and pushes from the remote services.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    AuthCompleted {
        ticket: Ticket,
        response: AuthResponse,
    },
    ChannelEnabled {
        ticket: Ticket,
    },
    /// Enabling failed, or the channel dropped after being enabled.
    ChannelFailed {
        ticket: Ticket,
        reason: String,
    },
    LobbyEvent {
        ticket: Ticket,
        event: LobbyEvent,
    },
    LobbyRequestCompleted {
        ticket: Ticket,
        status: u16,
    },
    RelayConnected {
        ticket: Ticket,
    },
    /// Connecting failed, or an established relay connection was lost.
    RelayFailed {
        ticket: Ticket,
        reason: String,
    },
    RelayMessage {
        ticket: Ticket,
        peer: PeerId,
        payload: Vec<u8>,
    },
    RelaySystem {
        ticket: Ticket,
        payload: Vec<u8>,
    },
}

impl GatewayEvent {
    pub fn ticket(&self) -> Ticket {
        match self {
            GatewayEvent::AuthCompleted { ticket, .. }
            | GatewayEvent::ChannelEnabled { ticket }
            | GatewayEvent::ChannelFailed { ticket, .. }
            | GatewayEvent::LobbyEvent { ticket, .. }
            | GatewayEvent::LobbyRequestCompleted { ticket, .. }
            | GatewayEvent::RelayConnected { ticket }
            | GatewayEvent::RelayFailed { ticket, .. }
            | GatewayEvent::RelayMessage { ticket, .. }
            | GatewayEvent::RelaySystem { ticket, .. } => *ticket,
        }
    }

    pub fn subscription(&self) -> Subscription {
        match self {
            GatewayEvent::AuthCompleted { .. } => Subscription::Auth,
            GatewayEvent::ChannelEnabled { .. } | GatewayEvent::ChannelFailed { .. } => {
                Subscription::Channel
            }
            GatewayEvent::LobbyEvent { .. } => Subscription::LobbyEvents,
            GatewayEvent::LobbyRequestCompleted { .. } => Subscription::LobbyRequest,
            GatewayEvent::RelayConnected { .. }
            | GatewayEvent::RelayFailed { .. }
            | GatewayEvent::RelayMessage { .. }
            | GatewayEvent::RelaySystem { .. } => Subscription::Relay,
        }
    }
}

pub trait AuthService {
    /// Completes with [`GatewayEvent::AuthCompleted`].
    fn authenticate(&mut self, ticket: Ticket, credentials: &Credentials);

    fn update_display_name(&mut self, name: &str);

    /// Drops any session state held by the service client.
    fn reset_communication(&mut self);
}

pub trait RealtimeChannel {
    /// Completes with [`GatewayEvent::ChannelEnabled`] or
    /// [`GatewayEvent::ChannelFailed`]; the latter may also fire later if the
    /// channel drops.
    fn enable(&mut self, ticket: Ticket);

    /// Idempotent.
    fn disable(&mut self);

    /// Lobby pushes arrive as [`GatewayEvent::LobbyEvent`].
    fn subscribe_lobby_events(&mut self, ticket: Ticket);

    /// Idempotent.
    fn unsubscribe_all(&mut self);
}

pub trait LobbyService {
    /// Completes with [`GatewayEvent::LobbyRequestCompleted`]. The lobby
    /// itself is announced through lobby events.
    fn find_or_create_lobby(&mut self, ticket: Ticket, request: &FindLobbyRequest);

    fn update_ready(&mut self, lobby_id: &str, is_ready: bool, extra: &MemberExtra);
}

pub trait RelayTransport {
    /// Completes with [`GatewayEvent::RelayConnected`] or
    /// [`GatewayEvent::RelayFailed`].
    fn connect(&mut self, ticket: Ticket, descriptor: &ServerDescriptor);

    /// Idempotent.
    fn disconnect(&mut self);

    /// Registers for peer messages and system messages under `ticket`.
    fn subscribe(&mut self, ticket: Ticket);

    /// Idempotent.
    fn unsubscribe(&mut self);

    fn send(
        &mut self,
        payload: &[u8],
        target: Target,
        delivery: Delivery,
    ) -> Result<(), GatewayError>;

    fn profile_id_for_peer(&self, peer: PeerId) -> Option<String>;
}

/// The full capability set the session controller needs.
pub trait Gateway: AuthService + RealtimeChannel + LobbyService + RelayTransport {}

impl<T> Gateway for T where T: AuthService + RealtimeChannel + LobbyService + RelayTransport {}

/// Local key-value preferences.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    Auth,
    Channel,
    LobbyEvents,
    LobbyRequest,
    Relay,
}

/// Live tickets, at most one per subscription kind.
#[derive(Debug)]
pub struct SubscriptionSet {
    next_ticket: Ticket,
    active: HashMap<Subscription, Ticket>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self {
            next_ticket: 1,
            active: HashMap::new(),
        }
    }

    /// Issues a fresh ticket for `kind`, superseding any earlier one.
    pub fn open(&mut self, kind: Subscription) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.active.insert(kind, ticket);
        ticket
    }

    pub fn ticket(&self, kind: Subscription) -> Option<Ticket> {
        self.active.get(&kind).copied()
    }

    pub fn is_active(&self, kind: Subscription) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn accepts(&self, event: &GatewayEvent) -> bool {
        self.ticket(event.subscription()) == Some(event.ticket())
    }

    /// Returns false if nothing of that kind was open.
    pub fn close(&mut self, kind: Subscription) -> bool {
        self.active.remove(&kind).is_some()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_are_never_reused() {
        let mut set = SubscriptionSet::new();
        let first = set.open(Subscription::Auth);
        set.close(Subscription::Auth);
        let second = set.open(Subscription::Auth);
        let third = set.open(Subscription::Relay);

        assert_ne!(first, second);
        assert!(third > second);
    }

    #[test]
    fn test_reopen_supersedes_previous_ticket() {
        let mut set = SubscriptionSet::new();
        let old = set.open(Subscription::Relay);
        let new = set.open(Subscription::Relay);

        assert!(!set.accepts(&GatewayEvent::RelayConnected { ticket: old }));
        assert!(set.accepts(&GatewayEvent::RelayConnected { ticket: new }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_accepts_checks_kind() {
        let mut set = SubscriptionSet::new();
        let ticket = set.open(Subscription::Channel);

        assert!(set.accepts(&GatewayEvent::ChannelEnabled { ticket }));
        assert!(!set.accepts(&GatewayEvent::LobbyRequestCompleted {
            ticket,
            status: 200
        }));
    }

    #[test]
    fn test_close_and_clear_are_idempotent() {
        let mut set = SubscriptionSet::new();
        set.open(Subscription::Channel);
        set.open(Subscription::LobbyEvents);

        assert!(set.close(Subscription::Channel));
        assert!(!set.close(Subscription::Channel));

        set.clear();
        set.clear();
        assert!(set.is_empty());
        assert!(!set.is_active(Subscription::LobbyEvents));
    }

    #[test]
    fn test_find_lobby_request_shape() {
        let request = FindLobbyRequest::new(&SessionConfig::default(), 3);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["lobbyType"], "CursorParty");
        assert_eq!(value["rating"], 0);
        assert_eq!(value["maxSteps"], 1);
        assert_eq!(value["algo"]["strategy"], "ranged-absolute");
        assert_eq!(value["isReady"], false);
        assert_eq!(value["extraJson"]["colorIndex"], 3);
        assert_eq!(value["teamCode"], "all");
    }
}
