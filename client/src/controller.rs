//! Session controller: the screen state machine
//!
//! The controller is the only writer of [`SessionState`]. It consumes three
//! kinds of input, one at a time:
//! - user intents from the presentation layer ([`Intent`])
//! - asynchronous gateway outcomes and pushes ([`GatewayEvent`])
//! - effect expiries from the [`EffectManager`]
//!
//! After each input the new state is published on a `watch` channel, so the
//! presentation layer only ever sees whole, read-only snapshots.
//!
//! Events whose ticket no longer matches a live subscription are dropped
//! before they reach any handler. That is what keeps late completions from a
//! torn-down lobby or relay session from leaking into the next one, whatever
//! order the three event streams interleave in.

use crate::config::SessionConfig;
use crate::effects::EffectManager;
use crate::error::SessionError;
use crate::gateway::{
    AuthResponse, Credentials, FindLobbyRequest, Gateway, GatewayEvent, PreferenceStore,
    Subscription, SubscriptionSet,
};
use crate::state::{EffectId, Screen, SessionState, User};
use log::{debug, error, info, warn};
use shared::{
    color_for, is_valid_color_index, Color, LobbyEvent, LobbyOperation, MemberExtra, PeerId,
    Position, RelayMessage, ServerDescriptor, SystemMessage, STATUS_OK,
};
use tokio::sync::watch;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Login { username: String, password: String },
    Play,
    SetColor(usize),
    SetReady,
    Back,
    PointerMove(Position),
    Click(Position),
}

pub struct SessionController<G, P> {
    state: SessionState,
    gateway: G,
    preferences: P,
    config: SessionConfig,
    subscriptions: SubscriptionSet,
    effects: EffectManager,
    snapshots: watch::Sender<SessionState>,

    pending_username: Option<String>,
    relay_connected: bool,
    last_error: Option<SessionError>,
}

impl<G: Gateway, P: PreferenceStore> SessionController<G, P> {
    pub fn new(gateway: G, preferences: P, config: SessionConfig, effects: EffectManager) -> Self {
        let state = SessionState::new();
        let (snapshots, _) = watch::channel(state.clone());

        Self {
            state,
            gateway,
            preferences,
            config,
            subscriptions: SubscriptionSet::new(),
            effects,
            snapshots,
            pending_username: None,
            relay_connected: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshots(&self) -> watch::Receiver<SessionState> {
        self.snapshots.subscribe()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn preferences(&self) -> &P {
        &self.preferences
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn is_relay_connected(&self) -> bool {
        self.relay_connected
    }

    pub fn handle_intent(&mut self, intent: Intent) {
        let screen = self.state.screen;

        match intent {
            Intent::Login { username, password } if screen == Screen::Login => {
                self.login(username, password)
            }
            Intent::Play if screen == Screen::MainMenu => self.play(),
            Intent::SetColor(index) if screen == Screen::Lobby => self.set_color(index),
            Intent::SetReady if screen == Screen::Lobby => self.set_ready(),
            Intent::Back if screen.in_lobby_session() => self.close_session(),
            Intent::PointerMove(pos) if screen.shows_lobby() => self.pointer_move(pos),
            Intent::Click(pos) if screen.shows_lobby() => self.click(pos),
            other => {
                debug!("Ignoring {:?} on screen {}", other, screen);
                return;
            }
        }

        self.publish();
    }

    pub fn handle_event(&mut self, event: GatewayEvent) {
        if !self.subscriptions.accepts(&event) {
            debug!(
                "Dropping stale {:?} event (ticket {})",
                event.subscription(),
                event.ticket()
            );
            return;
        }

        match event {
            GatewayEvent::AuthCompleted { response, .. } => self.on_auth_completed(response),
            GatewayEvent::ChannelEnabled { .. } => self.on_channel_enabled(),
            GatewayEvent::ChannelFailed { reason, .. } => self.on_channel_failed(reason),
            GatewayEvent::LobbyEvent { event, .. } => self.on_lobby_event(event),
            GatewayEvent::LobbyRequestCompleted { status, .. } => {
                self.on_lobby_request_completed(status)
            }
            GatewayEvent::RelayConnected { .. } => self.on_relay_connected(),
            GatewayEvent::RelayFailed { reason, .. } => {
                self.fail(SessionError::RelayConnectFailure(reason))
            }
            GatewayEvent::RelayMessage { peer, payload, .. } => {
                self.on_relay_message(peer, &payload)
            }
            GatewayEvent::RelaySystem { payload, .. } => self.on_relay_system(&payload),
        }

        self.publish();
    }

    /// Removes an expired effect. Safe to call for effects that are already gone.
    pub fn expire_effect(&mut self, id: EffectId) {
        self.effects.expired(id);

        if self.state.remove_effect(id) {
            self.publish();
        } else {
            debug!("Effect {} already cleared", id);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.clone());
    }

    // ----- intents -----

    fn login(&mut self, username: String, password: String) {
        info!("Logging in as '{}'", username);

        self.state.alert = None;
        self.state.screen = Screen::LoggingIn;

        let credentials = Credentials {
            username: username.clone(),
            password,
            remember: self.config.remember_me,
        };
        self.pending_username = Some(username);

        let ticket = self.subscriptions.open(Subscription::Auth);
        self.gateway.authenticate(ticket, &credentials);
    }

    fn play(&mut self) {
        info!("Enabling real-time channel");

        self.state.screen = Screen::JoiningLobby;
        let ticket = self.subscriptions.open(Subscription::Channel);
        self.gateway.enable(ticket);
    }

    fn set_color(&mut self, index: usize) {
        if !is_valid_color_index(index) {
            warn!("Ignoring invalid color index {}", index);
            return;
        }

        if let Some(user) = self.state.user.as_mut() {
            user.color_index = index;
        }
        self.preferences
            .set(&self.config.color_preference_key, &index.to_string());
        self.push_ready_state();
    }

    fn set_ready(&mut self) {
        if let Some(user) = self.state.user.as_mut() {
            user.is_ready = true;
        }
        self.push_ready_state();
    }

    fn pointer_move(&mut self, pos: Position) {
        let Some(user_id) = self.state.user.as_ref().map(|user| user.id.clone()) else {
            return;
        };

        if let Some(member) = self.state.member_mut(&user_id) {
            member.pos = Some(pos);
        }

        if self.relay_connected {
            self.send_relay(RelayMessage::Move(pos));
        }
    }

    fn click(&mut self, pos: Position) {
        let Some(color_index) = self.state.user.as_ref().map(|user| user.color_index) else {
            return;
        };

        if self.relay_connected {
            self.send_relay(RelayMessage::Shockwave(pos));
        }

        self.spawn_effect(pos, color_for(color_index));
    }

    // ----- gateway events -----

    fn on_auth_completed(&mut self, response: AuthResponse) {
        self.subscriptions.close(Subscription::Auth);

        if response.status != STATUS_OK {
            self.fail(SessionError::AuthFailure {
                status: response.status,
            });
            return;
        }

        // The login name is not necessarily the player name, so a typed
        // username is pushed upstream and takes precedence.
        let username = self.pending_username.take().unwrap_or_default();
        let name = if username.is_empty() {
            response.player_name
        } else {
            self.gateway.update_display_name(&username);
            username
        };

        let user = User {
            id: response.profile_id,
            name,
            color_index: self.stored_color_index(),
            is_ready: false,
        };
        info!("Logged in as {} ({})", user.name, user.id);

        self.state.user = Some(user);
        self.state.screen = Screen::MainMenu;
    }

    fn on_channel_enabled(&mut self) {
        if self.state.screen != Screen::JoiningLobby {
            debug!("Channel enabled outside of lobby join, ignoring");
            return;
        }
        let Some(color_index) = self.state.user.as_ref().map(|user| user.color_index) else {
            return;
        };
        info!("Real-time channel enabled, looking for a lobby");

        let lobby_ticket = self.subscriptions.open(Subscription::LobbyEvents);
        self.gateway.subscribe_lobby_events(lobby_ticket);

        let request = FindLobbyRequest::new(&self.config, color_index);
        let request_ticket = self.subscriptions.open(Subscription::LobbyRequest);
        self.gateway.find_or_create_lobby(request_ticket, &request);
    }

    fn on_channel_failed(&mut self, reason: String) {
        if self.subscriptions.is_active(Subscription::LobbyEvents) {
            self.fail(SessionError::ChannelDisconnect(reason));
        } else {
            self.fail(SessionError::ChannelEnableFailure(reason));
        }
    }

    fn on_lobby_request_completed(&mut self, status: u16) {
        self.subscriptions.close(Subscription::LobbyRequest);

        if status != STATUS_OK {
            self.fail(SessionError::MatchmakingRequestFailure { status });
        }
    }

    fn on_lobby_event(&mut self, event: LobbyEvent) {
        debug!(
            "Lobby event {:?} for {}",
            event.operation, event.data.lobby_id
        );

        if let Some(snapshot) = event.data.lobby.clone() {
            self.state.apply_snapshot(&event.data.lobby_id, snapshot);

            if self.state.screen == Screen::JoiningLobby {
                self.state.screen = Screen::Lobby;
            }
        }

        match event.operation {
            LobbyOperation::Starting => {
                info!("Lobby starting, waiting for server");
                self.state.screen = Screen::Connecting;
            }
            LobbyOperation::RoomReady => match ServerDescriptor::from_room_ready(&event.data) {
                Some(descriptor) => {
                    info!("Server ready at {}", descriptor);
                    self.state.server = Some(descriptor);
                }
                None => warn!("ROOM_READY without usable connection data"),
            },
            LobbyOperation::Disbanded => {
                let reason_code = event.disband_reason_code();
                if reason_code == Some(self.config.room_ready_reason_code) {
                    self.connect_relay();
                } else {
                    warn!("{}", SessionError::LobbyDisbandedAbnormally { reason_code });
                    self.close_session();
                }
            }
            _ => {}
        }
    }

    fn on_relay_connected(&mut self) {
        info!("Connected to relay server");
        self.relay_connected = true;
        self.state.screen = Screen::Game;
    }

    fn on_relay_message(&mut self, peer: PeerId, payload: &[u8]) {
        let Some(profile_id) = self.gateway.profile_id_for_peer(peer) else {
            warn!("Relay message from unknown peer {}", peer);
            return;
        };

        let message = match RelayMessage::decode(payload) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Ignoring unknown relay operation from {}", profile_id);
                return;
            }
            Err(e) => {
                warn!("Undecodable relay message from {}: {}", profile_id, e);
                return;
            }
        };

        match message {
            RelayMessage::Move(pos) => match self.state.member_mut(&profile_id) {
                Some(member) => member.pos = Some(pos),
                None => debug!("Move from {} who is not in the lobby", profile_id),
            },
            RelayMessage::Shockwave(pos) => {
                let color_index = self
                    .state
                    .lobby
                    .as_ref()
                    .and_then(|lobby| lobby.member(&profile_id))
                    .and_then(|member| member.extra.color_index)
                    .unwrap_or(self.config.default_color_index);
                self.spawn_effect(pos, color_for(color_index));
            }
        }
    }

    fn on_relay_system(&mut self, payload: &[u8]) {
        match SystemMessage::decode(payload) {
            Ok(SystemMessage::Disconnect { profile_id }) => {
                info!("{} left the game", profile_id);
                if let Some(member) = self.state.member_mut(&profile_id) {
                    member.pos = None;
                }
            }
            Ok(SystemMessage::Connect { profile_id }) => {
                info!("{} joined the game", profile_id);
            }
            Ok(SystemMessage::Other) => debug!("Ignoring relay system message"),
            Err(e) => warn!("Undecodable relay system message: {}", e),
        }
    }

    // ----- helpers -----

    fn stored_color_index(&self) -> usize {
        self.preferences
            .get(&self.config.color_preference_key)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|index| is_valid_color_index(*index))
            .unwrap_or(self.config.default_color_index)
    }

    /// Ready state and color are pushed together; the server answers with a
    /// fresh snapshot and drives any screen change.
    fn push_ready_state(&mut self) {
        let (Some(user), Some(lobby)) = (self.state.user.as_ref(), self.state.lobby.as_ref())
        else {
            return;
        };

        let extra = MemberExtra::with_color(user.color_index);
        self.gateway
            .update_ready(&lobby.lobby_id, user.is_ready, &extra);
    }

    fn connect_relay(&mut self) {
        let Some(descriptor) = self.state.server.clone() else {
            self.fail(SessionError::MissingServerDescriptor);
            return;
        };

        if self.subscriptions.is_active(Subscription::Relay) {
            warn!("Relay connection already in progress, ignoring repeated room ready");
            return;
        }

        info!("Connecting to relay server {}", descriptor);
        let ticket = self.subscriptions.open(Subscription::Relay);
        self.gateway.subscribe(ticket);
        self.gateway.connect(ticket, &descriptor);
    }

    fn send_relay(&mut self, message: RelayMessage) {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode {} message: {}", message.op(), e);
                return;
            }
        };

        if let Err(e) = self
            .gateway
            .send(&payload, message.target(), message.delivery())
        {
            warn!("Failed to send {} message: {}", message.op(), e);
        }
    }

    fn spawn_effect(&mut self, pos: Position, color: Color) {
        let effect = self.effects.spawn(pos, color);
        self.state.add_effect(effect);
    }

    /// Releases every live subscription and connection. Safe to repeat.
    fn tear_down(&mut self) {
        self.gateway.unsubscribe();
        self.gateway.disconnect();
        self.gateway.unsubscribe_all();
        self.gateway.disable();
        self.subscriptions.clear();
        self.relay_connected = false;
    }

    /// Ends the lobby or game and goes back to the main menu.
    fn close_session(&mut self) {
        info!("Leaving lobby session");
        self.tear_down();

        self.state.lobby = None;
        self.state.server = None;
        if let Some(user) = self.state.user.as_mut() {
            user.is_ready = false;
        }
        self.state.screen = Screen::MainMenu;
    }

    /// Fail-reset: everything goes, back to the login screen.
    fn fail(&mut self, err: SessionError) {
        debug_assert!(err.is_terminal());
        error!("Session failed: {}", err);

        self.tear_down();
        self.gateway.reset_communication();
        self.pending_username = None;

        self.state = SessionState {
            alert: Some(err.to_string()),
            ..SessionState::default()
        };
        self.last_error = Some(err);
    }
}
