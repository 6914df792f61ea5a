//! In-process stand-in for the authentication, lobby and relay services
//!
//! Every call answers through the gateway event channel after a simulated
//! network latency, in the same order the real services use:
//! find-or-create answers with the request status followed by a lobby
//! snapshot, and readying up runs the full STARTING → ROOM_READY → DISBANDED
//! allocation sequence. An optional bot peer joins each lobby, readies up
//! immediately and wanders around the relay room once connected.

use crate::gateway::{
    AuthResponse, AuthService, Credentials, FindLobbyRequest, GatewayError, GatewayEvent,
    LobbyService, RealtimeChannel, RelayTransport, Ticket,
};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ConnectData, Delivery, DisbandReason, LobbyEvent, LobbyEventData, LobbyOperation,
    LobbySnapshot, MemberExtra, MemberSnapshot, PeerId, PortMap, Position, RelayMessage,
    ServerDescriptor, SystemMessage, Target, COLORS, ROOM_READY_REASON_CODE, STATUS_OK,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant};

pub const LOCAL_PEER_ID: PeerId = 0;
pub const BOT_PEER_ID: PeerId = 1;
pub const BOT_PROFILE_ID: &str = "bot-1";
pub const STATUS_FORBIDDEN: u16 = 403;

/// How many outbound relay messages `sent` remembers.
pub const SENT_HISTORY: usize = 64;

const RELAY_ADDRESS: &str = "127.0.0.1";
const RELAY_WS_PORT: u16 = 9000;
const WORLD_WIDTH: f32 = 800.0;
const WORLD_HEIGHT: f32 = 600.0;

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Delay before each simulated response.
    pub latency: Duration,
    pub bot: bool,
    pub bot_interval: Duration,
    /// The bot disconnects from the relay after this many messages.
    pub bot_moves: Option<u32>,
    pub seed: Option<u64>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(50),
            bot: true,
            bot_interval: Duration::from_millis(100),
            bot_moves: None,
            seed: None,
        }
    }
}

/// Delivers delayed answers strictly in the order they were posted.
struct Outbox {
    queue: mpsc::UnboundedSender<(Instant, GatewayEvent)>,
    task: JoinHandle<()>,
}

impl Outbox {
    fn spawn(events: mpsc::UnboundedSender<GatewayEvent>) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel::<(Instant, GatewayEvent)>();

        let task = tokio::spawn(async move {
            while let Some((deadline, event)) = pending.recv().await {
                sleep_until(deadline).await;
                if events.send(event).is_err() {
                    break;
                }
            }
        });

        Self { queue, task }
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct LoopbackLobby {
    lobby_id: String,
    members: Vec<MemberSnapshot>,
    passcode: String,
}

pub struct LoopbackGateway {
    events: mpsc::UnboundedSender<GatewayEvent>,
    config: LoopbackConfig,
    rng: StdRng,

    profile_id: Option<String>,
    display_name: Option<String>,

    channel_enabled: bool,
    lobby_ticket: Option<Ticket>,
    lobby: Option<LoopbackLobby>,
    next_lobby_id: u32,

    relay_ticket: Option<Ticket>,
    relay_connected: bool,
    peers: HashMap<PeerId, String>,
    sent: Vec<(RelayMessage, Delivery)>,

    outbox: Outbox,
    bot_task: Option<JoinHandle<()>>,
}

impl LoopbackGateway {
    pub fn new(events: mpsc::UnboundedSender<GatewayEvent>, config: LoopbackConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let outbox = Outbox::spawn(events.clone());

        Self {
            events,
            config,
            rng,
            profile_id: None,
            display_name: None,
            channel_enabled: false,
            lobby_ticket: None,
            lobby: None,
            next_lobby_id: 1,
            relay_ticket: None,
            relay_connected: false,
            peers: HashMap::new(),
            sent: Vec::new(),
            outbox,
            bot_task: None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn is_channel_enabled(&self) -> bool {
        self.channel_enabled
    }

    pub fn is_relay_connected(&self) -> bool {
        self.relay_connected
    }

    /// The most recent messages the local player has sent into the relay
    /// room, oldest first, at most [`SENT_HISTORY`] of them.
    pub fn sent(&self) -> &[(RelayMessage, Delivery)] {
        &self.sent
    }

    /// Posts `events` in order, each one latency period after the previous.
    fn post(&mut self, events: Vec<GatewayEvent>) {
        let mut deadline = Instant::now();
        for event in events {
            deadline += self.config.latency;
            if self.outbox.queue.send((deadline, event)).is_err() {
                debug!("Loopback outbox closed, dropping answer");
                return;
            }
        }
    }

    /// A lobby event carrying the current membership.
    fn snapshot_event(&self, operation: LobbyOperation) -> Option<GatewayEvent> {
        let ticket = self.lobby_ticket?;
        let lobby = self.lobby.as_ref()?;

        let mut data = LobbyEventData::new(lobby.lobby_id.clone());
        data.lobby = Some(LobbySnapshot {
            members: lobby.members.clone(),
        });

        Some(GatewayEvent::LobbyEvent {
            ticket,
            event: LobbyEvent { operation, data },
        })
    }

    fn allocation_sequence(&self) -> Vec<GatewayEvent> {
        let (Some(ticket), Some(lobby)) = (self.lobby_ticket, self.lobby.as_ref()) else {
            return Vec::new();
        };

        let starting = LobbyEvent {
            operation: LobbyOperation::Starting,
            data: LobbyEventData::new(lobby.lobby_id.clone()),
        };

        let mut ready = LobbyEventData::new(lobby.lobby_id.clone());
        ready.connect_data = Some(ConnectData {
            address: RELAY_ADDRESS.to_string(),
            ports: PortMap {
                ws: Some(RELAY_WS_PORT),
                tcp: None,
                udp: None,
            },
        });
        ready.passcode = Some(lobby.passcode.clone());

        let mut disbanded = LobbyEventData::new(lobby.lobby_id.clone());
        disbanded.reason = Some(DisbandReason {
            code: ROOM_READY_REASON_CODE,
            desc: Some("Room is ready".to_string()),
        });

        [
            starting,
            LobbyEvent {
                operation: LobbyOperation::RoomReady,
                data: ready,
            },
            LobbyEvent {
                operation: LobbyOperation::Disbanded,
                data: disbanded,
            },
        ]
        .into_iter()
        .map(|event| GatewayEvent::LobbyEvent { ticket, event })
        .collect()
    }

    fn spawn_bot(&mut self, ticket: Ticket) {
        let tx = self.events.clone();
        let period = self.config.bot_interval;
        let limit = self.config.bot_moves;
        // First move lands one period after the connect completion.
        let start = Instant::now() + self.config.latency + period;
        let mut rng = StdRng::seed_from_u64(self.rng.gen());

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            let mut sent = 0u32;

            loop {
                ticker.tick().await;

                if limit.is_some_and(|limit| sent >= limit) {
                    let message = SystemMessage::Disconnect {
                        profile_id: BOT_PROFILE_ID.to_string(),
                    };
                    if let Ok(payload) = message.encode() {
                        let _ = tx.send(GatewayEvent::RelaySystem { ticket, payload });
                    }
                    break;
                }

                let pos = Position::new(
                    rng.gen_range(0.0..WORLD_WIDTH),
                    rng.gen_range(0.0..WORLD_HEIGHT),
                );
                let message = if rng.gen_bool(0.1) {
                    RelayMessage::Shockwave(pos)
                } else {
                    RelayMessage::Move(pos)
                };

                let Ok(payload) = message.encode() else {
                    break;
                };
                let event = GatewayEvent::RelayMessage {
                    ticket,
                    peer: BOT_PEER_ID,
                    payload,
                };
                if tx.send(event).is_err() {
                    break;
                }
                sent += 1;
            }
        });

        self.stop_bot();
        self.bot_task = Some(handle);
    }

    fn stop_bot(&mut self) {
        if let Some(task) = self.bot_task.take() {
            task.abort();
        }
    }
}

impl AuthService for LoopbackGateway {
    fn authenticate(&mut self, ticket: Ticket, credentials: &Credentials) {
        let status = if credentials.password.is_empty() {
            STATUS_FORBIDDEN
        } else {
            STATUS_OK
        };

        let player_name = self
            .display_name
            .clone()
            .unwrap_or_else(|| credentials.username.clone());
        let profile_id = format!("profile-{}", credentials.username);
        if status == STATUS_OK {
            self.profile_id = Some(profile_id.clone());
        }

        debug!("Loopback auth for '{}': {}", credentials.username, status);
        self.post(vec![GatewayEvent::AuthCompleted {
            ticket,
            response: AuthResponse {
                status,
                profile_id,
                player_name,
            },
        }]);
    }

    fn update_display_name(&mut self, name: &str) {
        self.display_name = Some(name.to_string());
    }

    fn reset_communication(&mut self) {
        self.stop_bot();
        self.outbox = Outbox::spawn(self.events.clone());
        self.profile_id = None;
        self.channel_enabled = false;
        self.lobby_ticket = None;
        self.lobby = None;
        self.relay_ticket = None;
        self.relay_connected = false;
        self.peers.clear();
    }
}

impl RealtimeChannel for LoopbackGateway {
    fn enable(&mut self, ticket: Ticket) {
        let event = if self.profile_id.is_some() {
            self.channel_enabled = true;
            GatewayEvent::ChannelEnabled { ticket }
        } else {
            GatewayEvent::ChannelFailed {
                ticket,
                reason: "not authenticated".to_string(),
            }
        };
        self.post(vec![event]);
    }

    fn disable(&mut self) {
        self.channel_enabled = false;
    }

    fn subscribe_lobby_events(&mut self, ticket: Ticket) {
        self.lobby_ticket = Some(ticket);
    }

    fn unsubscribe_all(&mut self) {
        self.lobby_ticket = None;
        self.lobby = None;
    }
}

impl LobbyService for LoopbackGateway {
    fn find_or_create_lobby(&mut self, ticket: Ticket, request: &FindLobbyRequest) {
        let Some(profile_id) = self.profile_id.clone() else {
            self.post(vec![GatewayEvent::LobbyRequestCompleted {
                ticket,
                status: STATUS_FORBIDDEN,
            }]);
            return;
        };

        let mut members = vec![MemberSnapshot {
            profile_id,
            name: self.display_name.clone(),
            is_ready: request.is_ready,
            extra: request.extra_json.clone(),
        }];
        if self.config.bot {
            members.push(MemberSnapshot {
                profile_id: BOT_PROFILE_ID.to_string(),
                name: Some("bot".to_string()),
                is_ready: true,
                extra: MemberExtra::with_color(self.rng.gen_range(0..COLORS.len())),
            });
        }

        let lobby_id = format!("{}-{}", request.lobby_type, self.next_lobby_id);
        self.next_lobby_id += 1;
        info!("Loopback lobby {} created", lobby_id);

        self.lobby = Some(LoopbackLobby {
            lobby_id,
            members,
            passcode: format!("{:08x}", self.rng.gen::<u32>()),
        });

        let mut events = vec![GatewayEvent::LobbyRequestCompleted {
            ticket,
            status: STATUS_OK,
        }];
        events.extend(self.snapshot_event(LobbyOperation::MemberJoin));
        self.post(events);
    }

    fn update_ready(&mut self, lobby_id: &str, is_ready: bool, extra: &MemberExtra) {
        let profile_id = self.profile_id.clone();
        let Some(lobby) = self.lobby.as_mut().filter(|lobby| lobby.lobby_id == lobby_id) else {
            debug!("Ready update for unknown lobby {}", lobby_id);
            return;
        };

        if let Some(member) = lobby
            .members
            .iter_mut()
            .find(|member| Some(&member.profile_id) == profile_id.as_ref())
        {
            member.is_ready = is_ready;
            member.extra = extra.clone();
        }
        let everyone_ready = lobby.members.iter().all(|member| member.is_ready);

        let mut events: Vec<GatewayEvent> = self
            .snapshot_event(LobbyOperation::MemberUpdate)
            .into_iter()
            .collect();
        if everyone_ready {
            events.extend(self.allocation_sequence());
        }
        self.post(events);
    }
}

impl RelayTransport for LoopbackGateway {
    fn connect(&mut self, ticket: Ticket, descriptor: &ServerDescriptor) {
        let expected = self.lobby.as_ref().map(|lobby| lobby.passcode.as_str());
        if expected != Some(descriptor.passcode.as_str()) {
            self.post(vec![GatewayEvent::RelayFailed {
                ticket,
                reason: "invalid passcode".to_string(),
            }]);
            return;
        }

        self.relay_connected = true;
        self.peers.clear();
        if let Some(profile_id) = self.profile_id.clone() {
            self.peers.insert(LOCAL_PEER_ID, profile_id);
        }
        if self.config.bot {
            self.peers.insert(BOT_PEER_ID, BOT_PROFILE_ID.to_string());
        }

        info!("Loopback relay connected to {}", descriptor);
        self.post(vec![GatewayEvent::RelayConnected { ticket }]);

        if self.config.bot {
            if let Some(relay_ticket) = self.relay_ticket {
                self.spawn_bot(relay_ticket);
            }
        }
    }

    fn disconnect(&mut self) {
        self.stop_bot();
        self.relay_connected = false;
        self.peers.clear();
    }

    fn subscribe(&mut self, ticket: Ticket) {
        self.relay_ticket = Some(ticket);
    }

    fn unsubscribe(&mut self) {
        self.stop_bot();
        self.relay_ticket = None;
    }

    fn send(
        &mut self,
        payload: &[u8],
        target: Target,
        delivery: Delivery,
    ) -> Result<(), GatewayError> {
        if !self.relay_connected {
            return Err(GatewayError::NotConnected);
        }

        let message = RelayMessage::decode(payload)
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .ok_or_else(|| GatewayError::Transport("unknown operation".to_string()))?;
        debug!(
            "Loopback relay {:?} <- {} ({:?})",
            target,
            message.op(),
            delivery
        );
        if self.sent.len() == SENT_HISTORY {
            self.sent.remove(0);
        }
        self.sent.push((message, delivery));
        Ok(())
    }

    fn profile_id_for_peer(&self, peer: PeerId) -> Option<String> {
        self.peers.get(&peer).cloned()
    }
}

impl Drop for LoopbackGateway {
    fn drop(&mut self) {
        self.stop_bot();
    }
}
