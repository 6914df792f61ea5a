//! Session state: the single record the controller owns and the presentation
//! layer receives snapshots of.

use shared::{Color, LobbySnapshot, MemberExtra, Position, ServerDescriptor};
use std::fmt;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Screen {
    #[default]
    Login,
    LoggingIn,
    MainMenu,
    JoiningLobby,
    Lobby,
    Connecting,
    Game,
}

impl Screen {
    /// Screens during which a lobby subscription is live.
    pub fn in_lobby_session(self) -> bool {
        matches!(
            self,
            Screen::JoiningLobby | Screen::Lobby | Screen::Connecting | Screen::Game
        )
    }

    /// Screens where the lobby snapshot is on display and pointer intents apply.
    pub fn shows_lobby(self) -> bool {
        matches!(self, Screen::Lobby | Screen::Connecting | Screen::Game)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Login => "login",
            Screen::LoggingIn => "loggingIn",
            Screen::MainMenu => "mainMenu",
            Screen::JoiningLobby => "joiningLobby",
            Screen::Lobby => "lobby",
            Screen::Connecting => "connecting",
            Screen::Game => "game",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub color_index: usize,
    pub is_ready: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub profile_id: String,
    pub name: Option<String>,
    pub is_ready: bool,
    pub extra: MemberExtra,
    /// Last known pointer position; `None` until seen or after a disconnect.
    pub pos: Option<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lobby {
    pub lobby_id: String,
    pub members: Vec<Member>,
}

impl Lobby {
    /// Builds the lobby from a fresh snapshot. Membership and metadata come
    /// from the snapshot; live positions are carried over from `previous` for
    /// members that are still listed.
    pub fn from_snapshot(
        lobby_id: impl Into<String>,
        snapshot: LobbySnapshot,
        previous: Option<&Lobby>,
    ) -> Self {
        let members = snapshot
            .members
            .into_iter()
            .map(|member| {
                let pos = previous
                    .and_then(|lobby| lobby.member(&member.profile_id))
                    .and_then(|old| old.pos);

                Member {
                    profile_id: member.profile_id,
                    name: member.name,
                    is_ready: member.is_ready,
                    extra: member.extra,
                    pos,
                }
            })
            .collect();

        Self {
            lobby_id: lobby_id.into(),
            members,
        }
    }

    pub fn member(&self, profile_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.profile_id == profile_id)
    }

    pub fn member_mut(&mut self, profile_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.profile_id == profile_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A shockwave on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: EffectId,
    pub pos: Position,
    pub color: Color,
    pub spawned_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub screen: Screen,
    pub user: Option<User>,
    pub lobby: Option<Lobby>,
    pub server: Option<ServerDescriptor>,
    pub effects: Vec<Effect>,
    /// Message shown after the last fail-reset.
    pub alert: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the lobby from a snapshot, preserving live positions.
    pub fn apply_snapshot(&mut self, lobby_id: &str, snapshot: LobbySnapshot) {
        let lobby = Lobby::from_snapshot(lobby_id, snapshot, self.lobby.as_ref());
        self.lobby = Some(lobby);
    }

    pub fn member_mut(&mut self, profile_id: &str) -> Option<&mut Member> {
        self.lobby.as_mut()?.member_mut(profile_id)
    }

    pub fn add_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Removes by id. Returns false if the effect was already gone.
    pub fn remove_effect(&mut self, id: EffectId) -> bool {
        match self.effects.iter().position(|effect| effect.id == id) {
            Some(index) => {
                self.effects.remove(index);
                true
            }
            None => false,
        }
    }
}
