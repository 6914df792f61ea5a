//! Text presentation of session snapshots

use crate::state::{Screen, SessionState};
use shared::{color_for, DEFAULT_COLOR_INDEX};
use std::fmt::Write;

/// What a frame shows, minus the fast-changing parts (pointers and effects).
#[derive(Debug, Clone, PartialEq)]
struct FrameKey {
    screen: Screen,
    alert: Option<String>,
    roster: Vec<(String, bool, Option<usize>)>,
}

impl FrameKey {
    fn of(state: &SessionState) -> Self {
        let roster = state
            .lobby
            .iter()
            .flat_map(|lobby| lobby.members.iter())
            .map(|m| (m.profile_id.clone(), m.is_ready, m.extra.color_index))
            .collect();

        Self {
            screen: state.screen,
            alert: state.alert.clone(),
            roster,
        }
    }
}

/// Prints a frame whenever the screen, the alert or the lobby roster changes.
#[derive(Debug, Default)]
pub struct Renderer {
    last: Option<FrameKey>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the frame to print, or `None` if nothing visible changed.
    pub fn render(&mut self, state: &SessionState) -> Option<String> {
        let key = FrameKey::of(state);
        if self.last.as_ref() == Some(&key) {
            return None;
        }
        self.last = Some(key);
        Some(describe(state))
    }
}

pub fn describe(state: &SessionState) -> String {
    let mut out = String::new();

    if let Some(alert) = &state.alert {
        let _ = writeln!(out, "!! {}", alert);
    }

    match state.screen {
        Screen::Login => {
            out.push_str("Relay Server Test App.\n");
            out.push_str("Log in with: login <user> [password]");
        }
        Screen::LoggingIn => out.push_str("Logging in..."),
        Screen::MainMenu => {
            out.push_str("Relay Server Test App.\n");
            if let Some(user) = &state.user {
                let _ = writeln!(out, "Welcome {}", user.name);
            }
            out.push_str("Type 'play' to find a lobby");
        }
        Screen::JoiningLobby => out.push_str("Joining..."),
        Screen::Lobby => {
            out.push_str("Relay Server Test App.\nLOBBY\n");
            write_roster(&mut out, state);
            out.push_str("Pick a color with 'color <0-7>', then 'ready'");
        }
        Screen::Connecting => {
            out.push_str("Joining Match...\n");
            out.push_str(
                "If this takes a while, don't worry. \
                 This means a new server is warming up just for you.",
            );
        }
        Screen::Game => {
            out.push_str("Relay Server Test App.\n");
            out.push_str("Move mouse around and click to create shockwaves.\n");
            write_roster(&mut out, state);
            let _ = write!(out, "{} shockwave(s) on screen", state.effects.len());
        }
    }

    out
}

fn write_roster(out: &mut String, state: &SessionState) {
    let Some(lobby) = &state.lobby else {
        return;
    };
    let me = state.user.as_ref().map(|user| user.id.as_str());

    for member in &lobby.members {
        let color = color_for(member.extra.color_index.unwrap_or(DEFAULT_COLOR_INDEX));
        let name = member.name.as_deref().unwrap_or(&member.profile_id);
        let marker = if Some(member.profile_id.as_str()) == me {
            " (you)"
        } else {
            ""
        };
        let ready = if member.is_ready { "ready" } else { "not ready" };
        let pos = match member.pos {
            Some(pos) => format!(" at ({:.0}, {:.0})", pos.x, pos.y),
            None => String::new(),
        };

        let _ = writeln!(out, "  {} {}{} [{}]{}", color.hex(), name, marker, ready, pos);
    }
}
