//! # Relay Session Client Library
//!
//! Client-side session logic for a small multiplayer cursor party: log in,
//! find or create a lobby, pick a color, ready up, follow the lobby through
//! relay room allocation, then exchange pointer moves and shockwaves with the
//! other members over the relay server.
//!
//! ## Architecture Overview
//!
//! Everything revolves around one [`controller::SessionController`] that owns
//! the [`state::SessionState`]. It runs on a single task inside
//! [`network::Client::run`] and handles three inputs strictly one at a time:
//!
//! - **Intents** from the presentation layer (login, play, color, ready,
//!   back, pointer move, click)
//! - **Gateway events**: completions and pushes from the backend services,
//!   each tagged with the ticket of the subscription that caused it
//! - **Effect expiries** from the shockwave timers
//!
//! The presentation layer never mutates state. It sends intents and reads
//! whole snapshots from a `watch` channel.
//!
//! ### Tickets Instead of Callbacks
//! Backend services answer asynchronously and may still answer after the
//! session they belonged to was torn down. Every outstanding request or
//! subscription is registered in a [`gateway::SubscriptionSet`]; events whose
//! ticket is no longer live are dropped before they reach any handler.
//!
//! ### Fail-Reset
//! Any service failure tears down every subscription and connection, resets
//! communication and returns to the login screen with an alert.
//!
//! ## Module Organization
//!
//! - `config`: session defaults (game type, match algorithm, effect lifetime)
//! - `controller`: the screen state machine
//! - `effects`: shockwave lifetimes and their expiry timers
//! - `error`: session failures and their user-facing alerts
//! - `gateway`: service traits, gateway events and ticket bookkeeping
//! - `input`: terminal command parsing
//! - `loopback`: in-process services for the demo and end-to-end tests
//! - `network`: the runtime loop
//! - `preferences`: local key/value preference stores
//! - `rendering`: text presentation of snapshots
//! - `state`: the session data model
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::config::SessionConfig;
//! use client::controller::Intent;
//! use client::loopback::{LoopbackConfig, LoopbackGateway};
//! use client::network::Client;
//! use client::preferences::MemoryPreferences;
//!
//! # async fn demo() {
//! let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
//! let gateway = LoopbackGateway::new(event_tx, LoopbackConfig::default());
//! let (mut client, handle) = Client::new(
//!     gateway,
//!     MemoryPreferences::new(),
//!     SessionConfig::default(),
//!     event_rx,
//! );
//!
//! handle
//!     .intents
//!     .send(Intent::Login {
//!         username: "alice".to_string(),
//!         password: "pw".to_string(),
//!     })
//!     .ok();
//! drop(handle);
//!
//! client.run().await;
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod effects;
pub mod error;
pub mod gateway;
pub mod input;
pub mod loopback;
pub mod network;
pub mod preferences;
pub mod rendering;
pub mod state;
