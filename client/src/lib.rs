//! # Snake Session Client Library
//!
//! Client side of one multiplayer snake game: it connects to the game server,
//! authenticates, follows the server's lobby/running/over lifecycle and turns
//! local key presses into commands. The server is authoritative for the world;
//! the client never simulates movement itself and only mirrors the latest
//! snapshot it received.
//!
//! ## Module Organization
//!
//! ### Connection (`connection`, `transport`)
//! Owns the WebSocket for the session in a background task. Authentication is
//! always the first frame; commands are held until the server acknowledges it.
//! Decoded server messages are delivered in arrival order.
//!
//! ### Session (`session`, `roster`)
//! The state machine that applies server messages to the session phase,
//! readiness, world snapshot, power-up log and final result. It also shapes
//! local intents into wire commands, picking a random opponent when a targeted
//! power-up is used without one.
//!
//! ### Input and Rendering (`input`, `rendering`)
//! Keyboard mapping per phase and a macroquad renderer that draws whatever the
//! latest session snapshot contains.
//!
//! ### Glue (`network`, `config`)
//! `network::Client` ties a connection to a state machine for the frame loop;
//! `config` parses command line flags into validated session parameters.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::{Args, SessionParams};
//! use client::network::Client;
//! use client::session::Intent;
//! use clap::Parser;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let params = SessionParams::from_args(&Args::parse())?;
//! let mut client = Client::open(&params);
//!
//! while client.next_event().await {
//!     println!("phase: {}", client.session().phase());
//!     client.submit(Intent::ToggleReady)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod input;
pub mod network;
pub mod rendering;
pub mod roster;
pub mod session;
pub mod transport;
