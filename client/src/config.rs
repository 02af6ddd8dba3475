//! Command line configuration and the validated parameters of one session

use clap::Parser;
use shared::UserId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid participant `{0}`, expected `user_id=display name`")]
    InvalidParticipant(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("unsupported server url `{0}`, expected ws:// or wss://")]
    UnsupportedUrl(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Snake session client", long_about = None)]
pub struct Args {
    /// Game server WebSocket endpoint
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:3001/game")]
    pub url: String,

    /// Identifier of the game to join
    #[arg(short = 'g', long)]
    pub game_id: String,

    /// Identifier of the local user
    #[arg(short = 'i', long)]
    pub user_id: String,

    /// Bearer credential for the game server
    #[arg(short = 't', long, env = "SNAKE_ACCESS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Participant as `user_id=display name`, repeat once per player
    #[arg(short = 'p', long = "player")]
    pub players: Vec<String>,

    /// Seconds to wait for the server to acknowledge authentication
    #[arg(long, default_value = "10")]
    pub auth_timeout: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "1000")]
    pub width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "640")]
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: UserId,
    pub display_name: String,
}

/// Everything needed to open a connection and seed the session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub url: String,
    pub game_id: String,
    pub user_id: UserId,
    pub access_token: String,
    pub participants: Vec<Participant>,
    pub auth_timeout: Duration,
}

impl SessionParams {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if !(args.url.starts_with("ws://") || args.url.starts_with("wss://")) {
            return Err(ConfigError::UnsupportedUrl(args.url.clone()));
        }
        if args.game_id.trim().is_empty() {
            return Err(ConfigError::Empty("game id"));
        }
        if args.user_id.trim().is_empty() {
            return Err(ConfigError::Empty("user id"));
        }
        if args.token.is_empty() {
            return Err(ConfigError::Empty("access token"));
        }

        let participants = args
            .players
            .iter()
            .map(|raw| parse_participant(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            url: args.url.clone(),
            game_id: args.game_id.clone(),
            user_id: args.user_id.clone(),
            access_token: args.token.clone(),
            participants,
            auth_timeout: Duration::from_secs(args.auth_timeout),
        })
    }
}

/// Parses `id=name`. A bare `id` uses the id as its display name.
pub fn parse_participant(raw: &str) -> Result<Participant, ConfigError> {
    let (user_id, display_name) = match raw.split_once('=') {
        Some((id, name)) => (id.trim(), name.trim()),
        None => (raw.trim(), raw.trim()),
    };

    if user_id.is_empty() || display_name.is_empty() {
        return Err(ConfigError::InvalidParticipant(raw.to_string()));
    }

    Ok(Participant {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
    })
}
