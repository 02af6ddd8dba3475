//! Wire protocol shared between the snake session client and the game server.
//!
//! Every message is JSON, internally tagged by a `"type"` field. Server frames
//! may arrive as text or as binary frames carrying UTF-8 JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_WIDTH: u32 = 100;
pub const BOARD_HEIGHT: u32 = 50;
/// Ticks a dead snake has to buy a revive before it is out for good.
pub const REVIVE_WINDOW_TICKS: u64 = 100;

pub type UserId = String;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Step from one body cell to the next one behind it.
    ///
    /// Body segments trail away from the head, so a snake heading `Up`
    /// (towards smaller `y` on screen) grows its tail towards larger `y`.
    pub fn trailing_step(self) -> (i64, i64) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (1, 0),
            Direction::Right => (-1, 0),
        }
    }
}

/// Power-up variants without their target, used for intents and pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerUpKind {
    ExtraLife,
    AddLength,
    ShrinkOpponent,
    FreezeOpponent,
    Revive,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 5] = [
        PowerUpKind::ExtraLife,
        PowerUpKind::AddLength,
        PowerUpKind::ShrinkOpponent,
        PowerUpKind::FreezeOpponent,
        PowerUpKind::Revive,
    ];

    /// Display price in points. The server charges on its own terms.
    pub fn cost(self) -> u32 {
        match self {
            PowerUpKind::ExtraLife => 5,
            PowerUpKind::AddLength => 1,
            PowerUpKind::ShrinkOpponent => 3,
            PowerUpKind::FreezeOpponent => 3,
            PowerUpKind::Revive => 10,
        }
    }

    pub fn is_targeted(self) -> bool {
        matches!(
            self,
            PowerUpKind::ShrinkOpponent | PowerUpKind::FreezeOpponent
        )
    }

    /// Builds the wire value. Targeted kinds need `opponent`, the rest ignore it.
    pub fn with_opponent(self, opponent: Option<UserId>) -> Option<PowerUp> {
        match (self, opponent) {
            (PowerUpKind::ExtraLife, _) => Some(PowerUp::ExtraLife),
            (PowerUpKind::AddLength, _) => Some(PowerUp::AddLength),
            (PowerUpKind::Revive, _) => Some(PowerUp::Revive),
            (PowerUpKind::ShrinkOpponent, Some(opponent)) => {
                Some(PowerUp::ShrinkOpponent { opponent })
            }
            (PowerUpKind::FreezeOpponent, Some(opponent)) => {
                Some(PowerUp::FreezeOpponent { opponent })
            }
            (_, None) => None,
        }
    }
}

impl fmt::Display for PowerUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PowerUpKind::ExtraLife => "ExtraLife",
            PowerUpKind::AddLength => "AddLength",
            PowerUpKind::ShrinkOpponent => "ShrinkOpponent",
            PowerUpKind::FreezeOpponent => "FreezeOpponent",
            PowerUpKind::Revive => "Revive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PowerUp {
    ExtraLife,
    AddLength,
    ShrinkOpponent { opponent: UserId },
    FreezeOpponent { opponent: UserId },
    Revive,
}

impl PowerUp {
    pub fn kind(&self) -> PowerUpKind {
        match self {
            PowerUp::ExtraLife => PowerUpKind::ExtraLife,
            PowerUp::AddLength => PowerUpKind::AddLength,
            PowerUp::ShrinkOpponent { .. } => PowerUpKind::ShrinkOpponent,
            PowerUp::FreezeOpponent { .. } => PowerUpKind::FreezeOpponent,
            PowerUp::Revive => PowerUpKind::Revive,
        }
    }

    pub fn opponent(&self) -> Option<&str> {
        match self {
            PowerUp::ShrinkOpponent { opponent } | PowerUp::FreezeOpponent { opponent } => {
                Some(opponent)
            }
            _ => None,
        }
    }

    pub fn cost(&self) -> u32 {
        self.kind().cost()
    }
}

/// A snake as the server reports it in each `GameState`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SentSnake {
    Alive {
        user_id: UserId,
        head: (u32, u32),
        head_direction: Direction,
        blocks: Vec<(Direction, u32)>,
        invulnerable: bool,
        frozen: bool,
        has_extra_life: bool,
    },
    Dead {
        user_id: UserId,
        revive_left: u64,
    },
}

impl SentSnake {
    pub fn user_id(&self) -> &str {
        match self {
            SentSnake::Alive { user_id, .. } | SentSnake::Dead { user_id, .. } => user_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReadyStatus {
    pub user_id: UserId,
    pub ready: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AmountSpent {
    pub user_id: UserId,
    pub amount_spent: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecentPowerUp {
    pub user_id: UserId,
    pub power_up: PowerUp,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Authenticated,
    ReadyStatus {
        status: Vec<ReadyStatus>,
    },
    StartGame,
    GameOver {
        winner: UserId,
        amounts_spent: Vec<AmountSpent>,
    },
    GameState {
        apples: Vec<(u32, u32)>,
        snakes: Vec<SentSnake>,
        just_ate_apple: Vec<UserId>,
        recent_power_ups: Vec<RecentPowerUp>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Authenticated => "Authenticated",
            ServerMessage::ReadyStatus { .. } => "ReadyStatus",
            ServerMessage::StartGame => "StartGame",
            ServerMessage::GameOver { .. } => "GameOver",
            ServerMessage::GameState { .. } => "GameState",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Authenticate { access_token: String, game_id: String },
    UsePowerUp { power_up: PowerUp },
    SetDirection { direction: Direction },
    SetReady { ready: bool },
}

pub fn decode_server_message(bytes: &[u8]) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use serde_json::json;

    #[test]
    fn test_direction_wire_format() {
        let encoded = serde_json::to_value(Direction::Left).unwrap();
        assert_eq!(encoded, json!({"type": "Left"}));

        let decoded: Direction = serde_json::from_value(json!({"type": "Down"})).unwrap();
        assert_eq!(decoded, Direction::Down);
    }

    #[test]
    fn test_trailing_step_points_away_from_heading() {
        assert_eq!(Direction::Up.trailing_step(), (0, 1));
        assert_eq!(Direction::Down.trailing_step(), (0, -1));
        assert_eq!(Direction::Left.trailing_step(), (1, 0));
        assert_eq!(Direction::Right.trailing_step(), (-1, 0));
    }

    #[test]
    fn test_authenticate_wire_format() {
        let message = ClientMessage::Authenticate {
            access_token: "token".to_string(),
            game_id: "game-1".to_string(),
        };
        let encoded: serde_json::Value =
            serde_json::from_str(&encode_client_message(&message).unwrap()).unwrap();

        assert_eq!(
            encoded,
            json!({"type": "Authenticate", "access_token": "token", "game_id": "game-1"})
        );
    }

    #[test]
    fn test_targeted_power_up_wire_format() {
        let message = ClientMessage::UsePowerUp {
            power_up: PowerUp::FreezeOpponent {
                opponent: "u2".to_string(),
            },
        };
        let encoded = serde_json::to_value(&message).unwrap();

        assert_eq!(
            encoded,
            json!({
                "type": "UsePowerUp",
                "power_up": {"type": "FreezeOpponent", "opponent": "u2"}
            })
        );
    }

    #[test]
    fn test_set_direction_and_ready_wire_format() {
        let direction = serde_json::to_value(ClientMessage::SetDirection {
            direction: Direction::Up,
        })
        .unwrap();
        assert_eq!(
            direction,
            json!({"type": "SetDirection", "direction": {"type": "Up"}})
        );

        let ready = serde_json::to_value(ClientMessage::SetReady { ready: true }).unwrap();
        assert_eq!(ready, json!({"type": "SetReady", "ready": true}));
    }

    #[test]
    fn test_decode_game_state() {
        let raw = json!({
            "type": "GameState",
            "apples": [[3, 4], [10, 20]],
            "snakes": [
                {
                    "type": "Alive",
                    "user_id": "u1",
                    "head": [5, 6],
                    "head_direction": {"type": "Up"},
                    "blocks": [[{"type": "Up"}, 3], [{"type": "Left"}, 2]],
                    "invulnerable": false,
                    "frozen": true,
                    "has_extra_life": false
                },
                {"type": "Dead", "user_id": "u2", "revive_left": 7}
            ],
            "just_ate_apple": ["u1"],
            "recent_power_ups": [
                {"user_id": "u1", "power_up": {"type": "ShrinkOpponent", "opponent": "u2"}}
            ]
        })
        .to_string();

        let message = decode_server_message(raw.as_bytes()).unwrap();
        match message {
            ServerMessage::GameState {
                apples,
                snakes,
                just_ate_apple,
                recent_power_ups,
            } => {
                assert_eq!(apples, vec![(3, 4), (10, 20)]);
                assert_eq!(snakes.len(), 2);
                assert_eq!(just_ate_apple, vec!["u1".to_string()]);
                assert_eq!(recent_power_ups[0].power_up.opponent(), Some("u2"));

                match &snakes[0] {
                    SentSnake::Alive {
                        head,
                        blocks,
                        frozen,
                        ..
                    } => {
                        assert_eq!(*head, (5, 6));
                        assert_eq!(blocks, &vec![(Direction::Up, 3), (Direction::Left, 2)]);
                        assert!(*frozen);
                    }
                    _ => panic!("Expected an alive snake"),
                }
                assert_eq!(
                    snakes[1],
                    SentSnake::Dead {
                        user_id: "u2".to_string(),
                        revive_left: 7
                    }
                );
            }
            _ => panic!("Wrong message type after decoding"),
        }
    }

    #[test]
    fn test_decode_game_over_with_integer_amounts() {
        let raw = r#"{"type":"GameOver","winner":"u2","amounts_spent":[{"user_id":"u1","amount_spent":12},{"user_id":"u2","amount_spent":5.5}]}"#;

        match decode_server_message(raw.as_bytes()).unwrap() {
            ServerMessage::GameOver {
                winner,
                amounts_spent,
            } => {
                assert_eq!(winner, "u2");
                assert_approx_eq!(amounts_spent[0].amount_spent, 12.0);
                assert_approx_eq!(amounts_spent[1].amount_spent, 5.5);
            }
            _ => panic!("Wrong message type after decoding"),
        }
    }

    #[test]
    fn test_decode_unit_messages() {
        assert_eq!(
            decode_server_message(br#"{"type":"Authenticated"}"#).unwrap(),
            ServerMessage::Authenticated
        );
        assert_eq!(
            decode_server_message(br#"{"type":"StartGame"}"#).unwrap(),
            ServerMessage::StartGame
        );
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed_frames() {
        assert!(decode_server_message(br#"{"type":"Teleport"}"#).is_err());
        assert!(decode_server_message(br#"{"type":"ReadyStatus"}"#).is_err());
        assert!(decode_server_message(b"not json").is_err());
    }

    #[test]
    fn test_power_up_costs() {
        assert_eq!(PowerUpKind::ExtraLife.cost(), 5);
        assert_eq!(PowerUpKind::ShrinkOpponent.cost(), 3);
        assert_eq!(PowerUpKind::FreezeOpponent.cost(), 3);
        assert_eq!(PowerUpKind::AddLength.cost(), 1);
        assert_eq!(PowerUpKind::Revive.cost(), 10);

        let power_up = PowerUp::ShrinkOpponent {
            opponent: "u9".to_string(),
        };
        assert_eq!(power_up.cost(), 3);
        assert_eq!(power_up.kind(), PowerUpKind::ShrinkOpponent);
    }

    #[test]
    fn test_with_opponent_requires_target_for_targeted_kinds() {
        assert_eq!(PowerUpKind::FreezeOpponent.with_opponent(None), None);
        assert_eq!(
            PowerUpKind::ShrinkOpponent.with_opponent(Some("u2".to_string())),
            Some(PowerUp::ShrinkOpponent {
                opponent: "u2".to_string()
            })
        );
        assert_eq!(
            PowerUpKind::Revive.with_opponent(None),
            Some(PowerUp::Revive)
        );
        assert!(PowerUpKind::ALL
            .iter()
            .filter(|kind| kind.is_targeted())
            .eq([PowerUpKind::ShrinkOpponent, PowerUpKind::FreezeOpponent].iter()));
    }
}
