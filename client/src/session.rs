//! Session state machine for one client's participation in one game.
//!
//! The machine moves `Lobby -> Running -> Over` and never back. Each server
//! message is applied whole before the next one is looked at, and every
//! applied change is published as an owned [`SessionSnapshot`] on a watch
//! channel for the render side to pick up.

use crate::roster::Roster;
use log::{debug, trace, warn};
use rand::Rng;
use shared::{
    AmountSpent, ClientMessage, Direction, PowerUpKind, ReadyStatus, RecentPowerUp, SentSnake,
    ServerMessage, UserId, REVIVE_WINDOW_TICKS,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Lobby,
    Running,
    Over,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lobby => "lobby",
            Phase::Running => "running",
            Phase::Over => "over",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Liveness {
    Alive {
        head: (u32, u32),
        heading: Direction,
        body: Vec<(Direction, u32)>,
        invulnerable: bool,
        frozen: bool,
        has_extra_life: bool,
    },
    Dead {
        revive_left: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub user_id: UserId,
    pub ordinal: usize,
    pub liveness: Liveness,
}

impl PlayerState {
    fn from_sent(snake: SentSnake, ordinal: usize) -> Self {
        match snake {
            SentSnake::Alive {
                user_id,
                head,
                head_direction,
                blocks,
                invulnerable,
                frozen,
                has_extra_life,
            } => Self {
                user_id,
                ordinal,
                liveness: Liveness::Alive {
                    head,
                    heading: head_direction,
                    body: blocks,
                    invulnerable,
                    frozen,
                    has_extra_life,
                },
            },
            SentSnake::Dead {
                user_id,
                revive_left,
            } => Self {
                user_id,
                ordinal,
                liveness: Liveness::Dead { revive_left },
            },
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.liveness, Liveness::Alive { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub apples: Vec<(u32, u32)>,
    pub players: Vec<PlayerState>,
    pub just_ate_apple: Vec<UserId>,
}

impl WorldSnapshot {
    pub fn player(&self, user_id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|player| player.user_id == user_id)
    }
}

/// Remaining revive budget of the local player while it is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadCountdown {
    pub revive_left: u64,
    pub revive_total: u64,
}

impl DeadCountdown {
    pub fn new(revive_left: u64) -> Self {
        Self {
            revive_left,
            revive_total: REVIVE_WINDOW_TICKS,
        }
    }

    pub fn fraction(&self) -> f32 {
        if self.revive_total == 0 {
            return 0.0;
        }
        (self.revive_left as f32 / self.revive_total as f32).clamp(0.0, 1.0)
    }

    pub fn can_revive(&self) -> bool {
        self.revive_left > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub winner: UserId,
    pub amounts_spent: Vec<AmountSpent>,
}

impl GameResult {
    pub fn amount_spent_by(&self, user_id: &str) -> Option<f64> {
        self.amounts_spent
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.amount_spent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Message only has meaning at the connection level.
    ConnectionLevel,
    /// Message arrived in a phase where it has no meaning.
    WrongPhase {
        message: &'static str,
        phase: Phase,
    },
    /// The session already ended; everything after the result is dropped.
    AlreadyOver { message: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    PhaseChanged { from: Phase, to: Phase },
    Ignored(IgnoreReason),
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Transition::Ignored(_))
    }
}

/// Something the local player wants to do, before it is shaped into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetDirection(Direction),
    ToggleReady,
    UsePowerUp {
        kind: PowerUpKind,
        opponent: Option<UserId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("the session is over")]
    SessionOver,

    #[error("power-up needs an opponent")]
    MissingOpponent,

    #[error("there is no opponent to target")]
    NoOpponents,

    #[error("unknown opponent `{0}`")]
    UnknownOpponent(UserId),

    #[error("cannot target yourself")]
    SelfTarget,

    #[error("{0} does not take an opponent")]
    UnexpectedOpponent(PowerUpKind),
}

/// Owned view of the session handed to the render side.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub local_user: UserId,
    pub roster: Arc<Roster>,
    pub phase: Phase,
    pub readiness: Vec<ReadyStatus>,
    pub world: WorldSnapshot,
    pub power_up_log: Vec<RecentPowerUp>,
    pub dead_countdown: Option<DeadCountdown>,
    pub result: Option<GameResult>,
}

impl SessionSnapshot {
    pub fn local_ready(&self) -> bool {
        local_ready(&self.readiness, &self.local_user)
    }
}

fn local_ready(readiness: &[ReadyStatus], local_user: &str) -> bool {
    readiness
        .iter()
        .find(|status| status.user_id == local_user)
        .map(|status| status.ready)
        .unwrap_or(false)
}

pub struct SessionStateMachine {
    local_user: UserId,
    roster: Arc<Roster>,
    phase: Phase,
    readiness: Vec<ReadyStatus>,
    world: WorldSnapshot,
    power_up_log: Vec<RecentPowerUp>,
    dead_countdown: Option<DeadCountdown>,
    result: Option<GameResult>,
    snapshot_tx: watch::Sender<Arc<SessionSnapshot>>,
}

impl SessionStateMachine {
    pub fn new(local_user: impl Into<UserId>, roster: Roster) -> Self {
        let local_user = local_user.into();
        let roster = Arc::new(roster);
        let initial = SessionSnapshot {
            local_user: local_user.clone(),
            roster: Arc::clone(&roster),
            phase: Phase::Lobby,
            readiness: Vec::new(),
            world: WorldSnapshot::default(),
            power_up_log: Vec::new(),
            dead_countdown: None,
            result: None,
        };
        let (snapshot_tx, _) = watch::channel(Arc::new(initial));

        Self {
            local_user,
            roster,
            phase: Phase::Lobby,
            readiness: Vec::new(),
            world: WorldSnapshot::default(),
            power_up_log: Vec::new(),
            dead_countdown: None,
            result: None,
            snapshot_tx,
        }
    }

    /// Receives a fresh snapshot after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Readiness rows in the order the server sent them. Empty outside the lobby.
    pub fn readiness(&self) -> &[ReadyStatus] {
        &self.readiness
    }

    pub fn local_ready(&self) -> bool {
        local_ready(&self.readiness, &self.local_user)
    }

    pub fn world(&self) -> &WorldSnapshot {
        &self.world
    }

    pub fn power_up_log(&self) -> &[RecentPowerUp] {
        &self.power_up_log
    }

    pub fn dead_countdown(&self) -> Option<DeadCountdown> {
        self.dead_countdown
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            local_user: self.local_user.clone(),
            roster: Arc::clone(&self.roster),
            phase: self.phase,
            readiness: self.readiness.clone(),
            world: self.world.clone(),
            power_up_log: self.power_up_log.clone(),
            dead_countdown: self.dead_countdown,
            result: self.result.clone(),
        }
    }

    /// Applies one server message in full.
    pub fn apply(&mut self, message: ServerMessage) -> Transition {
        let kind = message.kind();
        let transition = match message {
            ServerMessage::Authenticated => Transition::Ignored(IgnoreReason::ConnectionLevel),
            _ if self.phase == Phase::Over => {
                Transition::Ignored(IgnoreReason::AlreadyOver { message: kind })
            }
            ServerMessage::ReadyStatus { status } => self.apply_ready_status(status),
            ServerMessage::StartGame => self.apply_start_game(),
            ServerMessage::GameState {
                apples,
                snakes,
                just_ate_apple,
                recent_power_ups,
            } => self.apply_game_state(apples, snakes, just_ate_apple, recent_power_ups),
            ServerMessage::GameOver {
                winner,
                amounts_spent,
            } => self.apply_game_over(winner, amounts_spent),
        };

        match transition {
            Transition::Ignored(IgnoreReason::ConnectionLevel) => {
                trace!("{} has no effect on the session", kind);
            }
            Transition::Ignored(IgnoreReason::AlreadyOver { message }) => {
                debug!("Dropping {} after game over", message);
            }
            Transition::Ignored(IgnoreReason::WrongPhase { message, phase }) => {
                warn!("Dropping out-of-order {} during {} phase", message, phase);
            }
            Transition::PhaseChanged { from, to } => {
                debug!("Session phase {} -> {}", from, to);
                self.publish();
            }
            Transition::Applied => self.publish(),
        }

        transition
    }

    fn apply_ready_status(&mut self, status: Vec<ReadyStatus>) -> Transition {
        if self.phase != Phase::Lobby {
            return self.wrong_phase("ReadyStatus");
        }

        self.readiness = status
            .into_iter()
            .filter(|entry| {
                let known = self.roster.contains(&entry.user_id);
                if !known {
                    warn!("Ignoring readiness of unknown user {}", entry.user_id);
                }
                known
            })
            .collect();

        Transition::Applied
    }

    fn apply_start_game(&mut self) -> Transition {
        if self.phase != Phase::Lobby {
            return self.wrong_phase("StartGame");
        }

        self.readiness.clear();
        self.phase = Phase::Running;
        Transition::PhaseChanged {
            from: Phase::Lobby,
            to: Phase::Running,
        }
    }

    fn apply_game_state(
        &mut self,
        apples: Vec<(u32, u32)>,
        snakes: Vec<SentSnake>,
        just_ate_apple: Vec<UserId>,
        recent_power_ups: Vec<RecentPowerUp>,
    ) -> Transition {
        if self.phase != Phase::Running {
            return self.wrong_phase("GameState");
        }

        let mut seen = HashSet::new();
        let mut players = Vec::with_capacity(snakes.len());
        for snake in snakes {
            let Some(ordinal) = self.roster.ordinal(snake.user_id()) else {
                warn!("Ignoring snake of unknown user {}", snake.user_id());
                continue;
            };
            if !seen.insert(snake.user_id().to_string()) {
                warn!("Ignoring duplicate snake for {}", snake.user_id());
                continue;
            }
            players.push(PlayerState::from_sent(snake, ordinal));
        }

        let just_ate_apple = just_ate_apple
            .into_iter()
            .filter(|user_id| self.roster.contains(user_id))
            .collect();

        let roster = Arc::clone(&self.roster);
        let new_events = recent_power_ups.into_iter().filter(|event| {
            let actor_known = roster.contains(&event.user_id);
            let target_known = event
                .power_up
                .opponent()
                .map_or(true, |opponent| roster.contains(opponent));
            if !(actor_known && target_known) {
                warn!(
                    "Ignoring {} power-up referencing an unknown user",
                    event.power_up.kind()
                );
            }
            actor_known && target_known
        });
        self.power_up_log.extend(new_events);

        if let Some(local) = players.iter().find(|p| p.user_id == self.local_user) {
            self.dead_countdown = match local.liveness {
                Liveness::Dead { revive_left } => Some(DeadCountdown::new(revive_left)),
                Liveness::Alive { .. } => None,
            };
        }

        self.world = WorldSnapshot {
            apples,
            players,
            just_ate_apple,
        };

        Transition::Applied
    }

    fn apply_game_over(&mut self, winner: UserId, amounts_spent: Vec<AmountSpent>) -> Transition {
        if self.phase != Phase::Running {
            return self.wrong_phase("GameOver");
        }

        if !self.roster.contains(&winner) {
            warn!("Game over names unknown winner {}", winner);
        }

        self.result = Some(GameResult {
            winner,
            amounts_spent,
        });
        self.dead_countdown = None;
        self.phase = Phase::Over;
        Transition::PhaseChanged {
            from: Phase::Running,
            to: Phase::Over,
        }
    }

    fn wrong_phase(&self, message: &'static str) -> Transition {
        Transition::Ignored(IgnoreReason::WrongPhase {
            message,
            phase: self.phase,
        })
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.snapshot()));
    }

    /// Shapes an intent into the command to send. Only the shape is checked;
    /// whether the move is legal is for the server to decide.
    pub fn command_for<R: Rng + ?Sized>(
        &self,
        intent: Intent,
        rng: &mut R,
    ) -> Result<ClientMessage, IntentError> {
        if self.phase == Phase::Over {
            return Err(IntentError::SessionOver);
        }

        match intent {
            Intent::SetDirection(direction) => Ok(ClientMessage::SetDirection { direction }),
            Intent::ToggleReady => Ok(ClientMessage::SetReady {
                ready: !self.local_ready(),
            }),
            Intent::UsePowerUp { kind, opponent } => {
                let opponent = match (kind.is_targeted(), opponent) {
                    (false, Some(_)) => return Err(IntentError::UnexpectedOpponent(kind)),
                    (false, None) => None,
                    (true, Some(opponent)) => {
                        if opponent == self.local_user {
                            return Err(IntentError::SelfTarget);
                        }
                        if !self.roster.contains(&opponent) {
                            return Err(IntentError::UnknownOpponent(opponent));
                        }
                        Some(opponent)
                    }
                    (true, None) => Some(
                        self.roster
                            .random_opponent(&self.local_user, rng)
                            .cloned()
                            .ok_or(IntentError::NoOpponents)?,
                    ),
                };

                let power_up = kind
                    .with_opponent(opponent)
                    .ok_or(IntentError::MissingOpponent)?;
                Ok(ClientMessage::UsePowerUp { power_up })
            }
        }
    }
}
