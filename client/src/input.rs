//! Keyboard input translated into session intents

use crate::session::{DeadCountdown, Intent, Phase};
use log::debug;
use macroquad::prelude::*;
use shared::{Direction, PowerUpKind};
use std::collections::HashSet;

/// Turns held keys into intents for the current phase.
///
/// A key counts once when it goes down; holding it does not repeat.
pub struct InputManager {
    held: HashSet<KeyCode>,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
        }
    }

    /// Samples the keyboard for this frame.
    pub fn poll(&mut self, phase: Phase, countdown: Option<DeadCountdown>) -> Vec<Intent> {
        let pressed = self.newly_pressed(get_keys_down());
        let intents = intents_for_keys(&pressed, phase, countdown);
        if !intents.is_empty() {
            debug!("Keys {:?} gave {:?}", pressed, intents);
        }
        intents
    }

    /// Keys down now that were not down on the previous frame, in a stable order.
    pub fn newly_pressed(&mut self, down: HashSet<KeyCode>) -> Vec<KeyCode> {
        let mut pressed: Vec<KeyCode> = down.difference(&self.held).copied().collect();
        pressed.sort_by_key(|key| *key as u16);
        self.held = down;
        pressed
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn direction_for_key(key: KeyCode) -> Option<Direction> {
    match key {
        KeyCode::Up | KeyCode::W => Some(Direction::Up),
        KeyCode::Down | KeyCode::S => Some(Direction::Down),
        KeyCode::Left | KeyCode::A => Some(Direction::Left),
        KeyCode::Right | KeyCode::D => Some(Direction::Right),
        _ => None,
    }
}

pub fn power_up_for_key(key: KeyCode) -> Option<PowerUpKind> {
    match key {
        KeyCode::Key1 => Some(PowerUpKind::ExtraLife),
        KeyCode::Key2 => Some(PowerUpKind::AddLength),
        KeyCode::Key3 => Some(PowerUpKind::ShrinkOpponent),
        KeyCode::Key4 => Some(PowerUpKind::FreezeOpponent),
        KeyCode::Key5 | KeyCode::Space => Some(PowerUpKind::Revive),
        _ => None,
    }
}

/// Maps pressed keys to intents that make sense in `phase`.
///
/// Targeted power-ups are emitted without an opponent so the session picks
/// one at random. Revive is only offered while the revive window is open.
pub fn intents_for_keys(
    pressed: &[KeyCode],
    phase: Phase,
    countdown: Option<DeadCountdown>,
) -> Vec<Intent> {
    let mut intents = Vec::new();

    for &key in pressed {
        match phase {
            Phase::Lobby => {
                if key == KeyCode::R {
                    intents.push(Intent::ToggleReady);
                }
            }
            Phase::Running => {
                if let Some(direction) = direction_for_key(key) {
                    intents.push(Intent::SetDirection(direction));
                } else if let Some(kind) = power_up_for_key(key) {
                    if kind == PowerUpKind::Revive
                        && !countdown.map_or(false, |c| c.can_revive())
                    {
                        continue;
                    }
                    intents.push(Intent::UsePowerUp {
                        kind,
                        opponent: None,
                    });
                }
            }
            Phase::Over => {}
        }
    }

    intents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(input_manager.held.is_empty());
    }

    #[test]
    fn test_held_key_counts_once() {
        let mut input_manager = InputManager::new();

        let down: HashSet<KeyCode> = [KeyCode::Up].into_iter().collect();
        assert_eq!(input_manager.newly_pressed(down.clone()), vec![KeyCode::Up]);
        assert!(input_manager.newly_pressed(down).is_empty());

        let down: HashSet<KeyCode> = [KeyCode::Up, KeyCode::R].into_iter().collect();
        assert_eq!(input_manager.newly_pressed(down), vec![KeyCode::R]);

        assert!(input_manager.newly_pressed(HashSet::new()).is_empty());
        let down: HashSet<KeyCode> = [KeyCode::Up].into_iter().collect();
        assert_eq!(input_manager.newly_pressed(down), vec![KeyCode::Up]);
    }

    #[test]
    fn test_arrows_and_wasd_steer() {
        assert_eq!(direction_for_key(KeyCode::Up), Some(Direction::Up));
        assert_eq!(direction_for_key(KeyCode::A), Some(Direction::Left));
        assert_eq!(direction_for_key(KeyCode::S), Some(Direction::Down));
        assert_eq!(direction_for_key(KeyCode::Right), Some(Direction::Right));
        assert_eq!(direction_for_key(KeyCode::Q), None);
    }

    #[test]
    fn test_lobby_only_toggles_ready() {
        let intents = intents_for_keys(&[KeyCode::Up, KeyCode::R, KeyCode::Key1], Phase::Lobby, None);
        assert_eq!(intents, vec![Intent::ToggleReady]);
    }

    #[test]
    fn test_running_keys() {
        let intents = intents_for_keys(
            &[KeyCode::Left, KeyCode::Key3, KeyCode::R],
            Phase::Running,
            None,
        );
        assert_eq!(
            intents,
            vec![
                Intent::SetDirection(Direction::Left),
                Intent::UsePowerUp {
                    kind: PowerUpKind::ShrinkOpponent,
                    opponent: None
                },
            ]
        );
    }

    #[test]
    fn test_revive_needs_open_window() {
        assert!(intents_for_keys(&[KeyCode::Key5], Phase::Running, None).is_empty());
        assert!(
            intents_for_keys(&[KeyCode::Space], Phase::Running, Some(DeadCountdown::new(0)))
                .is_empty()
        );
        assert_eq!(
            intents_for_keys(&[KeyCode::Space], Phase::Running, Some(DeadCountdown::new(40))),
            vec![Intent::UsePowerUp {
                kind: PowerUpKind::Revive,
                opponent: None
            }]
        );
    }

    #[test]
    fn test_nothing_after_game_over() {
        assert!(intents_for_keys(&[KeyCode::Up, KeyCode::R], Phase::Over, None).is_empty());
    }
}
