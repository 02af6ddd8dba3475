use crate::network::ConnectionStatus;
use crate::session::{Liveness, Phase, SessionSnapshot};
use macroquad::prelude::*;
use shared::{Direction, BOARD_HEIGHT, BOARD_WIDTH};

const SIDEBAR_WIDTH: f32 = 300.0;
const FOOTER_HEIGHT: f32 = 40.0;
const MARGIN: f32 = 10.0;

const SNAKE_COLORS: [Color; 7] = [BLUE, GREEN, PURPLE, ORANGE, PINK, BROWN, BLACK];

pub fn snake_color(ordinal: usize) -> Color {
    SNAKE_COLORS[ordinal % SNAKE_COLORS.len()]
}

pub fn head_color(ordinal: usize, has_extra_life: bool, frozen: bool) -> Color {
    if has_extra_life {
        MAGENTA
    } else if frozen {
        GRAY
    } else {
        snake_color(ordinal)
    }
}

/// Invulnerable snakes are hidden for the second half of every 300 ms.
pub fn is_blink_hidden(now_ms: u64) -> bool {
    now_ms % 300 > 150
}

fn on_board(x: i64, y: i64) -> bool {
    x >= 0 && y >= 0 && x < BOARD_WIDTH as i64 && y < BOARD_HEIGHT as i64
}

/// Cells covered by a snake, head first, walking each run away from the head.
///
/// Walking stops at the board edge; run lengths come straight off the wire.
pub fn body_cells(head: (u32, u32), body: &[(Direction, u32)]) -> Vec<(i64, i64)> {
    let max_cells = (BOARD_WIDTH * BOARD_HEIGHT) as usize;
    let mut cells = Vec::new();
    let (mut x, mut y) = (head.0 as i64, head.1 as i64);

    for &(direction, run) in body {
        let (dx, dy) = direction.trailing_step();
        for _ in 0..run {
            if !on_board(x, y) || cells.len() >= max_cells {
                return cells;
            }
            cells.push((x, y));
            x += dx;
            y += dy;
        }
    }

    cells
}

/// US-dollar formatting with thousands separators, e.g. `$1,234.50`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Power-up history, newest first.
pub fn power_up_log_lines(snapshot: &SessionSnapshot) -> Vec<String> {
    snapshot
        .power_up_log
        .iter()
        .rev()
        .map(|event| {
            let kind = event.power_up.kind();
            let by = snapshot.roster.display_name(&event.user_id);
            let cost = format_currency(kind.cost() as f64);
            match event.power_up.opponent() {
                Some(opponent) => format!(
                    "{} {} by {} on {}",
                    kind,
                    cost,
                    by,
                    snapshot.roster.display_name(opponent)
                ),
                None => format!("{} {} by {}", kind, cost, by),
            }
        })
        .collect()
}

pub fn readiness_rows(snapshot: &SessionSnapshot) -> Vec<(String, bool)> {
    snapshot
        .readiness
        .iter()
        .map(|status| {
            (
                snapshot.roster.display_name(&status.user_id).to_string(),
                status.ready,
            )
        })
        .collect()
}

/// Every known participant with what they spent, in roster order.
pub fn result_rows(snapshot: &SessionSnapshot) -> Vec<(String, String)> {
    let Some(result) = &snapshot.result else {
        return Vec::new();
    };

    snapshot
        .roster
        .entries()
        .iter()
        .map(|entry| {
            let spent = result
                .amount_spent_by(&entry.user_id)
                .map(format_currency)
                .unwrap_or_else(|| "-".to_string());
            (entry.display_name.clone(), spent)
        })
        .collect()
}

pub fn status_banner(status: &ConnectionStatus) -> Option<String> {
    match status {
        ConnectionStatus::Connecting => Some("Connecting...".to_string()),
        ConnectionStatus::Connected => None,
        ConnectionStatus::Disconnected(None) => Some("Disconnected".to_string()),
        ConnectionStatus::Disconnected(Some(reason)) => Some(format!("Disconnected: {}", reason)),
    }
}

pub struct Renderer {
    cell: f32,
}

impl Renderer {
    pub fn new() -> Self {
        Self { cell: 1.0 }
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot, status: &ConnectionStatus, now_ms: u64) {
        clear_background(Color::from_rgba(245, 245, 245, 255));

        let board_w = (screen_width() - SIDEBAR_WIDTH - 2.0 * MARGIN).max(BOARD_WIDTH as f32);
        let board_h = (screen_height() - FOOTER_HEIGHT - 2.0 * MARGIN).max(BOARD_HEIGHT as f32);
        self.cell = (board_w / BOARD_WIDTH as f32).min(board_h / BOARD_HEIGHT as f32);

        match snapshot.phase {
            Phase::Lobby => self.draw_lobby(snapshot),
            Phase::Running | Phase::Over => {
                self.draw_board(snapshot, now_ms);
                self.draw_power_up_log(snapshot);
                self.draw_footer();

                if let (Phase::Running, Some(countdown)) = (snapshot.phase, snapshot.dead_countdown) {
                    self.draw_dead_overlay(countdown.fraction(), countdown.can_revive());
                }
                if snapshot.phase == Phase::Over {
                    self.draw_game_over(snapshot);
                }
            }
        }

        if let Some(banner) = status_banner(status) {
            self.draw_banner(&banner);
        }
    }

    fn draw_board(&self, snapshot: &SessionSnapshot, now_ms: u64) {
        let width = BOARD_WIDTH as f32 * self.cell;
        let height = BOARD_HEIGHT as f32 * self.cell;
        draw_rectangle(MARGIN, MARGIN, width, height, WHITE);
        draw_rectangle_lines(MARGIN, MARGIN, width, height, 2.0, BLACK);

        for &(x, y) in &snapshot.world.apples {
            self.draw_cell(x as i64, y as i64, RED);
        }

        for player in &snapshot.world.players {
            if let Liveness::Alive {
                head,
                body,
                invulnerable,
                frozen,
                has_extra_life,
                ..
            } = &player.liveness
            {
                if *invulnerable && is_blink_hidden(now_ms) {
                    continue;
                }

                let color = snake_color(player.ordinal);
                for (x, y) in body_cells(*head, body) {
                    self.draw_cell(x, y, color);
                }
                self.draw_cell(
                    head.0 as i64,
                    head.1 as i64,
                    head_color(player.ordinal, *has_extra_life, *frozen),
                );
            }
        }
    }

    fn draw_cell(&self, x: i64, y: i64, color: Color) {
        if !on_board(x, y) {
            return;
        }
        draw_rectangle(
            MARGIN + x as f32 * self.cell,
            MARGIN + y as f32 * self.cell,
            self.cell,
            self.cell,
            color,
        );
    }

    fn draw_power_up_log(&self, snapshot: &SessionSnapshot) {
        let x = screen_width() - SIDEBAR_WIDTH;
        draw_text("Powerups", x, 30.0, 26.0, BLACK);

        let mut y = 60.0;
        for line in power_up_log_lines(snapshot) {
            if y > screen_height() - FOOTER_HEIGHT {
                break;
            }
            draw_text(&line, x, y, 18.0, DARKGRAY);
            y += 22.0;
        }
    }

    fn draw_footer(&self) {
        let y = screen_height() - FOOTER_HEIGHT / 2.0;
        draw_rectangle(0.0, screen_height() - FOOTER_HEIGHT, screen_width(), FOOTER_HEIGHT, GOLD);
        draw_text(
            "1 extra life   2 add length   3 shrink opponent   4 freeze opponent   arrows steer",
            MARGIN,
            y + 6.0,
            20.0,
            BLACK,
        );
    }

    fn draw_lobby(&self, snapshot: &SessionSnapshot) {
        let center_x = screen_width() / 2.0 - 200.0;
        draw_text("Waiting for Players", center_x, 80.0, 40.0, BLACK);
        draw_text(
            "Please wait until all players are ready...",
            center_x,
            120.0,
            22.0,
            DARKGRAY,
        );

        let prompt = if snapshot.local_ready() {
            "I am ready! (R to cancel)"
        } else {
            "Press R to ready up"
        };
        let prompt_color = if snapshot.local_ready() {
            Color::from_rgba(76, 175, 80, 255)
        } else {
            Color::from_rgba(244, 67, 54, 255)
        };
        draw_text(prompt, center_x, 170.0, 28.0, prompt_color);

        let mut y = 230.0;
        for (name, ready) in readiness_rows(snapshot) {
            draw_text(&name, center_x, y, 24.0, BLACK);
            let (label, color) = if ready {
                ("Ready", Color::from_rgba(76, 175, 80, 255))
            } else {
                ("Not Ready", Color::from_rgba(244, 67, 54, 255))
            };
            draw_text(label, center_x + 300.0, y, 24.0, color);
            y += 34.0;
        }
    }

    fn draw_dead_overlay(&self, fraction: f32, can_revive: bool) {
        draw_rectangle(
            0.0,
            0.0,
            screen_width(),
            screen_height(),
            Color::new(0.0, 0.0, 0.0, 0.7),
        );

        let bar_width = screen_width() * 0.8;
        let bar_x = (screen_width() - bar_width) / 2.0;
        let mid_y = screen_height() / 2.0;

        draw_text("You have died!", bar_x, mid_y - 60.0, 44.0, WHITE);
        draw_text("Time remaining to revive:", bar_x, mid_y - 25.0, 22.0, WHITE);
        draw_rectangle(bar_x, mid_y, bar_width, 20.0, GRAY);
        draw_rectangle(bar_x, mid_y, bar_width * fraction, 20.0, RED);

        if can_revive {
            draw_text("Press 5 or Space to revive", bar_x, mid_y + 55.0, 24.0, WHITE);
        }
    }

    fn draw_game_over(&self, snapshot: &SessionSnapshot) {
        draw_rectangle(
            0.0,
            0.0,
            screen_width(),
            screen_height(),
            Color::new(0.0, 0.0, 0.0, 0.8),
        );

        let x = screen_width() / 2.0 - 220.0;
        draw_text("Game Over!", x, 100.0, 56.0, WHITE);

        if let Some(result) = &snapshot.result {
            let winner = snapshot.roster.display_name(&result.winner);
            draw_text(&format!("Winner: {}", winner), x, 160.0, 36.0, WHITE);
        }

        draw_text("Player Stats:", x, 220.0, 28.0, WHITE);
        let mut y = 260.0;
        for (name, spent) in result_rows(snapshot) {
            draw_text(&name, x, y, 24.0, WHITE);
            draw_text(&spent, x + 320.0, y, 24.0, WHITE);
            y += 32.0;
        }
    }

    fn draw_banner(&self, text: &str) {
        draw_rectangle(0.0, 0.0, screen_width(), 36.0, Color::from_rgba(183, 28, 28, 230));
        draw_text(text, MARGIN, 25.0, 24.0, WHITE);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Participant;
    use crate::error::SessionError;
    use crate::roster::Roster;
    use crate::session::{GameResult, WorldSnapshot};
    use shared::{AmountSpent, PowerUp, ReadyStatus, RecentPowerUp};
    use std::sync::Arc;

    fn snapshot() -> SessionSnapshot {
        let participants = vec![
            Participant {
                user_id: "u1".to_string(),
                display_name: "Alice".to_string(),
            },
            Participant {
                user_id: "u2".to_string(),
                display_name: "Bob".to_string(),
            },
        ];
        SessionSnapshot {
            local_user: "u1".to_string(),
            roster: Arc::new(Roster::new("u1", &participants)),
            phase: Phase::Running,
            readiness: Vec::new(),
            world: WorldSnapshot::default(),
            power_up_log: Vec::new(),
            dead_countdown: None,
            result: None,
        }
    }

    #[test]
    fn test_palette_wraps_by_ordinal() {
        assert_eq!(snake_color(0), BLUE);
        assert_eq!(snake_color(6), BLACK);
        assert_eq!(snake_color(7), BLUE);
    }

    #[test]
    fn test_head_color_priority() {
        assert_eq!(head_color(1, true, true), MAGENTA);
        assert_eq!(head_color(1, false, true), GRAY);
        assert_eq!(head_color(1, false, false), GREEN);
    }

    #[test]
    fn test_blink_phase() {
        assert!(!is_blink_hidden(0));
        assert!(!is_blink_hidden(150));
        assert!(is_blink_hidden(151));
        assert!(is_blink_hidden(299));
        assert!(!is_blink_hidden(300));
    }

    #[test]
    fn test_body_cells_trail_away_from_head() {
        let cells = body_cells((10, 10), &[(Direction::Up, 3), (Direction::Left, 2)]);
        assert_eq!(
            cells,
            vec![(10, 10), (10, 11), (10, 12), (10, 13), (11, 13)]
        );
    }

    #[test]
    fn test_body_cells_stop_at_board_edge() {
        let cells = body_cells((10, 3), &[(Direction::Down, u32::MAX)]);
        assert_eq!(cells, vec![(10, 3), (10, 2), (10, 1), (10, 0)]);

        let cells = body_cells(
            (0, 0),
            &[(Direction::Left, u32::MAX), (Direction::Up, u32::MAX)],
        );
        assert_eq!(cells.len(), BOARD_WIDTH as usize);
        assert_eq!(cells.last(), Some(&(BOARD_WIDTH as i64 - 1, 0)));
    }

    #[test]
    fn test_body_cells_empty_body() {
        assert!(body_cells((0, 0), &[]).is_empty());
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(12.0), "$12.00");
        assert_eq!(format_currency(5.5), "$5.50");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_currency(-3.0), "-$3.00");
    }

    #[test]
    fn test_power_up_log_newest_first_with_names() {
        let mut snapshot = snapshot();
        snapshot.power_up_log = vec![
            RecentPowerUp {
                user_id: "u1".to_string(),
                power_up: PowerUp::ExtraLife,
            },
            RecentPowerUp {
                user_id: "u2".to_string(),
                power_up: PowerUp::FreezeOpponent {
                    opponent: "u1".to_string(),
                },
            },
        ];

        assert_eq!(
            power_up_log_lines(&snapshot),
            vec![
                "FreezeOpponent $3.00 by Bob on Alice".to_string(),
                "ExtraLife $5.00 by Alice".to_string(),
            ]
        );
    }

    #[test]
    fn test_readiness_rows_use_display_names() {
        let mut snapshot = snapshot();
        snapshot.phase = Phase::Lobby;
        snapshot.readiness = vec![
            ReadyStatus {
                user_id: "u2".to_string(),
                ready: true,
            },
            ReadyStatus {
                user_id: "u1".to_string(),
                ready: false,
            },
        ];

        assert_eq!(
            readiness_rows(&snapshot),
            vec![("Bob".to_string(), true), ("Alice".to_string(), false)]
        );
    }

    #[test]
    fn test_result_rows_cover_every_participant() {
        let mut snapshot = snapshot();
        assert!(result_rows(&snapshot).is_empty());

        snapshot.phase = Phase::Over;
        snapshot.result = Some(GameResult {
            winner: "u2".to_string(),
            amounts_spent: vec![AmountSpent {
                user_id: "u1".to_string(),
                amount_spent: 12.0,
            }],
        });

        assert_eq!(
            result_rows(&snapshot),
            vec![
                ("Alice".to_string(), "$12.00".to_string()),
                ("Bob".to_string(), "-".to_string()),
            ]
        );
    }

    #[test]
    fn test_status_banner() {
        assert_eq!(status_banner(&ConnectionStatus::Connected), None);
        assert_eq!(
            status_banner(&ConnectionStatus::Disconnected(Some(
                SessionError::AuthenticationRejected
            ))),
            Some("Disconnected: server rejected authentication".to_string())
        );
    }
}
