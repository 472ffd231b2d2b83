//! App: terminal init, main loop, fixed-step ticks, key and mouse handling.

use crate::board::{Board, BoardEvent};
use crate::chain::DragEffect;
use crate::input::{Action, PointerEvent, key_to_action, pointer_from_mouse};
use crate::theme::Theme;
use crate::ui::{self, POPUP_TTL, Popup, ViewState};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use glam::Vec2;
use log::{debug, info, trace};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

/// Render budget per frame (~60 FPS).
const FRAME: Duration = Duration::from_millis(16);
/// Ticks replayed at most after a stall; the rest of the backlog is dropped.
const MAX_CATCH_UP: u32 = 5;

pub struct App {
    board: Board,
    theme: Theme,
    view: ViewState,
    /// Fixed logic step.
    tick: Duration,
    last_tick: Instant,
    /// Pit rect from the last frame; maps mouse cells to world points.
    pit: Rect,
}

impl App {
    pub fn new(board: Board, theme: Theme, tick_rate: f64, no_animation: bool) -> Self {
        let view = ViewState::new(no_animation);
        Self {
            board,
            theme,
            view,
            tick: Duration::from_secs_f64(1.0 / tick_rate.max(1.0)),
            last_tick: Instant::now(),
            pit: Rect::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        self.board.start_game();
        self.last_tick = Instant::now();
        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let mut pit = self.pit;
            terminal.draw(|f| {
                pit = ui::draw(f, &self.board, &self.theme, &mut self.view, now);
            })?;
            self.pit = pit;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if key_to_action(key) == Action::Quit {
                                info!("quit, score {}", self.board.score());
                                return Ok(());
                            }
                            self.apply_action(key_to_action(key));
                        }
                        Event::Mouse(mouse) => {
                            if let Some(pointer) = pointer_from_mouse(mouse) {
                                self.apply_pointer(pointer);
                            }
                        }
                        _ => {}
                    }
                }
            }

            if self.view.paused {
                self.last_tick = Instant::now();
                continue;
            }
            let mut steps = 0;
            while self.last_tick.elapsed() >= self.tick {
                self.step()?;
                self.last_tick += self.tick;
                steps += 1;
                if steps >= MAX_CATCH_UP {
                    self.last_tick = Instant::now();
                    break;
                }
            }
        }
    }

    /// One fixed logic step: board, then whatever it reported.
    fn step(&mut self) -> Result<()> {
        self.board.tick(self.tick)?;
        self.view.tick_popups(self.tick);
        for event in self.board.drain_events() {
            self.on_board_event(event);
        }
        self.view.best = self.view.best.max(self.board.score());
        Ok(())
    }

    fn on_board_event(&mut self, event: BoardEvent) {
        match event {
            BoardEvent::ChainFinalized { pieces, award } => {
                if let (Some(award), Some(first)) = (award, pieces.first()) {
                    debug!(
                        "{} erased: +{} (x{} combo, x{} bonus), total {}",
                        award.length, award.delta, award.combo_multiplier, award.chain_bonus, award.total
                    );
                    let centre = pieces.iter().map(|p| p.position).sum::<Vec2>() / pieces.len() as f32;
                    let text = match (award.combo, award.chain_bonus > 1.0) {
                        (0 | 1, false) => format!("+{}", award.delta),
                        (0 | 1, true) => format!("+{}!", award.delta),
                        (combo, _) => format!("+{} x{combo}", award.delta),
                    };
                    self.view.popups.push(Popup {
                        text,
                        position: centre,
                        color: self.theme.piece_color(first.kind),
                        ttl: POPUP_TTL,
                    });
                }
                self.view.pending_fade.extend(pieces);
            }
            BoardEvent::GameOver { score } => {
                self.view.best = self.view.best.max(score);
            }
            BoardEvent::Shuffled { count } => {
                let config = self.board.config();
                self.view.popups.push(Popup {
                    text: format!("shuffled {count}"),
                    position: Vec2::new(0.0, config.top_y() - config.pit_height * 0.25),
                    color: self.theme.title,
                    ttl: POPUP_TTL,
                });
            }
            BoardEvent::PhaseChanged { from, to } => trace!("view: {} -> {}", from.label(), to.label()),
            BoardEvent::ComboExpired => {}
        }
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::Pause => {
                self.view.paused = !self.view.paused;
                self.board.set_input_enabled(!self.view.paused);
                debug!("paused: {}", self.view.paused);
            }
            Action::Shuffle if !self.view.paused => {
                self.board.shuffle_all();
            }
            Action::Restart => {
                self.view.paused = false;
                self.view.clear_effects();
                self.board.restart_game();
                self.board.set_input_enabled(true);
                self.last_tick = Instant::now();
            }
            Action::Shuffle | Action::Quit | Action::None => {}
        }
    }

    fn apply_pointer(&mut self, pointer: PointerEvent) {
        if self.view.paused {
            return;
        }
        let config = self.board.config();
        match pointer {
            PointerEvent::Press { column, row } => {
                if let Some(p) = ui::cell_to_world(self.pit, config, column, row) {
                    self.board.press(p);
                }
            }
            PointerEvent::Move { column, row } => {
                if let Some(p) = ui::cell_to_world(self.pit, config, column, row) {
                    if let DragEffect::Retreated(n) = self.board.drag(p) {
                        trace!("chain walked back {n}");
                    }
                }
            }
            PointerEvent::Release => {
                self.board.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::physics::PitPhysics;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn app(no_animation: bool) -> App {
        let config = GameConfig::default();
        let physics = PitPhysics::from_config(&config);
        let board = Board::new(config, physics, StdRng::seed_from_u64(7));
        App::new(board, Theme::default(), 50.0, no_animation)
    }

    #[test]
    fn test_new_keeps_animation_flag() {
        let a = app(true);
        assert!(a.view.no_animation);
        assert!(!a.view.paused);
        assert_eq!(a.tick, Duration::from_millis(20));
        assert!(!app(false).view.no_animation);
    }

    #[test]
    fn test_restart_clears_pause() {
        let mut a = app(false);
        a.board.start_game();
        a.apply_action(Action::Pause);
        assert!(a.view.paused);
        a.apply_action(Action::Restart);
        assert!(!a.view.paused);
        assert_eq!(a.board.phase(), crate::board::GamePhase::Playing);
    }
}
