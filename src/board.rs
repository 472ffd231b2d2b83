//! Board orchestrator: owns the pieces and sequences press → chain → score → erase → refill.

use glam::Vec2;
use log::{debug, info, trace};
use rand::Rng;
use rand::rngs::StdRng;
use std::time::Duration;

use crate::chain::{ChainBuilder, ChainOutcome, DragEffect};
use crate::config::GameConfig;
use crate::contact::ContactQuery;
use crate::physics::{Physics, PitPhysics};
use crate::piece::{BodyMode, PieceId, PieceKind};
use crate::pool::{PiecePool, PoolError};
use crate::score::{ScoreAward, ScoreBoard, ScoreRules};
use crate::tasks::{TaskKind, TaskList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Idle,
    Playing,
    /// A chain gesture is in progress.
    Connecting,
    Erasing,
    GameOver,
}

impl GamePhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Playing => "Playing",
            Self::Connecting => "Connecting",
            Self::Erasing => "Erasing",
            Self::GameOver => "Game Over",
        }
    }

    const fn accepts_press(self) -> bool {
        matches!(self, Self::Idle | Self::Playing)
    }
}

/// Snapshot of one piece for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceView {
    pub id: PieceId,
    pub kind: PieceKind,
    pub position: Vec2,
    pub radius: f32,
    pub highlighted: bool,
    pub erasing: bool,
    pub scale: f32,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    ChainFinalized {
        pieces: Vec<PieceView>,
        award: Option<ScoreAward>,
    },
    ComboExpired,
    Shuffled { count: usize },
    GameOver { score: u64 },
}

pub struct Board<P: Physics = PitPhysics> {
    config: GameConfig,
    pool: PiecePool,
    /// Live, selectable pieces in spawn order. Erasing pieces are not in here.
    active: Vec<PieceId>,
    chain: ChainBuilder,
    score: ScoreBoard,
    tasks: TaskList,
    query: ContactQuery,
    physics: P,
    rng: StdRng,
    phase: GamePhase,
    /// Phase to go back to when a gesture ends without an erase.
    resume_phase: GamePhase,
    input_enabled: bool,
    time_left: Option<Duration>,
    running: bool,
    events: Vec<BoardEvent>,
}

impl<P: Physics> Board<P> {
    pub fn new(config: GameConfig, physics: P, rng: StdRng) -> Self {
        let pool = PiecePool::with_prewarm(
            config.pool_initial_size,
            config.pool_max_size,
            config.piece_radius,
        );
        Self {
            pool,
            active: Vec::new(),
            chain: ChainBuilder::new(config.min_chain),
            score: ScoreBoard::new(ScoreRules::from_config(&config)),
            tasks: TaskList::new(),
            query: ContactQuery::from_config(&config),
            physics,
            rng,
            phase: GamePhase::Idle,
            resume_phase: GamePhase::Idle,
            input_enabled: false,
            time_left: config.round_time,
            running: false,
            events: Vec::new(),
            config,
        }
    }

    /// Clear the pit, reset score and clock, and drop in a fresh set of pieces.
    pub fn start_game(&mut self) {
        self.chain.cancel(&mut self.pool);
        for id in self.active.drain(..) {
            self.pool.release(id);
        }
        for task in self.tasks.iter() {
            if let TaskKind::Erase { pieces, .. } = &task.kind {
                for id in pieces {
                    self.pool.release(*id);
                }
            }
        }
        if !self.tasks.is_empty() {
            debug!("dropping {} pending tasks", self.tasks.len());
        }
        self.tasks.clear();
        self.score.reset_all();
        self.time_left = self.config.round_time;
        self.running = true;
        if self.config.initial_piece_count > 0 {
            self.tasks.schedule(
                TaskKind::Spawn {
                    count: self.config.initial_piece_count,
                    interval: self.config.initial_spawn_interval,
                    scatter: true,
                },
                Duration::ZERO,
            );
        }
        info!(
            "game started: {} pieces, {} colours",
            self.config.initial_piece_count, self.config.palette_size
        );
        debug!(
            "pool: {} live, {} parked, {} built of {}",
            self.pool.live_count(),
            self.pool.free_count(),
            self.pool.capacity(),
            self.pool.max_size()
        );
        self.change_phase(GamePhase::Playing);
    }

    pub fn restart_game(&mut self) {
        self.score.reset_combo();
        self.start_game();
    }

    /// Begin a chain at `point`. Returns whether a chain started.
    pub fn press(&mut self, point: Vec2) -> bool {
        if !self.input_enabled || !self.phase.accepts_press() {
            trace!("press ignored in {:?}", self.phase);
            return false;
        }
        if !self
            .chain
            .press(&mut self.pool, &self.active, &self.query, point)
        {
            return false;
        }
        self.resume_phase = self.phase;
        self.change_phase(GamePhase::Connecting);
        true
    }

    pub fn drag(&mut self, point: Vec2) -> DragEffect {
        if !self.input_enabled || self.phase != GamePhase::Connecting {
            return DragEffect::Unchanged;
        }
        self.chain
            .drag(&mut self.pool, &self.active, &self.query, point)
    }

    pub fn release(&mut self) -> ChainOutcome {
        if self.phase != GamePhase::Connecting {
            return ChainOutcome::Empty;
        }
        let outcome = self.chain.release(&mut self.pool);
        match &outcome {
            ChainOutcome::Finalized(ids) => self.finalize(ids.clone()),
            ChainOutcome::Discarded(len) => {
                debug!("chain of {len} too short, discarded");
                self.change_phase(self.resume_phase);
            }
            ChainOutcome::Empty => self.change_phase(self.resume_phase),
        }
        outcome
    }

    /// External input gate. Disabling drops any chain in progress.
    pub fn set_input_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.cancel_chain();
        }
        self.input_enabled = enabled;
    }

    /// Give every selectable piece a random new colour. Only allowed between gestures.
    pub fn shuffle_all(&mut self) -> bool {
        if !self.phase.accepts_press() {
            debug!("shuffle refused in {:?}", self.phase);
            return false;
        }
        let palette = self.config.palette_size;
        for &id in &self.active {
            let kind = PieceKind::random(&mut self.rng, palette);
            if let Some(p) = self.pool.get_mut(id) {
                p.reassign(kind);
            }
        }
        let count = self.active.len();
        info!("shuffled {count} pieces");
        self.events.push(BoardEvent::Shuffled { count });
        true
    }

    /// Advance the round by `dt`. Pool exhaustion is fatal and propagates.
    pub fn tick(&mut self, dt: Duration) -> Result<(), PoolError> {
        if let Some(left) = self.time_left.filter(|_| self.running) {
            let left = left.saturating_sub(dt);
            self.time_left = Some(left);
            if left.is_zero() {
                self.game_over();
            }
        }

        if self.score.tick(dt) {
            self.events.push(BoardEvent::ComboExpired);
        }

        for task in self.tasks.advance(dt) {
            self.run_task(task)?;
        }

        let erasing: Vec<(Vec<PieceId>, f32)> = self
            .tasks
            .iter()
            .filter_map(|t| match &t.kind {
                TaskKind::Erase { pieces, .. } => Some((pieces.clone(), t.erase_progress()?)),
                TaskKind::Spawn { .. } => None,
            })
            .collect();
        for (pieces, t) in erasing {
            for id in pieces {
                if let Some(p) = self.pool.get_mut(id) {
                    p.animate_erase(t);
                }
            }
        }

        self.physics
            .step(&mut self.pool, &self.active, dt.as_secs_f32());
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Every piece on screen: selectable ones first, then any still erasing.
    pub fn pieces(&self) -> impl Iterator<Item = PieceView> + '_ {
        let erasing = self.tasks.iter().flat_map(|t| -> &[PieceId] {
            match &t.kind {
                TaskKind::Erase { pieces, .. } => pieces,
                TaskKind::Spawn { .. } => &[],
            }
        });
        self.active
            .iter()
            .chain(erasing)
            .filter_map(|&id| self.view(id))
    }

    pub fn view(&self, id: PieceId) -> Option<PieceView> {
        let p = self.pool.get(id)?;
        Some(PieceView {
            id,
            kind: p.kind,
            position: p.position,
            radius: p.radius.unwrap_or(self.config.piece_radius),
            highlighted: p.is_highlighted(),
            erasing: p.mode() == BodyMode::Erasing,
            scale: p.scale,
            alpha: p.alpha,
        })
    }

    pub fn chain(&self) -> &[PieceId] {
        self.chain.members()
    }

    pub fn chain_kind(&self) -> Option<PieceKind> {
        self.chain.required_kind()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn score(&self) -> u64 {
        self.score.score()
    }

    pub fn combo(&self) -> u32 {
        self.score.combo()
    }

    pub fn combo_ratio(&self) -> f64 {
        self.score.combo_ratio()
    }

    pub fn combo_time_left(&self) -> Option<Duration> {
        self.score.combo_time_left()
    }

    pub fn time_left(&self) -> Option<Duration> {
        self.time_left
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    fn finalize(&mut self, ids: Vec<PieceId>) {
        self.change_phase(GamePhase::Erasing);
        let award = self.score.on_chain_finalized(ids.len());
        self.active.retain(|id| !ids.contains(id));
        for &id in &ids {
            if let Some(p) = self.pool.get_mut(id) {
                p.begin_erase();
            }
        }
        let pieces = ids.iter().filter_map(|&id| self.view(id)).collect();
        self.events
            .push(BoardEvent::ChainFinalized { pieces, award });
        let duration = self.config.erase_animation;
        self.tasks
            .schedule(TaskKind::Erase { pieces: ids, duration }, duration);
    }

    fn run_task(&mut self, task: TaskKind) -> Result<(), PoolError> {
        match task {
            TaskKind::Erase { pieces, .. } => {
                let count = pieces.len();
                for id in pieces {
                    self.pool.release(id);
                }
                debug!("erased {count} pieces, refilling");
                self.tasks.schedule(
                    TaskKind::Spawn {
                        count,
                        interval: self.config.spawn_interval,
                        scatter: false,
                    },
                    self.config.fall_animation,
                );
                if self.phase == GamePhase::Erasing {
                    self.change_phase(GamePhase::Idle);
                }
            }
            TaskKind::Spawn {
                count,
                interval,
                scatter,
            } => {
                let now = if interval.is_zero() { count } else { count.min(1) };
                for _ in 0..now {
                    self.spawn_piece(scatter)?;
                }
                if count > now {
                    self.tasks.schedule(
                        TaskKind::Spawn {
                            count: count - now,
                            interval,
                            scatter,
                        },
                        interval,
                    );
                }
            }
        }
        Ok(())
    }

    fn spawn_piece(&mut self, scatter: bool) -> Result<(), PoolError> {
        let c = &self.config;
        let x = if c.spawn_min_x < c.spawn_max_x {
            self.rng.random_range(c.spawn_min_x..c.spawn_max_x)
        } else {
            c.spawn_min_x
        };
        let jitter = if scatter && c.spawn_height_jitter > 0.0 {
            self.rng
                .random_range(-c.spawn_height_jitter..=c.spawn_height_jitter)
        } else {
            0.0
        };
        let position = Vec2::new(x, c.spawn_height + jitter);
        let kind = PieceKind::random(&mut self.rng, c.palette_size);
        let id = self.pool.acquire(kind, position)?;
        self.active.push(id);
        trace!("spawned {} at {position}", kind.name());
        Ok(())
    }

    fn cancel_chain(&mut self) {
        if !self.chain.is_building() {
            return;
        }
        let dropped = self.chain.cancel(&mut self.pool);
        debug!("chain of {dropped} cancelled");
        if self.phase == GamePhase::Connecting {
            self.change_phase(self.resume_phase);
        }
    }

    fn game_over(&mut self) {
        self.running = false;
        self.chain.cancel(&mut self.pool);
        self.change_phase(GamePhase::GameOver);
        let score = self.score.score();
        info!("game over, final score {score}");
        self.events.push(BoardEvent::GameOver { score });
    }

    fn change_phase(&mut self, to: GamePhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        self.input_enabled = match to {
            GamePhase::Idle | GamePhase::Playing | GamePhase::Connecting => true,
            GamePhase::Erasing | GamePhase::GameOver => false,
        };
        debug!("phase {from:?} -> {to:?}");
        self.events.push(BoardEvent::PhaseChanged { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::NoPhysics;
    use rand::SeedableRng;

    const STEP: Duration = Duration::from_millis(100);

    fn config() -> GameConfig {
        GameConfig {
            initial_piece_count: 0,
            round_time: None,
            ..GameConfig::default()
        }
    }

    fn board(config: GameConfig) -> Board<NoPhysics> {
        let mut b = Board::new(config, NoPhysics, StdRng::seed_from_u64(42));
        b.start_game();
        b.drain_events();
        b
    }

    /// Lay pieces of the given kinds in a touching row along the floor.
    fn row(b: &mut Board<NoPhysics>, kinds: &[u8]) -> Vec<Vec2> {
        let y = b.config.floor_y() + b.config.piece_radius;
        kinds
            .iter()
            .enumerate()
            .map(|(i, &k)| {
                let pos = Vec2::new(-3.0 + i as f32 * 0.9, y);
                let id = b.pool.acquire(PieceKind::new(k), pos).unwrap();
                b.active.push(id);
                pos
            })
            .collect()
    }

    fn run(b: &mut Board<NoPhysics>, total: Duration) {
        let mut t = Duration::ZERO;
        while t < total {
            b.tick(STEP).unwrap();
            t += STEP;
        }
    }

    fn lit(b: &Board<NoPhysics>) -> usize {
        b.pieces().filter(|p| p.highlighted).count()
    }

    #[test]
    fn test_start_spawns_initial_pieces() {
        let mut b = board(GameConfig::default());
        assert_eq!(b.phase(), GamePhase::Playing);
        assert!(b.input_enabled);
        b.tick(Duration::ZERO).unwrap();
        assert_eq!(b.active_count(), 30);
        assert_eq!(b.pool.live_count(), 30);
        let c = GameConfig::default();
        for p in b.pieces() {
            assert!(p.position.x >= c.spawn_min_x && p.position.x < c.spawn_max_x);
            assert!((p.position.y - c.spawn_height).abs() <= c.spawn_height_jitter);
            assert!(p.kind.index() < c.palette_size);
        }
    }

    #[test]
    fn test_staggered_initial_spawn() {
        let mut b = board(GameConfig {
            initial_piece_count: 4,
            initial_spawn_interval: STEP,
            ..config()
        });
        b.tick(Duration::ZERO).unwrap();
        assert_eq!(b.active_count(), 1);
        run(&mut b, STEP * 3);
        assert_eq!(b.active_count(), 4);
    }

    #[test]
    fn test_finalize_erase_and_refill() {
        let mut b = board(config());
        let at = row(&mut b, &[2, 2, 2, 0]);
        assert!(b.press(at[0]));
        assert_eq!(b.phase(), GamePhase::Connecting);
        assert_eq!(b.drag(at[1]), DragEffect::Extended);
        assert_eq!(b.drag(at[2]), DragEffect::Extended);
        assert_eq!(b.drag(at[3]), DragEffect::Unchanged);

        let ChainOutcome::Finalized(ids) = b.release() else {
            panic!("chain should finalize");
        };
        assert_eq!(ids.len(), 3);
        assert_eq!(b.phase(), GamePhase::Erasing);
        assert_eq!(b.score(), 30);
        assert_eq!(b.active_count(), 1);
        assert!(b.pieces().filter(|p| p.erasing).count() == 3);

        let events = b.drain_events();
        let award = events.iter().find_map(|e| match e {
            BoardEvent::ChainFinalized { pieces, award } => {
                assert_eq!(pieces.len(), 3);
                *award
            }
            _ => None,
        });
        assert_eq!(award.map(|a| a.delta), Some(30));

        // Input is closed while the pieces shrink.
        assert!(!b.press(at[3]));
        assert!(!b.shuffle_all());

        run(&mut b, Duration::from_millis(200));
        assert_eq!(b.phase(), GamePhase::Idle);
        assert_eq!(b.pool.live_count(), 1);
        for id in &ids {
            assert!(b.view(*id).is_none());
        }

        run(&mut b, Duration::from_secs(2));
        assert_eq!(b.active_count(), 4);
        assert_eq!(b.pool.live_count(), 4);
    }

    #[test]
    fn test_refill_is_staggered() {
        let mut b = board(config());
        let at = row(&mut b, &[1, 1, 1]);
        b.press(at[0]);
        b.drag(at[1]);
        b.drag(at[2]);
        b.release();
        // erase (0.2s) + fall delay (0.3s) brings the first piece back.
        run(&mut b, Duration::from_millis(500));
        assert_eq!(b.active_count(), 1);
        run(&mut b, Duration::from_millis(300));
        assert_eq!(b.active_count(), 2);
        run(&mut b, Duration::from_millis(300));
        assert_eq!(b.active_count(), 3);
    }

    #[test]
    fn test_short_chain_returns_to_previous_phase() {
        let mut b = board(config());
        let at = row(&mut b, &[3, 3, 3]);
        b.press(at[0]);
        b.drag(at[1]);
        assert_eq!(b.release(), ChainOutcome::Discarded(2));
        assert_eq!(b.phase(), GamePhase::Playing);
        assert_eq!(lit(&b), 0);
        assert_eq!(b.score(), 0);
        assert_eq!(b.active_count(), 3);
    }

    #[test]
    fn test_press_on_empty_space_keeps_phase() {
        let mut b = board(config());
        row(&mut b, &[0]);
        assert!(!b.press(Vec2::new(3.0, 3.0)));
        assert_eq!(b.phase(), GamePhase::Playing);
        assert_eq!(b.release(), ChainOutcome::Empty);
    }

    #[test]
    fn test_game_over_cancels_live_drag() {
        let mut b = board(GameConfig {
            round_time: Some(Duration::from_secs(1)),
            ..config()
        });
        let at = row(&mut b, &[4, 4, 4, 4]);
        b.press(at[0]);
        b.drag(at[1]);
        b.drag(at[2]);
        run(&mut b, Duration::from_secs(1));
        assert_eq!(b.phase(), GamePhase::GameOver);
        assert_eq!(b.time_left(), Some(Duration::ZERO));
        assert!(b.chain().is_empty());
        assert_eq!(lit(&b), 0);
        assert_eq!(b.drag(at[3]), DragEffect::Unchanged);
        assert_eq!(b.release(), ChainOutcome::Empty);
        assert!(!b.press(at[0]));
        assert!(
            b.drain_events()
                .contains(&BoardEvent::GameOver { score: 0 })
        );
    }

    #[test]
    fn test_erase_finishes_after_game_over() {
        let mut b = board(GameConfig {
            round_time: Some(Duration::from_millis(100)),
            ..config()
        });
        let at = row(&mut b, &[0, 0, 0]);
        b.press(at[0]);
        b.drag(at[1]);
        b.drag(at[2]);
        b.release();
        run(&mut b, STEP);
        assert_eq!(b.phase(), GamePhase::GameOver);
        run(&mut b, Duration::from_secs(2));
        assert_eq!(b.phase(), GamePhase::GameOver);
        assert_eq!(b.pool.live_count(), 3);
        assert_eq!(b.score(), 30);
    }

    #[test]
    fn test_shuffle_keeps_count_and_positions() {
        let mut b = board(GameConfig {
            initial_piece_count: 25,
            ..config()
        });
        b.tick(Duration::ZERO).unwrap();
        let before: Vec<PieceView> = b.pieces().collect();
        assert!(b.shuffle_all());
        let after: Vec<PieceView> = b.pieces().collect();
        assert_eq!(before.len(), after.len());
        for (x, y) in before.iter().zip(&after) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.position, y.position);
            assert!(y.kind.index() < 5);
        }
        assert!(before.iter().zip(&after).any(|(x, y)| x.kind != y.kind));
        assert!(
            b.drain_events()
                .contains(&BoardEvent::Shuffled { count: 25 })
        );
    }

    #[test]
    fn test_shuffle_refused_mid_gesture() {
        let mut b = board(config());
        let at = row(&mut b, &[1, 1]);
        b.press(at[0]);
        assert!(!b.shuffle_all());
    }

    #[test]
    fn test_disabling_input_cancels_chain() {
        let mut b = board(config());
        let at = row(&mut b, &[2, 2, 2]);
        b.press(at[0]);
        b.drag(at[1]);
        b.drag(at[2]);
        b.set_input_enabled(false);
        assert!(b.chain().is_empty());
        assert_eq!(lit(&b), 0);
        assert_eq!(b.phase(), GamePhase::Playing);
        assert_eq!(b.release(), ChainOutcome::Empty);
        assert!(!b.press(at[0]));
        b.set_input_enabled(true);
        assert!(b.press(at[0]));
    }

    #[test]
    fn test_combo_expiry_event() {
        let mut b = board(config());
        let at = row(&mut b, &[0, 0, 0]);
        b.press(at[0]);
        b.drag(at[1]);
        b.drag(at[2]);
        b.release();
        assert_eq!(b.combo(), 1);
        b.drain_events();
        run(&mut b, Duration::from_secs(2));
        assert_eq!(b.combo(), 0);
        assert!(b.drain_events().contains(&BoardEvent::ComboExpired));
    }

    #[test]
    fn test_restart_clears_board_and_score() {
        let mut b = board(GameConfig {
            initial_piece_count: 6,
            ..config()
        });
        let at = row(&mut b, &[3, 3, 3]);
        b.press(at[0]);
        b.drag(at[1]);
        b.drag(at[2]);
        b.release();
        assert_eq!(b.score(), 30);
        b.restart_game();
        assert_eq!(b.score(), 0);
        assert_eq!(b.combo(), 0);
        assert_eq!(b.pool.live_count(), 0);
        assert_eq!(b.phase(), GamePhase::Playing);
        b.tick(Duration::ZERO).unwrap();
        assert_eq!(b.active_count(), 6);
    }

    #[test]
    fn test_pool_exhaustion_propagates() {
        let mut b = board(GameConfig {
            pool_initial_size: 2,
            pool_max_size: 2,
            initial_piece_count: 3,
            ..config()
        });
        assert_eq!(
            b.tick(Duration::ZERO),
            Err(PoolError::Exhausted { max: 2 })
        );
    }
}
