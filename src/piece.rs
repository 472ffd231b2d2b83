//! Piece record: palette kind, body mode, chain highlight and presentation state.

use glam::Vec2;
use rand::Rng;

/// Largest palette the theme can colour.
pub const MAX_PALETTE: u8 = 6;

/// Scale of a highlighted piece relative to its resting size.
const HIGHLIGHT_SCALE: f32 = 1.15;

/// Colour/type of a piece; index into the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceKind(u8);

impl PieceKind {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// Uniformly random kind among the first `palette_size` colours.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, palette_size: u8) -> Self {
        Self(rng.random_range(0..palette_size.max(1)))
    }

    pub const fn name(self) -> &'static str {
        match self.0 {
            0 => "red",
            1 => "blue",
            2 => "green",
            3 => "yellow",
            4 => "purple",
            _ => "cyan",
        }
    }
}

/// How the physics service treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Parked in the pool; not simulated.
    #[default]
    Neutral,
    /// Falling or resting under gravity.
    Settling,
    /// Pinned in place while part of a chain; still an obstacle for others.
    Held,
    /// Shrinking away; no collider.
    Erasing,
}

/// Pool handle. Goes stale once the slot is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone)]
pub struct Piece {
    pub kind: PieceKind,
    pub position: Vec2,
    pub velocity: Vec2,
    /// `None` when the piece carries no collider metadata.
    pub radius: Option<f32>,
    highlighted: bool,
    mode: BodyMode,
    /// Presentation scale (1.0 at rest).
    pub scale: f32,
    /// Presentation opacity.
    pub alpha: f32,
}

impl Piece {
    pub(crate) fn blank() -> Self {
        Self {
            kind: PieceKind::new(0),
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            radius: None,
            highlighted: false,
            mode: BodyMode::Neutral,
            scale: 1.0,
            alpha: 1.0,
        }
    }

    /// Fresh identity for a piece coming out of the pool.
    pub(crate) fn spawn(&mut self, kind: PieceKind, position: Vec2, radius: f32) {
        self.reset_for_pool();
        self.kind = kind;
        self.position = position;
        self.radius = Some(radius);
        self.mode = BodyMode::Settling;
    }

    /// Drop every transient flag. Unconditional so a recycled piece starts clean.
    pub(crate) fn reset_for_pool(&mut self) {
        self.highlighted = false;
        self.mode = BodyMode::Neutral;
        self.velocity = Vec2::ZERO;
        self.scale = 1.0;
        self.alpha = 1.0;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn mode(&self) -> BodyMode {
        self.mode
    }

    /// Chain highlight. Highlighted pieces are pinned (Held) until released back to Settling.
    pub fn set_highlight(&mut self, on: bool) {
        self.highlighted = on;
        match (on, self.mode) {
            (true, BodyMode::Settling) => {
                self.mode = BodyMode::Held;
                self.velocity = Vec2::ZERO;
                self.scale = HIGHLIGHT_SCALE;
            }
            (false, BodyMode::Held) => {
                self.mode = BodyMode::Settling;
                self.scale = 1.0;
            }
            _ => {}
        }
    }

    /// New kind in place; used by the board shuffle.
    pub(crate) fn reassign(&mut self, kind: PieceKind) {
        self.kind = kind;
        self.set_highlight(false);
    }

    pub(crate) fn begin_erase(&mut self) {
        self.mode = BodyMode::Erasing;
        self.velocity = Vec2::ZERO;
    }

    /// Erase animation at progress `t` in 0..=1: swell briefly, then shrink and fade.
    pub(crate) fn animate_erase(&mut self, t: f32) {
        let t = t.clamp(0.0, 1.0);
        let start = if self.highlighted { HIGHLIGHT_SCALE } else { 1.0 };
        let swell = if t < 0.3 {
            1.0 + 0.2 * (t / 0.3)
        } else {
            1.2 * (1.0 - (t - 0.3) / 0.7)
        };
        self.scale = start * swell;
        self.alpha = 1.0 - t;
    }

    /// True while the piece blocks other bodies.
    pub fn is_collidable(&self) -> bool {
        matches!(self.mode, BodyMode::Settling | BodyMode::Held)
    }
}
