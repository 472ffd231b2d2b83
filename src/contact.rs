//! Spatial contact queries over live pieces: touching pairs and point picking.
//!
//! Both queries scale from the collider radius. Settled circles never reach zero gap, so contact
//! reach is the summed radii times a tolerance above 1. Picking reaches `pick_scale` radii from a
//! piece centre. Pieces without a radius fall back to fixed distances.

use glam::Vec2;

use crate::config::GameConfig;
use crate::piece::{Piece, PieceId};
use crate::pool::PiecePool;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactQuery {
    pub touch_tolerance: f32,
    pub fallback_touch_distance: f32,
    pub pick_scale: f32,
    pub pick_radius: f32,
}

impl ContactQuery {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            touch_tolerance: config.touch_tolerance,
            fallback_touch_distance: config.fallback_touch_distance,
            pick_scale: config.pick_scale,
            pick_radius: config.pick_radius,
        }
    }

    /// Largest centre distance at which `a` and `b` still count as touching. Radii grow with the
    /// presentation scale, so a highlighted chain tail reaches further.
    pub fn touch_reach(&self, a: &Piece, b: &Piece) -> f32 {
        match (a.radius, b.radius) {
            (Some(ra), Some(rb)) => (ra * a.scale + rb * b.scale) * self.touch_tolerance,
            _ => self.fallback_touch_distance,
        }
    }

    pub fn touching(&self, a: &Piece, b: &Piece) -> bool {
        a.position.distance(b.position) < self.touch_reach(a, b)
    }

    /// `touching` by handle; a handle that no longer resolves never touches anything.
    pub fn touching_ids(&self, pool: &PiecePool, a: PieceId, b: PieceId) -> bool {
        match (pool.get(a), pool.get(b)) {
            (Some(pa), Some(pb)) => self.touching(pa, pb),
            _ => false,
        }
    }

    fn pick_reach(&self, piece: &Piece) -> f32 {
        piece
            .radius
            .map_or(self.pick_radius, |r| r * self.pick_scale)
    }

    /// Nearest active piece within pick reach of `point`. Ties keep registry order.
    pub fn piece_at(&self, pool: &PiecePool, active: &[PieceId], point: Vec2) -> Option<PieceId> {
        let mut best: Option<(PieceId, f32)> = None;
        for &id in active {
            let Some(piece) = pool.get(id) else {
                continue;
            };
            let d = piece.position.distance(point);
            if d >= self.pick_reach(piece) {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }
}
