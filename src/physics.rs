//! Rigid-circle physics for the pit.
//!
//! The board only talks to the [`Physics`] trait. `PitPhysics` is a small impulse solver: gravity
//! on settling bodies, circle-circle contacts with restitution and positional correction, then the
//! walls and floor. Held bodies are immovable obstacles; erasing and pooled bodies are skipped.

use glam::Vec2;

use crate::config::GameConfig;
use crate::piece::{BodyMode, PieceId};
use crate::pool::PiecePool;

pub trait Physics {
    /// Advance every active body by `dt` seconds.
    fn step(&mut self, pool: &mut PiecePool, active: &[PieceId], dt: f32);
}

/// Overlap tolerated before positional correction kicks in.
const SLOP: f32 = 0.005;
/// Fraction of the remaining overlap removed per iteration.
const BETA: f32 = 0.4;
/// Bodies above this speed are clamped; keeps a large dt from tunnelling through the floor.
const MAX_SPEED: f32 = 30.0;

#[derive(Debug, Clone, Copy)]
struct Body {
    id: PieceId,
    pos: Vec2,
    vel: Vec2,
    radius: f32,
    inv_mass: f32,
}

#[derive(Debug, Clone)]
pub struct PitPhysics {
    pub half_width: f32,
    pub floor_y: f32,
    pub gravity: f32,
    pub restitution: f32,
    pub iterations: usize,
    /// Velocity kept per second; 1.0 disables damping.
    pub damping: f32,
    /// Collider size for pieces without radius metadata.
    pub default_radius: f32,
}

impl PitPhysics {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            half_width: config.pit_width / 2.0,
            floor_y: config.floor_y(),
            gravity: config.gravity,
            restitution: 0.2,
            iterations: 6,
            damping: 0.6,
            default_radius: config.piece_radius,
        }
    }

    fn solve_pair(&self, a: &mut Body, b: &mut Body) {
        let inv_sum = a.inv_mass + b.inv_mass;
        if inv_sum == 0.0 {
            return;
        }
        let d = b.pos - a.pos;
        let rsum = a.radius + b.radius;
        let dist2 = d.length_squared();
        if dist2 >= rsum * rsum {
            return;
        }
        let dist = dist2.sqrt();
        let n = if dist > 1.0e-6 { d / dist } else { Vec2::Y };
        let depth = rsum - dist;

        let rel_v_n = (b.vel - a.vel).dot(n);
        if rel_v_n < 0.0 {
            let jn = -(1.0 + self.restitution) * rel_v_n / inv_sum;
            a.vel -= n * jn * a.inv_mass;
            b.vel += n * jn * b.inv_mass;
        }

        let corr = (depth - SLOP).max(0.0) * BETA / inv_sum;
        if corr > 0.0 {
            a.pos -= n * corr * a.inv_mass;
            b.pos += n * corr * b.inv_mass;
        }
    }

    fn confine(&self, body: &mut Body) {
        if body.inv_mass == 0.0 {
            return;
        }
        let left = -self.half_width + body.radius;
        let right = self.half_width - body.radius;
        if body.pos.x < left {
            body.pos.x = left;
            body.vel.x = body.vel.x.abs() * self.restitution;
        } else if body.pos.x > right {
            body.pos.x = right;
            body.vel.x = -body.vel.x.abs() * self.restitution;
        }
        let floor = self.floor_y + body.radius;
        if body.pos.y < floor {
            body.pos.y = floor;
            body.vel.y = body.vel.y.abs() * self.restitution;
        }
    }
}

impl Physics for PitPhysics {
    fn step(&mut self, pool: &mut PiecePool, active: &[PieceId], dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let keep = self.damping.powf(dt);
        let mut bodies: Vec<Body> = active
            .iter()
            .filter_map(|&id| {
                let p = pool.get(id).filter(|p| p.is_collidable())?;
                let inv_mass = if p.mode() == BodyMode::Held { 0.0 } else { 1.0 };
                Some(Body {
                    id,
                    pos: p.position,
                    vel: p.velocity,
                    radius: p.radius.unwrap_or(self.default_radius),
                    inv_mass,
                })
            })
            .collect();

        for b in bodies.iter_mut().filter(|b| b.inv_mass > 0.0) {
            b.vel.y -= self.gravity * dt;
            b.vel = (b.vel * keep).clamp_length_max(MAX_SPEED);
            b.pos += b.vel * dt;
        }

        for _ in 0..self.iterations {
            for i in 0..bodies.len() {
                let (head, tail) = bodies.split_at_mut(i + 1);
                let a = &mut head[i];
                for b in tail.iter_mut() {
                    self.solve_pair(a, b);
                }
            }
            for b in &mut bodies {
                self.confine(b);
            }
        }

        for b in bodies.iter().filter(|b| b.inv_mass > 0.0) {
            if let Some(p) = pool.get_mut(b.id) {
                p.position = b.pos;
                p.velocity = b.vel;
            }
        }
    }
}

/// Leaves every body where it is.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct NoPhysics;

#[cfg(test)]
impl Physics for NoPhysics {
    fn step(&mut self, _pool: &mut PiecePool, _active: &[PieceId], _dt: f32) {}
}
