//! Bounded piece pool: slots are recycled through a free list, handles carry a generation.

use glam::Vec2;
use thiserror::Error;

use crate::piece::{Piece, PieceId, PieceKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("piece pool exhausted: all {max} pieces are live")]
    Exhausted { max: usize },
}

#[derive(Debug)]
struct Slot {
    piece: Piece,
    generation: u32,
    live: bool,
}

#[derive(Debug)]
pub struct PiecePool {
    slots: Vec<Slot>,
    /// Indices of parked slots; last in, first out.
    free: Vec<u32>,
    max_size: usize,
    live: usize,
    piece_radius: f32,
}

impl PiecePool {
    pub fn new(max_size: usize, piece_radius: f32) -> Self {
        Self {
            slots: Vec::with_capacity(max_size),
            free: Vec::with_capacity(max_size),
            max_size,
            live: 0,
            piece_radius,
        }
    }

    /// Pool with `initial` slots constructed up front.
    pub fn with_prewarm(initial: usize, max_size: usize, piece_radius: f32) -> Self {
        let mut pool = Self::new(max_size, piece_radius);
        pool.prewarm(initial);
        pool
    }

    /// Construct parked slots until `count` exist (capped at the max size).
    pub fn prewarm(&mut self, count: usize) {
        let target = count.min(self.max_size);
        let start = self.slots.len();
        for _ in start..target {
            self.slots.push(Slot {
                piece: Piece::blank(),
                generation: 0,
                live: false,
            });
        }
        // Reverse so the lowest index is handed out first.
        self.free.extend((start..target).rev().map(|i| i as u32));
    }

    /// A settling piece of `kind` at `position`. Fails only when every slot up to the max is live.
    pub fn acquire(&mut self, kind: PieceKind, position: Vec2) -> Result<PieceId, PoolError> {
        let index = match self.free.pop() {
            Some(i) => i,
            None if self.slots.len() < self.max_size => {
                self.slots.push(Slot {
                    piece: Piece::blank(),
                    generation: 0,
                    live: false,
                });
                (self.slots.len() - 1) as u32
            }
            None => return Err(PoolError::Exhausted { max: self.max_size }),
        };
        let slot = &mut self.slots[index as usize];
        slot.live = true;
        slot.piece.spawn(kind, position, self.piece_radius);
        self.live += 1;
        Ok(PieceId {
            index,
            generation: slot.generation,
        })
    }

    /// Park the piece. Stale or unknown handles are ignored; returns whether anything was released.
    pub fn release(&mut self, id: PieceId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if !slot.live || slot.generation != id.generation {
            return false;
        }
        slot.piece.reset_for_pool();
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    pub fn get(&self, id: PieceId) -> Option<&Piece> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.live && s.generation == id.generation)
            .map(|s| &s.piece)
    }

    pub fn get_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.live && s.generation == id.generation)
            .map(|s| &mut s.piece)
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Slots constructed so far (live + parked).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::BodyMode;
    use std::collections::HashSet;

    fn kind(i: u8) -> PieceKind {
        PieceKind::new(i)
    }

    #[test]
    fn test_acquire_returns_settling_piece() {
        let mut pool = PiecePool::with_prewarm(4, 8, 0.45);
        let id = pool.acquire(kind(3), Vec2::new(1.0, 2.0)).unwrap();
        let p = pool.get(id).unwrap();
        assert_eq!(p.kind, kind(3));
        assert_eq!(p.position, Vec2::new(1.0, 2.0));
        assert_eq!(p.mode(), BodyMode::Settling);
        assert_eq!(p.radius, Some(0.45));
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn test_grows_to_max_then_fails() {
        let mut pool = PiecePool::new(3, 0.45);
        for _ in 0..3 {
            pool.acquire(kind(0), Vec2::ZERO).unwrap();
        }
        assert_eq!(
            pool.acquire(kind(0), Vec2::ZERO),
            Err(PoolError::Exhausted { max: 3 })
        );
        assert_eq!(pool.live_count(), 3);
    }

    #[test]
    fn test_released_piece_comes_back_clean() {
        let mut pool = PiecePool::new(2, 0.45);
        let a = pool.acquire(kind(1), Vec2::ZERO).unwrap();
        {
            let p = pool.get_mut(a).unwrap();
            p.set_highlight(true);
            p.begin_erase();
            p.animate_erase(0.8);
        }
        assert!(pool.release(a));
        let b = pool.acquire(kind(4), Vec2::new(0.0, 5.0)).unwrap();
        assert_eq!(b.index, a.index);
        let p = pool.get(b).unwrap();
        assert!(!p.is_highlighted());
        assert_eq!(p.mode(), BodyMode::Settling);
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.alpha, 1.0);
        assert_eq!(p.kind, kind(4));
    }

    #[test]
    fn test_stale_handle_is_dead() {
        let mut pool = PiecePool::new(2, 0.45);
        let a = pool.acquire(kind(0), Vec2::ZERO).unwrap();
        assert!(pool.release(a));
        assert!(!pool.release(a));
        let _b = pool.acquire(kind(0), Vec2::ZERO).unwrap();
        assert!(pool.get(a).is_none());
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn test_live_handles_never_exceed_max() {
        let mut pool = PiecePool::with_prewarm(2, 5, 0.45);
        let mut live: Vec<PieceId> = Vec::new();
        for step in 0..200u32 {
            if step % 3 == 2 && !live.is_empty() {
                let id = live.remove((step as usize) % live.len());
                assert!(pool.release(id));
                let p_ok = pool.acquire(kind(0), Vec2::ZERO).unwrap();
                assert!(!pool.get(p_ok).unwrap().is_highlighted());
                live.push(p_ok);
            } else if let Ok(id) = pool.acquire(kind(1), Vec2::ZERO) {
                pool.get_mut(id).unwrap().set_highlight(true);
                live.push(id);
            }
            let distinct: HashSet<_> = live.iter().copied().collect();
            assert_eq!(distinct.len(), live.len());
            assert!(live.len() <= pool.max_size());
            assert_eq!(pool.live_count(), live.len());
        }
    }
}
