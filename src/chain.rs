//! Drag state machine that grows a chain of touching, same-kind pieces.

use glam::Vec2;
use log::trace;

use crate::contact::ContactQuery;
use crate::piece::{PieceId, PieceKind};
use crate::pool::PiecePool;

/// What a release did with the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// No gesture was in progress.
    Empty,
    /// Too short; members were un-highlighted. Carries the discarded length.
    Discarded(usize),
    /// Long enough to erase. Members stay highlighted for the erase sequence.
    Finalized(Vec<PieceId>),
}

/// Effect of one pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEffect {
    Unchanged,
    Extended,
    /// Walked back along the path; carries how many members were dropped.
    Retreated(usize),
}

#[derive(Debug)]
pub struct ChainBuilder {
    members: Vec<PieceId>,
    kind: Option<PieceKind>,
    min_chain: usize,
}

impl ChainBuilder {
    pub fn new(min_chain: usize) -> Self {
        Self {
            members: Vec::new(),
            kind: None,
            min_chain,
        }
    }

    pub fn is_building(&self) -> bool {
        self.kind.is_some()
    }

    pub fn members(&self) -> &[PieceId] {
        &self.members
    }

    pub fn required_kind(&self) -> Option<PieceKind> {
        self.kind
    }

    /// Start a chain on the piece under `point`. Returns false if the press hit nothing.
    pub fn press(
        &mut self,
        pool: &mut PiecePool,
        active: &[PieceId],
        query: &ContactQuery,
        point: Vec2,
    ) -> bool {
        if self.is_building() {
            self.cancel(pool);
        }
        let Some(id) = query.piece_at(pool, active, point) else {
            trace!("press at {point} hit no piece");
            return false;
        };
        let Some(piece) = pool.get_mut(id) else {
            return false;
        };
        piece.set_highlight(true);
        self.kind = Some(piece.kind);
        self.members.push(id);
        true
    }

    /// Follow the pointer: retreat onto an earlier member, or extend onto a touching piece of the chain's kind.
    pub fn drag(
        &mut self,
        pool: &mut PiecePool,
        active: &[PieceId],
        query: &ContactQuery,
        point: Vec2,
    ) -> DragEffect {
        let Some(kind) = self.kind else {
            return DragEffect::Unchanged;
        };
        let Some(id) = query.piece_at(pool, active, point) else {
            return DragEffect::Unchanged;
        };

        if let Some(i) = self.members.iter().position(|&m| m == id) {
            if i + 1 == self.members.len() {
                return DragEffect::Unchanged;
            }
            let dropped = self.members.split_off(i + 1);
            for m in &dropped {
                if let Some(p) = pool.get_mut(*m) {
                    p.set_highlight(false);
                }
            }
            return DragEffect::Retreated(dropped.len());
        }

        let Some(&last) = self.members.last() else {
            return DragEffect::Unchanged;
        };
        if !query.touching_ids(pool, last, id) {
            trace!("piece {id:?} not touching chain tail");
            return DragEffect::Unchanged;
        }
        let Some(piece) = pool.get_mut(id) else {
            return DragEffect::Unchanged;
        };
        if piece.kind != kind {
            trace!("piece {id:?} is {}, chain is {}", piece.kind.name(), kind.name());
            return DragEffect::Unchanged;
        }
        piece.set_highlight(true);
        self.members.push(id);
        DragEffect::Extended
    }

    /// End the gesture. Long chains are handed over, short ones are dropped.
    pub fn release(&mut self, pool: &mut PiecePool) -> ChainOutcome {
        if !self.is_building() {
            return ChainOutcome::Empty;
        }
        self.kind = None;
        if self.members.len() >= self.min_chain {
            return ChainOutcome::Finalized(std::mem::take(&mut self.members));
        }
        let len = self.members.len();
        self.clear_highlights(pool);
        ChainOutcome::Discarded(len)
    }

    /// Abort regardless of length. Returns how many members were dropped.
    pub fn cancel(&mut self, pool: &mut PiecePool) -> usize {
        let len = self.members.len();
        self.clear_highlights(pool);
        self.kind = None;
        len
    }

    fn clear_highlights(&mut self, pool: &mut PiecePool) {
        for id in self.members.drain(..) {
            if let Some(p) = pool.get_mut(id) {
                p.set_highlight(false);
            }
        }
    }
}
