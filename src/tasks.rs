//! Timed operations in flight (spawn runs, erase animations), advanced once per tick.

use std::time::Duration;

use crate::piece::PieceId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Drop `count` new pieces, one every `interval` (all at once when zero).
    /// `scatter` spreads spawn heights, as for the opening fill.
    Spawn {
        count: usize,
        interval: Duration,
        scatter: bool,
    },
    /// Pieces shrinking away; released to the pool when the task comes due.
    Erase {
        pieces: Vec<PieceId>,
        duration: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub kind: TaskKind,
    pub remaining: Duration,
}

impl Task {
    /// Progress of an erase in 0..=1; `None` for other kinds.
    pub fn erase_progress(&self) -> Option<f32> {
        match &self.kind {
            TaskKind::Erase { duration, .. } if !duration.is_zero() => {
                Some(1.0 - (self.remaining.as_secs_f32() / duration.as_secs_f32()).min(1.0))
            }
            TaskKind::Erase { .. } => Some(1.0),
            TaskKind::Spawn { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TaskKind, delay: Duration) {
        self.tasks.push(Task {
            kind,
            remaining: delay,
        });
    }

    /// Count every task down by `dt` and hand back the ones that came due, in scheduling order.
    pub fn advance(&mut self, dt: Duration) -> Vec<TaskKind> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.tasks.len() {
            let task = &mut self.tasks[i];
            task.remaining = task.remaining.saturating_sub(dt);
            if task.remaining.is_zero() {
                due.push(self.tasks.remove(i).kind);
            } else {
                i += 1;
            }
        }
        due
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.iter()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
