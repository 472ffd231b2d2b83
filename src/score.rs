//! Score and combo: chain length → score delta, combo window countdown.

use log::{debug, info};
use std::time::Duration;

use crate::config::{ChainBonus, GameConfig};

/// Chains at least this long get an extra log line.
const EXCELLENT_CHAIN: usize = 7;

/// Result of scoring one finalized chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAward {
    pub length: usize,
    pub delta: u64,
    pub combo: u32,
    pub combo_multiplier: f32,
    pub chain_bonus: f32,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct ScoreRules {
    pub base_score_per_piece: u32,
    pub min_chain: usize,
    pub combo_multipliers: Vec<f32>,
    /// Highest `min_length` first.
    pub chain_bonus: Vec<ChainBonus>,
    pub combo_reset_window: Duration,
}

impl ScoreRules {
    pub fn from_config(config: &GameConfig) -> Self {
        let mut chain_bonus = config.chain_bonus.clone();
        chain_bonus.sort_by(|a, b| b.min_length.cmp(&a.min_length));
        Self {
            base_score_per_piece: config.base_score_per_piece,
            min_chain: config.min_chain,
            combo_multipliers: config.combo_multipliers.clone(),
            chain_bonus,
            combo_reset_window: config.combo_reset_window,
        }
    }

    /// `table[combo - 1]`, clamped to the last entry; 1.0 for no combo.
    pub fn combo_multiplier(&self, combo: u32) -> f32 {
        if combo == 0 {
            return 1.0;
        }
        let index = (combo as usize - 1).min(self.combo_multipliers.len().saturating_sub(1));
        self.combo_multipliers.get(index).copied().unwrap_or(1.0)
    }

    /// First (largest) breakpoint the length reaches, else 1.0.
    pub fn chain_bonus(&self, length: usize) -> f32 {
        self.chain_bonus
            .iter()
            .find(|b| length >= b.min_length)
            .map_or(1.0, |b| b.multiplier)
    }
}

#[derive(Debug, Clone)]
pub struct ScoreBoard {
    rules: ScoreRules,
    score: u64,
    combo: u32,
    combo_left: Option<Duration>,
}

impl ScoreBoard {
    pub fn new(rules: ScoreRules) -> Self {
        Self {
            rules,
            score: 0,
            combo: 0,
            combo_left: None,
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn combo_time_left(&self) -> Option<Duration> {
        self.combo_left
    }

    /// Remaining combo window as 0..=1, for gauges.
    pub fn combo_ratio(&self) -> f64 {
        let window = self.rules.combo_reset_window.as_secs_f64();
        match self.combo_left {
            Some(left) if window > 0.0 => (left.as_secs_f64() / window).min(1.0),
            _ => 0.0,
        }
    }

    /// Score a finalized chain. Chains below the minimum change nothing.
    pub fn on_chain_finalized(&mut self, length: usize) -> Option<ScoreAward> {
        if length < self.rules.min_chain {
            return None;
        }
        self.combo = self.combo.saturating_add(1);
        self.combo_left = Some(self.rules.combo_reset_window);

        let combo_multiplier = self.rules.combo_multiplier(self.combo);
        let chain_bonus = self.rules.chain_bonus(length);
        let raw = f64::from(self.rules.base_score_per_piece)
            * length as f64
            * f64::from(combo_multiplier)
            * f64::from(chain_bonus);
        let delta = raw.round_ties_even().max(0.0) as u64;
        self.score = self.score.saturating_add(delta);

        if length >= EXCELLENT_CHAIN {
            info!("excellent {length}-chain, bonus x{chain_bonus:.1}");
        }
        debug!(
            "chain {length}: +{delta} (combo {} x{combo_multiplier}, bonus x{chain_bonus}), total {}",
            self.combo, self.score
        );
        Some(ScoreAward {
            length,
            delta,
            combo: self.combo,
            combo_multiplier,
            chain_bonus,
            total: self.score,
        })
    }

    /// Run the combo window down. Returns true when the combo expired during this tick.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(left) = self.combo_left else {
            return false;
        };
        let left = left.saturating_sub(dt);
        if left.is_zero() {
            self.combo_left = None;
            self.combo = 0;
            debug!("combo expired");
            return true;
        }
        self.combo_left = Some(left);
        false
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
        self.combo_left = None;
    }

    pub fn reset_all(&mut self) {
        self.score = 0;
        self.reset_combo();
    }
}
