//! Game configuration: defaults, `key = value` config files, validation.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::piece::MAX_PALETTE;

/// One chain-length bonus step: chains of at least `min_length` pieces get `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainBonus {
    pub min_length: usize,
    pub multiplier: f32,
}

impl ChainBonus {
    pub const fn new(min_length: usize, multiplier: f32) -> Self {
        Self {
            min_length,
            multiplier,
        }
    }
}

/// Everything the board, scoring and physics read at startup. Read-only once the game runs.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Number of piece colours in play (1..=6).
    pub palette_size: u8,
    /// Shortest chain that erases on release.
    pub min_chain: usize,
    pub base_score_per_piece: u32,
    /// Index = combo - 1; combos past the end use the last entry.
    pub combo_multipliers: Vec<f32>,
    pub combo_reset_window: Duration,
    /// Kept sorted highest `min_length` first by `validate`.
    pub chain_bonus: Vec<ChainBonus>,
    pub pool_initial_size: usize,
    pub pool_max_size: usize,
    pub erase_animation: Duration,
    /// Pause between the end of an erase and the first replacement piece dropping in.
    pub fall_animation: Duration,
    pub spawn_interval: Duration,
    pub initial_spawn_interval: Duration,
    pub initial_piece_count: usize,
    pub spawn_min_x: f32,
    pub spawn_max_x: f32,
    pub spawn_height: f32,
    pub spawn_height_jitter: f32,
    pub piece_radius: f32,
    /// Contact reach as a multiple of the summed radii; must exceed 1.
    pub touch_tolerance: f32,
    /// Contact reach when a piece has no radius.
    pub fallback_touch_distance: f32,
    /// Pick reach as a multiple of a piece's radius.
    pub pick_scale: f32,
    /// Pick reach when a piece has no radius.
    pub pick_radius: f32,
    pub pit_width: f32,
    pub pit_height: f32,
    pub gravity: f32,
    /// `None` plays without a clock.
    pub round_time: Option<Duration>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            palette_size: 5,
            min_chain: 3,
            base_score_per_piece: 10,
            combo_multipliers: vec![1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0],
            combo_reset_window: Duration::from_secs(2),
            chain_bonus: vec![
                ChainBonus::new(15, 5.0),
                ChainBonus::new(12, 4.0),
                ChainBonus::new(10, 3.0),
                ChainBonus::new(7, 2.0),
                ChainBonus::new(5, 1.5),
            ],
            pool_initial_size: 100,
            pool_max_size: 150,
            erase_animation: Duration::from_millis(200),
            fall_animation: Duration::from_millis(300),
            spawn_interval: Duration::from_millis(300),
            initial_spawn_interval: Duration::ZERO,
            initial_piece_count: 30,
            spawn_min_x: -3.5,
            spawn_max_x: 3.5,
            spawn_height: 5.0,
            spawn_height_jitter: 3.0,
            piece_radius: 0.45,
            touch_tolerance: 2.5,
            fallback_touch_distance: 1.2,
            pick_scale: 1.1,
            pick_radius: 0.5,
            pit_width: 8.0,
            pit_height: 10.0,
            gravity: 19.6,
            round_time: Some(Duration::from_secs(60)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: expected `key = value`")]
    Syntax { line: usize },
    #[error("line {line}: unknown key `{key}`")]
    UnknownKey { line: usize, key: String },
    #[error("invalid value for `{key}`: {value}")]
    InvalidValue { key: String, value: String },
    #[error("combo multiplier table is empty")]
    EmptyComboTable,
    #[error("combo multiplier {0} must be positive")]
    InvalidMultiplier(f32),
    #[error("palette size {0} out of range 1..={MAX_PALETTE}")]
    PaletteSize(u8),
    #[error("minimum chain {0} must be at least 2")]
    MinChain(usize),
    #[error("pool max size {max} is smaller than its initial size {initial}")]
    PoolTooSmall { initial: usize, max: usize },
    #[error("pool max size {max} cannot hold the {pieces} initial pieces")]
    PoolBelowBoard { pieces: usize, max: usize },
    #[error("touch tolerance {0} must be greater than 1")]
    Tolerance(f32),
    #[error("spawn range {min}..{max} is empty or outside the pit")]
    SpawnRange { min: f32, max: f32 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },
}

impl GameConfig {
    /// Defaults overridden by the file at `path`, if any.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            config.apply_text(&text)?;
        }
        Ok(config)
    }

    /// Apply `key = value` lines. Blank lines and `#` comments are skipped.
    pub fn apply_text(&mut self, text: &str) -> Result<(), ConfigError> {
        for (line, key, value) in parse_key_values(text)? {
            self.set(line, &key, &value)?;
        }
        Ok(())
    }

    fn set(&mut self, line: usize, key: &str, value: &str) -> Result<(), ConfigError> {
        let bad = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let num = |v: &str| v.parse::<f32>().map_err(|_| bad());
        let int = |v: &str| v.parse::<usize>().map_err(|_| bad());
        let secs = |v: &str| {
            v.parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64)
                .ok_or_else(bad)
        };
        match key {
            "palette_size" => self.palette_size = value.parse().map_err(|_| bad())?,
            "min_chain" => self.min_chain = int(value)?,
            "base_score_per_piece" => self.base_score_per_piece = value.parse().map_err(|_| bad())?,
            "combo_multipliers" => {
                self.combo_multipliers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(num)
                    .collect::<Result<_, _>>()?;
            }
            "combo_reset_window" => self.combo_reset_window = secs(value)?,
            "chain_bonus" => {
                self.chain_bonus = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|step| {
                        let (len, mult) = step.split_once(':').ok_or_else(bad)?;
                        Ok(ChainBonus::new(int(len.trim())?, num(mult.trim())?))
                    })
                    .collect::<Result<_, ConfigError>>()?;
            }
            "pool_initial_size" => self.pool_initial_size = int(value)?,
            "pool_max_size" => self.pool_max_size = int(value)?,
            "erase_animation" => self.erase_animation = secs(value)?,
            "fall_animation" => self.fall_animation = secs(value)?,
            "spawn_interval" => self.spawn_interval = secs(value)?,
            "initial_spawn_interval" => self.initial_spawn_interval = secs(value)?,
            "initial_piece_count" => self.initial_piece_count = int(value)?,
            "spawn_min_x" => self.spawn_min_x = num(value)?,
            "spawn_max_x" => self.spawn_max_x = num(value)?,
            "spawn_height" => self.spawn_height = num(value)?,
            "spawn_height_jitter" => self.spawn_height_jitter = num(value)?,
            "piece_radius" => self.piece_radius = num(value)?,
            "touch_tolerance" => self.touch_tolerance = num(value)?,
            "fallback_touch_distance" => self.fallback_touch_distance = num(value)?,
            "pick_scale" => self.pick_scale = num(value)?,
            "pick_radius" => self.pick_radius = num(value)?,
            "pit_width" => self.pit_width = num(value)?,
            "pit_height" => self.pit_height = num(value)?,
            "gravity" => self.gravity = num(value)?,
            "round_time" => {
                let t = secs(value)?;
                self.round_time = (!t.is_zero()).then_some(t);
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    line,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reject configurations the game cannot run with and normalise the bonus table order.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.combo_multipliers.is_empty() {
            return Err(ConfigError::EmptyComboTable);
        }
        if let Some(&m) = self.combo_multipliers.iter().find(|m| !(**m > 0.0)) {
            return Err(ConfigError::InvalidMultiplier(m));
        }
        if let Some(b) = self.chain_bonus.iter().find(|b| !(b.multiplier > 0.0)) {
            return Err(ConfigError::InvalidMultiplier(b.multiplier));
        }
        if self.palette_size == 0 || self.palette_size > MAX_PALETTE {
            return Err(ConfigError::PaletteSize(self.palette_size));
        }
        if self.min_chain < 2 {
            return Err(ConfigError::MinChain(self.min_chain));
        }
        if self.pool_max_size < self.pool_initial_size {
            return Err(ConfigError::PoolTooSmall {
                initial: self.pool_initial_size,
                max: self.pool_max_size,
            });
        }
        if self.pool_max_size < self.initial_piece_count {
            return Err(ConfigError::PoolBelowBoard {
                pieces: self.initial_piece_count,
                max: self.pool_max_size,
            });
        }
        if !(self.touch_tolerance > 1.0) {
            return Err(ConfigError::Tolerance(self.touch_tolerance));
        }
        for (name, value) in [
            ("piece_radius", self.piece_radius),
            ("pit_width", self.pit_width),
            ("pit_height", self.pit_height),
            ("pick_scale", self.pick_scale),
            ("pick_radius", self.pick_radius),
            ("fallback_touch_distance", self.fallback_touch_distance),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        let half = self.pit_width / 2.0;
        if !(self.spawn_min_x < self.spawn_max_x) || self.spawn_min_x < -half || self.spawn_max_x > half
        {
            return Err(ConfigError::SpawnRange {
                min: self.spawn_min_x,
                max: self.spawn_max_x,
            });
        }
        if self.spawn_height_jitter < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "spawn_height_jitter",
                value: self.spawn_height_jitter,
            });
        }
        self.chain_bonus
            .sort_by(|a, b| b.min_length.cmp(&a.min_length));
        Ok(())
    }

    /// Floor of the pit in world units (pit is centred on the origin).
    pub fn floor_y(&self) -> f32 {
        -self.pit_height / 2.0
    }

    /// Top edge of the visible pit.
    pub fn top_y(&self) -> f32 {
        self.pit_height / 2.0
    }
}

/// Split `key = value` lines into (line number, key, value). Values may be quoted.
fn parse_key_values(s: &str) -> Result<Vec<(usize, String, String)>, ConfigError> {
    let mut out = Vec::new();
    for (i, raw) in s.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or(ConfigError::Syntax { line: i + 1 })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Syntax { line: i + 1 });
        }
        let value = value.trim().trim_matches('"').trim_matches('\'').trim();
        out.push((i + 1, key.to_string(), value.to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let mut c = GameConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.chain_bonus[0].min_length, 15);
        assert_eq!(c.min_chain, 3);
    }

    #[test]
    fn test_apply_text_overrides() {
        let mut c = GameConfig::default();
        c.apply_text(
            "# tuning\n\
             min_chain = 4\n\
             combo_multipliers = 1.0, 2.0\n\
             chain_bonus = 5:1.5, 9:3\n\
             round_time = 0\n\
             touch_tolerance = \"2.0\"\n",
        )
        .unwrap();
        assert_eq!(c.min_chain, 4);
        assert_eq!(c.combo_multipliers, vec![1.0, 2.0]);
        assert_eq!(c.round_time, None);
        assert_eq!(c.touch_tolerance, 2.0);
        c.validate().unwrap();
        assert_eq!(c.chain_bonus, vec![ChainBonus::new(9, 3.0), ChainBonus::new(5, 1.5)]);
    }

    #[test]
    fn test_unknown_key_reports_line() {
        let mut c = GameConfig::default();
        let err = c.apply_text("\nwobble = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { line: 2, .. }));
    }

    #[test]
    fn test_missing_equals_is_syntax_error() {
        let mut c = GameConfig::default();
        assert!(matches!(
            c.apply_text("min_chain 3"),
            Err(ConfigError::Syntax { line: 1 })
        ));
    }

    #[test]
    fn test_bad_number_rejected() {
        let mut c = GameConfig::default();
        assert!(matches!(
            c.apply_text("piece_radius = wide"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_combo_table_is_fatal() {
        let mut c = GameConfig::default();
        c.combo_multipliers.clear();
        assert!(matches!(c.validate(), Err(ConfigError::EmptyComboTable)));
    }

    #[test]
    fn test_pool_limits() {
        let mut c = GameConfig {
            pool_initial_size: 10,
            pool_max_size: 5,
            ..GameConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::PoolTooSmall { .. })));

        let mut c = GameConfig {
            pool_initial_size: 10,
            pool_max_size: 20,
            initial_piece_count: 30,
            ..GameConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::PoolBelowBoard { .. })));
    }

    #[test]
    fn test_tolerance_must_exceed_one() {
        let mut c = GameConfig {
            touch_tolerance: 1.0,
            ..GameConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Tolerance(_))));
    }

    #[test]
    fn test_palette_bounds() {
        let mut c = GameConfig {
            palette_size: 7,
            ..GameConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::PaletteSize(7))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = GameConfig::load(Some(Path::new("/nonexistent/chainpit.conf"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
