//! chainpit: link touching pieces of one colour in a physics-driven pit, in the terminal.

mod app;
mod board;
mod chain;
mod config;
mod contact;
mod input;
mod logging;
mod physics;
mod piece;
mod pool;
mod score;
mod tasks;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use board::Board;
use clap::{Parser, ValueEnum};
use config::GameConfig;
use log::{LevelFilter, info};
use physics::PitPhysics;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::time::Duration;
use theme::{Palette, Theme};

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = GameConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate().context("invalid game configuration")?;

    if let Some(path) = &args.log_file {
        logging::init(path, args.log_level.into())
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }

    let theme = Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    info!(
        "config: {} colours, min chain {}, round {:?}, seed {:?}",
        config.palette_size, config.min_chain, config.round_time, args.seed
    );

    let physics = PitPhysics::from_config(&config);
    let board = Board::new(config, physics, rng);
    let mut app = App::new(board, theme, args.tick_rate, args.no_animation);
    app.run()?;
    Ok(())
}

/// Chain-puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "chainpit",
    version,
    about = "Chain puzzle in the terminal: drag across touching pieces of one colour to erase them.",
    long_about = "chainpit drops round pieces into a pit where they fall and settle under gravity.\n\n\
        Press on a piece and drag across touching pieces of the same colour; release to erase \
        a chain of three or more. Chains scored in quick succession build a combo multiplier, \
        and long chains earn a bonus. Erased pieces are replaced from the top.\n\n\
        CONTROLS:\n  Mouse drag  Link pieces   S / Tab  Shuffle colours   R  Restart\n  P           Pause         Q / Esc  Quit\n\n\
        Use --config to tune the rules (key = value lines) and --theme to load a btop-style theme."
)]
struct Args {
    /// Game config file (`key = value` per line). Built-in defaults if not set.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    palette: Palette,

    /// Game mode: timed (round clock) or endless (no clock).
    #[arg(short, long, default_value = "timed")]
    mode: GameMode,

    /// Number of piece colours in play (1-6).
    #[arg(long, value_name = "N")]
    colors: Option<u8>,

    /// Shortest chain that erases.
    #[arg(long, value_name = "N")]
    min_chain: Option<usize>,

    /// In mode 'timed': round length in seconds.
    #[arg(long, value_name = "SECS")]
    round_secs: Option<u64>,

    /// Pieces dropped in at the start of a round.
    #[arg(long, value_name = "N")]
    pieces: Option<usize>,

    /// Game logic ticks per second (physics, timers).
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    tick_rate: f64,

    /// Seed for piece colours and spawn positions (reproducible rounds).
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Disable erase fade animation.
    #[arg(long)]
    no_animation: bool,

    /// Write log records to this file.
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log level for --log-file.
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
}

impl Args {
    fn apply_overrides(&self, config: &mut GameConfig) {
        if let Some(n) = self.colors {
            config.palette_size = n;
        }
        if let Some(n) = self.min_chain {
            config.min_chain = n;
        }
        if let Some(n) = self.pieces {
            config.initial_piece_count = n;
        }
        match self.mode {
            GameMode::Endless => config.round_time = None,
            GameMode::Timed => {
                if let Some(secs) = self.round_secs {
                    config.round_time = (secs > 0).then(|| Duration::from_secs(secs));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum GameMode {
    #[default]
    Timed,
    Endless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "chainpit",
            "--colors",
            "4",
            "--min-chain",
            "4",
            "--round-secs",
            "90",
            "--pieces",
            "40",
        ]);
        let mut c = GameConfig::default();
        args.apply_overrides(&mut c);
        assert_eq!(c.palette_size, 4);
        assert_eq!(c.min_chain, 4);
        assert_eq!(c.initial_piece_count, 40);
        assert_eq!(c.round_time, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_endless_mode_has_no_clock() {
        let args = Args::parse_from(["chainpit", "--mode", "endless", "--round-secs", "30"]);
        let mut c = GameConfig::default();
        args.apply_overrides(&mut c);
        assert_eq!(c.round_time, None);
    }

    #[test]
    fn test_palette_aliases() {
        let args = Args::parse_from(["chainpit", "--palette", "colourblind", "--log-level", "trace"]);
        assert_eq!(args.palette, Palette::Colorblind);
        assert_eq!(LevelFilter::from(args.log_level), LevelFilter::Trace);
    }

    #[test]
    fn test_args_debug_assert() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
