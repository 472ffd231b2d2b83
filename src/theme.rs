//! Colours: btop-style `theme[key]="value"` files, palette variants, hex parsing.

use clap::ValueEnum;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::piece::{MAX_PALETTE, PieceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone)]
pub struct Theme {
    /// Piece colours by kind: red, blue, green, yellow, purple, cyan.
    pub pieces: [Color; MAX_PALETTE as usize],
    /// Pit background.
    pub bg: Color,
    /// Pit walls and panel borders.
    pub frame: Color,
    pub text: Color,
    pub title: Color,
    /// Secondary text and empty gauge.
    pub muted: Color,
    /// Chain outline and link line.
    pub highlight: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const ONEDARK_PIECES: [Color; 6] = [
    Color::Rgb(0xE0, 0x6C, 0x75),
    Color::Rgb(0x61, 0xAF, 0xEF),
    Color::Rgb(0x98, 0xC3, 0x79),
    Color::Rgb(0xE5, 0xC0, 0x7B),
    Color::Rgb(0xC6, 0x78, 0xDD),
    Color::Rgb(0x56, 0xB6, 0xC2),
];

const HIGH_CONTRAST_PIECES: [Color; 6] = [
    Color::Rgb(0xFF, 0x00, 0x00),
    Color::Rgb(0x00, 0x88, 0xFF),
    Color::Rgb(0x00, 0xFF, 0x00),
    Color::Rgb(0xFF, 0xFF, 0x00),
    Color::Rgb(0xFF, 0x00, 0xFF),
    Color::Rgb(0x00, 0xFF, 0xFF),
];

// Tol's bright scheme; red/green never carry meaning alone.
const COLORBLIND_PIECES: [Color; 6] = [
    Color::Rgb(0xCC, 0x33, 0x11),
    Color::Rgb(0x00, 0x77, 0xBB),
    Color::Rgb(0x00, 0x99, 0x88),
    Color::Rgb(0xEE, 0x77, 0x33),
    Color::Rgb(0xEE, 0x33, 0x77),
    Color::Rgb(0xBB, 0xBB, 0x00),
];

/// btop keys tried for each piece colour, in order.
const PIECE_KEYS: [&[&str]; 6] = [
    &["cpu_end", "temp_end"],
    &["cpu_box"],
    &["mem_box", "cpu_start"],
    &["cpu_mid", "title"],
    &["net_box"],
    &["hi_fg", "proc_misc"],
];

impl Default for Theme {
    fn default() -> Self {
        Self {
            pieces: ONEDARK_PIECES,
            bg: Color::Rgb(0x28, 0x2C, 0x34),
            frame: Color::Rgb(0x3F, 0x44, 0x4F),
            text: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            muted: Color::Rgb(0x5C, 0x63, 0x70),
            highlight: Color::Rgb(0xFF, 0xFF, 0xFF),
        }
    }
}

impl Theme {
    /// Theme from a btop-style file, or One Dark when `path` is None or missing.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            _ => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Swap the piece colours for an accessibility palette. UI colours are kept.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => self.pieces = HIGH_CONTRAST_PIECES,
            Palette::Colorblind => self.pieces = COLORBLIND_PIECES,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()));
        let base = Self::default();
        let mut pieces = base.pieces;
        for (slot, keys) in pieces.iter_mut().zip(PIECE_KEYS) {
            if let Some(c) = get(keys) {
                *slot = c;
            }
        }
        Self {
            pieces,
            bg: get(&["main_bg", "meter_bg"]).unwrap_or(base.bg),
            frame: get(&["div_line"]).unwrap_or(base.frame),
            text: get(&["main_fg"]).unwrap_or(base.text),
            title: get(&["title"]).unwrap_or(base.title),
            muted: get(&["inactive_fg"]).unwrap_or(base.muted),
            highlight: get(&["selected_fg"]).unwrap_or(base.highlight),
        }
    }

    pub fn piece_color(&self, kind: PieceKind) -> Color {
        self.pieces[usize::from(kind.index()) % self.pieces.len()]
    }
}

/// `theme[key]="value"` lines into a map. Other lines are skipped.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("theme[")?;
            let (key, rest) = rest.split_once(']')?;
            let (_, value) = rest.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let hex = s.trim().trim_start_matches('#');
    let bad = || ThemeError::InvalidHex(s.to_string());
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| bad());
    if !hex.is_ascii() {
        return Err(bad());
    }
    match hex.len() {
        6 => Ok(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        3 => Ok(Color::Rgb(
            channel(&hex[0..1])? * 17,
            channel(&hex[1..2])? * 17,
            channel(&hex[2..3])? * 17,
        )),
        _ => Err(bad()),
    }
}
