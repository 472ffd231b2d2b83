//! Layout and drawing: pit, sidebar, score popups, pause and game-over overlays.

use crate::board::{Board, GamePhase, PieceView};
use crate::config::GameConfig;
use crate::piece::PieceKind;
use crate::theme::Theme;
use glam::Vec2;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

const SIDEBAR_WIDTH: u16 = 24;
/// Smallest pit (inner rows) worth drawing.
const MIN_PIT_ROWS: u16 = 6;
/// How long a score popup floats above an erased chain.
pub const POPUP_TTL: Duration = Duration::from_millis(900);
/// Popups drift up this far (world units) over their lifetime.
const POPUP_RISE: f32 = 1.0;

/// Floating "+N" over an erased chain.
#[derive(Debug, Clone)]
pub struct Popup {
    pub text: String,
    pub position: Vec2,
    pub color: Color,
    pub ttl: Duration,
}

/// Front-end state that lives across frames.
#[derive(Default)]
pub struct ViewState {
    pub paused: bool,
    pub no_animation: bool,
    /// Best score this session.
    pub best: u64,
    pub popups: Vec<Popup>,
    /// Finalized pieces whose fade has not been built yet (needs the current pit rect).
    pub pending_fade: Vec<PieceView>,
    fade: Option<Effect>,
    fade_clock: Option<Instant>,
}

impl ViewState {
    pub fn new(no_animation: bool) -> Self {
        Self {
            no_animation,
            ..Self::default()
        }
    }

    pub fn tick_popups(&mut self, dt: Duration) {
        for p in &mut self.popups {
            p.ttl = p.ttl.saturating_sub(dt);
        }
        self.popups.retain(|p| !p.ttl.is_zero());
    }

    pub fn clear_effects(&mut self) {
        self.popups.clear();
        self.pending_fade.clear();
        self.fade = None;
        self.fade_clock = None;
    }
}

/// Screen regions for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Areas {
    pub pit_outer: Rect,
    /// Drawable pit; one cell holds two vertical pixels.
    pub pit: Rect,
    pub sidebar: Rect,
}

/// Inner pit size (cols, rows) so that pixels (one column by half a row) keep the pit's aspect.
pub fn pit_size(avail_cols: u16, avail_rows: u16, config: &GameConfig) -> (u16, u16) {
    let aspect = f64::from(config.pit_width) / f64::from(config.pit_height);
    let rows_for_cols = (f64::from(avail_cols) / (2.0 * aspect)).floor();
    let rows = f64::from(avail_rows).min(rows_for_cols).max(0.0);
    let cols = (rows * 2.0 * aspect).round().min(f64::from(avail_cols));
    (cols as u16, rows as u16)
}

/// Pit centred next to the sidebar, both inside `area`.
pub fn layout(area: Rect, config: &GameConfig) -> Areas {
    let avail_cols = area.width.saturating_sub(2 + SIDEBAR_WIDTH);
    let avail_rows = area.height.saturating_sub(2);
    let (cols, rows) = pit_size(avail_cols, avail_rows, config);
    let total_w = cols + 2 + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(rows + 2) / 2;
    let pit_outer = Rect {
        x,
        y,
        width: (cols + 2).min(area.width),
        height: (rows + 2).min(area.height),
    };
    Areas {
        pit_outer,
        pit: Rect {
            x: x + 1,
            y: y + 1,
            width: cols,
            height: rows,
        },
        sidebar: Rect {
            x: x + pit_outer.width,
            y,
            width: SIDEBAR_WIDTH.min((area.x + area.width).saturating_sub(x + pit_outer.width)),
            height: pit_outer.height.max(24).min((area.y + area.height).saturating_sub(y)),
        },
    }
}

/// World point under pixel (`px`, `py`) of a `cols` × `2*rows` pixel grid.
fn pixel_to_world(px: f32, py: f32, cols: u16, rows: u16, config: &GameConfig) -> Vec2 {
    let x = -config.pit_width / 2.0 + (px + 0.5) / f32::from(cols) * config.pit_width;
    let y = config.top_y() - (py + 0.5) / (2.0 * f32::from(rows)) * config.pit_height;
    Vec2::new(x, y)
}

/// World point at the centre of terminal cell (`column`, `row`); `None` outside the pit.
pub fn cell_to_world(pit: Rect, config: &GameConfig, column: u16, row: u16) -> Option<Vec2> {
    if !pit.contains(Position::new(column, row)) {
        return None;
    }
    let px = f32::from(column - pit.x);
    let py = f32::from(row - pit.y) * 2.0 + 0.5;
    Some(pixel_to_world(px, py, pit.width, pit.height, config))
}

/// Terminal cell containing world point `p`; `None` outside the pit.
pub fn world_to_cell(pit: Rect, config: &GameConfig, p: Vec2) -> Option<(u16, u16)> {
    if pit.width == 0 || pit.height == 0 {
        return None;
    }
    let fx = (p.x + config.pit_width / 2.0) / config.pit_width * f32::from(pit.width);
    let fy = (config.top_y() - p.y) / config.pit_height * f32::from(pit.height);
    if fx < 0.0 || fy < 0.0 || fx >= f32::from(pit.width) || fy >= f32::from(pit.height) {
        return None;
    }
    Some((pit.x + fx as u16, pit.y + fy as u16))
}

/// Blend `color` toward `bg` by `alpha` (1.0 = unchanged). Non-RGB colours just switch at half.
fn fade(color: Color, bg: Color, alpha: f32) -> Color {
    match (color, bg) {
        (Color::Rgb(r, g, b), Color::Rgb(br, bgc, bb)) => {
            let mix = |c: u8, base: u8| {
                (f32::from(base) + (f32::from(c) - f32::from(base)) * alpha.clamp(0.0, 1.0)) as u8
            };
            Color::Rgb(mix(r, br), mix(g, bgc), mix(b, bb))
        }
        _ if alpha >= 0.5 => color,
        _ => bg,
    }
}

fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Colour of one pixel: chain link, highlight ring, piece body, or background.
fn pixel_color(
    p: Vec2,
    pieces: &[PieceView],
    links: &[(Vec2, Vec2)],
    pixel: f32,
    theme: &Theme,
) -> Color {
    if links
        .iter()
        .any(|(a, b)| distance_to_segment(p, *a, *b) < pixel * 0.5)
    {
        return theme.highlight;
    }
    let hit = pieces
        .iter()
        .filter(|v| v.alpha > 0.02)
        .map(|v| (v, p.distance(v.position)))
        .filter(|(v, d)| *d < v.radius * v.scale)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    let Some((v, d)) = hit else {
        return theme.bg;
    };
    if v.highlighted && !v.erasing && d > v.radius * v.scale - pixel {
        return theme.highlight;
    }
    fade(theme.piece_color(v.kind), theme.bg, v.alpha)
}

/// Draw one frame. Returns the pit rect for mapping mouse cells back to the world.
pub fn draw(
    frame: &mut Frame,
    board: &Board,
    theme: &Theme,
    view: &mut ViewState,
    now: Instant,
) -> Rect {
    let area = frame.area();
    let areas = layout(area, board.config());
    if areas.pit.height < MIN_PIT_ROWS {
        Paragraph::new("Terminal too small")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.text).bg(theme.bg))
            .render(area, frame.buffer_mut());
        return areas.pit;
    }

    draw_pit(frame, board, theme, view, areas);
    draw_sidebar(frame, board, theme, view, areas.sidebar);

    if !view.no_animation {
        apply_erase_fade(frame, board.config(), theme, view, areas.pit, now);
    } else {
        view.pending_fade.clear();
    }

    if view.paused {
        draw_pause_overlay(frame, theme, area);
    } else if board.phase() == GamePhase::GameOver {
        draw_game_over(frame, board, theme, view.best, areas.pit_outer);
    }
    areas.pit
}

fn draw_pit(frame: &mut Frame, board: &Board, theme: &Theme, view: &ViewState, areas: Areas) {
    let config = board.config();
    let title = match board.time_left() {
        Some(left) => {
            let secs = left.as_secs_f32().ceil() as u64;
            format!(" chainpit  {:02}:{:02} ", secs / 60, secs % 60)
        }
        None => " chainpit ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.frame).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    block.render(areas.pit_outer, frame.buffer_mut());

    let pit = areas.pit;
    let pieces: Vec<PieceView> = board.pieces().collect();
    let chain: Vec<Vec2> = board
        .chain()
        .iter()
        .filter_map(|id| pieces.iter().find(|v| v.id == *id))
        .map(|v| v.position)
        .collect();
    let links: Vec<(Vec2, Vec2)> = chain.windows(2).map(|w| (w[0], w[1])).collect();
    let pixel = config.pit_width / f32::from(pit.width.max(1));

    let buf = frame.buffer_mut();
    for row in 0..pit.height {
        for col in 0..pit.width {
            let top = pixel_to_world(
                f32::from(col),
                f32::from(row * 2),
                pit.width,
                pit.height,
                config,
            );
            let bottom = pixel_to_world(
                f32::from(col),
                f32::from(row * 2 + 1),
                pit.width,
                pit.height,
                config,
            );
            let fg = pixel_color(top, &pieces, &links, pixel, theme);
            let bg = pixel_color(bottom, &pieces, &links, pixel, theme);
            buf[(pit.x + col, pit.y + row)]
                .set_symbol("▀")
                .set_style(Style::default().fg(fg).bg(bg));
        }
    }

    for popup in &view.popups {
        let life = 1.0 - popup.ttl.as_secs_f32() / POPUP_TTL.as_secs_f32();
        let at = popup.position + Vec2::Y * (POPUP_RISE * life);
        let Some((x, y)) = world_to_cell(pit, config, at) else {
            continue;
        };
        let half = (popup.text.len() as u16) / 2;
        let x = x.saturating_sub(half).max(pit.x);
        let room = (pit.x + pit.width).saturating_sub(x) as usize;
        let text: String = popup.text.chars().take(room).collect();
        frame
            .buffer_mut()
            .set_string(x, y, text, Style::default().fg(popup.color).bg(theme.bg).bold());
    }
}

/// Fade the cells of freshly erased pieces to the background.
fn apply_erase_fade(
    frame: &mut Frame,
    config: &GameConfig,
    theme: &Theme,
    view: &mut ViewState,
    pit: Rect,
    now: Instant,
) {
    if !view.pending_fade.is_empty() {
        let cells = covered_cells(pit, config, &view.pending_fade);
        view.pending_fade.clear();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            cells.contains(&(pos.x, pos.y))
        }));
        let ms = config.erase_animation.as_millis().min(u128::from(u32::MAX)) as u32;
        let effect = fx::fade_to(theme.bg, theme.bg, (ms.max(1), Interpolation::Linear))
            .with_filter(filter)
            .with_area(pit);
        view.fade = Some(effect);
        view.fade_clock = None;
    }

    let delta = view
        .fade_clock
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    view.fade_clock = Some(now);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;

    if let Some(effect) = view.fade.as_mut() {
        frame.render_effect(effect, pit, TfxDuration::from_millis(delta_ms));
    }
    if view.fade.as_ref().is_some_and(|e| e.done()) {
        view.fade = None;
    }
}

/// Terminal cells whose centre lies inside any of `pieces`.
fn covered_cells(pit: Rect, config: &GameConfig, pieces: &[PieceView]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for row in pit.y..pit.y + pit.height {
        for col in pit.x..pit.x + pit.width {
            let Some(p) = cell_to_world(pit, config, col, row) else {
                continue;
            };
            if pieces
                .iter()
                .any(|v| p.distance(v.position) < v.radius * v.scale.max(1.0))
            {
                set.insert((col, row));
            }
        }
    }
    set
}

fn draw_sidebar(frame: &mut Frame, board: &Board, theme: &Theme, view: &ViewState, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.text);
    let border_style = Style::default().fg(theme.frame).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Score, best, pieces
            Constraint::Length(1),
            Constraint::Length(4), // Combo label + timer bar
            Constraint::Length(1),
            Constraint::Length(4), // Colours
            Constraint::Length(1),
            Constraint::Length(3), // Phase
            Constraint::Length(1),
            Constraint::Min(0), // Keys
        ])
        .split(area);

    let stats = section(frame, chunks[0], border_style);
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    Paragraph::new(vec![
        stat("Score: ", board.score().to_string()),
        stat("Best: ", view.best.max(board.score()).to_string()),
        stat("Pieces: ", board.active_count().to_string()),
    ])
    .render(stats, frame.buffer_mut());

    let combo = section(frame, chunks[2], border_style);
    let combo_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(combo);
    let label = match (board.combo(), board.combo_time_left()) {
        (0, _) | (_, None) => "Combo".to_string(),
        (n, Some(left)) => format!("Combo x{n}  {:.1}s", left.as_secs_f32()),
    };
    Paragraph::new(Line::from(Span::styled(label, title_style)))
        .render(combo_rows[0], frame.buffer_mut());
    let ratio = board.combo_ratio();
    let bar_color = if ratio > 0.6 {
        Color::Green
    } else if ratio > 0.3 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio.clamp(0.0, 1.0))
        .label("")
        .gauge_style(Style::default().fg(bar_color).bg(theme.muted))
        .render(combo_rows[1], frame.buffer_mut());

    let colours = section(frame, chunks[4], border_style);
    Paragraph::new(Line::from(Span::styled("Colours", title_style)))
        .render(colours, frame.buffer_mut());
    let strip_y = colours.y + 1;
    if strip_y < colours.y + colours.height {
        for i in 0..board.config().palette_size {
            let x = colours.x + u16::from(i) * 2;
            if x >= colours.x + colours.width {
                break;
            }
            let c = theme.piece_color(PieceKind::new(i));
            frame
                .buffer_mut()
                .set_string(x, strip_y, "●", Style::default().fg(c));
        }
    }

    let status = section(frame, chunks[6], border_style);
    let phase = match (board.phase(), board.chain_kind()) {
        (GamePhase::Connecting, Some(kind)) => {
            format!("{} {}", board.chain().len(), kind.name())
        }
        (phase, _) => phase.label().to_string(),
    };
    let phase_color = match board.phase() {
        GamePhase::Connecting => board
            .chain_kind()
            .map_or(theme.text, |k| theme.piece_color(k)),
        GamePhase::GameOver => Color::Red,
        _ => theme.text,
    };
    Paragraph::new(Line::from(Span::styled(phase, Style::default().fg(phase_color))))
        .render(status, frame.buffer_mut());

    let keys = [
        "Drag  link pieces",
        "S     shuffle",
        "R     restart",
        "P     pause",
        "Q     quit",
    ];
    let lines: Vec<Line> = keys
        .iter()
        .map(|k| Line::from(Span::styled(*k, Style::default().fg(theme.muted))))
        .collect();
    Paragraph::new(lines).render(chunks[8], frame.buffer_mut());
}

/// Bordered sidebar box; returns its inner rect.
fn section(frame: &mut Frame, rect: Rect, border_style: Style) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(rect);
    block.render(rect, frame.buffer_mut());
    inner
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(theme.text),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.frame).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, board: &Board, theme: &Theme, best: u64, area: Rect) {
    let popup = centered(area, 26, 9);
    let score = board.score();
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Time's up! ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {score} "),
            Style::default().fg(theme.text),
        )),
    ];
    if score > 0 && score >= best {
        lines.push(Line::from(Span::styled(
            " Session best! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!(" Best: {best} "),
            Style::default().fg(theme.text),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " R: Restart    Q: Quit ",
        Style::default().fg(theme.text),
    )));
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.frame).bg(theme.bg))
                .title(Span::styled(" chainpit ", theme.title)),
        )
        .render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pit_keeps_aspect() {
        let c = GameConfig::default();
        // 8 wide, 10 high: cols = rows * 1.6
        assert_eq!(pit_size(200, 30, &c), (48, 30));
        // Narrow terminal: width limits rows.
        assert_eq!(pit_size(32, 50, &c), (32, 20));
    }

    #[test]
    fn test_layout_fits_area() {
        let c = GameConfig::default();
        let area = Rect::new(0, 0, 100, 32);
        let a = layout(area, &c);
        assert_eq!(a.pit.height, 30);
        assert_eq!(a.pit.width, 48);
        assert!(a.sidebar.x + a.sidebar.width <= area.width);
        assert_eq!(a.pit.x, a.pit_outer.x + 1);
    }

    #[test]
    fn test_cell_world_round_trip() {
        let c = GameConfig::default();
        let pit = Rect::new(3, 2, 48, 30);
        for (col, row) in [(3, 2), (26, 17), (50, 31)] {
            let p = cell_to_world(pit, &c, col, row).unwrap();
            assert_eq!(world_to_cell(pit, &c, p), Some((col, row)));
        }
        assert!(cell_to_world(pit, &c, 2, 2).is_none());
        assert!(world_to_cell(pit, &c, Vec2::new(0.0, 9.0)).is_none());
    }

    #[test]
    fn test_corners_map_inside_pit() {
        let c = GameConfig::default();
        let pit = Rect::new(0, 0, 48, 30);
        let top_left = cell_to_world(pit, &c, 0, 0).unwrap();
        let bottom_right = cell_to_world(pit, &c, 47, 29).unwrap();
        assert!(top_left.x < -3.8 && top_left.y > 4.8);
        assert!(bottom_right.x > 3.8 && bottom_right.y < -4.8);
    }

    #[test]
    fn test_fade_blends_rgb() {
        let bg = Color::Rgb(0, 0, 0);
        assert_eq!(fade(Color::Rgb(200, 100, 50), bg, 1.0), Color::Rgb(200, 100, 50));
        assert_eq!(fade(Color::Rgb(200, 100, 50), bg, 0.5), Color::Rgb(100, 50, 25));
        assert_eq!(fade(Color::Red, bg, 0.2), bg);
    }

    #[test]
    fn test_popups_expire() {
        let mut v = ViewState::default();
        v.popups.push(Popup {
            text: "+30".into(),
            position: Vec2::ZERO,
            color: Color::White,
            ttl: Duration::from_millis(100),
        });
        v.tick_popups(Duration::from_millis(60));
        assert_eq!(v.popups.len(), 1);
        v.tick_popups(Duration::from_millis(60));
        assert!(v.popups.is_empty());
    }
}
