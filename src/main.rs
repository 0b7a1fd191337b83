use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    env,
    io::{self, stdout},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use blockfall::game::{
    Action, CellState, Config, Engine, GameState, PieceKind, RandomSource, Snapshot, Soundtrack,
};

// ============================================================================
// Visual Constants
// ============================================================================

const CELL_WIDTH: u16 = 2;
const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = "  ";

// How long the input loop waits for a key before checking the dirty flag.
const INPUT_POLL_MS: u64 = 16;

// ============================================================================
// Color Mapping
// ============================================================================

fn piece_color(kind: PieceKind) -> Color {
    match kind {
        PieceKind::J => Color::Blue,
        PieceKind::S => Color::Cyan,
        PieceKind::I => Color::Green,
        PieceKind::T => Color::Rgb(255, 165, 0),
        PieceKind::L => Color::Magenta,
        PieceKind::Z => Color::Red,
        PieceKind::O => Color::Yellow,
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, snap: &Snapshot) {
    let area = frame.size();

    match snap.state {
        GameState::Playing => render_game(frame, snap, area),
        GameState::Paused => render_paused(frame, snap, area),
        GameState::GameOver => render_game_over(frame, snap, area),
    }
}

fn render_game(frame: &mut Frame, snap: &Snapshot, area: Rect) {
    let grid_height = snap.cells.len() as u16;
    let grid_width = snap.cells.first().map_or(0, Vec::len) as u16;

    let grid_display_width = grid_width * CELL_WIDTH + 2;
    let grid_display_height = grid_height + 2;
    let preview_width = 12;
    let info_width = 14;
    let total_width = grid_display_width + preview_width + info_width + 4;
    let total_height = grid_display_height + 3;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let game_row = vertical[0];

    // Layout: [Grid][Preview][Info]
    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(preview_width),
        Constraint::Length(info_width),
    ])
    .split(game_row);

    render_board(frame, snap, horizontal[0]);
    render_preview(frame, snap, horizontal[1]);
    render_info(frame, snap, horizontal[2]);

    let controls_area = Rect {
        x: area.x,
        y: game_row.y + game_row.height,
        width: area.width,
        height: 2,
    };

    if controls_area.y + 1 < area.height {
        let controls = Paragraph::new(vec![Line::from(
            "←→: Move | ↓: Lower | ↑: Rotate | Space: Drop | P: Pause | Q/ESC: Quit | F1-F3: Music",
        )])
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(controls, controls_area);
    }
}

fn render_board(frame: &mut Frame, snap: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Blockfall ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();

    for row in &snap.cells {
        let mut spans: Vec<Span> = Vec::new();

        for cell in row {
            let (symbol, style) = match cell {
                CellState::Empty => (EMPTY_CHAR, Style::default()),
                CellState::Filled(kind) => {
                    (BLOCK_CHAR, Style::default().fg(piece_color(*kind)))
                }
            };

            spans.push(Span::styled(symbol, style));
        }

        lines.push(Line::from(spans));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_preview(frame: &mut Frame, snap: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Spawn offsets double as the preview shape; they span x -2..=1, y 0..=1.
    let offsets = snap.next.spawn_offsets();
    let color = piece_color(snap.next);

    let mut lines: Vec<Line> = vec![Line::from("")];

    for y in 0i16..2 {
        let mut spans: Vec<Span> = vec![Span::raw(" ")];

        for x in -2i16..2 {
            if offsets.contains(&(x, y)) {
                spans.push(Span::styled(BLOCK_CHAR, Style::default().fg(color)));
            } else {
                spans.push(Span::raw(EMPTY_CHAR));
            }
        }

        lines.push(Line::from(spans));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_info(frame: &mut Frame, snap: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Lines", Style::default().fg(Color::Cyan))),
        Line::from(format!("{}", snap.completed_lines)),
        Line::from(""),
        Line::from(Span::styled("Level", Style::default().fg(Color::Green))),
        Line::from(format!("{}", snap.level)),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_paused(frame: &mut Frame, snap: &Snapshot, area: Rect) {
    render_game(frame, snap, area);

    let text = vec![
        Line::from(""),
        Line::from(Span::styled("PAUSED", Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(Span::styled(
            "Press P to continue",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "Press ESC to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Paused ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    let popup_area = centered_rect(24, 10, area);
    frame.render_widget(paragraph, popup_area);
}

fn render_game_over(frame: &mut Frame, snap: &Snapshot, area: Rect) {
    render_game(frame, snap, area);

    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Lines: {}", snap.completed_lines)),
        Line::from(format!("Level: {}", snap.level)),
        Line::from(""),
        Line::from(Span::styled(
            "Press ESC to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    let popup_area = centered_rect(24, 12, area);
    frame.render_widget(paragraph, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Input Mapping
// ============================================================================

fn map_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(Action::TogglePause),
        KeyCode::Left => Some(Action::MoveLeft),
        KeyCode::Right => Some(Action::MoveRight),
        KeyCode::Down => Some(Action::SoftDrop),
        KeyCode::Up => Some(Action::Rotate),
        KeyCode::Char(' ') => Some(Action::HardDrop),
        KeyCode::F(1) => Some(Action::Soundtrack(Soundtrack::Korobeiniki)),
        KeyCode::F(2) => Some(Action::Soundtrack(Soundtrack::Bwv814Menuet)),
        KeyCode::F(3) => Some(Action::Soundtrack(Soundtrack::RussianSong)),
        _ => None,
    }
}

// The optional first argument is the starting level; anything unparsable
// means level 0, out-of-range values are clamped by the engine.
fn start_level_from_args() -> u32 {
    env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0)
}

// ============================================================================
// Main Loop
// ============================================================================

fn main() -> io::Result<()> {
    let config = Config {
        start_level: start_level_from_args(),
        ..Config::default()
    };

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let engine = Arc::new(Mutex::new(Engine::new(
        config,
        Box::new(RandomSource::new()),
    )));
    let dirty = Arc::new(AtomicBool::new(true));
    let quit = Arc::new(AtomicBool::new(false));

    // Clock thread: advances simulated time at the configured rate. It
    // keeps running through pauses and game over so the input loop stays
    // the only place that decides when to exit.
    let clock = {
        let engine = Arc::clone(&engine);
        let dirty = Arc::clone(&dirty);
        let quit = Arc::clone(&quit);
        let period = Duration::from_millis(1000 / config.tick_hz.max(1));
        thread::spawn(move || {
            let mut game_ticks: u64 = 0;
            while !quit.load(Ordering::Acquire) {
                thread::sleep(period);
                game_ticks += 1;
                if engine.lock().unwrap().tick(game_ticks) {
                    dirty.store(true, Ordering::Release);
                }
            }
        })
    };

    loop {
        if dirty.swap(false, Ordering::AcqRel) {
            let snap = engine.lock().unwrap().snapshot();
            terminal.draw(|frame| render(frame, &snap))?;
        }

        if event::poll(Duration::from_millis(INPUT_POLL_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = map_key(key.code) {
                        if matches!(action, Action::Quit) {
                            break;
                        }
                        if engine.lock().unwrap().apply(action) {
                            dirty.store(true, Ordering::Release);
                        }
                    }
                }
            }
        }
    }

    quit.store(true, Ordering::Release);
    let _ = clock.join();

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
