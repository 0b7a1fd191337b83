use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_WIDTH: usize = 10;
pub const DEFAULT_HEIGHT: usize = 20;
pub const DEFAULT_TICK_HZ: u64 = 60;

pub const LINES_PER_LEVEL: u32 = 3;
pub const MAX_START_LEVEL: u32 = 15;

// Automatic drop happens every `BASE_DROP_INTERVAL - level` ticks, never
// faster than one drop per tick.
const BASE_DROP_INTERVAL: u64 = 15;

/// Startup values handed in by the command-line layer.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub tick_hz: u64,
    pub start_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            tick_hz: DEFAULT_TICK_HZ,
            start_level: 0,
        }
    }
}

// ============================================================================
// Geometry Tables
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceKind {
    /// Leftward L piece.
    J,
    /// Rightward Z piece.
    S,
    /// Long straight piece.
    I,
    /// Bump-in-middle piece.
    T,
    /// L piece.
    L,
    /// Z piece.
    Z,
    /// Square piece.
    O,
}

pub const ALL_KINDS: [PieceKind; 7] = [
    PieceKind::J,
    PieceKind::S,
    PieceKind::I,
    PieceKind::T,
    PieceKind::L,
    PieceKind::Z,
    PieceKind::O,
];

impl PieceKind {
    /// Cell offsets at spawn time, relative to the anchor column. Every
    /// offset lands in rows 0-1, so pieces always enter at the top.
    pub fn spawn_offsets(self) -> [(i16, i16); 4] {
        match self {
            PieceKind::J => [(-1, 0), (-1, 1), (0, 1), (1, 1)],
            PieceKind::S => [(-1, 1), (0, 1), (0, 0), (1, 0)],
            PieceKind::I => [(-2, 0), (-1, 0), (0, 0), (1, 0)],
            PieceKind::T => [(-1, 1), (0, 1), (0, 0), (1, 1)],
            PieceKind::L => [(-1, 1), (0, 1), (1, 1), (1, 0)],
            PieceKind::Z => [(-1, 0), (0, 0), (0, 1), (1, 1)],
            PieceKind::O => [(-1, 0), (-1, 1), (0, 0), (0, 1)],
        }
    }

    /// Per-cell deltas taking orientation `o` to `(o + 1) % 4`. The deltas
    /// apply to the piece's current absolute coordinates; this is not a
    /// rotation about a center. Each cell's deltas cancel over four
    /// applications, so four rotations restore the original coordinates.
    /// Symmetric pieces repeat rows (S/Z/I: 0==2 and 1==3; O: all zero).
    pub fn rotation_deltas(self, orientation: usize) -> [(i16, i16); 4] {
        let table: [[(i16, i16); 4]; 4] = match self {
            PieceKind::J => [
                [(0, 2), (1, 1), (0, 0), (-1, -1)],
                [(2, 0), (1, -1), (0, 0), (-1, 1)],
                [(0, -2), (-1, -1), (0, 0), (1, 1)],
                [(-2, 0), (-1, 1), (0, 0), (1, -1)],
            ],
            PieceKind::S | PieceKind::Z => [
                [(1, 0), (0, 1), (-1, 0), (-2, 1)],
                [(-1, 0), (0, -1), (1, 0), (2, -1)],
                [(1, 0), (0, 1), (-1, 0), (-2, 1)],
                [(-1, 0), (0, -1), (1, 0), (2, -1)],
            ],
            PieceKind::I => [
                [(2, -2), (1, -1), (0, 0), (-1, 1)],
                [(-2, 2), (-1, 1), (0, 0), (1, -1)],
                [(2, -2), (1, -1), (0, 0), (-1, 1)],
                [(-2, 2), (-1, 1), (0, 0), (1, -1)],
            ],
            PieceKind::T => [
                [(1, 1), (0, 0), (-1, 1), (-1, -1)],
                [(1, -1), (0, 0), (1, 1), (-1, 1)],
                [(-1, -1), (0, 0), (1, -1), (1, 1)],
                [(-1, 1), (0, 0), (-1, -1), (1, -1)],
            ],
            PieceKind::L => [
                [(1, 1), (0, 0), (-1, -1), (-2, 0)],
                [(1, -1), (0, 0), (-1, 1), (0, 2)],
                [(-1, -1), (0, 0), (1, 1), (2, 0)],
                [(-1, 1), (0, 0), (1, -1), (0, -2)],
            ],
            PieceKind::O => [[(0, 0); 4]; 4],
        };
        table[orientation % 4]
    }
}

// ============================================================================
// Board
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CellState {
    Empty,
    Filled(PieceKind),
}

/// The playing grid, row-major with row 0 at the top. Allocated once;
/// cleared rows are recycled in place.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Board {
    width: usize,
    height: usize,
    rows: Vec<Vec<CellState>>,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rows: vec![vec![CellState::Empty; width]; height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bounds-checked read. Out-of-range coordinates are a caller bug;
    /// collision checks must have validated them already.
    pub fn cell(&self, x: usize, y: usize) -> CellState {
        self.rows[y][x]
    }

    pub fn set(&mut self, x: usize, y: usize, cell: CellState) {
        self.rows[y][x] = cell;
    }

    pub fn rows(&self) -> &[Vec<CellState>] {
        &self.rows
    }

    pub fn row_is_full(&self, row: usize) -> bool {
        self.rows[row].iter().all(|cell| *cell != CellState::Empty)
    }

    /// Removes every full row and collapses the rows above it, in a single
    /// bottom-to-top pass. A collapse pulls a new row into the same index,
    /// so that index is re-tested before the scan moves up; rows already
    /// recycled to the top bound the scan. Returns the number of rows
    /// removed; 1-4 simultaneous full rows all go in one call.
    pub fn clear_and_collapse(&mut self) -> u32 {
        let mut removed = 0;
        let mut row = self.height - 1;
        while row >= removed {
            if self.row_is_full(row) {
                let mut freed = self.rows.remove(row);
                freed.fill(CellState::Empty);
                self.rows.insert(removed, freed);
                removed += 1;
            } else if row == 0 {
                break;
            } else {
                row -= 1;
            }
        }
        removed as u32
    }
}

// ============================================================================
// Piece
// ============================================================================

/// The active tetromino: its kind, orientation step, and the 4 absolute
/// board coordinates it occupies.
#[derive(Clone, Copy, Debug)]
pub struct Piece {
    kind: PieceKind,
    orientation: usize,
    cells: [(i16, i16); 4],
}

impl Piece {
    pub fn spawn(kind: PieceKind, board_width: usize) -> Self {
        let anchor = (board_width / 2) as i16;
        let mut cells = kind.spawn_offsets();
        for (x, _) in &mut cells {
            *x += anchor;
        }
        Self {
            kind,
            orientation: 0,
            cells,
        }
    }

    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    pub fn orientation(&self) -> usize {
        self.orientation
    }

    pub fn cells(&self) -> [(i16, i16); 4] {
        self.cells
    }

    /// Unconditional move; the caller has already confirmed the destination
    /// is collision-free.
    fn translate(&mut self, dx: i16, dy: i16) {
        for (x, y) in &mut self.cells {
            *x += dx;
            *y += dy;
        }
    }

    /// Candidate coordinates for the next orientation. No mutation; the
    /// engine validates the candidate before committing it.
    fn rotate_candidate(&self) -> [(i16, i16); 4] {
        let deltas = self.kind.rotation_deltas(self.orientation);
        let mut cells = self.cells;
        for i in 0..4 {
            cells[i].0 += deltas[i].0;
            cells[i].1 += deltas[i].1;
        }
        cells
    }

    fn commit_rotation(&mut self, cells: [(i16, i16); 4]) {
        self.cells = cells;
        self.orientation = (self.orientation + 1) % 4;
    }
}

// ============================================================================
// Piece Source
// ============================================================================

pub trait PieceSource: Send {
    fn next(&mut self) -> PieceKind;
}

/// Uniform draw over the 7 kinds, seeded once at startup.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceSource for RandomSource {
    fn next(&mut self) -> PieceKind {
        ALL_KINDS[self.rng.gen_range(0..ALL_KINDS.len())]
    }
}

/// Cycles through a fixed sequence; for deterministic tests.
pub struct SequenceSource {
    kinds: Vec<PieceKind>,
    index: usize,
}

impl SequenceSource {
    pub fn new(kinds: Vec<PieceKind>) -> Self {
        Self { kinds, index: 0 }
    }
}

impl PieceSource for SequenceSource {
    fn next(&mut self) -> PieceKind {
        let kind = self.kinds[self.index % self.kinds.len()];
        self.index += 1;
        kind
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameState {
    Playing,
    Paused,
    GameOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Soundtrack {
    Korobeiniki,
    Bwv814Menuet,
    RussianSong,
}

/// Discrete input events the driver forwards to the engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    MoveLeft,
    MoveRight,
    SoftDrop,
    HardDrop,
    Rotate,
    TogglePause,
    Quit,
    Soundtrack(Soundtrack),
}

/// Read-only copy of everything the renderer needs; taken under the engine
/// lock, rendered outside it.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub cells: Vec<Vec<CellState>>,
    pub state: GameState,
    pub completed_lines: u32,
    pub level: u32,
    pub next: PieceKind,
}

/// The game state machine. Owns the board and the active piece; the active
/// piece's cells live on the board itself, so locking a landed piece is
/// implicit and move/rotate rewrite board cells in place.
pub struct Engine {
    board: Board,
    piece: Piece,
    next: PieceKind,
    state: GameState,
    completed_lines: u32,
    last_drop_tick: u64,
    source: Box<dyn PieceSource>,
}

impl Engine {
    pub fn new(config: Config, source: Box<dyn PieceSource>) -> Self {
        Self::with_board(Board::new(config.width, config.height), config, source)
    }

    /// Builds an engine over a prepared board; the board's dimensions win
    /// over the config's. The first piece spawns immediately, so an engine
    /// over a board that blocks the spawn starts in `GameOver`.
    pub fn with_board(board: Board, config: Config, mut source: Box<dyn PieceSource>) -> Self {
        let start_level = config.start_level.min(MAX_START_LEVEL);
        let first = source.next();
        let next = source.next();
        let mut engine = Self {
            piece: Piece::spawn(first, board.width()),
            board,
            next,
            state: GameState::Playing,
            completed_lines: LINES_PER_LEVEL * start_level,
            last_drop_tick: 0,
            source,
        };
        if engine.place_piece() {
            engine.state = GameState::GameOver;
        }
        engine
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn piece(&self) -> &Piece {
        &self.piece
    }

    pub fn next_kind(&self) -> PieceKind {
        self.next
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn completed_lines(&self) -> u32 {
        self.completed_lines
    }

    pub fn level(&self) -> u32 {
        self.completed_lines / LINES_PER_LEVEL
    }

    /// Ticks between automatic drops at the current level, floored at 1.
    pub fn drop_interval(&self) -> u64 {
        BASE_DROP_INTERVAL
            .saturating_sub(u64::from(self.level()))
            .max(1)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cells: self.board.rows().to_vec(),
            state: self.state,
            completed_lines: self.completed_lines,
            level: self.level(),
            next: self.next,
        }
    }

    fn write_piece_cells(&mut self, cell: CellState) {
        for (x, y) in self.piece.cells() {
            self.board.set(x as usize, y as usize, cell);
        }
    }

    /// Writes the active piece onto the board. All four cells are verified
    /// free before the first write, so a blocked spawn leaves the board
    /// untouched. Returns true if the piece could not be placed.
    fn place_piece(&mut self) -> bool {
        for (x, y) in self.piece.cells() {
            if self.board.cell(x as usize, y as usize) != CellState::Empty {
                return true;
            }
        }
        self.write_piece_cells(CellState::Filled(self.piece.kind()));
        false
    }

    /// Would translating the active piece by `(dx, dy)` hit a wall, the
    /// bottom, or a settled cell? The piece is lifted off the board for the
    /// test so it cannot collide with itself, and restored before returning.
    /// Only sideways/downward movement comes through here, so the top bound
    /// is never tested.
    pub fn collision(&mut self, dx: i16, dy: i16) -> bool {
        self.write_piece_cells(CellState::Empty);
        let mut hit = false;
        for (x, y) in self.piece.cells() {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0
                || nx >= self.board.width() as i16
                || ny >= self.board.height() as i16
                || self.board.cell(nx as usize, ny as usize) != CellState::Empty
            {
                hit = true;
                break;
            }
        }
        self.write_piece_cells(CellState::Filled(self.piece.kind()));
        hit
    }

    /// Unconditional commit of a collision-checked move.
    fn shift(&mut self, dx: i16, dy: i16) {
        self.write_piece_cells(CellState::Empty);
        self.piece.translate(dx, dy);
        self.write_piece_cells(CellState::Filled(self.piece.kind()));
    }

    fn try_shift(&mut self, dx: i16, dy: i16) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        if self.collision(dx, dy) {
            return false;
        }
        self.shift(dx, dy);
        true
    }

    pub fn move_left(&mut self) -> bool {
        self.try_shift(-1, 0)
    }

    pub fn move_right(&mut self) -> bool {
        self.try_shift(1, 0)
    }

    pub fn soft_drop(&mut self) -> bool {
        self.try_shift(0, 1)
    }

    /// Drops the piece as far as it goes in one call. The piece is not
    /// locked here; locking happens on the next due tick.
    pub fn hard_drop(&mut self) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        let mut changed = false;
        while !self.collision(0, 1) {
            self.shift(0, 1);
            changed = true;
        }
        changed
    }

    /// Rotates the active piece one step clockwise, or rejects the rotation
    /// outright. Unlike `collision`, the candidate cells are tested against
    /// the top bound as well, since rotation can lift a cell above row 0.
    /// No kick adjustment is attempted.
    pub fn rotate(&mut self) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        let candidate = self.piece.rotate_candidate();
        self.write_piece_cells(CellState::Empty);
        for &(x, y) in &candidate {
            if x < 0
                || x >= self.board.width() as i16
                || y < 0
                || y >= self.board.height() as i16
                || self.board.cell(x as usize, y as usize) != CellState::Empty
            {
                self.write_piece_cells(CellState::Filled(self.piece.kind()));
                return false;
            }
        }
        self.piece.commit_rotation(candidate);
        self.write_piece_cells(CellState::Filled(self.piece.kind()));
        true
    }

    /// Promotes the pre-rolled next piece to active and rolls a new one.
    /// Returns true on game over: a spawn blocked by settled cells is the
    /// sole terminal condition.
    pub fn spawn_next(&mut self) -> bool {
        self.piece = Piece::spawn(self.next, self.board.width());
        self.next = self.source.next();
        if self.place_piece() {
            self.state = GameState::GameOver;
            return true;
        }
        false
    }

    pub fn toggle_pause(&mut self) -> bool {
        match self.state {
            GameState::Playing => {
                self.state = GameState::Paused;
                true
            }
            GameState::Paused => {
                self.state = GameState::Playing;
                true
            }
            GameState::GameOver => false,
        }
    }

    /// Advances simulated time. `game_ticks` is the driver's monotone tick
    /// counter; while paused, ticks arrive and are discarded. When a drop
    /// is due the piece descends one row, or, if it cannot, it has landed:
    /// full rows are cleared and counted and the next piece spawns. Returns
    /// whether the visible board changed (advisory, for redraw throttling).
    pub fn tick(&mut self, game_ticks: u64) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        if game_ticks < self.last_drop_tick + self.drop_interval() {
            return false;
        }
        self.last_drop_tick = game_ticks;
        if !self.collision(0, 1) {
            self.shift(0, 1);
        } else {
            let cleared = self.board.clear_and_collapse();
            self.completed_lines += cleared;
            self.spawn_next();
        }
        true
    }

    /// Single dispatch point for the input collaborator. Returns the
    /// advisory changed flag. Soundtrack selection belongs to the audio
    /// collaborator and quit to the driver; neither touches game state.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::MoveLeft => self.move_left(),
            Action::MoveRight => self.move_right(),
            Action::SoftDrop => self.soft_drop(),
            Action::HardDrop => self.hard_drop(),
            Action::Rotate => self.rotate(),
            Action::TogglePause => self.toggle_pause(),
            Action::Quit | Action::Soundtrack(_) => false,
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;

    pub fn empty_board() -> Board {
        Board::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    pub fn fill_row(board: &mut Board, y: usize) {
        for x in 0..board.width() {
            board.set(x, y, CellState::Filled(PieceKind::T));
        }
    }

    pub fn fill_row_with_gap(board: &mut Board, y: usize, gap_x: usize) {
        for x in 0..board.width() {
            if x != gap_x {
                board.set(x, y, CellState::Filled(PieceKind::T));
            }
        }
    }

    pub fn engine_with(board: Board, kinds: Vec<PieceKind>) -> Engine {
        Engine::with_board(board, Config::default(), Box::new(SequenceSource::new(kinds)))
    }
}
