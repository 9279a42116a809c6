use crate::error::{GameError, RuleResult};
use crate::types::{BOARD_SIZE, Cell, Grid, NUM_SQUARES, Player, Position};

/// Scan order for flips: (row step, col step).
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Reversi board state represented by two bitboards.
///
/// `Board` is `Copy`, so every hand-off is already a defensive copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    black: u64,
    white: u64,
}

impl Board {
    /// Creates the initial board:
    /// (3,3)=white, (3,4)=black, (4,3)=black, (4,4)=white.
    pub fn new() -> Self {
        Self {
            black: bit(28) | bit(35),
            white: bit(27) | bit(36),
        }
    }

    pub fn empty() -> Self {
        Self { black: 0, white: 0 }
    }

    /// Overlapping squares are resolved in favour of black.
    pub fn from_bitboards(black: u64, white: u64) -> Self {
        Self {
            black,
            white: white & !black,
        }
    }

    /// Builds a board from raw wire rows (0=empty, 1=black, 2=white).
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> RuleResult<Self> {
        let bad_row = rows
            .iter()
            .map(|row| row.as_ref().len())
            .find(|&len| len != BOARD_SIZE);
        if rows.len() != BOARD_SIZE || bad_row.is_some() {
            return Err(GameError::InvalidDimensions {
                rows: rows.len(),
                cols: bad_row.unwrap_or(BOARD_SIZE),
            });
        }

        let mut board = Self::empty();
        for (r, row) in rows.iter().enumerate() {
            for (c, &value) in row.as_ref().iter().enumerate() {
                let square = bit(r * BOARD_SIZE + c);
                match value {
                    0 => {}
                    1 => board.black |= square,
                    2 => board.white |= square,
                    value => {
                        return Err(GameError::InvalidCell {
                            row: r,
                            col: c,
                            value,
                        });
                    }
                }
            }
        }
        Ok(board)
    }

    pub fn from_grid(grid: &Grid) -> Self {
        let mut board = Self::empty();
        for (r, row) in grid.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                board.set(Position::new(r as u8, c as u8), cell);
            }
        }
        board
    }

    pub fn to_grid(&self) -> Grid {
        let mut grid = [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE];
        for (r, row) in grid.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = self.cell(Position::new(r as u8, c as u8));
            }
        }
        grid
    }

    /// Converts board to `[u8; 64]` where 0=empty, 1=black, 2=white.
    pub fn to_array(&self) -> [u8; NUM_SQUARES] {
        let mut cells = [0u8; NUM_SQUARES];
        for (index, value) in cells.iter_mut().enumerate() {
            *value = self.cell_at(index).as_u8();
        }
        cells
    }

    /// Out-of-bounds positions read as empty.
    pub fn cell(&self, pos: Position) -> Cell {
        if !pos.in_bounds() {
            return Cell::Empty;
        }
        self.cell_at(pos.index())
    }

    pub fn set(&mut self, pos: Position, cell: Cell) {
        if !pos.in_bounds() {
            return;
        }
        let square = bit(pos.index());
        self.black &= !square;
        self.white &= !square;
        match cell {
            Cell::Empty => {}
            Cell::Black => self.black |= square,
            Cell::White => self.white |= square,
        }
    }

    /// Stones of one side as a bitboard.
    pub fn stones(&self, player: Player) -> u64 {
        match player {
            Player::Black => self.black,
            Player::White => self.white,
        }
    }

    /// Squares `player` would flip by playing at `pos`, in direction-scan order.
    /// Empty when `pos` is occupied or out of bounds.
    pub fn flippable(&self, pos: Position, player: Player) -> Vec<Position> {
        let mut out = Vec::new();
        self.walk_flips(pos, player, |square| {
            if let Some(p) = Position::from_index(square) {
                out.push(p);
            }
        });
        out
    }

    /// Number of stones `player` would flip by playing at `pos`.
    pub fn flip_count(&self, pos: Position, player: Player) -> usize {
        self.flip_mask(pos, player).count_ones() as usize
    }

    pub fn is_legal(&self, pos: Position, player: Player) -> bool {
        self.flip_mask(pos, player) != 0
    }

    /// Returns legal move mask for the given side.
    pub fn legal_mask(&self, player: Player) -> u64 {
        let occupied = self.black | self.white;
        let mut legal = 0u64;

        for index in 0..NUM_SQUARES {
            let square = bit(index);
            if (occupied & square) != 0 {
                continue;
            }
            if let Some(pos) = Position::from_index(index)
                && self.flip_mask(pos, player) != 0
            {
                legal |= square;
            }
        }

        legal
    }

    /// Legal moves in row-major order.
    pub fn legal_moves(&self, player: Player) -> Vec<Position> {
        mask_to_positions(self.legal_mask(player))
    }

    pub fn has_legal_move(&self, player: Player) -> bool {
        self.legal_mask(player) != 0
    }

    /// Places one stone and flips captured stones.
    /// Returns the flipped squares; empty and board unchanged when the move is illegal.
    pub fn place(&mut self, pos: Position, player: Player) -> Vec<Position> {
        let flips = self.flip_mask(pos, player);
        if flips == 0 {
            return Vec::new();
        }
        let flipped = self.flippable(pos, player);
        self.apply(pos, player, flips);
        flipped
    }

    /// The board after `player` plays `pos`, leaving `self` untouched.
    /// Only the placed square changes when the move flips nothing.
    pub fn with_move(&self, pos: Position, player: Player) -> Board {
        let mut next = *self;
        if pos.in_bounds() {
            let flips = self.flip_mask(pos, player);
            next.apply(pos, player, flips);
        }
        next
    }

    pub fn count(&self, player: Player) -> u8 {
        self.stones(player).count_ones() as u8
    }

    /// Returns `(black_count, white_count)`.
    pub fn counts(&self) -> (u8, u8) {
        (self.black.count_ones() as u8, self.white.count_ones() as u8)
    }

    /// Returns the number of empty squares.
    pub fn empty_count(&self) -> u8 {
        let (black_count, white_count) = self.counts();
        NUM_SQUARES as u8 - black_count - white_count
    }

    fn cell_at(&self, index: usize) -> Cell {
        let square = bit(index);
        if (self.black & square) != 0 {
            Cell::Black
        } else if (self.white & square) != 0 {
            Cell::White
        } else {
            Cell::Empty
        }
    }

    fn apply(&mut self, pos: Position, player: Player, flips: u64) {
        let placed = bit(pos.index()) | flips;
        match player {
            Player::Black => {
                self.black |= placed;
                self.white &= !placed;
            }
            Player::White => {
                self.white |= placed;
                self.black &= !placed;
            }
        }
    }

    fn flip_mask(&self, pos: Position, player: Player) -> u64 {
        let mut mask = 0u64;
        self.walk_flips(pos, player, |square| mask |= bit(square));
        mask
    }

    /// Walks the 8 directions from `pos`, reporting each square of every run of
    /// opponent stones closed by one of `player`'s stones.
    fn walk_flips(&self, pos: Position, player: Player, mut emit: impl FnMut(usize)) {
        if !pos.in_bounds() {
            return;
        }
        let me = self.stones(player);
        let opp = self.stones(player.opponent());
        if ((me | opp) & bit(pos.index())) != 0 {
            return;
        }

        let (row, col) = (pos.row as i32, pos.col as i32);
        let mut line = [0usize; BOARD_SIZE];

        for (dr, dc) in DIRECTIONS {
            let mut r = row + dr;
            let mut c = col + dc;
            let mut len = 0usize;

            while in_bounds(r, c) {
                let index = (r as usize) * BOARD_SIZE + c as usize;
                let square = bit(index);
                if (opp & square) != 0 {
                    line[len] = index;
                    len += 1;
                } else {
                    if (me & square) != 0 {
                        line[..len].iter().for_each(|&index| emit(index));
                    }
                    break;
                }

                r += dr;
                c += dc;
            }
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn mask_to_positions(mut mask: u64) -> Vec<Position> {
    let mut out = Vec::with_capacity(mask.count_ones() as usize);
    while mask != 0 {
        if let Some(pos) = Position::from_index(mask.trailing_zeros() as usize) {
            out.push(pos);
        }
        mask &= mask - 1;
    }
    out
}

fn bit(index: usize) -> u64 {
    if index < NUM_SQUARES { 1u64 << index } else { 0 }
}

fn in_bounds(row: i32, col: i32) -> bool {
    (0..BOARD_SIZE as i32).contains(&row) && (0..BOARD_SIZE as i32).contains(&col)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: u8, col: u8) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn initial_black_legal_moves_are_four_expected_squares() {
        let board = Board::new();

        assert_eq!(
            board.legal_moves(Player::Black),
            vec![pos(2, 3), pos(3, 2), pos(4, 5), pos(5, 4)]
        );
        assert_eq!(
            board.legal_moves(Player::White),
            vec![pos(2, 4), pos(3, 5), pos(4, 2), pos(5, 3)]
        );
    }

    #[test]
    fn place_flips_opponent_stones_and_updates_counts() {
        let mut board = Board::new();

        let flips = board.place(pos(2, 3), Player::Black);

        assert_eq!(flips, vec![pos(3, 3)]);
        assert_eq!(board.counts(), (4, 1));
        assert_eq!(board.empty_count(), 59);

        let grid = board.to_grid();
        assert_eq!(grid[2][3], Cell::Black);
        assert_eq!(grid[3][3], Cell::Black);
        assert_eq!(grid[4][4], Cell::White);
    }

    #[test]
    fn illegal_place_returns_empty_and_keeps_board_unchanged() {
        let mut board = Board::new();
        let before = board;

        assert!(board.place(pos(0, 0), Player::Black).is_empty());
        assert!(board.place(pos(3, 3), Player::Black).is_empty());
        assert!(board.place(pos(9, 1), Player::Black).is_empty());
        assert_eq!(board, before);
    }

    #[test]
    fn flippable_reports_runs_in_direction_order() {
        // Closed runs up-left and right of (3,3).
        let mut board = Board::empty();
        board.set(pos(0, 0), Cell::Black);
        board.set(pos(1, 1), Cell::White);
        board.set(pos(2, 2), Cell::White);
        board.set(pos(3, 4), Cell::White);
        board.set(pos(3, 5), Cell::White);
        board.set(pos(3, 6), Cell::Black);
        // Open run: reaches the edge without a black terminator.
        board.set(pos(4, 3), Cell::White);
        board.set(pos(5, 3), Cell::White);
        board.set(pos(6, 3), Cell::White);
        board.set(pos(7, 3), Cell::White);

        let flips = board.flippable(pos(3, 3), Player::Black);

        assert_eq!(flips, vec![pos(2, 2), pos(1, 1), pos(3, 4), pos(3, 5)]);
        assert_eq!(board.flip_count(pos(3, 3), Player::Black), 4);
    }

    #[test]
    fn run_ended_by_empty_square_flips_nothing() {
        let mut board = Board::empty();
        board.set(pos(0, 1), Cell::White);
        board.set(pos(0, 2), Cell::White);

        assert!(board.flippable(pos(0, 0), Player::Black).is_empty());
        assert!(!board.is_legal(pos(0, 0), Player::Black));
    }

    #[test]
    fn with_move_leaves_source_board_untouched() {
        let board = Board::new();

        let next = board.with_move(pos(2, 3), Player::Black);

        assert_eq!(board, Board::new());
        assert_eq!(next.counts(), (4, 1));
    }

    #[test]
    fn from_rows_validates_dimensions_and_values() {
        let short = vec![vec![0u8; 8]; 7];
        assert_eq!(
            Board::from_rows(&short),
            Err(GameError::InvalidDimensions { rows: 7, cols: 8 })
        );

        let mut ragged = vec![vec![0u8; 8]; 8];
        ragged[5].push(0);
        assert_eq!(
            Board::from_rows(&ragged),
            Err(GameError::InvalidDimensions { rows: 8, cols: 9 })
        );

        let mut bad = vec![vec![0u8; 8]; 8];
        bad[2][6] = 9;
        assert_eq!(
            Board::from_rows(&bad),
            Err(GameError::InvalidCell {
                row: 2,
                col: 6,
                value: 9
            })
        );

        let rows: Vec<Vec<u8>> = Board::new()
            .to_array()
            .chunks(BOARD_SIZE)
            .map(<[u8]>::to_vec)
            .collect();
        assert_eq!(Board::from_rows(&rows), Ok(Board::new()));
    }

    #[test]
    fn grid_conversion_preserves_cells() {
        let board = Board::new().with_move(pos(2, 3), Player::Black);
        assert_eq!(Board::from_grid(&board.to_grid()), board);
    }
}
