/*!
# Quadfall

`quadfall` is a deterministic implementation of a guideline-style tetromino
game engine, layered as:

1. [`Playfield`] — grid storage, placement checks, line clearing, garbage rows.
2. [`Tetrion`] — the timeless "Tetris machine": move, rotate (SRS kicks),
   drop, lock, spawn and hold as atomic operations that either produce a new
   [`Tetrion`] or fail with a typed error.
3. [`Tetris`] — the timed driver on top: translates held keys into DAS/ARR
   shifts, applies gravity and soft drop, and enforces lock delay, all clocked
   by monotonic millisecond timestamps supplied with each event.

Rendering, key capture and the main loop are external collaborators: they
feed [`Event`]s in and pull snapshots ([`Tetris::playfield`],
[`Tetris::queue`], [`Tetris::hold`]) back out.

# Examples

```
use quadfall::{Event, Tetris};

// Identically seeded games replay identically from the same event stream.
let mut game = Tetris::builder().seed(42).build();

// The host reports that 'left' was pressed at millisecond 5.
game.update(Event::LeftPressed, 5).unwrap();

// Ticks advance gravity, auto-shift and the lock timer.
game.update(Event::Tick, 16).unwrap();

// Snapshots are plain values for a renderer to consume.
let snapshot = game.playfield(true);
assert_eq!(snapshot.cols(), 10);
```
*/

#![warn(missing_docs)]

pub mod generator;
pub mod playfield;
pub mod rotation;
pub mod tetrion;
pub mod tetris;

pub use generator::TetrominoSource;
pub use playfield::{Block, GarbageHole, InvalidPlacement, Playfield, Tile, TileVariant};
pub use tetrion::Tetrion;
pub use tetris::{Event, Feedback, FeedbackMessages, Tetris, TetrisBuilder};

use crate::playfield::Playfield as Field;

/// Coordinates conventionally used to index into a [`Playfield`], starting in
/// the bottom left.
pub type Coord = (usize, usize);
/// A translation that can be applied to piece positions and kick candidates.
pub type Offset = (i32, i32);
/// Monotonic millisecond timestamps, the only notion of time in the engine.
pub type Millis = u64;
/// The internal PRNG shared by the bag generator and garbage hole placement.
pub type EngineRng = rand_chacha::ChaCha12Rng;

/// Represents one of the seven playable piece shapes.
///
/// A tetromino is a two-dimensional shape made from connecting exactly four
/// square tiles into one rigid piece.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tetromino {
    /// 'O'-Tetromino: four tiles arranged in one big square.
    O = 0,
    /// 'I'-Tetromino: four tiles arranged in one straight line.
    I,
    /// 'S'-Tetromino: four tiles arranged in a left-snaking manner.
    S,
    /// 'Z'-Tetromino: four tiles arranged in a right-snaking manner.
    Z,
    /// 'T'-Tetromino: four tiles arranged in a 'T'-shape.
    T,
    /// 'L'-Tetromino: four tiles arranged in an 'L'-shape.
    L,
    /// 'J'-Tetromino: four tiles arranged in a 'J'-shape.
    J,
}

/// Represents the orientation an active piece can be in, counted in clockwise
/// quarter turns from the spawn orientation.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// North, the spawn orientation.
    N = 0,
    /// East, one clockwise quarter turn.
    E,
    /// South, two quarter turns.
    S,
    /// West, three clockwise quarter turns.
    W,
}

/// An active tetromino in play.
///
/// The piece is a blueprint layered over the lock stack: its cells are the
/// shape template offsets translated by `position`. The position itself may
/// be negative (bounding-box templates hug walls and the floor), but every
/// cell of a placeable piece lies within the playfield.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Piece {
    /// Type of tetromino the active piece is.
    pub shape: Tetromino,
    /// In which way the tetromino is re-oriented.
    pub orientation: Orientation,
    /// The translation applied to the shape template's cell offsets.
    pub position: (i32, i32),
}

/// Represents how a round can end.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GameOver {
    /// A new piece could not spawn without overlapping the lock stack.
    #[error("new piece could not spawn without overlapping the stack")]
    BlockOut,
    /// A piece locked down with every cell above the visible playfield.
    #[error("piece locked entirely inside the vanish zone")]
    LockOut,
    /// The host abandoned the round via [`Tetris::forfeit`].
    #[error("round forfeited by the host")]
    Forfeit,
}

/// A failure returned by a [`Tetrion`] operation.
///
/// The first three kinds are ordinary rule denials that callers routinely
/// swallow (a move into a wall is not an exceptional situation). Only
/// [`TetrionError::BlockOut`] and [`TetrionError::LockOut`] are terminal;
/// [`TetrionError::game_over`] classifies them.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TetrionError {
    /// The translated piece would overlap the stack or leave the field.
    #[error("piece cannot move to the requested cells")]
    CannotMove,
    /// Every kick candidate (and 180° fallback) failed.
    #[error("no rotation candidate fits")]
    CannotRotate,
    /// Hold was already used for the current piece.
    #[error("hold already used for this piece")]
    CannotHold,
    /// A spawned piece overlapped the lock stack.
    #[error("new piece could not spawn without overlapping the stack")]
    BlockOut,
    /// A piece locked down with every cell above the visible playfield.
    #[error("piece locked entirely inside the vanish zone")]
    LockOut,
}

impl TetrionError {
    /// Classifies this failure: `Some` for the two terminal kinds that end a
    /// round, `None` for ordinary rule denials.
    pub const fn game_over(self) -> Option<GameOver> {
        match self {
            TetrionError::BlockOut => Some(GameOver::BlockOut),
            TetrionError::LockOut => Some(GameOver::LockOut),
            _ => None,
        }
    }
}

/// Configuration options of a game, consumed by [`Tetrion::new`] and
/// [`Tetris::new`].
#[derive(PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Playfield column count.
    pub cols: usize,
    /// Visible playfield row count. The grid additionally carries a vanish
    /// zone of `max(rows, 20)` hidden rows on top.
    pub rows: usize,
    /// How many upcoming pieces are pre-generated and visible in the queue.
    pub preview_size: usize,
    /// The value to seed the engine's PRNG with, or `None` to draw one from
    /// OS entropy (forgoing reproducibility).
    pub seed: Option<u64>,
    /// Garbage rows injected at the bottom of the field before the first
    /// piece spawns.
    pub initial_garbage_rows: usize,
    /// Where the hole in each injected garbage row goes.
    pub garbage_hole: GarbageHole,
    /// The method (and internal state) of tetromino generation used.
    pub source: TetrominoSource,
    /// How long a piece takes to fall one row under gravity.
    pub gravity_drop_ms: Millis,
    /// How long a piece takes to fall one row while soft drop is held.
    pub soft_drop_step_ms: Millis,
    /// How long automatic side movement takes to repeat once started (ARR).
    pub auto_repeat_ms: Millis,
    /// How long a 'move' button must be held before auto-shift starts (DAS).
    pub auto_shift_delay_ms: Millis,
    /// How long a grounded piece may rest without a successful action before
    /// it locks down.
    pub lock_delay_ms: Millis,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 20,
            preview_size: 5,
            seed: None,
            initial_garbage_rows: 0,
            garbage_hole: GarbageHole::RandomPerRow,
            source: TetrominoSource::bag(),
            gravity_drop_ms: 1000,
            soft_drop_step_ms: 20,
            auto_repeat_ms: 25,
            auto_shift_delay_ms: 133,
            lock_delay_ms: 500,
        }
    }
}

impl Tetromino {
    /// The tetromino variants.
    pub const VARIANTS: [Self; 7] = {
        use Tetromino::*;
        [O, I, S, Z, T, L, J]
    };

    /// Returns the cell offsets of a tetromino shape, given an orientation.
    ///
    /// Offsets are non-negative with the origin at the bottom left of the
    /// shape's bounding box (2×2 for O, 4×4 for I, 3×3 otherwise). Each
    /// orientation is the spawn matrix rotated clockwise the corresponding
    /// number of quarter turns.
    pub const fn minos(self, oriented: Orientation) -> [Coord; 4] {
        use Orientation::*;
        match self {
            Tetromino::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
            Tetromino::I => match oriented {
                N => [(0, 2), (1, 2), (2, 2), (3, 2)],
                E => [(2, 0), (2, 1), (2, 2), (2, 3)],
                S => [(0, 1), (1, 1), (2, 1), (3, 1)],
                W => [(1, 0), (1, 1), (1, 2), (1, 3)],
            },
            Tetromino::S => match oriented {
                N => [(0, 1), (1, 1), (1, 2), (2, 2)],
                E => [(1, 1), (1, 2), (2, 0), (2, 1)],
                S => [(0, 0), (1, 0), (1, 1), (2, 1)],
                W => [(0, 1), (0, 2), (1, 0), (1, 1)],
            },
            Tetromino::Z => match oriented {
                N => [(0, 2), (1, 2), (1, 1), (2, 1)],
                E => [(1, 0), (1, 1), (2, 1), (2, 2)],
                S => [(0, 1), (1, 1), (1, 0), (2, 0)],
                W => [(0, 0), (0, 1), (1, 1), (1, 2)],
            },
            Tetromino::T => match oriented {
                N => [(0, 1), (1, 1), (1, 2), (2, 1)],
                E => [(1, 0), (1, 1), (1, 2), (2, 1)],
                S => [(0, 1), (1, 0), (1, 1), (2, 1)],
                W => [(0, 1), (1, 0), (1, 1), (1, 2)],
            },
            Tetromino::L => match oriented {
                N => [(0, 1), (1, 1), (2, 1), (2, 2)],
                E => [(1, 0), (1, 1), (1, 2), (2, 0)],
                S => [(0, 0), (0, 1), (1, 1), (2, 1)],
                W => [(0, 2), (1, 0), (1, 1), (1, 2)],
            },
            Tetromino::J => match oriented {
                N => [(0, 1), (0, 2), (1, 1), (2, 1)],
                E => [(1, 0), (1, 1), (1, 2), (2, 2)],
                S => [(0, 1), (1, 1), (2, 0), (2, 1)],
                W => [(0, 0), (1, 0), (1, 1), (1, 2)],
            },
        }
    }

    /// Side length of the bounding box the shape rotates within.
    pub const fn box_size(self) -> usize {
        match self {
            Tetromino::O => 2,
            Tetromino::I => 4,
            _ => 3,
        }
    }

    /// Returns the convened-on display color of this shape as an RGB triple.
    pub const fn color(self) -> (u8, u8, u8) {
        match self {
            Tetromino::O => (242, 235, 12),
            Tetromino::I => (0, 247, 255),
            Tetromino::S => (0, 217, 51),
            Tetromino::Z => (245, 7, 7),
            Tetromino::T => (205, 7, 245),
            Tetromino::L => (255, 128, 0),
            Tetromino::J => (0, 132, 255),
        }
    }

    /// The letter denoting this shape in the playfield text format.
    pub const fn letter(self) -> char {
        match self {
            Tetromino::O => 'O',
            Tetromino::I => 'I',
            Tetromino::S => 'S',
            Tetromino::Z => 'Z',
            Tetromino::T => 'T',
            Tetromino::L => 'L',
            Tetromino::J => 'J',
        }
    }

    /// Inverse of [`Tetromino::letter`], case-insensitive.
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'O' => Some(Tetromino::O),
            'I' => Some(Tetromino::I),
            'S' => Some(Tetromino::S),
            'Z' => Some(Tetromino::Z),
            'T' => Some(Tetromino::T),
            'L' => Some(Tetromino::L),
            'J' => Some(Tetromino::J),
            _ => None,
        }
    }
}

impl Orientation {
    /// The orientation variants, in clockwise order.
    pub const VARIANTS: [Self; 4] = {
        use Orientation::*;
        [N, E, S, W]
    };

    /// Find a new orientation by turning right some number of times.
    ///
    /// This accepts `i8` to allow for left rotation.
    pub const fn reorient_right(self, right_turns: i8) -> Self {
        use Orientation::*;
        match (self as i8 + right_turns).rem_euclid(4) {
            0 => N,
            1 => E,
            2 => S,
            3 => W,
            _ => unreachable!(),
        }
    }
}

impl Piece {
    /// Returns the four grid cells the piece covers, possibly negative when
    /// the piece hugs the left wall or floor.
    pub fn cells(&self) -> [(i32, i32); 4] {
        let (x, y) = self.position;
        self.shape
            .minos(self.orientation)
            .map(|(dx, dy)| (x + dx as i32, y + dy as i32))
    }

    /// Returns the piece's cells as placeable [`Block`]s of the given
    /// variant, or `None` if any cell lies below or left of the field.
    pub fn blocks(&self, variant: TileVariant) -> Option<[Block; 4]> {
        let tile = Tile::Shape(self.shape, variant);
        let mut out = [Block {
            position: (0, 0),
            tile,
        }; 4];
        for (slot, (x, y)) in out.iter_mut().zip(self.cells()) {
            slot.position = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        }
        Some(out)
    }

    /// The same piece translated by `offset`.
    pub fn offset_by(&self, (dx, dy): Offset) -> Piece {
        Piece {
            position: (self.position.0 + dx, self.position.1 + dy),
            ..*self
        }
    }

    /// The same piece with its orientation changed by some number of right
    /// turns.
    pub fn reoriented(&self, right_turns: i8) -> Piece {
        Piece {
            orientation: self.orientation.reorient_right(right_turns),
            ..*self
        }
    }

    /// Checks whether the piece fits at its current location on the field.
    pub fn fits(&self, field: &Field) -> bool {
        self.cells().iter().all(|&(x, y)| field.is_free(x, y))
    }

    /// Checks whether the piece fits a given offset from its current
    /// location on the field.
    pub fn fits_at(&self, field: &Field, offset: Offset) -> Option<Piece> {
        let moved = self.offset_by(offset);
        moved.fits(field).then_some(moved)
    }

    /// Given an iterator over some offsets, checks whether the reoriented
    /// piece fits at any offset location on the field and returns the first
    /// that does.
    pub fn first_fit(
        &self,
        field: &Field,
        offsets: impl IntoIterator<Item = Offset>,
        right_turns: i8,
    ) -> Option<Piece> {
        let turned = self.reoriented(right_turns);
        offsets
            .into_iter()
            .find_map(|offset| turned.fits_at(field, offset))
    }

    /// Returns the position the piece would come to rest at if it kept
    /// falling.
    pub fn dropped(&self, field: &Field) -> Piece {
        let mut piece = *self;
        while let Some(fallen) = piece.fits_at(field, (0, -1)) {
            piece = fallen;
        }
        piece
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rotating a cell clockwise within an `n`-sized bounding box.
    fn rotate_cell_cw(n: usize, (x, y): Coord) -> Coord {
        (y, n - 1 - x)
    }

    #[test]
    fn every_template_has_four_cells_in_box() {
        for shape in Tetromino::VARIANTS {
            let n = shape.box_size();
            for orientation in Orientation::VARIANTS {
                let minos = shape.minos(orientation);
                assert_eq!(minos.len(), 4);
                for (x, y) in minos {
                    assert!(x < n && y < n, "{shape:?} {orientation:?} ({x},{y})");
                }
                // No duplicate cells.
                let mut sorted = minos;
                sorted.sort_unstable();
                sorted.windows(2).for_each(|w| assert_ne!(w[0], w[1]));
            }
        }
    }

    #[test]
    fn templates_follow_clockwise_rotation_of_spawn_matrix() {
        for shape in Tetromino::VARIANTS {
            let n = shape.box_size();
            for turns in 0..4 {
                let from = Orientation::N.reorient_right(turns);
                let to = Orientation::N.reorient_right(turns + 1);
                let mut rotated = shape.minos(from).map(|cell| rotate_cell_cw(n, cell));
                let mut expected = shape.minos(to);
                rotated.sort_unstable();
                expected.sort_unstable();
                assert_eq!(rotated, expected, "{shape:?} {from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn four_right_turns_are_identity() {
        for orientation in Orientation::VARIANTS {
            assert_eq!(orientation.reorient_right(4), orientation);
            assert_eq!(orientation.reorient_right(-4), orientation);
            assert_eq!(
                orientation.reorient_right(1).reorient_right(-1),
                orientation
            );
        }
    }

    #[test]
    fn letters_roundtrip() {
        for shape in Tetromino::VARIANTS {
            assert_eq!(Tetromino::from_letter(shape.letter()), Some(shape));
        }
        assert_eq!(Tetromino::from_letter('G'), None);
        assert_eq!(Tetromino::from_letter('.'), None);
    }

    #[test]
    fn shape_colors_match_contract() {
        assert_eq!(Tetromino::L.color(), (255, 128, 0));
        assert_eq!(Tetromino::J.color(), (0, 132, 255));
        assert_eq!(Tetromino::S.color(), (0, 217, 51));
        assert_eq!(Tetromino::Z.color(), (245, 7, 7));
        assert_eq!(Tetromino::T.color(), (205, 7, 245));
        assert_eq!(Tetromino::I.color(), (0, 247, 255));
        assert_eq!(Tetromino::O.color(), (242, 235, 12));
    }

    #[test]
    fn terminal_errors_classify_as_game_over() {
        assert_eq!(TetrionError::BlockOut.game_over(), Some(GameOver::BlockOut));
        assert_eq!(TetrionError::LockOut.game_over(), Some(GameOver::LockOut));
        assert_eq!(TetrionError::CannotMove.game_over(), None);
        assert_eq!(TetrionError::CannotRotate.game_over(), None);
        assert_eq!(TetrionError::CannotHold.game_over(), None);
    }
}
