/*!
This module implements the playing grid: tile storage, placement checks,
line clearing and garbage injection.
*/

use rand::Rng;

use crate::{Coord, Tetromino};

/// Whether a shape tile is a committed block or a render-only projection.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TileVariant {
    /// An ordinary, collision-relevant tile.
    Normal,
    /// A ghost-piece tile. Ghost tiles never enter the lock stack and do not
    /// participate in collision; they exist only in rendered snapshots.
    Ghost,
}

/// The value occupying a single playfield cell.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tile {
    /// A gray tile from an injected garbage row.
    Garbage,
    /// A tile belonging to a tetromino, normal or ghost.
    Shape(Tetromino, TileVariant),
}

impl Tile {
    /// Returns the display color of this tile as an RGB triple.
    pub const fn color(self) -> (u8, u8, u8) {
        match self {
            Tile::Garbage => (156, 154, 154),
            Tile::Shape(shape, _) => shape.color(),
        }
    }

    /// Whether the tile takes part in collision and line clears. Ghost tiles
    /// do not.
    pub const fn occupies(self) -> bool {
        !matches!(self, Tile::Shape(_, TileVariant::Ghost))
    }

    /// The character denoting this tile in the text format: a letter for a
    /// shape tile (lowercase when ghost), `G` for garbage.
    pub const fn glyph(self) -> char {
        match self {
            Tile::Garbage => 'G',
            Tile::Shape(shape, TileVariant::Normal) => shape.letter(),
            Tile::Shape(shape, TileVariant::Ghost) => shape.letter().to_ascii_lowercase(),
        }
    }
}

/// A positioned tile, the unit of placement on a [`Playfield`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    /// The cell the tile sits in, bottom-left origin.
    pub position: Coord,
    /// The tile itself.
    pub tile: Tile,
}

/// Where the hole goes in each injected garbage row.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GarbageHole {
    /// Draw a fresh hole column from the engine RNG for every row.
    RandomPerRow,
    /// Keep the hole in a fixed column (clamped to the field width).
    FixedColumn(usize),
}

impl Default for GarbageHole {
    fn default() -> Self {
        Self::RandomPerRow
    }
}

/// The error returned when a block cannot be written to the grid.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("cannot place tile at column {x}, row {y}: cell occupied or out of range")]
pub struct InvalidPlacement {
    /// Column of the offending block.
    pub x: usize,
    /// Row of the offending block.
    pub y: usize,
}

/// One horizontal line of the playing grid.
pub type Line = Vec<Option<Tile>>;

/// The playing grid: `cols × total_rows` optional tiles, indexed from the
/// bottom left, where `total_rows` is the visible row count plus a vanish
/// zone of at least 20 hidden rows for spawning and lock-out detection.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Playfield {
    cols: usize,
    rows: usize,
    grid: Vec<Line>,
}

impl Playfield {
    /// Creates an empty playfield with `cols` columns and `rows` visible
    /// rows. The backing grid holds `rows + max(rows, 20)` rows.
    pub fn new(cols: usize, rows: usize) -> Self {
        let total = rows + rows.max(20);
        Self {
            cols,
            rows,
            grid: vec![vec![None; cols]; total],
        }
    }

    /// Column count.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Visible row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total row count including the vanish zone.
    pub fn total_rows(&self) -> usize {
        self.grid.len()
    }

    /// The stored tile at `(x, y)`, if any. Out-of-range coordinates read as
    /// empty.
    pub fn tile(&self, (x, y): Coord) -> Option<Tile> {
        self.grid.get(y).and_then(|line| line.get(x)).copied().flatten()
    }

    /// Whether the (possibly negative) cell is inside the field and not
    /// occupied by a collision-relevant tile.
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        let Ok(x) = usize::try_from(x) else {
            return false;
        };
        let Ok(y) = usize::try_from(y) else {
            return false;
        };
        x < self.cols
            && y < self.total_rows()
            && !self.tile((x, y)).is_some_and(Tile::occupies)
    }

    /// Whether every block sits in range on a cell that is empty (or only
    /// ghost-occupied).
    pub fn can_place(&self, blocks: &[Block]) -> bool {
        blocks.iter().all(|block| {
            let (x, y) = block.position;
            x < self.cols
                && y < self.total_rows()
                && !self.tile((x, y)).is_some_and(Tile::occupies)
        })
    }

    /// Writes one block into the grid.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidPlacement`] when the target cell is occupied or
    /// out of range; the grid is unchanged in that case.
    pub fn add_block(&mut self, block: Block) -> Result<(), InvalidPlacement> {
        self.add_blocks(&[block])
    }

    /// Writes several blocks into the grid, all-or-nothing: if any block
    /// cannot be placed, none are.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidPlacement`] naming the first offending block.
    pub fn add_blocks(&mut self, blocks: &[Block]) -> Result<(), InvalidPlacement> {
        for block in blocks {
            if !self.can_place(std::slice::from_ref(block)) {
                let (x, y) = block.position;
                return Err(InvalidPlacement { x, y });
            }
        }
        for block in blocks {
            let (x, y) = block.position;
            self.grid[y][x] = Some(block.tile);
        }
        Ok(())
    }

    /// Writes every block that fits and silently skips the rest. Only used
    /// to overlay the ghost piece on rendered snapshots.
    pub fn add_blocks_best_effort(&mut self, blocks: impl IntoIterator<Item = Block>) {
        for block in blocks {
            let _ = self.add_block(block);
        }
    }

    /// Injects `n` garbage rows at the bottom of the field. Existing rows
    /// shift up; the topmost `n` rows of the vanish zone fall away. Each
    /// garbage row is full except for a single hole placed per `hole`.
    pub fn add_garbage<R: Rng + ?Sized>(&mut self, n: usize, hole: GarbageHole, rng: &mut R) {
        let n = n.min(self.total_rows());
        self.grid.rotate_right(n);
        for y in 0..n {
            let hole_x = match hole {
                GarbageHole::RandomPerRow => rng.random_range(0..self.cols),
                GarbageHole::FixedColumn(col) => col.min(self.cols - 1),
            };
            self.grid[y] = (0..self.cols)
                .map(|x| (x != hole_x).then_some(Tile::Garbage))
                .collect();
        }
    }

    /// Removes every full row, preserving the relative order of surviving
    /// rows and pushing fresh empty rows in on top so the total row count is
    /// unchanged. Returns how many rows were removed.
    pub fn clear_lines(&mut self) -> usize {
        let mut cleared = 0;
        for y in (0..self.total_rows()).rev() {
            let full = self.grid[y].iter().all(|cell| cell.is_some_and(Tile::occupies));
            if full {
                // Starting from the offending line, move down all above it,
                // then empty the uppermost.
                self.grid[y..].rotate_left(1);
                let cols = self.cols;
                *self.grid.last_mut().expect("grid has rows") = vec![None; cols];
                cleared += 1;
            }
        }
        cleared
    }

    /// Enumerates every stored tile as a [`Block`], bottom row first.
    pub fn blocks(&self) -> Vec<Block> {
        self.grid
            .iter()
            .enumerate()
            .flat_map(|(y, line)| {
                line.iter().enumerate().filter_map(move |(x, cell)| {
                    cell.map(|tile| Block {
                        position: (x, y),
                        tile,
                    })
                })
            })
            .collect()
    }

    /// Read access to the backing grid, rows bottom-up. Renderer-facing.
    pub fn block_matrix(&self) -> &[Line] {
        &self.grid
    }

    /// Builds a playfield from the text format: one string per row in visual
    /// order (first string is the highest of the listed rows), placed at the
    /// bottom of an otherwise empty field. `.` is an empty cell, a shape
    /// letter is a normal tile of that shape, `G` is garbage.
    ///
    /// # Panics
    ///
    /// Panics when a row is not `cols` characters long or contains an
    /// unknown character; this is a test-construction convenience.
    pub fn from_rows(cols: usize, rows: usize, text_rows: &[&str]) -> Self {
        let mut field = Self::new(cols, rows);
        assert!(
            text_rows.len() <= field.total_rows(),
            "more text rows than grid rows"
        );
        for (i, text) in text_rows.iter().enumerate() {
            let y = text_rows.len() - 1 - i;
            assert_eq!(text.chars().count(), cols, "row {text:?} is not {cols} wide");
            for (x, c) in text.chars().enumerate() {
                field.grid[y][x] = match c {
                    '.' => None,
                    'G' => Some(Tile::Garbage),
                    _ => Some(Tile::Shape(
                        Tetromino::from_letter(c)
                            .unwrap_or_else(|| panic!("unknown cell character {c:?}")),
                        TileVariant::Normal,
                    )),
                };
            }
        }
        field
    }

    /// Renders the bottom `count` rows in the text format, highest listed
    /// row first. Inverse of [`Playfield::from_rows`] for ghost-free fields.
    pub fn render_rows(&self, count: usize) -> Vec<String> {
        let count = count.min(self.total_rows());
        (0..count)
            .rev()
            .map(|y| {
                self.grid[y]
                    .iter()
                    .map(|cell| cell.map_or('.', Tile::glyph))
                    .collect()
            })
            .collect()
    }
}
