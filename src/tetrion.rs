/*!
This module implements the discrete "Tetris machine".

A [`Tetrion`] is a timeless value: it knows nothing about milliseconds, DAS
or lock delay. Every operation either produces a new `Tetrion` or fails with
a typed [`TetrionError`], so callers (and tests) can retain and compare
intermediate states cheaply. All Tetris *rules* live here: SRS kicks, bag
randomization, preview refills, hold legality, spawn centering, block-out
and lock-out.
*/

use std::collections::VecDeque;

use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;

use crate::playfield::{GarbageHole, Playfield, TileVariant};
use crate::{
    rotation, Config, EngineRng, Orientation, Piece, TetrionError, Tetromino, TetrominoSource,
};

/// The discrete Tetris state machine: active piece, lock stack, bag, preview
/// queue and hold slot.
///
/// Invariants upheld by every operation: the queue always holds the
/// configured preview size, the active piece never overlaps the lock stack,
/// and the lock stack never contains ghost tiles.
#[derive(Eq, PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tetrion {
    piece: Option<Piece>,
    locked: Playfield,
    rng: EngineRng,
    source: TetrominoSource,
    queue: VecDeque<Tetromino>,
    hold: Option<Tetromino>,
    can_hold: bool,
    cleared: u64,
    preview_size: usize,
    garbage_hole: GarbageHole,
}

impl Tetrion {
    /// Creates a machine with an empty lock stack (apart from any configured
    /// initial garbage), a filled preview queue and no piece in play.
    pub fn new(config: &Config) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().next_u64());
        let mut rng = EngineRng::seed_from_u64(seed);
        let mut source = config.source;
        let mut locked = Playfield::new(config.cols, config.rows);
        if config.initial_garbage_rows > 0 {
            locked.add_garbage(config.initial_garbage_rows, config.garbage_hole, &mut rng);
        }
        let queue = source.with_rng(&mut rng).take(config.preview_size).collect();
        Self {
            piece: None,
            locked,
            rng,
            source,
            queue,
            hold: None,
            can_hold: true,
            cleared: 0,
            preview_size: config.preview_size,
            garbage_hole: config.garbage_hole,
        }
    }

    /// The active piece, if one is in play.
    pub const fn piece(&self) -> Option<&Piece> {
        self.piece.as_ref()
    }

    /// The lock stack (committed tiles and garbage); never contains ghost
    /// tiles or the active piece.
    pub const fn locked(&self) -> &Playfield {
        &self.locked
    }

    /// The upcoming shapes, head (next to spawn) first.
    pub const fn queue(&self) -> &VecDeque<Tetromino> {
        &self.queue
    }

    /// The held shape, if any.
    pub const fn hold_shape(&self) -> Option<Tetromino> {
        self.hold
    }

    /// Whether the hold slot may be used for the current piece.
    pub const fn can_hold(&self) -> bool {
        self.can_hold
    }

    /// Total lines cleared since creation.
    pub const fn cleared(&self) -> u64 {
        self.cleared
    }

    /// Whether the active piece rests on the stack or floor (a drop would
    /// fail).
    pub fn is_grounded(&self) -> bool {
        self.piece
            .is_some_and(|piece| piece.fits_at(&self.locked, (0, -1)).is_none())
    }

    /// Spawns the next piece from the queue head, refills the queue from the
    /// bag and re-arms the hold slot.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::BlockOut`] when the spawned cells overlap
    /// the stack; the machine is unchanged in that case.
    pub fn spawn(&self) -> Result<Self, TetrionError> {
        let mut next = self.clone();
        let shape = next.queue.pop_front().unwrap_or_else(|| {
            next.source
                .with_rng(&mut next.rng)
                .next()
                .expect("tetromino source ran dry")
        });
        let refill = next.preview_size.saturating_sub(next.queue.len());
        let drawn: Vec<_> = next.source.with_rng(&mut next.rng).take(refill).collect();
        next.queue.extend(drawn);
        next.can_hold = true;
        next.place_spawned(shape, None, Orientation::N)?;
        Ok(next)
    }

    /// Spawns a specific shape at the default centered position in the
    /// vanish zone, without touching the queue or the hold gate.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::BlockOut`] when the spawned cells overlap
    /// the stack.
    pub fn spawn_shape(&self, shape: Tetromino) -> Result<Self, TetrionError> {
        self.spawn_shape_at(shape, None, Orientation::N)
    }

    /// Spawns a specific shape, optionally at an explicit position and
    /// orientation. With `position: None` the piece is centered with its
    /// lowest cells on the first vanish row.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::BlockOut`] when the spawned cells overlap
    /// the stack.
    pub fn spawn_shape_at(
        &self,
        shape: Tetromino,
        position: Option<(i32, i32)>,
        orientation: Orientation,
    ) -> Result<Self, TetrionError> {
        let mut next = self.clone();
        next.place_spawned(shape, position, orientation)?;
        Ok(next)
    }

    /// Shifts the active piece by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotMove`] when there is no piece or the
    /// target cells are blocked or outside the field.
    pub fn move_by(&self, dx: i32, dy: i32) -> Result<Self, TetrionError> {
        let piece = self.piece.ok_or(TetrionError::CannotMove)?;
        let moved = piece
            .fits_at(&self.locked, (dx, dy))
            .ok_or(TetrionError::CannotMove)?;
        let mut next = self.clone();
        next.piece = Some(moved);
        Ok(next)
    }

    /// Shifts the active piece one column left.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotMove`].
    pub fn left(&self) -> Result<Self, TetrionError> {
        self.move_by(-1, 0)
    }

    /// Shifts the active piece one column right.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotMove`].
    pub fn right(&self) -> Result<Self, TetrionError> {
        self.move_by(1, 0)
    }

    /// Drops the active piece one row.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotMove`] when the piece is grounded.
    pub fn drop(&self) -> Result<Self, TetrionError> {
        self.move_by(0, -1)
    }

    /// Drops the active piece as far as it goes. Never fails; with no piece
    /// in play this is a no-op.
    pub fn hard_drop(&self) -> Self {
        let mut next = self.clone();
        if let Some(piece) = next.piece {
            next.piece = Some(piece.dropped(&next.locked));
        }
        next
    }

    /// Rotates the active piece one quarter turn, walking the SRS kick
    /// candidates in order.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotRotate`] when no candidate fits.
    pub fn rotate(&self, clockwise: bool) -> Result<Self, TetrionError> {
        self.rotate_by(if clockwise { 1 } else { -1 })
    }

    /// Rotates the active piece half a turn: in place if possible, otherwise
    /// as two successive kicked clockwise quarter turns.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotRotate`] when both strategies fail.
    pub fn rotate_180(&self) -> Result<Self, TetrionError> {
        self.rotate_by(2)
    }

    fn rotate_by(&self, right_turns: i8) -> Result<Self, TetrionError> {
        let piece = self.piece.ok_or(TetrionError::CannotRotate)?;
        let turned = rotation::try_rotate(&piece, &self.locked, right_turns)
            .ok_or(TetrionError::CannotRotate)?;
        let mut next = self.clone();
        next.piece = Some(turned);
        Ok(next)
    }

    /// Commits the active piece into the lock stack, clears full lines and
    /// leaves no piece in play. With no piece in play this is a no-op.
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::LockOut`] when *every* cell of the piece
    /// is above the visible playfield.
    pub fn lock(&self) -> Result<Self, TetrionError> {
        let Some(piece) = self.piece else {
            return Ok(self.clone());
        };
        let min_y = piece
            .cells()
            .iter()
            .map(|&(_, y)| y)
            .min()
            .unwrap_or(i32::MAX);
        if min_y >= self.locked.rows() as i32 {
            return Err(TetrionError::LockOut);
        }
        let mut next = self.clone();
        let blocks = piece
            .blocks(TileVariant::Normal)
            .expect("active piece cells are in range");
        next.locked
            .add_blocks(&blocks)
            .expect("active piece does not overlap the stack");
        next.cleared += next.locked.clear_lines() as u64;
        next.piece = None;
        Ok(next)
    }

    /// Swaps the active piece with the hold slot; with an empty slot the
    /// shape is stowed and the next queue piece spawns instead. Either way
    /// the slot is spent until the next [`Tetrion::spawn`].
    ///
    /// # Errors
    ///
    /// Fails with [`TetrionError::CannotHold`] when hold was already used
    /// for this piece, or [`TetrionError::BlockOut`] when the swapped-in
    /// piece cannot spawn.
    pub fn hold(&self) -> Result<Self, TetrionError> {
        if !self.can_hold {
            return Err(TetrionError::CannotHold);
        }
        let piece = self.piece.ok_or(TetrionError::CannotHold)?;
        let mut next = match self.hold {
            None => self.spawn()?,
            Some(held) => {
                let mut swapped = self.clone();
                swapped.place_spawned(held, None, Orientation::N)?;
                swapped
            }
        };
        next.hold = Some(piece.shape);
        next.can_hold = false;
        Ok(next)
    }

    /// Injects `n` garbage rows at the bottom of the stack. The active
    /// piece rides up with the stack when the raised rows would overlap it.
    pub fn add_garbage(&self, n: usize) -> Self {
        let mut next = self.clone();
        next.locked.add_garbage(n, next.garbage_hole, &mut next.rng);
        if let Some(piece) = next.piece {
            if !piece.fits(&next.locked) {
                next.piece = Some(piece.offset_by((0, n as i32)));
            }
        }
        next
    }

    /// A renderable snapshot: the lock stack with the active piece's cells
    /// overlaid as normal tiles, and, when `include_ghost` is set, the cells
    /// the piece would occupy after a hard drop overlaid as ghost tiles.
    /// Ghost tiles never displace existing blocks and never appear in
    /// [`Tetrion::locked`] itself.
    pub fn playfield(&self, include_ghost: bool) -> Playfield {
        let mut snapshot = self.locked.clone();
        if let Some(piece) = self.piece {
            if let Some(blocks) = piece.blocks(TileVariant::Normal) {
                snapshot.add_blocks_best_effort(blocks);
            }
            if include_ghost {
                let landed = piece.dropped(&self.locked);
                if let Some(ghost) = landed.blocks(TileVariant::Ghost) {
                    snapshot.add_blocks_best_effort(ghost);
                }
            }
        }
        snapshot
    }

    /// Places a freshly spawned piece, defaulting to the centered position
    /// with its lowest cells on the first vanish row.
    fn place_spawned(
        &mut self,
        shape: Tetromino,
        position: Option<(i32, i32)>,
        orientation: Orientation,
    ) -> Result<(), TetrionError> {
        let position = position.unwrap_or_else(|| self.spawn_position(shape, orientation));
        let piece = Piece {
            shape,
            orientation,
            position,
        };
        if !piece.fits(&self.locked) {
            return Err(TetrionError::BlockOut);
        }
        self.piece = Some(piece);
        Ok(())
    }

    /// The guideline spawn position: horizontally centered (biased left for
    /// even widths on even fields), lowest cells on the first row above the
    /// visible playfield.
    fn spawn_position(&self, shape: Tetromino, orientation: Orientation) -> (i32, i32) {
        let minos = shape.minos(orientation);
        let min_x = minos.iter().map(|&(x, _)| x).min().unwrap_or(0);
        let max_x = minos.iter().map(|&(x, _)| x).max().unwrap_or(0);
        let min_y = minos.iter().map(|&(_, y)| y).min().unwrap_or(0);
        let width = max_x - min_x + 1;
        let leftmost = self.locked.cols().saturating_sub(width) / 2;
        (
            leftmost as i32 - min_x as i32,
            self.locked.rows() as i32 - min_y as i32,
        )
    }
}
