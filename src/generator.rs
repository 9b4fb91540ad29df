/*!
This module handles random generation of [`Tetromino`]s.
*/

use rand::{
    distr::{weighted::WeightedIndex, Distribution},
    Rng,
};

use crate::Tetromino;

/// Handles the information of which pieces to spawn during a game.
///
/// A `TetrominoSource` is a plain state value; to actually generate
/// [`Tetromino`]s it borrows an external RNG via
/// [`TetrominoSource::with_rng`], which yields an [`Iterator`]. Two sources
/// in the same state driven by identically seeded RNGs produce identical
/// infinite sequences.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TetrominoSource {
    /// Uniformly random piece generator.
    Uniform,
    /// Standard 7-bag generator.
    ///
    /// The bag holds one copy of each [`Tetromino`] type and hands them out
    /// uniformly at random without replacement; once empty it is refilled.
    /// Every window of seven consecutive pieces aligned to a refill is a
    /// permutation of the seven shapes.
    Bag {
        /// The number of each piece type left in the bag.
        pieces_left: [u32; 7],
    },
}

impl TetrominoSource {
    /// Initialize an instance of the [`TetrominoSource::Uniform`] variant.
    pub const fn uniform() -> Self {
        Self::Uniform
    }

    /// Initialize a full 7-bag.
    pub const fn bag() -> Self {
        Self::Bag {
            pieces_left: [1; 7],
        }
    }

    /// Method that allows `TetrominoSource` to be used as an [`Iterator`].
    pub fn with_rng<'a, 'b, R: Rng>(&'a mut self, rng: &'b mut R) -> WithRng<'a, 'b, R> {
        WithRng { source: self, rng }
    }
}

impl Default for TetrominoSource {
    fn default() -> Self {
        Self::bag()
    }
}

/// Struct produced by [`TetrominoSource::with_rng`] which implements
/// [`Iterator`].
pub struct WithRng<'a, 'b, R: Rng> {
    /// Selected tetromino source to use as information source.
    pub source: &'a mut TetrominoSource,
    /// Random number generator as the raw source of randomness.
    pub rng: &'b mut R,
}

impl<R: Rng> Iterator for WithRng<'_, '_, R> {
    type Item = Tetromino;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            TetrominoSource::Uniform => Some(Tetromino::VARIANTS[self.rng.random_range(0..=6)]),
            TetrominoSource::Bag { pieces_left } => {
                let weights = pieces_left.iter();
                // SAFETY: Struct invariant, the bag is never all-zero between draws.
                let idx = WeightedIndex::new(weights).unwrap().sample(&mut self.rng);
                // Update the drawn tetromino count and replenish the bag if it ran out.
                pieces_left[idx] -= 1;
                if pieces_left.iter().sum::<u32>() == 0 {
                    *pieces_left = [1; 7];
                }
                // SAFETY: 0 <= idx <= 6.
                Some(Tetromino::VARIANTS[idx])
            }
        }
    }
}
