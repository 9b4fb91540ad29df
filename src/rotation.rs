/*!
This module handles rotation of [`Piece`]s with Super Rotation System wall
kicks.
*/

use crate::{playfield::Playfield, Offset, Orientation, Piece, Tetromino};

/// Returns the five kick candidate translations the Super Rotation System
/// tries, in order, when rotating `shape` from `from` to `to`.
///
/// Two tables exist: one shared by J, L, S, T, Z and O, and one for I. The
/// first candidate is always `(0, 0)`.
///
/// # Panics
///
/// Kick data only exists for the eight single-quarter-turn transitions.
/// Asking for `from == to` or a 180° transition is a programmer error and
/// panics.
#[rustfmt::skip]
pub fn kick_offsets(shape: Tetromino, from: Orientation, to: Orientation) -> [Offset; 5] {
    use Orientation::*;
    match shape {
        Tetromino::I => match (from, to) {
            (N, E) => [(0, 0), (-2, 0), ( 1, 0), (-2, -1), ( 1,  2)],
            (E, N) => [(0, 0), ( 2, 0), (-1, 0), ( 2,  1), (-1, -2)],
            (E, S) => [(0, 0), (-1, 0), ( 2, 0), (-1,  2), ( 2, -1)],
            (S, E) => [(0, 0), ( 1, 0), (-2, 0), ( 1, -2), (-2,  1)],
            (S, W) => [(0, 0), ( 2, 0), (-1, 0), ( 2,  1), (-1, -2)],
            (W, S) => [(0, 0), (-2, 0), ( 1, 0), (-2, -1), ( 1,  2)],
            (W, N) => [(0, 0), ( 1, 0), (-2, 0), ( 1, -2), (-2,  1)],
            (N, W) => [(0, 0), (-1, 0), ( 2, 0), (-1,  2), ( 2, -1)],
            _ => panic!("no kick data for non-quarter rotation"),
        },
        _ => match (from, to) {
            (N, E) => [(0, 0), (-1, 0), (-1,  1), (0, -2), (-1, -2)],
            (E, N) => [(0, 0), ( 1, 0), ( 1, -1), (0,  2), ( 1,  2)],
            (E, S) => [(0, 0), ( 1, 0), ( 1, -1), (0,  2), ( 1,  2)],
            (S, E) => [(0, 0), (-1, 0), (-1,  1), (0, -2), (-1, -2)],
            (S, W) => [(0, 0), ( 1, 0), ( 1,  1), (0, -2), ( 1, -2)],
            (W, S) => [(0, 0), (-1, 0), (-1, -1), (0,  2), (-1,  2)],
            (W, N) => [(0, 0), (-1, 0), (-1, -1), (0,  2), (-1,  2)],
            (N, W) => [(0, 0), ( 1, 0), ( 1,  1), (0, -2), ( 1, -2)],
            _ => panic!("no kick data for non-quarter rotation"),
        },
    }
}

/// Tries to rotate a piece on the given field.
///
/// This will return `None` if the rotation is not possible, and `Some(p)` if
/// the rotation succeeded with `p` as the new state of the piece.
///
/// Quarter turns (`right_turns ≡ ±1 mod 4`) walk the [`kick_offsets`]
/// candidates in order and accept the first that fits. A 180° turn is not
/// part of standard SRS; it first tries the reoriented piece in place, then
/// falls back to two successive clockwise quarter turns, each with its own
/// kick sequence.
pub fn try_rotate(piece: &Piece, field: &Playfield, right_turns: i8) -> Option<Piece> {
    match right_turns.rem_euclid(4) {
        // 0° - Don't rotate anything.
        0 => Some(*piece),

        // 180° - Rotate 'around'.
        2 => {
            if let Some(turned) = piece.first_fit(field, [(0, 0)], 2) {
                return Some(turned);
            }
            let halfway = quarter_rotate(piece, field, 1)?;
            quarter_rotate(&halfway, field, 1)
        }

        // ±90° - Rotate 'right'/'left'.
        1 => quarter_rotate(piece, field, 1),
        _ => quarter_rotate(piece, field, -1),
    }
}

/// One kicked quarter turn, `right_turns` being `1` (cw) or `-1` (ccw).
fn quarter_rotate(piece: &Piece, field: &Playfield, right_turns: i8) -> Option<Piece> {
    let to = piece.orientation.reorient_right(right_turns);
    let offsets = kick_offsets(piece.shape, piece.orientation, to);
    piece.first_fit(field, offsets, right_turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Orientation::*;

    #[test]
    fn l_kick_row_west_to_north() {
        assert_eq!(
            kick_offsets(Tetromino::L, W, N),
            [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)]
        );
    }

    #[test]
    fn first_candidate_is_always_identity() {
        for shape in Tetromino::VARIANTS {
            for from in Orientation::VARIANTS {
                for turns in [1i8, -1] {
                    let to = from.reorient_right(turns);
                    assert_eq!(kick_offsets(shape, from, to)[0], (0, 0));
                }
            }
        }
    }

    #[test]
    fn i_uses_its_own_table() {
        assert_ne!(
            kick_offsets(Tetromino::I, N, E),
            kick_offsets(Tetromino::T, N, E)
        );
        // O shares the common table with J/L/S/T/Z.
        assert_eq!(
            kick_offsets(Tetromino::O, N, E),
            kick_offsets(Tetromino::J, N, E)
        );
    }

    #[test]
    #[should_panic(expected = "no kick data")]
    fn half_turn_has_no_kick_data() {
        kick_offsets(Tetromino::T, N, S);
    }

    #[test]
    #[should_panic(expected = "no kick data")]
    fn reflexive_turn_has_no_kick_data() {
        kick_offsets(Tetromino::I, E, E);
    }

    #[test]
    fn free_rotation_takes_the_identity_kick() {
        let field = Playfield::new(10, 20);
        let piece = Piece {
            shape: Tetromino::T,
            orientation: N,
            position: (4, 5),
        };
        let turned = try_rotate(&piece, &field, 1).unwrap();
        assert_eq!(turned.orientation, E);
        assert_eq!(turned.position, piece.position);
    }

    #[test]
    fn o_rotation_is_identity_placement() {
        let field = Playfield::new(10, 20);
        let piece = Piece {
            shape: Tetromino::O,
            orientation: N,
            position: (4, 5),
        };
        for turns in [1i8, -1, 2] {
            let turned = try_rotate(&piece, &field, turns).unwrap();
            assert_eq!(turned.position, piece.position);
            assert_eq!(turned.cells(), piece.cells());
        }
    }

    #[test]
    fn wall_kick_nudges_piece_back_into_the_field() {
        let field = Playfield::new(10, 20);
        // A vertical T hugging the left wall: rotating ccw into North needs
        // the (+1, 0) kick.
        let piece = Piece {
            shape: Tetromino::T,
            orientation: E,
            position: (-1, 5),
        };
        assert!(piece.fits(&field));
        let turned = try_rotate(&piece, &field, -1).unwrap();
        assert_eq!(turned.orientation, N);
        assert_eq!(turned.position, (0, 5));
    }

    #[test]
    fn half_turn_in_open_space_keeps_position() {
        let field = Playfield::new(10, 20);
        let piece = Piece {
            shape: Tetromino::J,
            orientation: E,
            position: (3, 7),
        };
        let turned = try_rotate(&piece, &field, 2).unwrap();
        assert_eq!(turned.orientation, W);
        assert_eq!(turned.position, piece.position);
    }
}
