//! Property tests for the core engine invariants.
//!
//! Purpose:
//! - Provide fuzz-like coverage using generated seeds and event scripts.
//! - Lock invariants that must hold regardless of how a round is played:
//!   bag windows are permutations, replays are bit-identical, clears never
//!   leave a full row, and the grid never changes shape.

use proptest::prelude::*;
use rand::SeedableRng;

use quadfall::{
    EngineRng, Event, GarbageHole, Playfield, Tetris, TetrominoSource,
};

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::LeftPressed),
        Just(Event::LeftReleased),
        Just(Event::RightPressed),
        Just(Event::RightReleased),
        Just(Event::SoftDropPressed),
        Just(Event::SoftDropReleased),
        Just(Event::RotateCw),
        Just(Event::RotateCcw),
        Just(Event::Rotate180),
        Just(Event::HardDrop),
        Just(Event::Hold),
        Just(Event::Tick),
        Just(Event::Tick),
        Just(Event::Tick),
    ]
}

proptest! {
    #[test]
    fn bag_windows_are_permutations(seed in any::<u64>()) {
        let mut source = TetrominoSource::bag();
        let mut rng = EngineRng::seed_from_u64(seed);
        let pieces: Vec<_> = source.with_rng(&mut rng).take(70).collect();
        for window in pieces.chunks(7) {
            let mut sorted = window.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), 7);
        }
    }

    #[test]
    fn replays_are_deterministic(
        seed in any::<u64>(),
        script in prop::collection::vec((arb_event(), 1u64..200), 0..60),
    ) {
        let mut a = Tetris::builder().seed(seed).build();
        let mut b = Tetris::builder().seed(seed).build();
        let mut ms = 0;
        for (event, dt) in script {
            ms += dt;
            let result_a = a.update(event, ms);
            let result_b = b.update(event, ms);
            prop_assert_eq!(result_a, result_b);
            prop_assert_eq!(a.playfield(true), b.playfield(true));
            prop_assert_eq!(a.queue(), b.queue());
            prop_assert_eq!(a.hold(), b.hold());
            prop_assert_eq!(a.cleared(), b.cleared());
        }
    }

    #[test]
    fn rounds_never_bend_the_grid(
        seed in any::<u64>(),
        script in prop::collection::vec((arb_event(), 1u64..500), 0..80),
    ) {
        let mut game = Tetris::builder().seed(seed).build();
        let mut ms = 0;
        let mut cleared_before = 0;
        for (event, dt) in script {
            ms += dt;
            if game.update(event, ms).is_err() {
                break;
            }
            let snapshot = game.playfield(true);
            prop_assert_eq!(snapshot.total_rows(), 40);
            prop_assert!(snapshot.block_matrix().iter().all(|line| line.len() == 10));
            prop_assert_eq!(game.queue().len(), 5);
            prop_assert!(game.cleared() >= cleared_before);
            cleared_before = game.cleared();
        }
    }

    #[test]
    fn clearing_garbage_leaves_no_full_rows(
        seed in any::<u64>(),
        rows in 0usize..12,
    ) {
        let mut field = Playfield::new(10, 20);
        let mut rng = EngineRng::seed_from_u64(seed);
        field.add_garbage(rows, GarbageHole::RandomPerRow, &mut rng);

        // Garbage rows always carry a hole, so nothing clears...
        prop_assert_eq!(field.clear_lines(), 0);

        // ...until the holes are plugged.
        let holes: Vec<_> = (0..rows)
            .filter_map(|y| {
                field.block_matrix()[y]
                    .iter()
                    .position(|cell| cell.is_none())
                    .map(|x| (x, y))
            })
            .collect();
        for (x, y) in holes {
            field
                .add_block(quadfall::Block {
                    position: (x, y),
                    tile: quadfall::Tile::Garbage,
                })
                .unwrap();
        }
        prop_assert_eq!(field.clear_lines(), rows);
        prop_assert_eq!(field.total_rows(), 40);
        prop_assert!(field.blocks().is_empty());
        prop_assert_eq!(field.clear_lines(), 0);
    }
}
