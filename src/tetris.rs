/*!
This module implements the timed driver: the layer that introduces the time
axis on top of the [`Tetrion`].

The driver consumes [`Event`]s carrying monotonic millisecond timestamps and
translates them into discrete Tetrion operations: held directional keys
become DAS/ARR auto-shifts, elapsed time becomes gravity or soft-drop steps,
and a grounded piece locks once the lock delay runs out without a successful
piece-affecting action.
*/

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::playfield::{GarbageHole, Playfield};
use crate::{
    Config, GameOver, Millis, Piece, Tetrion, TetrionError, Tetromino, TetrominoSource,
};

/// How many recent tick timestamps are kept for [`Tetris::fps_estimate`].
const TICK_SAMPLES: usize = 16;

/// An input or clock signal delivered to the driver, always together with a
/// monotonic millisecond timestamp.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    /// The 'move left' key went down.
    LeftPressed,
    /// The 'move left' key came up.
    LeftReleased,
    /// The 'move right' key went down.
    RightPressed,
    /// The 'move right' key came up.
    RightReleased,
    /// The 'soft drop' key went down.
    SoftDropPressed,
    /// The 'soft drop' key came up.
    SoftDropReleased,
    /// Rotate the piece one quarter turn clockwise.
    RotateCw,
    /// Rotate the piece one quarter turn counter-clockwise.
    RotateCcw,
    /// Rotate the piece half a turn.
    Rotate180,
    /// Drop the piece to the floor and lock it immediately.
    HardDrop,
    /// Swap the piece with the hold slot.
    Hold,
    /// A clock tick; advances gravity, auto-shift and the lock timer.
    Tick,
}

/// A renderable in-game happening reported back from [`Tetris::update`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Feedback {
    /// A piece was locked down in a certain configuration.
    PieceLocked(Piece),
    /// A number of lines were cleared by the lock.
    LinesCleared(usize),
    /// A piece was quickly dropped from its original position to a new one.
    HardDropped(Piece, Piece),
    /// A shape was put into the hold slot.
    Held(Tetromino),
    /// The round ended.
    GameOver(GameOver),
}

/// Convenient type alias to denote a collection of [`Feedback`]s associated
/// with the [`Millis`] timestamp they happened at.
pub type FeedbackMessages = Vec<(Millis, Feedback)>;

/// State of one tracked key.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct KeyState {
    pressed: bool,
    last_change_ms: Millis,
}

/// The three keys the driver tracks across events.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Keys {
    left: KeyState,
    right: KeyState,
    down: KeyState,
}

/// A running, timed round of play.
///
/// All driver output is a pure function of the configured seed plus the
/// ordered `(event, ms)` inputs, which is what makes replays possible.
///
/// Timestamps must be non-decreasing; an event carrying an earlier timestamp
/// than its predecessor is treated as if it happened at the predecessor's
/// time.
///
/// Once a round has ended, [`Tetris::update`] consistently returns the
/// recorded [`GameOver`] as an error and changes nothing; snapshots keep
/// reflecting the final state.
#[derive(PartialEq, Clone, Debug)]
pub struct Tetris {
    config: Config,
    tetrion: Tetrion,
    keys: Keys,
    /// Timestamp of the last gravity or soft-drop step (or spawn).
    t_drop_ms: Millis,
    /// Timestamp of the last auto-shift step.
    t_autoshift_ms: Millis,
    /// Timestamp of the last successful piece-affecting action.
    t_lock_ms: Millis,
    last_ms: Millis,
    ticks: VecDeque<Millis>,
    over: Option<GameOver>,
}

impl Tetris {
    /// Creates a blank [`TetrisBuilder`] ready for configuration.
    pub fn builder() -> TetrisBuilder {
        TetrisBuilder::default()
    }

    /// Starts a round at in-game time `start_ms` and spawns the first piece.
    pub fn new(start_ms: Millis, config: Config) -> Self {
        let key = KeyState {
            pressed: false,
            last_change_ms: start_ms,
        };
        let mut game = Self {
            tetrion: Tetrion::new(&config),
            config,
            keys: Keys {
                left: key,
                right: key,
                down: key,
            },
            t_drop_ms: start_ms,
            t_autoshift_ms: start_ms,
            t_lock_ms: start_ms,
            last_ms: start_ms,
            ticks: VecDeque::with_capacity(TICK_SAMPLES),
            over: None,
        };
        match game.tetrion.spawn() {
            Ok(spawned) => game.tetrion = spawned,
            Err(err) => game.over = err.game_over(),
        }
        game
    }

    /// Applies one event at timestamp `ms` and returns the feedback it
    /// caused.
    ///
    /// # Errors
    ///
    /// Returns the recorded [`GameOver`] when the round has already ended; a
    /// round ending *during* this call is reported as
    /// [`Feedback::GameOver`] in the returned messages instead.
    pub fn update(&mut self, event: Event, ms: Millis) -> Result<FeedbackMessages, GameOver> {
        if let Some(over) = self.over {
            return Err(over);
        }
        // Clamp: a timestamp from the past is treated as "now".
        let ms = ms.max(self.last_ms);
        self.last_ms = ms;

        let mut msgs = FeedbackMessages::new();
        match event {
            Event::LeftPressed => {
                self.keys.left = KeyState {
                    pressed: true,
                    last_change_ms: ms,
                };
                self.try_shift(-1, ms);
            }
            Event::LeftReleased => {
                self.keys.left = KeyState {
                    pressed: false,
                    last_change_ms: ms,
                };
            }
            Event::RightPressed => {
                self.keys.right = KeyState {
                    pressed: true,
                    last_change_ms: ms,
                };
                self.try_shift(1, ms);
            }
            Event::RightReleased => {
                self.keys.right = KeyState {
                    pressed: false,
                    last_change_ms: ms,
                };
            }
            Event::SoftDropPressed => {
                self.keys.down = KeyState {
                    pressed: true,
                    last_change_ms: ms,
                };
                // Backdate the drop timer by one step so the next tick
                // drops a row immediately.
                self.t_drop_ms = ms.saturating_sub(self.config.soft_drop_step_ms);
            }
            Event::SoftDropReleased => {
                self.keys.down = KeyState {
                    pressed: false,
                    last_change_ms: ms,
                };
            }
            Event::RotateCw => self.try_rotate(1, ms),
            Event::RotateCcw => self.try_rotate(-1, ms),
            Event::Rotate180 => self.try_rotate(2, ms),
            Event::HardDrop => self.hard_drop(ms, &mut msgs),
            Event::Hold => self.try_hold(ms, &mut msgs),
            Event::Tick => self.tick(ms, &mut msgs),
        }
        Ok(msgs)
    }

    /// Immediately ends the round by forfeiting it.
    ///
    /// Subsequent [`Tetris::update`] calls return [`GameOver::Forfeit`].
    pub fn forfeit(&mut self) {
        if self.over.is_none() {
            self.over = Some(GameOver::Forfeit);
        }
    }

    /// How the round ended, if it has.
    pub const fn result(&self) -> Option<GameOver> {
        self.over
    }

    /// Read accessor for the driver's configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Read accessor for the underlying discrete machine.
    pub const fn tetrion(&self) -> &Tetrion {
        &self.tetrion
    }

    /// A renderable snapshot: the lock stack with the active piece overlaid,
    /// and optionally the ghost projection of where it would land.
    pub fn playfield(&self, include_ghost: bool) -> Playfield {
        self.tetrion.playfield(include_ghost)
    }

    /// The upcoming shapes, queue head (next to spawn) first.
    pub fn queue(&self) -> Vec<Tetromino> {
        self.tetrion.queue().iter().copied().collect()
    }

    /// The held shape, if any.
    pub fn hold(&self) -> Option<Tetromino> {
        self.tetrion.hold_shape()
    }

    /// Total lines cleared since the round started.
    pub fn cleared(&self) -> u64 {
        self.tetrion.cleared()
    }

    /// Ticks per second observed over the recent tick history, or `0.0`
    /// before enough ticks arrived.
    pub fn fps_estimate(&self) -> f64 {
        match (self.ticks.front(), self.ticks.back()) {
            (Some(&first), Some(&last)) if last > first => {
                (self.ticks.len() - 1) as f64 * 1000.0 / (last - first) as f64
            }
            _ => 0.0,
        }
    }

    /// A single immediate shift from a directional key press.
    fn try_shift(&mut self, dx: i32, ms: Millis) {
        if let Ok(moved) = self.tetrion.move_by(dx, 0) {
            self.tetrion = moved;
            self.t_lock_ms = ms;
        }
    }

    /// Best-effort rotation; a failed rotation is a no-op.
    fn try_rotate(&mut self, right_turns: i8, ms: Millis) {
        let turned = match right_turns {
            2 => self.tetrion.rotate_180(),
            1 => self.tetrion.rotate(true),
            _ => self.tetrion.rotate(false),
        };
        if let Ok(turned) = turned {
            self.tetrion = turned;
            self.t_lock_ms = ms;
        }
    }

    fn hard_drop(&mut self, ms: Millis, msgs: &mut FeedbackMessages) {
        let Some(before) = self.tetrion.piece().copied() else {
            return;
        };
        let dropped = self.tetrion.hard_drop();
        let after = dropped.piece().copied().unwrap_or(before);
        msgs.push((ms, Feedback::HardDropped(before, after)));
        self.tetrion = dropped;
        self.lock_and_spawn(ms, msgs);
    }

    fn try_hold(&mut self, ms: Millis, msgs: &mut FeedbackMessages) {
        match self.tetrion.hold() {
            Ok(held) => {
                if let Some(shape) = held.hold_shape() {
                    msgs.push((ms, Feedback::Held(shape)));
                }
                self.tetrion = held;
                // A fresh piece is in play.
                self.t_drop_ms = ms;
                self.t_lock_ms = ms;
            }
            // `CannotHold` is a no-op; a block-out from the induced spawn
            // ends the round.
            Err(err) => self.end(err, ms, msgs),
        }
    }

    /// Commits the active piece and spawns the next, refreshing the drop and
    /// lock timers. A lock-out or block-out ends the round.
    fn lock_and_spawn(&mut self, ms: Millis, msgs: &mut FeedbackMessages) {
        let Some(piece) = self.tetrion.piece().copied() else {
            return;
        };
        match self.tetrion.lock() {
            Ok(locked) => {
                let lines = (locked.cleared() - self.tetrion.cleared()) as usize;
                msgs.push((ms, Feedback::PieceLocked(piece)));
                if lines > 0 {
                    msgs.push((ms, Feedback::LinesCleared(lines)));
                }
                match locked.spawn() {
                    Ok(spawned) => {
                        self.tetrion = spawned;
                        self.t_drop_ms = ms;
                        self.t_lock_ms = ms;
                    }
                    Err(err) => {
                        // Keep the committed stack visible in snapshots.
                        self.tetrion = locked;
                        self.end(err, ms, msgs);
                    }
                }
            }
            Err(err) => self.end(err, ms, msgs),
        }
    }

    fn end(&mut self, err: TetrionError, ms: Millis, msgs: &mut FeedbackMessages) {
        if let Some(over) = err.game_over() {
            self.over = Some(over);
            msgs.push((ms, Feedback::GameOver(over)));
        }
    }

    fn tick(&mut self, ms: Millis, msgs: &mut FeedbackMessages) {
        // 1. FPS accounting.
        if self.ticks.len() == TICK_SAMPLES {
            self.ticks.pop_front();
        }
        self.ticks.push_back(ms);

        // 2. Gravity / soft drop.
        let rate = if self.keys.down.pressed {
            self.config.soft_drop_step_ms
        } else {
            self.config.gravity_drop_ms
        };
        let rate = rate.max(1);
        let base = self.t_drop_ms;
        let due = ms.saturating_sub(base) / rate;
        self.t_drop_ms = base + due * rate;
        let mut grounded = false;
        for step in 1..=due {
            match self.tetrion.drop() {
                Ok(fallen) => {
                    self.tetrion = fallen;
                    // The step's nominal time, not the tick's arrival time.
                    self.t_lock_ms = base + step * rate;
                }
                Err(_) => {
                    grounded = true;
                    break;
                }
            }
        }
        let grounded = grounded || self.tetrion.is_grounded();
        if grounded && ms.saturating_sub(self.t_lock_ms) > self.config.lock_delay_ms {
            self.lock_and_spawn(ms, msgs);
            if self.over.is_some() {
                return;
            }
        }

        // 3. Auto-shift.
        let Some((dx, pressed_ms)) = self.effective_shift() else {
            return;
        };
        if ms.saturating_sub(pressed_ms) <= self.config.auto_shift_delay_ms {
            return;
        }
        let base = self
            .t_autoshift_ms
            .max(pressed_ms + self.config.auto_shift_delay_ms);
        let arr = self.config.auto_repeat_ms.max(1);
        let repeats = ms.saturating_sub(base) / arr;
        self.t_autoshift_ms = base + repeats * arr;
        for _ in 0..repeats {
            match self.tetrion.move_by(dx, 0) {
                Ok(moved) => {
                    self.tetrion = moved;
                    self.t_lock_ms = ms;
                }
                Err(_) => break,
            }
        }
    }

    /// The direction auto-shift currently applies to: with both keys held
    /// the most recently pressed one wins, and a dead heat moves nothing.
    fn effective_shift(&self) -> Option<(i32, Millis)> {
        let Keys { left, right, .. } = self.keys;
        match (left.pressed, right.pressed) {
            (true, true) => match left.last_change_ms.cmp(&right.last_change_ms) {
                Ordering::Greater => Some((-1, left.last_change_ms)),
                Ordering::Less => Some((1, right.last_change_ms)),
                Ordering::Equal => None,
            },
            (true, false) => Some((-1, left.last_change_ms)),
            (false, true) => Some((1, right.last_change_ms)),
            (false, false) => None,
        }
    }
}

/// This builder exposes the ability to configure a new [`Tetris`] round to
/// varying degrees.
///
/// Chain calls to the setters, then call [`TetrisBuilder::build`]. The
/// builder is not used up and can be re-used to start more rounds.
#[derive(PartialEq, Clone, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TetrisBuilder {
    /// The configuration the round will start with.
    pub config: Config,
    /// The in-game time of the round's start.
    pub start_ms: Millis,
}

impl TetrisBuilder {
    /// Creates a blank builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a [`Tetris`] round with the information specified by `self`.
    pub fn build(&self) -> Tetris {
        Tetris::new(self.start_ms, self.config.clone())
    }

    /// Sets the whole [`Config`] at once.
    pub fn config(&mut self, x: Config) -> &mut Self {
        self.config = x;
        self
    }

    /// The in-game time of the round's start.
    pub fn start_ms(&mut self, x: Millis) -> &mut Self {
        self.start_ms = x;
        self
    }

    /// Playfield column count.
    pub fn cols(&mut self, x: usize) -> &mut Self {
        self.config.cols = x;
        self
    }

    /// Visible playfield row count.
    pub fn rows(&mut self, x: usize) -> &mut Self {
        self.config.rows = x;
        self
    }

    /// How many upcoming pieces are visible in the queue.
    pub fn preview_size(&mut self, x: usize) -> &mut Self {
        self.config.preview_size = x;
        self
    }

    /// The value to seed the engine's PRNG with.
    pub fn seed(&mut self, x: u64) -> &mut Self {
        self.config.seed = Some(x);
        self
    }

    /// Garbage rows injected before the first piece spawns.
    pub fn initial_garbage_rows(&mut self, x: usize) -> &mut Self {
        self.config.initial_garbage_rows = x;
        self
    }

    /// Where the hole in each injected garbage row goes.
    pub fn garbage_hole(&mut self, x: GarbageHole) -> &mut Self {
        self.config.garbage_hole = x;
        self
    }

    /// The method (and internal state) of tetromino generation used.
    pub fn source(&mut self, x: TetrominoSource) -> &mut Self {
        self.config.source = x;
        self
    }

    /// How long a piece takes to fall one row under gravity.
    pub fn gravity_drop_ms(&mut self, x: Millis) -> &mut Self {
        self.config.gravity_drop_ms = x;
        self
    }

    /// How long a piece takes to fall one row while soft drop is held.
    pub fn soft_drop_step_ms(&mut self, x: Millis) -> &mut Self {
        self.config.soft_drop_step_ms = x;
        self
    }

    /// How long automatic side movement takes to repeat once started (ARR).
    pub fn auto_repeat_ms(&mut self, x: Millis) -> &mut Self {
        self.config.auto_repeat_ms = x;
        self
    }

    /// How long a 'move' key must be held before auto-shift starts (DAS).
    pub fn auto_shift_delay_ms(&mut self, x: Millis) -> &mut Self {
        self.config.auto_shift_delay_ms = x;
        self
    }

    /// How long a grounded piece may rest before it locks down.
    pub fn lock_delay_ms(&mut self, x: Millis) -> &mut Self {
        self.config.lock_delay_ms = x;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece_x(game: &Tetris) -> i32 {
        game.tetrion().piece().expect("piece in play").position.0
    }

    #[test]
    fn auto_shift_follows_das_then_arr() {
        // Wide field so eleven left moves fit.
        let mut game = Tetris::builder().cols(30).seed(1).build();
        let x0 = piece_x(&game);

        game.update(Event::LeftPressed, 0).unwrap();
        assert_eq!(piece_x(&game), x0 - 1, "press moves once immediately");

        game.update(Event::Tick, 100).unwrap();
        assert_eq!(piece_x(&game), x0 - 1, "DAS not elapsed yet");

        game.update(Event::Tick, 150).unwrap();
        assert_eq!(piece_x(&game), x0 - 1, "charge point reached, no repeat yet");

        game.update(Event::Tick, 200).unwrap();
        assert_eq!(piece_x(&game), x0 - 3, "two repeats since the charge point");

        game.update(Event::Tick, 300).unwrap();
        assert_eq!(piece_x(&game), x0 - 7);

        game.update(Event::Tick, 400).unwrap();
        assert_eq!(piece_x(&game), x0 - 11, "1 + 0 + 2 + 4 + 4 moves in total");
    }

    #[test]
    fn most_recent_direction_wins() {
        let mut game = Tetris::builder().cols(30).seed(1).build();
        let x0 = piece_x(&game);
        game.update(Event::LeftPressed, 0).unwrap();
        game.update(Event::RightPressed, 10).unwrap();
        // Both held; right was pressed later, so auto-shift goes right.
        game.update(Event::Tick, 200).unwrap();
        assert!(piece_x(&game) > x0 - 1);
    }

    #[test]
    fn soft_drop_steps_one_row_on_the_next_tick() {
        let mut game = Tetris::builder().seed(3).build();
        let y0 = game.tetrion().piece().unwrap().position.1;
        game.update(Event::SoftDropPressed, 50).unwrap();
        game.update(Event::Tick, 51).unwrap();
        assert_eq!(game.tetrion().piece().unwrap().position.1, y0 - 1);
    }

    #[test]
    fn past_timestamps_are_clamped() {
        let mut game = Tetris::builder().seed(4).build();
        game.update(Event::Tick, 500).unwrap();
        // This tick claims to happen earlier; it must not rewind time and
        // in particular must not trigger gravity twice for the same span.
        let y_before = game.tetrion().piece().unwrap().position.1;
        game.update(Event::Tick, 100).unwrap();
        assert_eq!(game.tetrion().piece().unwrap().position.1, y_before);
    }

    #[test]
    fn gravity_pulls_the_piece_down() {
        let mut game = Tetris::builder().seed(5).build();
        let y0 = game.tetrion().piece().unwrap().position.1;
        game.update(Event::Tick, 2500).unwrap();
        assert_eq!(game.tetrion().piece().unwrap().position.1, y0 - 2);
    }

    #[test]
    fn hard_drop_locks_and_spawns() {
        let mut game = Tetris::builder().seed(6).build();
        let first = game.queue()[0];
        let msgs = game.update(Event::HardDrop, 10).unwrap();
        assert!(msgs
            .iter()
            .any(|(_, f)| matches!(f, Feedback::HardDropped(..))));
        assert!(msgs
            .iter()
            .any(|(_, f)| matches!(f, Feedback::PieceLocked(_))));
        // The next piece from the queue is in play.
        assert_eq!(game.tetrion().piece().unwrap().shape, first);
    }

    #[test]
    fn hold_is_gated_once_per_piece() {
        let mut game = Tetris::builder().seed(7).build();
        let shape = game.tetrion().piece().unwrap().shape;
        let msgs = game.update(Event::Hold, 5).unwrap();
        assert_eq!(msgs, vec![(5, Feedback::Held(shape))]);
        assert_eq!(game.hold(), Some(shape));
        // Second hold before a lock is a silent no-op.
        let msgs = game.update(Event::Hold, 6).unwrap();
        assert!(msgs.is_empty());
        assert_eq!(game.hold(), Some(shape));
    }

    #[test]
    fn updates_after_game_over_raise_consistently() {
        let mut game = Tetris::builder().seed(8).build();
        // Stack hard drops until the round ends.
        let mut over = None;
        for i in 0u64.. {
            match game.update(Event::HardDrop, i) {
                Ok(_) => (),
                Err(kind) => {
                    over = Some(kind);
                    break;
                }
            }
            if let Some(kind) = game.result() {
                over = Some(kind);
                break;
            }
        }
        let kind = over.expect("stacking forever must top out");
        let frozen = game.playfield(false);
        assert_eq!(game.update(Event::Tick, 1_000_000), Err(kind));
        assert_eq!(game.update(Event::LeftPressed, 1_000_001), Err(kind));
        // Snapshots still reflect the final state.
        assert_eq!(game.playfield(false), frozen);
    }

    #[test]
    fn forfeit_ends_the_round() {
        let mut game = Tetris::builder().seed(9).build();
        game.forfeit();
        assert_eq!(game.result(), Some(GameOver::Forfeit));
        assert_eq!(game.update(Event::Tick, 10), Err(GameOver::Forfeit));
    }

    #[test]
    fn fps_estimate_reads_the_tick_ring() {
        let mut game = Tetris::builder().seed(10).build();
        assert_eq!(game.fps_estimate(), 0.0);
        for i in 0..10u64 {
            game.update(Event::Tick, i * 100).unwrap();
        }
        let fps = game.fps_estimate();
        assert!((fps - 10.0).abs() < 1e-9, "{fps}");
    }

    #[test]
    fn builder_reuse_produces_identical_rounds() {
        let mut builder = Tetris::builder();
        builder.seed(11).cols(8).rows(18);
        let a = builder.build();
        let b = builder.build();
        assert_eq!(a.queue(), b.queue());
        assert_eq!(a.playfield(true), b.playfield(true));
    }
}
