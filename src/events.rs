//! The engine-to-host callback contract.
//!
//! Everything the engine wants the host to know about score, moves and level
//! outcome goes through an `EngineListener`. All methods default to doing
//! nothing, so a host only implements what it displays.
use std::cell::RefCell;
use std::rc::Rc;

/// Receives engine notifications. Called synchronously from engine methods.
pub trait EngineListener {
    /// Score changed (once per cascade batch, and once with 0 at level start).
    fn on_score_update(&mut self, _score: u32) {}

    /// A move was consumed (and once at level start with the full budget).
    fn on_moves_update(&mut self, _moves_left: u32) {}

    /// The level's target score was reached.
    ///
    /// Fired with `is_final_level == false` when the level completes, and
    /// once more with `true` when the host advances past the last level.
    fn on_level_complete(&mut self, _level: u32, _score: u32, _is_final_level: bool) {}

    /// Moves ran out below the target score.
    fn on_game_over(&mut self, _score: u32) {}
}

/// Listener that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl EngineListener for NullListener {}

/// A notification, as recorded by `EventRecorder`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    ScoreUpdate(u32),
    MovesUpdate(u32),
    LevelComplete {
        level: u32,
        score: u32,
        is_final_level: bool,
    },
    GameOver(u32),
}

/// Shared, growable log of engine events.
pub type EventLog = Rc<RefCell<Vec<EngineEvent>>>;

/// Listener that appends every notification to an `EventLog`.
///
/// The engine owns the recorder; the host keeps a clone of the log.
///
/// # Examples
/// ```
/// use match3_engine::events::{EngineEvent, EngineListener, EventRecorder};
/// let (mut recorder, log) = EventRecorder::new();
/// recorder.on_score_update(30);
/// assert_eq!(log.borrow().as_slice(), &[EngineEvent::ScoreUpdate(30)]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EventRecorder {
    log: EventLog,
}

impl EventRecorder {
    pub fn new() -> (Self, EventLog) {
        let recorder = EventRecorder::default();
        let log = Rc::clone(&recorder.log);
        (recorder, log)
    }

    fn push(&self, event: EngineEvent) {
        self.log.borrow_mut().push(event);
    }
}

impl EngineListener for EventRecorder {
    fn on_score_update(&mut self, score: u32) {
        self.push(EngineEvent::ScoreUpdate(score));
    }

    fn on_moves_update(&mut self, moves_left: u32) {
        self.push(EngineEvent::MovesUpdate(moves_left));
    }

    fn on_level_complete(&mut self, level: u32, score: u32, is_final_level: bool) {
        self.push(EngineEvent::LevelComplete {
            level,
            score,
            is_final_level,
        });
    }

    fn on_game_over(&mut self, score: u32) {
        self.push(EngineEvent::GameOver(score));
    }
}
