//! Lifecycle of one drawing loop.

use std::fmt;

use tracing::{debug, warn};

use bingo_core::types::GameId;

/// Phase of a drawing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPhase {
    /// Ownership not yet taken.
    NotStarted,
    /// Drawing one number per tick.
    Running,
    /// Stopped by a control signal or the game's flags.
    StoppedBySignal,
    /// All numbers drawn.
    Exhausted,
    /// Ending the game without a winner.
    Finalizing,
    /// Terminated; the drawing lock is released.
    Done,
}

impl DrawPhase {
    /// Phase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Running => "RUNNING",
            Self::StoppedBySignal => "STOPPED_BY_SIGNAL",
            Self::Exhausted => "EXHAUSTED",
            Self::Finalizing => "FINALIZING",
            Self::Done => "DONE",
        }
    }

    /// Whether the loop may move from `self` to `next`.
    ///
    /// `Running -> Done` covers lost ownership and store failures.
    pub fn can_advance_to(&self, next: DrawPhase) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running)
                | (Self::Running, Self::StoppedBySignal)
                | (Self::Running, Self::Exhausted)
                | (Self::Running, Self::Done)
                | (Self::Exhausted, Self::Finalizing)
                | (Self::Exhausted, Self::Done)
                | (Self::StoppedBySignal, Self::Done)
                | (Self::Finalizing, Self::Done)
        )
    }
}

impl fmt::Display for DrawPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished loop went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawSummary {
    /// Game the loop drew for.
    pub game_id: GameId,
    /// Numbers this loop drew.
    pub drawn: u32,
    /// Every phase visited, in order.
    pub phases: Vec<DrawPhase>,
}

impl DrawSummary {
    /// Whether the loop passed through `phase`.
    pub fn visited(&self, phase: DrawPhase) -> bool {
        self.phases.contains(&phase)
    }
}

/// Records phase transitions of one loop.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    game_id: GameId,
    phase: DrawPhase,
    phases: Vec<DrawPhase>,
    drawn: u32,
}

impl PhaseTracker {
    pub(crate) fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            phase: DrawPhase::NotStarted,
            phases: vec![DrawPhase::NotStarted],
            drawn: 0,
        }
    }

    pub(crate) fn phase(&self) -> DrawPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: DrawPhase) {
        if self.phase == next {
            return;
        }
        if !self.phase.can_advance_to(next) {
            warn!(game_id = %self.game_id, from = %self.phase, to = %next, "Unexpected drawing phase transition");
        }
        debug!(game_id = %self.game_id, from = %self.phase, to = %next, "Drawing phase");
        self.phase = next;
        self.phases.push(next);
    }

    pub(crate) fn count_draw(&mut self) {
        self.drawn += 1;
    }

    pub(crate) fn finish(self) -> DrawSummary {
        DrawSummary {
            game_id: self.game_id,
            drawn: self.drawn,
            phases: self.phases,
        }
    }
}
