use std::fmt;

use thiserror::Error;

use crate::engine::Event;
use crate::progress::GenerationState;

/// Why a run stopped before finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptReason {
    TimedOut,
    Cancelled,
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptReason::TimedOut => f.write_str("burst timed out"),
            InterruptReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("illegal transition: {event:?} in state {from}")]
    IllegalTransition { from: GenerationState, event: Event },

    #[error("generation interrupted: {0}")]
    Interrupted(InterruptReason),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CalendarError {
    /// A query met an in-progress state. `Calendar` runs borrow it mutably
    /// and always return in a resting state, so its own API never yields
    /// this; it guards engines shared outside the facade.
    #[error("operation not allowed while {0}")]
    InProgress(GenerationState),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid day records: {0}")]
    Records(#[from] serde_json::Error),
}
