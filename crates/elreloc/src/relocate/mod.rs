//! Relocation: the state machine, the safe move, and what gets reported.

mod engine;
mod mover;
mod outcome;

pub use engine::{CancelToken, Relocator, RelocatorOptions};
pub use mover::{move_file, MoveError, MoveMethod, MoveOptions};
pub use outcome::{FailureReason, FileReport, RelocationOutcome, RunReport, RunSummary, SkipReason};
