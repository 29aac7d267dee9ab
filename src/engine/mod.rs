//! Attempt evaluation (C5) and execution protocol (C6).

pub mod attempt;
pub mod execution;

pub use attempt::{evaluate, EvaluationOutcome};
pub use execution::{execute, ExecutionOutcome};
