//! Position evaluation.
//!
//! Scores a board from a given side's perspective using material and
//! positional terms.

pub(crate) mod heuristic;

pub use heuristic::{evaluate, raw_score, EvalParams, MaterialScale, MAX_GRANULARITY};
