//! kingrow: a distributed checkers search engine.
//!
//! Exposes the packed board, move generation, evaluation, parallel minimax
//! search and the remote evaluation layer for the binaries and integration
//! tests.

pub mod board;
pub mod config;
pub mod distributed;
pub mod engine;
pub mod error;
pub mod eval;
pub mod movegen;
pub mod protocol;
pub mod search;

pub use error::{EngineError, Result};
