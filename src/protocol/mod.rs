//! Protocol handling.
//!
//! The RPC wire format shared by distributors, coordinators and workers, and
//! the line-oriented command parser of the `kingrow` driver.

pub mod parser;
pub mod wire;

pub use parser::{parse_command, Command, GoParams};
pub use wire::{
    read_frame, write_frame, Request, RequestFrame, Response, ResponseFrame, TaskSpec, WireBoard,
};
