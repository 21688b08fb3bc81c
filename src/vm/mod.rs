//! This module contains the stack machine that runs
//! compiled bytecode. See `vm::vm` for the call convention.

pub mod vm;

pub use vm::{ExitState, VM};
