//! # Xi
//! This crate contains the Xi compiler and the stack machine
//! that runs its output. The `xi` binary wraps both; see
//! `xi --help`.
//!
//! ## Embedding Xi in Rust
//! ```ignore
//! use xi::{compile, run, Source};
//!
//! let source = Source::source("main : -> i64\nmain = 6 * 7");
//! let bytecode = compile(source).unwrap();
//! assert_eq!(run(&bytecode).top(), Some(42));
//! ```
//!
//! ## Overview of the compilation process
//! Within the compiler pipeline, source code is represented as a `Source`
//! object. `compiler::parse` turns it into an untyped AST,
//! `compiler::check` annotates every node with a `Type` while recording
//! declarations in a `Context`, and `compiler::gen` lowers the typed AST
//! to `Bytecode`. The `vm` then executes the bytecode on a single array
//! of integer cells.

pub mod common;
pub mod compiler;
pub mod config;
pub mod vm;

pub use common::{Bytecode, Source};
pub use compiler::{compile, Syntax};
pub use config::Config;
pub use vm::{ExitState, VM};

/// Runs compiled bytecode on a fresh VM of the
/// default capacity.
pub fn run(bytecode: &Bytecode) -> ExitState {
    VM::init().run(bytecode)
}
