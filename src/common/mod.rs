//! Contains datastructures and utility functions
//! common to both the `compiler` and `vm`.
//!
//! - Source code representation and span annotations.
//! - The `Type` tagged union shared by the AST and the generator.
//! - Opcodes, the operator table, and the bytecode container.

pub mod bytecode;
pub mod opcode;
pub mod source;
pub mod span;
pub mod ty;

pub use bytecode::{Bytecode, Instruction};
pub use opcode::{Opcode, Operator};
pub use source::Source;
pub use span::Span;
pub use ty::Type;
