//! This module contains the compiler implementation.
//!
//! Each step in the compiler pipeline turns one datatype into another.
//! loosely, starting with `Source` (string + path):
//!
//! 1. Typeless AST: `parse.rs`, built from the combinators in `combinator.rs`
//! 2. Typed AST:    `check.rs`, recording symbols in a `Context`
//! 3. Bytecode:     `gen.rs`
//!
//! Each step reports its own error type; `Syntax` wraps all three.

use std::rc::Rc;

use tracing::debug;

use crate::common::{bytecode::Bytecode, source::Source};

pub mod ast;
pub mod combinator;
pub mod context;

pub mod check;
pub mod gen;
pub mod parse;

pub mod syntax;

pub use check::check;
pub use context::Context;
pub use gen::gen;
pub use parse::parse;
pub use syntax::Syntax;

/// Runs the whole pipeline on a source with a fresh
/// `Context`.
pub fn compile(source: Rc<Source>) -> Result<Bytecode, Syntax> {
    let mut program = parse(source)?;
    let mut context = Context::new();
    check(&mut context, &mut program)?;
    let bytecode = gen(&context, &program)?;

    debug!(
        instructions = bytecode.code.len(),
        functions = bytecode.functions.len(),
        "compiled"
    );
    Ok(bytecode)
}
