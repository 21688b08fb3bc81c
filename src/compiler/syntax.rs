use std::fmt;

use thiserror::Error;

use crate::common::span::Span;

/// Raised when the grammar can not consume the whole
/// program. The combinators report no expectations, so all
/// we know is where the parse stopped.
#[derive(Debug, Error, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub span: Span,
}

impl ParseError {
    pub fn new(span: Span) -> ParseError {
        ParseError {
            offset: span.offset(),
            span,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.span)?;
        write!(f, "Parse Error: no match past offset {}", self.offset)
    }
}

/// The ways the type assignment pass can reject a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    UnknownType,
    DuplicateDeclaration,
    DuplicateDefinition,
    TypeMismatch,
    ParameterCountMismatch,
    UnknownVariable,
    UnknownMember,
    VarargNotLast,
}

/// Represents a static error found by the type assignment
/// pass. The first error aborts the pass.
#[derive(Debug, Error, PartialEq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl TypeError {
    /// Creates a new type error pointing at a node.
    pub fn error(kind: TypeErrorKind, message: &str, span: &Span) -> TypeError {
        TypeError {
            kind,
            message: message.to_string(),
            span: Some(span.clone()),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref span) = self.span {
            write!(f, "{}", span)?;
        }
        write!(f, "Type Error ({:?}): {}", self.kind, self.message)
    }
}

/// The ways bytecode generation can fail.
/// Some kinds are shared with backends other than the
/// stack machine and are never produced by `gen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    UnknownVariable,
    UnknownType,
    UnknownOperator,
    UnknownFunction,
    UnknownStruct,
    UnknownEnum,
    UnknownField,
    UnknownMethod,
    UnknownParameter,
    UnknownArgument,
    UnknownReturn,
    Redefinition,
    InvalidArgumentCount,
    NotImplemented,
    TypeMismatch,
}

/// Represents an error found while lowering a typed AST.
#[derive(Debug, Error, PartialEq)]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl CodegenError {
    pub fn error(
        kind: CodegenErrorKind,
        message: &str,
        span: &Span,
    ) -> CodegenError {
        CodegenError {
            kind,
            message: message.to_string(),
            span: Some(span.clone()),
        }
    }

    /// An error that can not be pinned to a node,
    /// e.g. a missing `main`.
    pub fn global(kind: CodegenErrorKind, message: &str) -> CodegenError {
        CodegenError {
            kind,
            message: message.to_string(),
            span: None,
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref span) = self.span {
            write!(f, "{}", span)?;
        }
        write!(f, "Codegen Error ({:?}): {}", self.kind, self.message)
    }
}

/// Any static error raised while compiling a program.
#[derive(Debug, Error, PartialEq)]
pub enum Syntax {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::source::Source;

    #[test]
    fn type_error() {
        let source = Source::source("main : -> i64\nmain = true");
        let error = TypeError::error(
            TypeErrorKind::TypeMismatch,
            "`main` returns i64, but its body is bool",
            &Span::new(&source, 21, 4),
        );

        let target = "In ./source:2:8
  |
2 | main = true
  |        ^^^^
  |
Type Error (TypeMismatch): `main` returns i64, but its body is bool";

        assert_eq!(format!("{}", error), target);
    }

    #[test]
    fn global_codegen_error() {
        let error = CodegenError::global(
            CodegenErrorKind::UnknownFunction,
            "no `main` function",
        );
        assert_eq!(
            Syntax::from(error).to_string(),
            "Codegen Error (UnknownFunction): no `main` function"
        );
    }
}
