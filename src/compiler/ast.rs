use std::fmt;

use crate::common::{span::Span, ty::Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Member access, `point.x`.
    Dot,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Assign => ":=",
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Dot => ".",
        }
    }
}

impl UnOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnOp::Plus => "+",
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

/// Each expression-level construct has its own variant.
/// Recursive variants own their children through a `Box`
/// or `Vec`, so the enum stays the same size however deep
/// the tree is.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Integer(i64),
    Real(f64),
    Str(String),
    Bool(bool),
    Iden(String),
    Unary(UnOp, Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        /// For `Dot`, the ordinal of the accessed member,
        /// filled in by the type assignment pass.
        member: Option<usize>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        other: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
}

/// An expression node.
/// `ty` stays `Type::Unknown` until type assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr {
            kind,
            ty: Type::Unknown,
            span,
        }
    }

    /// Shortcut for creating an `ExprKind::Binary` node
    /// spanning both operands.
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        let span = Span::combine(&left.span, &right.span);
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                member: None,
            },
            span,
        )
    }

    pub fn unary(op: UnOp, operand: Expr, span: Span) -> Expr {
        Expr::new(ExprKind::Unary(op, Box::new(operand)), span)
    }

    /// The variable name, if this is an identifier.
    pub fn iden(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Iden(name) => Some(name),
            _ => None,
        }
    }
}

/// The body of a function definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    /// `name : params -> ret`
    Decl {
        name: String,
        ty: Type,
    },
    /// `set name = (member type)...`
    Record {
        name: String,
        members: Vec<(String, Type)>,
    },
    Comment(String),
    Return(Expr),
    /// `name params = let bindings in body`
    Def {
        name: String,
        params: Vec<String>,
        prelude: Vec<(String, Expr)>,
        body: Body,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        other: Vec<Stmt>,
    },
    Let {
        name: String,
        value: Expr,
    },
    Block(Vec<Stmt>),
}

/// A statement node. Like expressions, statements are
/// typed during type assignment; see `compiler::check`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub ty: Type,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            kind,
            ty: Type::Unknown,
            span,
        }
    }
}

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

// The printed form is a compact s-expression,
// used for dumps and for checking the shape of trees.

fn write_all<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for item in items {
        write!(f, " {}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Integer(i) => write!(f, "{}", i),
            ExprKind::Real(r) => write!(f, "{:?}", r),
            ExprKind::Str(s) => write!(f, "{:?}", s),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Iden(name) => write!(f, "{}", name),
            ExprKind::Unary(op, operand) => write!(f, "({} {})", op.symbol(), operand),
            ExprKind::Binary {
                op, left, right, ..
            } => write!(f, "({} {} {})", op.symbol(), left, right),
            ExprKind::If { cond, then, other } => {
                write!(f, "(if {} {} {})", cond, then, other)
            },
            ExprKind::Lambda { params, body } => {
                write!(f, "(\\ ({}) {})", params.join(" "), body)
            },
            ExprKind::Call { name, args } => {
                write!(f, "({}", name)?;
                write_all(f, args)?;
                write!(f, ")")
            },
            ExprKind::Array(items) => {
                write!(f, "[")?;
                let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "{}]", items.join(" "))
            },
            ExprKind::Index { array, index } => write!(f, "(@ {} {})", array, index),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Expr(e) => write!(f, "{}", e),
            StmtKind::Decl { name, ty } => write!(f, "(decl {} {})", name, ty),
            StmtKind::Record { name, members } => {
                write!(f, "(set {}", name)?;
                for (member, ty) in members {
                    write!(f, " ({} {})", member, ty)?;
                }
                write!(f, ")")
            },
            StmtKind::Comment(text) => write!(f, "(# {:?})", text),
            StmtKind::Return(e) => write!(f, "(return {})", e),
            StmtKind::Def {
                name,
                params,
                prelude,
                body,
            } => {
                write!(f, "(def {} ({})", name, params.join(" "))?;
                for (binding, value) in prelude {
                    write!(f, " (let {} {})", binding, value)?;
                }
                match body {
                    Body::Expr(e) => write!(f, " {})", e),
                    Body::Block(block) => {
                        write!(f, " {{")?;
                        write_all(f, block)?;
                        write!(f, " }})")
                    },
                }
            },
            StmtKind::While { cond, body } => {
                write!(f, "(while {} {{", cond)?;
                write_all(f, body)?;
                write!(f, " }})")
            },
            StmtKind::If { cond, then, other } => {
                write!(f, "(if {} {{", cond)?;
                write_all(f, then)?;
                write!(f, " }} {{")?;
                write_all(f, other)?;
                write!(f, " }})")
            },
            StmtKind::Let { name, value } => write!(f, "(let {} {})", name, value),
            StmtKind::Block(block) => {
                write!(f, "{{")?;
                write_all(f, block)?;
                write!(f, " }}")
            },
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in self.statements.iter() {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}
