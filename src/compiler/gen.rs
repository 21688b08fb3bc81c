use std::{collections::HashMap, mem};

use tracing::debug;

use crate::{
    common::{
        bytecode::Bytecode,
        opcode::{cell, Opcode, Operator},
        span::Span,
        ty::Type,
    },
    compiler::{
        ast::{BinOp, Body, Expr, ExprKind, Program, Stmt, StmtKind, UnOp},
        context::Context,
        syntax::{CodegenError, CodegenErrorKind},
    },
};

/// The number of header cells at the bottom of each frame:
/// static link, dynamic link, and return address.
pub const HEADER: usize = 3;

/// Lowers a type-checked program to bytecode.
pub fn gen(context: &Context, program: &Program) -> Result<Bytecode, CodegenError> {
    let mut compiler = Compiler::new(context);
    compiler.program(program)?;
    Ok(compiler.bytecode)
}

/// Where a variable lives: the level of the function that
/// owns it and its offset in that function's frame.
#[derive(Debug, Clone, PartialEq)]
struct Var {
    level: usize,
    offset: usize,
    ty: Type,
}

/// The names visible at some point of the program.
#[derive(Debug, Clone, Default)]
struct Scope {
    vars: HashMap<String, Var>,
    /// Functions defined in an enclosing block, with the
    /// level they were defined at.
    funs: HashMap<String, usize>,
}

/// A call site whose callee had not been emitted yet.
struct Pending {
    index: usize,
    name: String,
    span: Span,
}

/// Compiler is a bytecode generator that walks a typed AST
/// and produces (unoptimized) bytecode. Types are taken
/// from the nodes; the AST is assumed to have passed
/// `check`.
pub struct Compiler<'c> {
    context: &'c Context,
    bytecode: Bytecode,
    scope: Scope,
    /// The nesting depth of the function being emitted.
    /// Top-level functions are defined at level 0.
    level: usize,
    /// The next free cell of the current frame.
    offset: usize,
    pending: Vec<Pending>,
}

impl<'c> Compiler<'c> {
    pub fn new(context: &'c Context) -> Compiler<'c> {
        Compiler {
            context,
            bytecode: Bytecode::empty(),
            scope: Scope::default(),
            level: 0,
            offset: HEADER,
            pending: vec![],
        }
    }

    /// Opens a nested scope, returning the enclosing one so
    /// it can be restored with `exit_scope`.
    fn enter_scope(&mut self) -> Scope {
        self.scope.clone()
    }

    fn exit_scope(&mut self, enclosing: Scope) {
        self.scope = enclosing;
    }

    fn emit(&mut self, op: Opcode, level: usize, operand: i64) -> usize {
        self.bytecode.emit(op, level, operand)
    }

    /// Points the jump at `index` to the next instruction.
    fn patch_here(&mut self, index: usize) {
        let here = self.bytecode.here();
        self.bytecode.patch(index, here as i64);
    }

    /// Reserves `size` cells in the current frame.
    fn allocate(&mut self, size: usize) -> usize {
        let offset = self.offset;
        self.offset += size;
        offset
    }

    fn bind(&mut self, name: &str, offset: usize, ty: Type) {
        let var = Var {
            level: self.level,
            offset,
            ty,
        };
        self.scope.vars.insert(name.to_string(), var);
    }

    fn load_cells(&mut self, delta: usize, offset: usize, size: usize) {
        for cell in 0..size {
            self.emit(Opcode::Lod, delta, (offset + cell) as i64);
        }
    }

    /// Pops `size` cells into a variable, last cell first.
    fn store_cells(&mut self, delta: usize, offset: usize, size: usize) {
        for cell in (0..size).rev() {
            self.emit(Opcode::Sto, delta, (offset + cell) as i64);
        }
    }

    fn variable(&self, name: &str, span: &Span) -> Result<Var, CodegenError> {
        self.scope.vars.get(name).cloned().ok_or_else(|| {
            CodegenError::error(
                CodegenErrorKind::UnknownVariable,
                &format!("`{}` is not in scope", name),
                span,
            )
        })
    }

    /// Makes the definitions of a block visible to the whole
    /// block, so they can be called before they appear.
    fn hoist(&mut self, statements: &[Stmt]) {
        for statement in statements {
            if let StmtKind::Def { name, .. } = &statement.kind {
                self.scope.funs.insert(name.clone(), self.level);
            }
        }
    }

    // Program layout

    fn program(&mut self, program: &Program) -> Result<(), CodegenError> {
        let skip = self.emit(Opcode::Jmp, 0, 0);
        self.hoist(&program.statements);

        for statement in program.statements.iter() {
            match &statement.kind {
                StmtKind::Def {
                    name,
                    params,
                    prelude,
                    body,
                } => self.function(name, params, prelude, body, &statement.span)?,
                StmtKind::Decl { .. } | StmtKind::Record { .. } | StmtKind::Comment(_) => (),
                _ => {
                    return Err(CodegenError::error(
                        CodegenErrorKind::NotImplemented,
                        "statements outside of functions can not be compiled",
                        &statement.span,
                    ))
                },
            }
        }

        let main = match self.bytecode.entry("main") {
            Some(entry) if self.scope.funs.contains_key("main") => entry,
            _ => {
                return Err(CodegenError::global(
                    CodegenErrorKind::UnknownFunction,
                    "no `main` function is defined",
                ))
            },
        };
        if let Some(Type::Function { params, .. }) = self.context.function("main") {
            if !params.is_empty() {
                return Err(CodegenError::global(
                    CodegenErrorKind::InvalidArgumentCount,
                    "`main` can not take parameters",
                ));
            }
        }

        self.patch_here(skip);
        self.emit(Opcode::Cap, 0, 0);
        self.emit(Opcode::Cal, 0, main as i64);

        self.backpatch()
    }

    /// Resolves the targets of calls emitted before their
    /// callee.
    fn backpatch(&mut self) -> Result<(), CodegenError> {
        for pending in mem::take(&mut self.pending) {
            let entry = self.bytecode.entry(&pending.name).ok_or_else(|| {
                CodegenError::error(
                    CodegenErrorKind::UnknownFunction,
                    &format!("`{}` is declared but never defined", pending.name),
                    &pending.span,
                )
            })?;
            debug!(site = pending.index, entry, name = %pending.name, "patched call");
            self.bytecode.patch(pending.index, entry as i64);
        }
        Ok(())
    }

    fn function(
        &mut self,
        name: &str,
        params: &[String],
        prelude: &[(String, Expr)],
        body: &Body,
        span: &Span,
    ) -> Result<(), CodegenError> {
        let (ret, types) = match self.context.function(name) {
            Some(Type::Function {
                ret, params: types, ..
            }) => ((**ret).clone(), types.clone()),
            _ => {
                return Err(CodegenError::error(
                    CodegenErrorKind::UnknownFunction,
                    &format!("`{}` has no signature", name),
                    span,
                ))
            },
        };

        let entry = self.bytecode.here();
        self.bytecode.functions.insert(name.to_string(), entry);
        debug!(%name, entry, level = self.level, "emitting function");

        let enclosing = self.enter_scope();
        let outer_offset = mem::replace(&mut self.offset, HEADER);
        self.level += 1;

        for (param, ty) in params.iter().zip(types) {
            let offset = self.allocate(ty.size());
            self.bind(param, offset, ty);
        }
        let locals = self.offset;
        let reserve = self.emit(Opcode::Ini, 0, 0);

        let result = self.function_body(prelude, body, &ret);
        self.bytecode.patch(reserve, (self.offset - locals) as i64);

        self.level -= 1;
        self.offset = outer_offset;
        self.exit_scope(enclosing);
        result
    }

    fn function_body(
        &mut self,
        prelude: &[(String, Expr)],
        body: &Body,
        ret: &Type,
    ) -> Result<(), CodegenError> {
        for (name, value) in prelude {
            self.binding(name, value)?;
        }

        match body {
            Body::Expr(expr) => self.expr(expr)?,
            Body::Block(block) => self.block(block)?,
        }

        // a block body that falls off its end still returns
        self.emit(Opcode::Ret, 0, ret.size() as i64);
        Ok(())
    }

    // Statements

    fn block(&mut self, statements: &[Stmt]) -> Result<(), CodegenError> {
        let enclosing = self.enter_scope();
        self.hoist(statements);
        let result = statements.iter().try_for_each(|s| self.statement(s));
        self.exit_scope(enclosing);
        result
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.discard(expr),
            StmtKind::Decl { .. } | StmtKind::Record { .. } | StmtKind::Comment(_) => Ok(()),
            StmtKind::Return(value) => {
                self.expr(value)?;
                self.emit(Opcode::Ret, 0, value.ty.size() as i64);
                Ok(())
            },
            StmtKind::Def {
                name,
                params,
                prelude,
                body,
            } => {
                let skip = self.emit(Opcode::Jmp, 0, 0);
                self.function(name, params, prelude, body, &stmt.span)?;
                self.patch_here(skip);
                Ok(())
            },
            StmtKind::While { cond, body } => {
                let start = self.bytecode.here();
                self.expr(cond)?;
                let exit = self.emit(Opcode::Jpc, 0, 0);
                self.block(body)?;
                self.emit(Opcode::Jmp, 0, start as i64);
                self.patch_here(exit);
                Ok(())
            },
            StmtKind::If { cond, then, other } => {
                self.expr(cond)?;
                let to_else = self.emit(Opcode::Jpc, 0, 0);
                self.block(then)?;
                let to_end = self.emit(Opcode::Jmp, 0, 0);
                self.patch_here(to_else);
                self.block(other)?;
                self.patch_here(to_end);
                Ok(())
            },
            StmtKind::Let { name, value } => self.binding(name, value),
            StmtKind::Block(block) => self.block(block),
        }
    }

    /// Evaluates an expression for its effect only.
    fn discard(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        if let ExprKind::Binary {
            op: BinOp::Assign,
            left,
            right,
            ..
        } = &expr.kind
        {
            return self.assign(left, right);
        }

        self.expr(expr)?;
        let size = expr.ty.size();
        if size > 0 {
            self.emit(Opcode::Ini, 0, -(size as i64));
        }
        Ok(())
    }

    /// `let name = value`: the value is computed before the
    /// name is bound, so it may refer to an outer `name`.
    fn binding(&mut self, name: &str, value: &Expr) -> Result<(), CodegenError> {
        let size = value.ty.size();
        let offset = self.allocate(size);
        self.expr(value)?;
        self.store_cells(0, offset, size);
        self.bind(name, offset, value.ty.clone());
        Ok(())
    }

    /// Stores into a variable, leaving nothing on the stack.
    fn assign(&mut self, target: &Expr, value: &Expr) -> Result<(), CodegenError> {
        let name = target.iden().ok_or_else(|| {
            CodegenError::error(
                CodegenErrorKind::TypeMismatch,
                "only variables can be assigned to",
                &target.span,
            )
        })?;
        let var = self.variable(name, &target.span)?;

        self.expr(value)?;
        self.store_cells(self.level - var.level, var.offset, var.ty.size());
        Ok(())
    }

    // Expressions

    /// Walks an expression, leaving its value on the stack.
    fn expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Integer(integer) => {
                self.emit(Opcode::Lit, 0, *integer);
            },
            ExprKind::Real(real) => {
                self.emit(Opcode::Lit, 0, cell(*real));
            },
            ExprKind::Str(string) => {
                let index = self.bytecode.index_string(string);
                self.emit(Opcode::Lit, 0, index as i64);
            },
            ExprKind::Bool(boolean) => {
                self.emit(Opcode::Lit, 0, *boolean as i64);
            },
            ExprKind::Iden(name) => {
                let var = self.variable(name, &expr.span)?;
                self.load_cells(self.level - var.level, var.offset, var.ty.size());
            },
            ExprKind::Unary(op, operand) => {
                self.expr(operand)?;
                let operator = match op {
                    UnOp::Plus => return Ok(()),
                    UnOp::Neg if operand.ty == Type::Real => Operator::FNeg,
                    UnOp::Neg => Operator::Neg,
                    UnOp::Not => Operator::Not,
                };
                self.emit(Opcode::Opr, 0, operator as i64);
            },
            ExprKind::Binary {
                op: BinOp::Assign,
                left,
                right,
                ..
            } => {
                self.assign(left, right)?;
                self.expr(left)?;
            },
            ExprKind::Binary {
                op: BinOp::Dot,
                left,
                member,
                ..
            } => self.member(expr, left, *member)?,
            ExprKind::Binary {
                op, left, right, ..
            } => {
                let operator = operator(*op, &left.ty).ok_or_else(|| {
                    CodegenError::error(
                        CodegenErrorKind::UnknownOperator,
                        &format!("no instruction for `{}` on {}", op.symbol(), left.ty),
                        &expr.span,
                    )
                })?;
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Opcode::Opr, 0, operator as i64);
            },
            ExprKind::If { cond, then, other } => {
                self.expr(cond)?;
                let to_else = self.emit(Opcode::Jpc, 0, 0);
                self.expr(then)?;
                let to_end = self.emit(Opcode::Jmp, 0, 0);
                self.patch_here(to_else);
                self.expr(other)?;
                self.patch_here(to_end);
            },
            ExprKind::Call { name, args } => self.call(name, args, &expr.span)?,
            ExprKind::Lambda { .. } => return Err(not_implemented("lambdas", &expr.span)),
            ExprKind::Array(_) => return Err(not_implemented("array literals", &expr.span)),
            ExprKind::Index { .. } => return Err(not_implemented("indexing", &expr.span)),
        }

        Ok(())
    }

    /// The frame cells of a variable, or of a member of a
    /// variable at any depth.
    fn place(&self, expr: &Expr) -> Option<Var> {
        match &expr.kind {
            ExprKind::Iden(name) => self.scope.vars.get(name).cloned(),
            ExprKind::Binary {
                op: BinOp::Dot,
                left,
                member: Some(index),
                ..
            } => {
                let record = self.place(left)?;
                Some(Var {
                    level: record.level,
                    offset: record.offset + left.ty.member_offset(*index)?,
                    ty: expr.ty.clone(),
                })
            },
            _ => None,
        }
    }

    fn member(
        &mut self,
        expr: &Expr,
        record: &Expr,
        member: Option<usize>,
    ) -> Result<(), CodegenError> {
        if let Some(var) = self.place(expr) {
            self.load_cells(self.level - var.level, var.offset, var.ty.size());
            return Ok(());
        }

        let offset = member
            .and_then(|index| record.ty.member_offset(index))
            .ok_or_else(|| {
                CodegenError::error(
                    CodegenErrorKind::UnknownField,
                    &format!("{} has no such member", record.ty),
                    &expr.span,
                )
            })?;

        // not a variable: spill the record into a temporary
        let size = record.ty.size();
        self.expr(record)?;
        let temp = self.allocate(size);
        self.store_cells(0, temp, size);
        self.load_cells(0, temp + offset, expr.ty.size());
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Expr], span: &Span) -> Result<(), CodegenError> {
        if self.scope.vars.contains_key(name) {
            return Err(not_implemented("calls through function values", span));
        }

        // a record value is just its members, in order
        if self.context.is_constructor(name) {
            return args.iter().try_for_each(|arg| self.expr(arg));
        }

        let defined = *self.scope.funs.get(name).ok_or_else(|| {
            CodegenError::error(
                CodegenErrorKind::UnknownFunction,
                &format!("`{}` is declared but never defined in scope", name),
                span,
            )
        })?;
        let delta = self.level - defined;

        self.emit(Opcode::Cap, delta, 0);
        for arg in args {
            self.expr(arg)?;
        }

        match self.bytecode.entry(name) {
            Some(entry) => {
                self.emit(Opcode::Cal, delta, entry as i64);
            },
            None => {
                let index = self.emit(Opcode::Cal, delta, 0);
                self.pending.push(Pending {
                    index,
                    name: name.to_string(),
                    span: span.clone(),
                });
            },
        }
        Ok(())
    }
}

fn not_implemented(what: &str, span: &Span) -> CodegenError {
    CodegenError::error(
        CodegenErrorKind::NotImplemented,
        &format!("{} are not supported by the bytecode backend", what),
        span,
    )
}

/// Selects the `opr` operator for a binary operator applied
/// to operands of type `operand`.
fn operator(op: BinOp, operand: &Type) -> Option<Operator> {
    let real = *operand == Type::Real;
    let operator = match op {
        BinOp::Add if real => Operator::FAdd,
        BinOp::Add => Operator::Add,
        BinOp::Sub if real => Operator::FSub,
        BinOp::Sub => Operator::Sub,
        BinOp::Mul if real => Operator::FMul,
        BinOp::Mul => Operator::Mul,
        BinOp::Div if real => Operator::FDiv,
        BinOp::Div => Operator::Div,
        BinOp::Mod => Operator::Mod,
        BinOp::Eq if real => Operator::FEq,
        BinOp::Eq => Operator::Eq,
        BinOp::Ne if real => Operator::FNe,
        BinOp::Ne => Operator::Ne,
        BinOp::Lt if real => Operator::FLt,
        BinOp::Lt => Operator::Lt,
        BinOp::Gt if real => Operator::FGt,
        BinOp::Gt => Operator::Gt,
        BinOp::And => Operator::And,
        BinOp::Or => Operator::Or,
        BinOp::Assign | BinOp::Dot => return None,
    };
    Some(operator)
}
