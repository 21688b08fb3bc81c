//! Type assignment.
//!
//! A single depth-first, left-to-right walk over the AST.
//! Every expression and statement node gets its type filled
//! in, and declarations, records and definitions are entered
//! into the `Context` as they are met. Functions therefore
//! have to be declared before they are called, but may be
//! defined in any order.
//!
//! The first error aborts the walk.

use std::{
    collections::{HashMap, HashSet},
    mem,
};

use tracing::debug;

use crate::{
    common::{span::Span, ty::Type},
    compiler::{
        ast::{BinOp, Body, Expr, ExprKind, Program, Stmt, StmtKind, UnOp},
        context::{Context, Kind},
        syntax::{TypeError, TypeErrorKind},
    },
};

/// Annotates `program` with types, registering its symbols
/// in `context`.
pub fn check(context: &mut Context, program: &mut Program) -> Result<(), TypeError> {
    let mut checker = Checker::new(context);
    for statement in program.statements.iter_mut() {
        checker.statement(statement)?;
    }

    debug!(
        functions = context.symbols.count(Kind::Function),
        records = context.symbols.count(Kind::Type),
        definitions = context.definitions.len(),
        "type assignment finished"
    );
    Ok(())
}

/// The variables visible at some point of the program.
/// Each lexical scope works on its own copy.
#[derive(Debug, Clone, Default)]
pub struct Locals {
    vars: HashMap<String, Type>,
}

impl Locals {
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.vars.get(name)
    }

    /// Binds or rebinds a variable.
    pub fn bind(&mut self, name: &str, ty: Type) {
        self.vars.insert(name.to_string(), ty);
    }
}

fn error(kind: TypeErrorKind, message: String, span: &Span) -> TypeError {
    TypeError::error(kind, &message, span)
}

fn mismatch(message: String, span: &Span) -> TypeError {
    error(TypeErrorKind::TypeMismatch, message, span)
}

fn expect(expected: &Type, found: &Type, what: &str, span: &Span) -> Result<(), TypeError> {
    if expected == found {
        Ok(())
    } else {
        Err(mismatch(
            format!("{} expects {}, found {}", what, expected, found),
            span,
        ))
    }
}

/// Fails on the first name that occurs twice.
fn distinct<'n>(
    names: impl IntoIterator<Item = &'n str>,
    kind: TypeErrorKind,
    span: &Span,
) -> Result<(), TypeError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(error(kind, format!("`{}` is bound twice", name), span));
        }
    }
    Ok(())
}

struct Checker<'c> {
    context: &'c mut Context,
    locals: Locals,
}

impl<'c> Checker<'c> {
    fn new(context: &'c mut Context) -> Checker<'c> {
        Checker {
            context,
            locals: Locals::default(),
        }
    }

    /// Runs `f` in a nested scope.
    /// Bindings made inside do not outlive it.
    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TypeError>,
    ) -> Result<T, TypeError> {
        let outer = self.locals.clone();
        let result = f(self);
        self.locals = outer;
        result
    }

    // Types

    /// Replaces references to named types with their
    /// definitions.
    fn resolve(&self, ty: &Type, span: &Span) -> Result<Type, TypeError> {
        match ty {
            Type::I64 | Type::Real | Type::Str | Type::Bool => Ok(ty.clone()),
            Type::Array(inner) => Ok(Type::Array(Box::new(self.resolve(inner, span)?))),
            Type::Function { .. } => self.signature(ty, span),
            Type::Record { name, members } if members.is_empty() => {
                self.context.record(name).cloned().ok_or_else(|| {
                    error(
                        TypeErrorKind::UnknownType,
                        format!("unknown type `{}`", name),
                        span,
                    )
                })
            },
            Type::Record { .. } => Ok(ty.clone()),
            Type::Vararg => Err(error(
                TypeErrorKind::VarargNotLast,
                "`...` can only end a parameter list".to_string(),
                span,
            )),
            Type::List(_) | Type::Unknown => Err(error(
                TypeErrorKind::UnknownType,
                format!("`{}` is not a type", ty),
                span,
            )),
        }
    }

    /// Resolves a function type, turning a trailing `...`
    /// into the `vararg` flag.
    fn signature(&self, ty: &Type, span: &Span) -> Result<Type, TypeError> {
        let (ret, params) = match ty {
            Type::Function { ret, params, .. } => (ret, params),
            other => return self.resolve(other, span),
        };

        let mut resolved = vec![];
        let mut vararg = false;
        for (index, param) in params.iter().enumerate() {
            if *param != Type::Vararg {
                resolved.push(self.resolve(param, span)?);
            } else if index + 1 == params.len() {
                vararg = true;
            } else {
                return Err(error(
                    TypeErrorKind::VarargNotLast,
                    "`...` must be the last parameter".to_string(),
                    span,
                ));
            }
        }

        Ok(Type::function(self.resolve(ret, span)?, resolved, vararg))
    }

    // Expressions

    fn expr(&mut self, expr: &mut Expr) -> Result<Type, TypeError> {
        let span = expr.span.clone();

        let ty = match &mut expr.kind {
            ExprKind::Integer(_) => Type::I64,
            ExprKind::Real(_) => Type::Real,
            ExprKind::Str(_) => Type::Str,
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Iden(name) => self.variable(name, &span)?,
            ExprKind::Unary(op, operand) => self.unary(*op, operand)?,
            ExprKind::Binary {
                op,
                left,
                right,
                member,
            } => match op {
                BinOp::Assign => self.assign(left, right)?,
                BinOp::Dot => self.member(left, right, member)?,
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                    self.operands(*op, left, right, Type::is_numeric, &span)?
                },
                BinOp::Mod => {
                    self.operands(*op, left, right, |t: &Type| *t == Type::I64, &span)?
                },
                BinOp::Eq | BinOp::Ne => {
                    let allowed = |t: &Type| t.is_numeric() || *t == Type::Bool;
                    self.operands(*op, left, right, allowed, &span)?;
                    Type::Bool
                },
                BinOp::Lt | BinOp::Gt => {
                    self.operands(*op, left, right, Type::is_numeric, &span)?;
                    Type::Bool
                },
                BinOp::And | BinOp::Or => {
                    self.operands(*op, left, right, |t: &Type| *t == Type::Bool, &span)?
                },
            },
            ExprKind::If { cond, then, other } => {
                let found = self.expr(cond)?;
                expect(&Type::Bool, &found, "an `if` condition", &cond.span)?;
                let then = self.expr(then)?;
                let other_ty = self.expr(other)?;
                expect(&then, &other_ty, "the `else` branch", &other.span)?;
                then
            },
            ExprKind::Lambda { .. } => {
                return Err(mismatch(
                    "the type of a lambda can only be inferred from the parameter it is passed to"
                        .to_string(),
                    &span,
                ))
            },
            ExprKind::Call { name, args } => self.call(name, args, &span)?,
            ExprKind::Array(items) => self.array(items, &span)?,
            ExprKind::Index { array, index } => {
                let inner = match self.expr(array)? {
                    Type::Array(inner) => *inner,
                    other => {
                        return Err(mismatch(
                            format!("only arrays can be indexed, found {}", other),
                            &array.span,
                        ))
                    },
                };
                let found = self.expr(index)?;
                expect(&Type::I64, &found, "an index", &index.span)?;
                inner
            },
        };

        expr.ty = ty.clone();
        Ok(ty)
    }

    fn variable(&self, name: &str, span: &Span) -> Result<Type, TypeError> {
        self.locals.get(name).cloned().ok_or_else(|| {
            error(
                TypeErrorKind::UnknownVariable,
                format!("`{}` is not bound", name),
                span,
            )
        })
    }

    fn unary(&mut self, op: UnOp, operand: &mut Expr) -> Result<Type, TypeError> {
        let ty = self.expr(operand)?;
        let allowed = match op {
            UnOp::Plus | UnOp::Neg => ty.is_numeric(),
            UnOp::Not => ty == Type::Bool,
        };

        if !allowed {
            return Err(mismatch(
                format!("`{}` can not be applied to {}", op.symbol(), ty),
                &operand.span,
            ));
        }
        Ok(ty)
    }

    /// Checks both operands of a binary operator: they must
    /// have the same type, which `allowed` must accept.
    /// Returns the operand type.
    fn operands(
        &mut self,
        op: BinOp,
        left: &mut Expr,
        right: &mut Expr,
        allowed: impl Fn(&Type) -> bool,
        span: &Span,
    ) -> Result<Type, TypeError> {
        let left = self.expr(left)?;
        let right = self.expr(right)?;

        if left != right {
            return Err(mismatch(
                format!(
                    "operands of `{}` must have the same type, found {} and {}",
                    op.symbol(),
                    left,
                    right
                ),
                span,
            ));
        }
        if !allowed(&left) {
            return Err(mismatch(
                format!("`{}` can not be applied to {}", op.symbol(), left),
                span,
            ));
        }
        Ok(left)
    }

    fn assign(&mut self, target: &mut Expr, value: &mut Expr) -> Result<Type, TypeError> {
        if target.iden().is_none() {
            return Err(mismatch(
                "only variables can be assigned to".to_string(),
                &target.span,
            ));
        }

        let ty = self.expr(target)?;
        let found = self.expr(value)?;
        expect(&ty, &found, "the assignment", &value.span)?;
        Ok(ty)
    }

    fn member(
        &mut self,
        target: &mut Expr,
        field: &mut Expr,
        member: &mut Option<usize>,
    ) -> Result<Type, TypeError> {
        let record = self.expr(target)?;
        let name = match field.iden() {
            Some(name) => name.to_string(),
            None => {
                return Err(mismatch(
                    "`.` must be followed by a member name".to_string(),
                    &field.span,
                ))
            },
        };

        if !matches!(record, Type::Record { .. }) {
            return Err(mismatch(
                format!("{} has no members", record),
                &target.span,
            ));
        }

        let (index, ty) = record.member(&name).ok_or_else(|| {
            error(
                TypeErrorKind::UnknownMember,
                format!("{} has no member `{}`", record, name),
                &field.span,
            )
        })?;

        *member = Some(index);
        field.ty = ty.clone();
        Ok(ty.clone())
    }

    fn array(&mut self, items: &mut [Expr], span: &Span) -> Result<Type, TypeError> {
        let (first, rest) = match items.split_first_mut() {
            Some(split) => split,
            None => {
                return Err(error(
                    TypeErrorKind::UnknownType,
                    "the element type of an empty array can not be inferred".to_string(),
                    span,
                ))
            },
        };

        let ty = self.expr(first)?;
        for item in rest.iter_mut() {
            let found = self.expr(item)?;
            expect(&ty, &found, "the array", &item.span)?;
        }
        Ok(Type::Array(Box::new(ty)))
    }

    fn call(&mut self, name: &str, args: &mut [Expr], span: &Span) -> Result<Type, TypeError> {
        let callee = self
            .locals
            .get(name)
            .or_else(|| self.context.function(name))
            .cloned()
            .ok_or_else(|| {
                error(
                    TypeErrorKind::UnknownVariable,
                    format!("`{}` is not declared", name),
                    span,
                )
            })?;

        let (ret, params, vararg) = match callee {
            Type::Function {
                ret,
                params,
                vararg,
            } => (*ret, params, vararg),
            other => {
                return Err(mismatch(
                    format!("`{}` is {}, not a function", name, other),
                    span,
                ))
            },
        };

        if args.len() < params.len() || (args.len() > params.len() && !vararg) {
            return Err(error(
                TypeErrorKind::ParameterCountMismatch,
                format!(
                    "`{}` takes {} arguments, found {}",
                    name,
                    params.len(),
                    args.len()
                ),
                span,
            ));
        }

        for (index, arg) in args.iter_mut().enumerate() {
            match params.get(index) {
                Some(expected) => self.argument(name, index, arg, expected)?,
                None => {
                    self.expr(arg)?;
                },
            }
        }

        Ok(ret)
    }

    /// Checks one positional argument. A lambda passed to a
    /// function-typed parameter takes its type from it.
    fn argument(
        &mut self,
        callee: &str,
        index: usize,
        arg: &mut Expr,
        expected: &Type,
    ) -> Result<(), TypeError> {
        if let ExprKind::Lambda { params, body } = &mut arg.kind {
            if let Type::Function {
                ret,
                params: types,
                ..
            } = expected
            {
                self.lambda(params, body, ret, types, &arg.span)?;
                arg.ty = expected.clone();
                return Ok(());
            }
        }

        let found = self.expr(arg)?;
        let what = format!("argument {} of `{}`", index + 1, callee);
        expect(expected, &found, &what, &arg.span)
    }

    fn lambda(
        &mut self,
        params: &[String],
        body: &mut Expr,
        ret: &Type,
        types: &[Type],
        span: &Span,
    ) -> Result<(), TypeError> {
        if params.len() != types.len() {
            return Err(error(
                TypeErrorKind::ParameterCountMismatch,
                format!(
                    "the lambda takes {} parameters, but {} are expected",
                    params.len(),
                    types.len()
                ),
                span,
            ));
        }
        distinct(
            params.iter().map(String::as_str),
            TypeErrorKind::DuplicateDefinition,
            span,
        )?;

        self.scoped(|checker| {
            for (param, ty) in params.iter().zip(types) {
                checker.locals.bind(param, ty.clone());
            }
            let found = checker.expr(body)?;
            expect(ret, &found, "the lambda", &body.span)
        })
    }

    // Statements

    fn statement(&mut self, stmt: &mut Stmt) -> Result<Type, TypeError> {
        let span = stmt.span.clone();

        let ty = match &mut stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr)?,
            StmtKind::Decl { name, ty } => self.declaration(name, ty, &span)?,
            StmtKind::Record { name, members } => self.record(name, members, &span)?,
            StmtKind::Comment(_) => Type::List(vec![]),
            StmtKind::Return(value) => self.ret(value, &span)?,
            StmtKind::Def {
                name,
                params,
                prelude,
                body,
            } => self.definition(name, params, prelude, body, &span)?,
            StmtKind::While { cond, body } => {
                let found = self.expr(cond)?;
                expect(&Type::Bool, &found, "a `while` condition", &cond.span)?;
                Type::List(self.block(body)?)
            },
            // branches may return different types; only the
            // condition is constrained
            StmtKind::If { cond, then, other } => {
                let found = self.expr(cond)?;
                expect(&Type::Bool, &found, "an `if` condition", &cond.span)?;
                let mut outcomes = self.block(then)?;
                outcomes.extend(self.block(other)?);
                Type::List(outcomes)
            },
            StmtKind::Let { name, value } => {
                let ty = self.expr(value)?;
                self.locals.bind(name, ty.clone());
                ty
            },
            StmtKind::Block(block) => Type::List(self.block(block)?),
        };

        stmt.ty = ty.clone();
        Ok(ty)
    }

    /// Checks a block in its own scope, collecting the types
    /// of the `return`s it contains.
    fn block(&mut self, statements: &mut [Stmt]) -> Result<Vec<Type>, TypeError> {
        self.scoped(|checker| {
            let mut outcomes = vec![];
            for statement in statements.iter_mut() {
                let ty = checker.statement(statement)?;
                outcomes.extend(ty.outcomes().iter().cloned());
            }
            Ok(outcomes)
        })
    }

    fn ret(&mut self, value: &mut Expr, span: &Span) -> Result<Type, TypeError> {
        let expected = match &self.context.current {
            Some(ty) => ty.clone(),
            None => {
                return Err(mismatch(
                    "`return` outside of a function".to_string(),
                    span,
                ))
            },
        };

        let found = self.expr(value)?;
        expect(&expected, &found, "`return`", &value.span)?;
        Ok(Type::List(vec![found]))
    }

    fn declaration(&mut self, name: &str, ty: &mut Type, span: &Span) -> Result<Type, TypeError> {
        let signature = self.signature(ty, span)?;

        if !self
            .context
            .symbols
            .register(name, Kind::Function, signature.clone())
        {
            return Err(error(
                TypeErrorKind::DuplicateDeclaration,
                format!("`{}` is already declared", name),
                span,
            ));
        }

        debug!(%name, %signature, "declared function");
        *ty = signature.clone();
        Ok(signature)
    }

    fn record(
        &mut self,
        name: &str,
        members: &mut [(String, Type)],
        span: &Span,
    ) -> Result<Type, TypeError> {
        distinct(
            members.iter().map(|(member, _)| member.as_str()),
            TypeErrorKind::DuplicateDeclaration,
            span,
        )?;
        for (_, ty) in members.iter_mut() {
            *ty = self.resolve(ty, span)?;
        }

        let record = Type::Record {
            name: name.to_string(),
            members: members.to_vec(),
        };
        let fields = members.iter().map(|(_, ty)| ty.clone()).collect();
        let constructor = Type::function(record.clone(), fields, false);

        let symbols = &mut self.context.symbols;
        if !symbols.register(name, Kind::Type, record.clone())
            || !symbols.register(name, Kind::Function, constructor)
        {
            return Err(error(
                TypeErrorKind::DuplicateDeclaration,
                format!("`{}` is already declared", name),
                span,
            ));
        }

        debug!(%name, size = record.size(), "declared record");
        Ok(record)
    }

    fn definition(
        &mut self,
        name: &str,
        params: &[String],
        prelude: &mut [(String, Expr)],
        body: &mut Body,
        span: &Span,
    ) -> Result<Type, TypeError> {
        if self.context.is_constructor(name) || self.context.is_defined(name) {
            return Err(error(
                TypeErrorKind::DuplicateDefinition,
                format!("`{}` is already defined", name),
                span,
            ));
        }

        let declared = match self.context.function(name) {
            Some(ty) => ty.clone(),
            None => {
                return Err(error(
                    TypeErrorKind::UnknownVariable,
                    format!("`{}` is defined but never declared", name),
                    span,
                ))
            },
        };
        let (ret, types) = match &declared {
            Type::Function { ret, params, .. } => (ret.as_ref().clone(), params.clone()),
            other => return Err(mismatch(format!("`{}` is {}", name, other), span)),
        };

        if params.len() != types.len() {
            return Err(error(
                TypeErrorKind::ParameterCountMismatch,
                format!(
                    "`{}` is declared with {} parameters, but defined with {}",
                    name,
                    types.len(),
                    params.len()
                ),
                span,
            ));
        }

        let bound = params
            .iter()
            .map(String::as_str)
            .chain(prelude.iter().map(|(binding, _)| binding.as_str()));
        distinct(bound, TypeErrorKind::DuplicateDefinition, span)?;

        self.context.definitions.insert(name.to_string(), span.clone());
        let outer = mem::replace(&mut self.context.current, Some(ret.clone()));

        let result = self.scoped(|checker| {
            for (param, ty) in params.iter().zip(types) {
                checker.locals.bind(param, ty);
            }
            for (binding, value) in prelude.iter_mut() {
                let ty = checker.expr(value)?;
                checker.locals.bind(binding, ty);
            }

            match body {
                Body::Expr(expr) => {
                    let found = checker.expr(expr)?;
                    let what = format!("`{}` returns {}, but its body", name, ret);
                    if found != ret {
                        return Err(mismatch(format!("{} is {}", what, found), &expr.span));
                    }
                },
                Body::Block(block) => {
                    checker.block(block)?;
                },
            }
            Ok(())
        });

        self.context.current = outer;
        result?;

        debug!(%name, "checked definition");
        Ok(declared)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{common::source::Source, compiler::parse::parse};

    fn checked(text: &str) -> Result<(Context, Program), TypeError> {
        let mut program = parse(Source::source(text)).unwrap();
        let mut context = Context::new();
        check(&mut context, &mut program)?;
        Ok((context, program))
    }

    fn kind(text: &str) -> TypeErrorKind {
        checked(text).unwrap_err().kind
    }

    fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
        f(expr);
        match &expr.kind {
            ExprKind::Unary(_, operand) => visit_expr(operand, f),
            ExprKind::Binary { left, right, .. } => {
                visit_expr(left, f);
                visit_expr(right, f);
            },
            ExprKind::If { cond, then, other } => {
                visit_expr(cond, f);
                visit_expr(then, f);
                visit_expr(other, f);
            },
            ExprKind::Lambda { body, .. } => visit_expr(body, f),
            ExprKind::Call { args: items, .. } | ExprKind::Array(items) => {
                items.iter().for_each(|item| visit_expr(item, f))
            },
            ExprKind::Index { array, index } => {
                visit_expr(array, f);
                visit_expr(index, f);
            },
            _ => (),
        }
    }

    fn visit(stmt: &Stmt, f: &mut impl FnMut(&Expr)) {
        match &stmt.kind {
            StmtKind::Expr(e) | StmtKind::Return(e) | StmtKind::Let { value: e, .. } => {
                visit_expr(e, f)
            },
            StmtKind::Def { prelude, body, .. } => {
                prelude.iter().for_each(|(_, value)| visit_expr(value, f));
                match body {
                    Body::Expr(e) => visit_expr(e, f),
                    Body::Block(block) => block.iter().for_each(|s| visit(s, f)),
                }
            },
            StmtKind::While { cond, body } => {
                visit_expr(cond, f);
                body.iter().for_each(|s| visit(s, f));
            },
            StmtKind::If { cond, then, other } => {
                visit_expr(cond, f);
                then.iter().chain(other).for_each(|s| visit(s, f));
            },
            StmtKind::Block(block) => block.iter().for_each(|s| visit(s, f)),
            StmtKind::Decl { .. } | StmtKind::Record { .. } | StmtKind::Comment(_) => (),
        }
    }

    const POINTS: &str = "\
set point = (x i64)(y real)
sum : i64 ... -> i64
scale : point real -> point
scale p k = point(p.x p.y * k)
apply : (i64 -> i64) i64 -> i64
apply f x = f(x)
main : -> i64
main = {
    let p = scale(point(1 2.0) 0.5)
    let i = 0
    while i < 10 && !false {
        i := i + apply(\\n -> n * 2 1) % 3
    }
    if p.y > 0.5 { return sum(i 1 2 3) }
    return if i == 3 then -1 else +i
}
";

    #[test]
    fn every_node_is_typed() {
        let (context, program) = checked(POINTS).unwrap();

        let mut untyped = vec![];
        for statement in program.statements.iter() {
            assert!(!statement.ty.is_unknown(), "{}", statement);
            visit(statement, &mut |e| {
                if e.ty.is_unknown() {
                    untyped.push(e.to_string())
                }
            });
        }
        assert!(untyped.is_empty(), "untyped: {:?}", untyped);

        assert_eq!(context.symbols.count(Kind::Function), 5);
        assert_eq!(context.symbols.count(Kind::Type), 1);
        assert!(context.is_defined("main"));
        assert!(!context.is_defined("sum"));
        assert_eq!(context.current, None);
    }

    #[test]
    fn declarations_are_resolved() {
        let (context, _) = checked(POINTS).unwrap();
        let point = context.record("point").unwrap().clone();

        assert_eq!(
            context.function("sum"),
            Some(&Type::function(Type::I64, vec![Type::I64], true))
        );
        assert_eq!(
            context.function("point"),
            Some(&Type::function(
                point.clone(),
                vec![Type::I64, Type::Real],
                false
            ))
        );
        assert_eq!(
            context.function("scale"),
            Some(&Type::function(point.clone(), vec![point, Type::Real], false))
        );
    }

    #[test]
    fn member_indices() {
        let (_, program) = checked(
            "set point = (x i64)(y real)\nget : point -> real\nget p = p.y\nfst : point -> i64\nfst p = p.x",
        )
        .unwrap();

        let mut members = vec![];
        for statement in program.statements.iter() {
            visit(statement, &mut |e| {
                if let ExprKind::Binary {
                    op: BinOp::Dot,
                    member,
                    right,
                    ..
                } = &e.kind
                {
                    members.push((*member, right.ty.clone()));
                }
            });
        }
        assert_eq!(members, vec![(Some(1), Type::Real), (Some(0), Type::I64)]);
    }

    #[test]
    fn argument_mismatch() {
        let error = checked("f : i64 -> i64\nf x = x\nmain : -> i64\nmain = f(true)").unwrap_err();
        assert_eq!(error.kind, TypeErrorKind::TypeMismatch);
        assert_eq!(error.message, "argument 1 of `f` expects i64, found bool");
        assert_eq!(error.span.unwrap().contents(), "true");
    }

    #[test]
    fn parameter_counts() {
        let f = "f : i64 -> i64\nf x = x\nmain : -> i64\n";
        assert_eq!(
            kind(&format!("{}main = f(1 2)", f)),
            TypeErrorKind::ParameterCountMismatch
        );
        assert_eq!(
            kind(&format!("{}main = f()", f)),
            TypeErrorKind::ParameterCountMismatch
        );
        assert_eq!(
            kind("f : i64 -> i64\nf x y = x"),
            TypeErrorKind::ParameterCountMismatch
        );
        assert_eq!(
            kind("apply : (i64 -> i64) -> i64\nmain : -> i64\nmain = apply(\\x y -> x)"),
            TypeErrorKind::ParameterCountMismatch
        );
        assert!(checked("f : i64 ... -> i64\nmain : -> i64\nmain = f(1 true \"s\")").is_ok());
    }

    #[test]
    fn varargs() {
        assert_eq!(kind("f : ... i64 -> i64"), TypeErrorKind::VarargNotLast);
        assert_eq!(kind("f : i64 -> ..."), TypeErrorKind::VarargNotLast);
    }

    #[test]
    fn duplicates() {
        assert_eq!(
            kind("f : -> i64\nf : -> bool"),
            TypeErrorKind::DuplicateDeclaration
        );
        assert_eq!(
            kind("f : -> i64\nf = 1\nf = 2"),
            TypeErrorKind::DuplicateDefinition
        );
        assert_eq!(
            kind("f : i64 i64 -> i64\nf x x = x"),
            TypeErrorKind::DuplicateDefinition
        );
        assert_eq!(
            kind("f : i64 -> i64\nf x = let x = 1 in x"),
            TypeErrorKind::DuplicateDefinition
        );
        assert_eq!(
            kind("set p = (x i64)(x bool)"),
            TypeErrorKind::DuplicateDeclaration
        );
        assert_eq!(
            kind("set p = (x i64)\np : -> i64"),
            TypeErrorKind::DuplicateDeclaration
        );
    }

    #[test]
    fn unknowns() {
        assert_eq!(kind("main : -> i64\nmain = x"), TypeErrorKind::UnknownVariable);
        assert_eq!(kind("main = 1"), TypeErrorKind::UnknownVariable);
        assert_eq!(kind("main : -> i64\nmain = g(1)"), TypeErrorKind::UnknownVariable);
        assert_eq!(kind("f : vec -> i64"), TypeErrorKind::UnknownType);
        assert_eq!(kind("main : -> [i64]\nmain = []"), TypeErrorKind::UnknownType);
        assert_eq!(
            kind("set point = (x i64)\nf : point -> i64\nf p = p.z"),
            TypeErrorKind::UnknownMember
        );
    }

    fn body_type(text: &str) -> Type {
        let (_, program) = checked(text).unwrap();
        match &program.statements.last().unwrap().kind {
            StmtKind::Def {
                body: Body::Expr(body),
                ..
            } => body.ty.clone(),
            other => panic!("expected a definition, found {:?}", other),
        }
    }

    #[test]
    fn arrays() {
        assert_eq!(
            body_type("main : -> [i64]\nmain = [1 2 3]"),
            Type::Array(Box::new(Type::I64))
        );
        assert_eq!(body_type("f : [bool] -> bool\nf xs = xs[0]"), Type::Bool);
        assert_eq!(
            body_type("f : [[real]] -> [real]\nf xs = xs[1 + 1]"),
            Type::Array(Box::new(Type::Real))
        );

        assert_eq!(kind("main : -> [i64]\nmain = [1 true]"), TypeErrorKind::TypeMismatch);
        assert_eq!(kind("f : [i64] -> i64\nf xs = xs[true]"), TypeErrorKind::TypeMismatch);
        assert_eq!(kind("main : -> i64\nmain = 1[0]"), TypeErrorKind::TypeMismatch);
    }

    #[test]
    fn indexing_checks_the_array_first() {
        let error = checked("main : -> i64\nmain = a[true]").unwrap_err();
        assert_eq!(error.kind, TypeErrorKind::UnknownVariable);
        assert_eq!(error.span.unwrap().contents(), "a");

        let error = checked("main : -> i64\nmain = a[b]").unwrap_err();
        assert_eq!(error.span.unwrap().contents(), "a");
    }

    #[test]
    fn returns() {
        assert_eq!(
            kind("main : -> i64\nmain = { return true }"),
            TypeErrorKind::TypeMismatch
        );
        assert_eq!(kind("return 1"), TypeErrorKind::TypeMismatch);
        assert_eq!(
            kind("main : -> i64\nmain = true"),
            TypeErrorKind::TypeMismatch
        );

        let (_, program) = checked("main : -> i64\nmain = { { return 1 } return 2 }").unwrap();
        match &program.statements[1].kind {
            StmtKind::Def {
                body: Body::Block(block),
                ..
            } => {
                assert_eq!(block[0].ty, Type::List(vec![Type::I64]));
                assert_eq!(block[1].ty, Type::List(vec![Type::I64]));
            },
            other => panic!("expected a definition, found {:?}", other),
        }
    }

    #[test]
    fn statement_if_is_permissive() {
        let (_, program) = checked(
            "main : -> i64\nmain = { if true { return 1 } else { let s = \"x\" } return 2 }",
        )
        .unwrap();
        match &program.statements[1].kind {
            StmtKind::Def {
                body: Body::Block(block),
                ..
            } => assert_eq!(block[0].ty, Type::List(vec![Type::I64])),
            other => panic!("expected a definition, found {:?}", other),
        }

        assert_eq!(
            kind("main : -> i64\nmain = if true then 1 else 2.0"),
            TypeErrorKind::TypeMismatch
        );
    }

    #[test]
    fn operators() {
        let main = |body: &str| format!("main : -> bool\nmain = {}", body);
        assert!(checked(&main("1 < 2 && 2.0 > 1.5 || true == false")).is_ok());
        assert_eq!(kind(&main("1.0 % 2.0 == 1.0")), TypeErrorKind::TypeMismatch);
        assert_eq!(kind(&main("1 + 2.0 == 3")), TypeErrorKind::TypeMismatch);
        assert_eq!(kind(&main("true < false")), TypeErrorKind::TypeMismatch);
        assert_eq!(kind(&main("!1")), TypeErrorKind::TypeMismatch);
        assert_eq!(kind(&main("\"a\" == \"a\"")), TypeErrorKind::TypeMismatch);
    }

    #[test]
    fn lambdas_need_a_parameter() {
        assert_eq!(
            kind("main : -> i64\nmain = { let f = \\x -> x return 1 }"),
            TypeErrorKind::TypeMismatch
        );
        assert_eq!(
            kind("apply : (i64 -> i64) -> i64\nmain : -> i64\nmain = apply(\\x -> x == 1)"),
            TypeErrorKind::TypeMismatch
        );
    }

    #[test]
    fn assignment() {
        let main = |body: &str| format!("main : -> i64\nmain = {{ let x = 1 {} return x }}", body);
        assert!(checked(&main("x := 2")).is_ok());
        assert_eq!(kind(&main("x := true")), TypeErrorKind::TypeMismatch);
        assert_eq!(kind(&main("y := 1")), TypeErrorKind::UnknownVariable);
    }

    #[test]
    fn scopes_do_not_leak() {
        assert_eq!(
            kind("main : -> i64\nmain = { { let y = 1 } return y }"),
            TypeErrorKind::UnknownVariable
        );
        assert_eq!(
            kind("main : -> i64\nmain = { while false { let y = 1 } return y }"),
            TypeErrorKind::UnknownVariable
        );
    }

    #[test]
    fn nested_functions_see_enclosing_variables() {
        let source = "\
outer : i64 -> i64
middle : i64 -> i64
inner : i64 -> i64
outer a = {
    middle b = {
        inner c = a + b + c
        return inner(1)
    }
    return middle(10)
}";
        assert!(checked(source).is_ok());
    }

    #[test]
    fn context_can_be_reused() {
        let mut context = Context::new();
        let text = "main : -> i64\nmain = 1";

        let mut program = parse(Source::source(text)).unwrap();
        check(&mut context, &mut program).unwrap();

        let mut again = parse(Source::source(text)).unwrap();
        assert_eq!(
            check(&mut context, &mut again).unwrap_err().kind,
            TypeErrorKind::DuplicateDeclaration
        );

        context.reset();
        let mut again = parse(Source::source(text)).unwrap();
        assert!(check(&mut context, &mut again).is_ok());
    }
}
