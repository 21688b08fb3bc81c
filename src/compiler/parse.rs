//! The Xi grammar, built on the combinators in
//! `compiler::combinator`.
//!
//! Every nonterminal is a plain function from a `Cursor`
//! to a `Reply`, so the grammar can be mutually recursive
//! without any boxing. Leading whitespace is skipped by the
//! token-level parsers; a few places (postfix `.` and `[`,
//! the `(` of a call) deliberately match without skipping.

use std::rc::Rc;

use crate::{
    common::{source::Source, span::Span, ty::Type},
    compiler::{
        ast::{BinOp, Body, Expr, ExprKind, Program, Stmt, StmtKind, UnOp},
        combinator::{
            bind, chain_left, chars, choice, list, literal, many, map, maybe, pair,
            right, satisfy, some, spanned, token, verify, Cursor, Parser, Reply,
        },
        syntax::ParseError,
    },
};

const KEYWORDS: [&str; 10] = [
    "if", "then", "else", "while", "return", "let", "in", "set", "true", "false",
];

/// Parses a complete program.
/// Fails with the offset of the first statement that could
/// not be parsed.
pub fn parse(source: Rc<Source>) -> Result<Program, ParseError> {
    let start = Cursor::new(&source);
    let (statements, rest) = list(statement)(start).unwrap_or((vec![], start));

    let rest = rest.skip_whitespace();
    if !rest.is_empty() {
        return Err(ParseError::new(rest.point()));
    }

    Ok(Program { statements })
}

fn push<T>(mut items: Vec<T>, item: T) -> Vec<T> {
    items.push(item);
    items
}

fn push_char(mut string: String, c: char) -> String {
    string.push(c);
    string
}

// Lexical level

/// A run of word characters not starting with a digit.
fn word<'a>(input: Cursor<'a>) -> Reply<'a, String> {
    token(verify(
        chars(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
        |word: &String| !word.starts_with(|c: char| c.is_ascii_digit()),
    ))(input)
}

/// A word that is not a keyword.
fn ident<'a>(input: Cursor<'a>) -> Reply<'a, String> {
    verify(word, |word: &String| !KEYWORDS.contains(&word.as_str()))(input)
}

fn keyword<'a>(expected: &'static str) -> impl Parser<'a, &'static str> {
    map(
        verify(word, move |word: &String| word.as_str() == expected),
        move |_| expected,
    )
}

/// Brackets and separators.
fn punct<'a>(symbol: &'static str) -> impl Parser<'a, &'static str> {
    token(literal(symbol))
}

/// An operator symbol. Does not match when the next
/// character could continue a longer operator, so `=` is
/// never the prefix of `==` and `-` never that of `->`.
fn op<'a>(symbol: &'static str) -> impl Parser<'a, &'static str> {
    move |input: Cursor<'a>| {
        let (matched, rest) = punct(symbol)(input)?;
        match rest.rest().chars().next() {
            Some('=' | '>' | '&' | '|') => None,
            _ => Some((matched, rest)),
        }
    }
}

fn digits<'a>(input: Cursor<'a>) -> Reply<'a, String> {
    chars(satisfy(|c: char| c.is_ascii_digit()))(input)
}

/// Integer and real literals. A minus sign directly
/// attached to the digits belongs to the literal.
fn number<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    let start = input.skip_whitespace();
    let fraction = maybe(pair(literal("."), digits));
    let (_, rest) = pair(maybe(literal("-")), pair(digits, fraction))(start)?;

    let span = start.span_to(rest);
    let text = span.contents();
    let kind = if text.contains('.') {
        ExprKind::Real(text.parse().ok()?)
    } else {
        ExprKind::Integer(text.parse().ok()?)
    };

    Some((Expr::new(kind, span), rest))
}

fn string_char<'a>(input: Cursor<'a>) -> Reply<'a, char> {
    choice!(
        map(literal("\\n"), |_| '\n'),
        map(literal("\\t"), |_| '\t'),
        map(literal("\\\\"), |_| '\\'),
        map(literal("\\\""), |_| '"'),
        satisfy(|c: char| c != '"' && c != '\\'),
    )(input)
}

fn string<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    let (_, rest) = literal("\"")(input)?;
    let (contents, rest) = many(string_char, String::new(), push_char)(rest)?;
    let (_, rest) = literal("\"")(rest)?;
    Some((ExprKind::Str(contents), rest))
}

// Types

fn ty<'a>(input: Cursor<'a>) -> Reply<'a, Type> {
    choice!(
        map(op("..."), |_| Type::Vararg),
        array_type,
        function_type,
        map(ident, |name: String| match name.as_str() {
            "i64" => Type::I64,
            "real" => Type::Real,
            "string" => Type::Str,
            "bool" => Type::Bool,
            other => Type::named(other),
        }),
    )(input)
}

fn array_type<'a>(input: Cursor<'a>) -> Reply<'a, Type> {
    let (_, rest) = punct("[")(input)?;
    let (inner, rest) = ty(rest)?;
    let (_, rest) = punct("]")(rest)?;
    Some((Type::Array(Box::new(inner)), rest))
}

fn function_type<'a>(input: Cursor<'a>) -> Reply<'a, Type> {
    let (_, rest) = punct("(")(input)?;
    let (params, rest) = list(ty)(rest)?;
    let (_, rest) = op("->")(rest)?;
    let (ret, rest) = ty(rest)?;
    let (_, rest) = punct(")")(rest)?;
    Some((Type::function(ret, params, false), rest))
}

// Expressions

/// Wraps a parser of an expression kind into one that
/// produces a spanned node.
fn node<'a, P>(p: P) -> impl Parser<'a, Expr>
where
    P: Parser<'a, ExprKind>,
{
    map(token(spanned(p)), |(kind, span): (ExprKind, Span)| {
        Expr::new(kind, span)
    })
}

fn iden<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    map(ident, ExprKind::Iden)(input)
}

fn boolean<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    choice!(
        map(keyword("true"), |_| ExprKind::Bool(true)),
        map(keyword("false"), |_| ExprKind::Bool(false)),
    )(input)
}

fn if_expr<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    let (_, rest) = keyword("if")(input)?;
    let (cond, rest) = expr(rest)?;
    let (_, rest) = keyword("then")(rest)?;
    let (then, rest) = expr(rest)?;
    let (_, rest) = keyword("else")(rest)?;
    let (other, rest) = expr(rest)?;

    let kind = ExprKind::If {
        cond: Box::new(cond),
        then: Box::new(then),
        other: Box::new(other),
    };
    Some((kind, rest))
}

fn lambda<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    let (_, rest) = punct("\\")(input)?;
    let (params, rest) = some(ident, vec![], push)(rest)?;
    let (_, rest) = op("->")(rest)?;
    let (body, rest) = expr(rest)?;
    Some((
        ExprKind::Lambda {
            params,
            body: Box::new(body),
        },
        rest,
    ))
}

/// A call argument after the first one.
/// A line break before it ends the argument list.
fn argument<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    if input.newline_ahead() {
        return None;
    }
    expr(input)
}

fn call<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    let (name, rest) = ident(input)?;
    let (_, rest) = literal("(")(rest)?;
    let (args, rest) = match expr(rest) {
        Some((first, rest)) => many(argument, vec![first], push)(rest)?,
        None => (vec![], rest),
    };
    let (_, rest) = punct(")")(rest)?;
    Some((ExprKind::Call { name, args }, rest))
}

fn array<'a>(input: Cursor<'a>) -> Reply<'a, ExprKind> {
    let (_, rest) = punct("[")(input)?;
    let (items, rest) = list(expr)(rest)?;
    let (_, rest) = punct("]")(rest)?;
    Some((ExprKind::Array(items), rest))
}

fn group<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    let (_, rest) = punct("(")(input)?;
    let (inner, rest) = expr(rest)?;
    let (_, rest) = punct(")")(rest)?;
    Some((inner, rest))
}

fn atom<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    choice!(
        number,
        node(string),
        node(boolean),
        node(if_expr),
        node(lambda),
        node(call),
        node(array),
        node(iden),
        group,
    )(input)
}

enum Suffix {
    Member(Expr),
    Index(Expr, Span),
}

/// `.member` or `[index]`, directly after the target.
fn suffix<'a>(input: Cursor<'a>) -> Reply<'a, Suffix> {
    if let Some((_, rest)) = literal(".")(input) {
        let (member, rest) = node(iden)(rest)?;
        return Some((Suffix::Member(member), rest));
    }

    let (_, rest) = literal("[")(input)?;
    let (index, rest) = expr(rest)?;
    let ((_, close), rest) = token(spanned(literal("]")))(rest)?;
    Some((Suffix::Index(index, close), rest))
}

fn apply_suffix(target: Expr, suffix: Suffix) -> Expr {
    match suffix {
        Suffix::Member(member) => Expr::binary(BinOp::Dot, target, member),
        Suffix::Index(index, close) => {
            let span = Span::combine(&target.span, &close);
            let kind = ExprKind::Index {
                array: Box::new(target),
                index: Box::new(index),
            };
            Expr::new(kind, span)
        },
    }
}

fn postfix<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    bind(atom, |first: Expr| many(suffix, first, apply_suffix))(input)
}

fn prefixed<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    let start = input.skip_whitespace();
    let (operator, rest) = choice!(
        map(op("-"), |_| UnOp::Neg),
        map(op("+"), |_| UnOp::Plus),
        map(op("!"), |_| UnOp::Not),
    )(start)?;
    let (operand, rest) = unary(rest)?;
    let span = start.span_to(rest);
    Some((Expr::unary(operator, operand, span), rest))
}

fn unary<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    choice!(postfix, prefixed)(input)
}

/// Matches the first operator of the table.
fn binary_op<'a>(
    table: &'static [(&'static str, BinOp)],
) -> impl Parser<'a, BinOp> + Copy {
    move |input: Cursor<'a>| {
        table.iter().find_map(|&(symbol, operator)| {
            op(symbol)(input).map(|(_, rest)| (operator, rest))
        })
    }
}

fn fold_binary(left: Expr, (operator, right): (BinOp, Expr)) -> Expr {
    Expr::binary(operator, left, right)
}

const MUL: &[(&str, BinOp)] = &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)];
const ADD: &[(&str, BinOp)] = &[("+", BinOp::Add), ("-", BinOp::Sub)];
const REL: &[(&str, BinOp)] = &[("<", BinOp::Lt), (">", BinOp::Gt)];
const EQ: &[(&str, BinOp)] = &[("==", BinOp::Eq), ("!=", BinOp::Ne)];
const AND: &[(&str, BinOp)] = &[("&&", BinOp::And)];
const OR: &[(&str, BinOp)] = &[("||", BinOp::Or)];

fn mul<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    chain_left(unary, binary_op(MUL), fold_binary)(input)
}

fn add<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    chain_left(mul, binary_op(ADD), fold_binary)(input)
}

fn rel<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    chain_left(add, binary_op(REL), fold_binary)(input)
}

fn eq<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    chain_left(rel, binary_op(EQ), fold_binary)(input)
}

fn and<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    chain_left(eq, binary_op(AND), fold_binary)(input)
}

fn or<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    chain_left(and, binary_op(OR), fold_binary)(input)
}

fn assign<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    let (target, rest) = node(iden)(input)?;
    let (_, rest) = op(":=")(rest)?;
    let (value, rest) = expr(rest)?;
    Some((Expr::binary(BinOp::Assign, target, value), rest))
}

fn expr<'a>(input: Cursor<'a>) -> Reply<'a, Expr> {
    choice!(assign, or)(input)
}

// Statements

fn comment<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (_, rest) = punct("#")(input)?;
    let text = satisfy(|c: char| c != '\n');
    let (text, rest) = many(text, String::new(), push_char)(rest)?;
    Some((StmtKind::Comment(text.trim().to_string()), rest))
}

fn member<'a>(input: Cursor<'a>) -> Reply<'a, (String, Type)> {
    let (_, rest) = punct("(")(input)?;
    let (name, rest) = ident(rest)?;
    let (ty, rest) = ty(rest)?;
    let (_, rest) = punct(")")(rest)?;
    Some(((name, ty), rest))
}

fn record<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (_, rest) = keyword("set")(input)?;
    let (name, rest) = ident(rest)?;
    let (_, rest) = op("=")(rest)?;
    let (members, rest) = some(member, vec![], push)(rest)?;
    Some((StmtKind::Record { name, members }, rest))
}

fn declaration<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (name, rest) = ident(input)?;
    let (_, rest) = op(":")(rest)?;
    let (params, rest) = list(ty)(rest)?;
    let (_, rest) = op("->")(rest)?;
    let (ret, rest) = ty(rest)?;
    let ty = Type::function(ret, params, false);
    Some((StmtKind::Decl { name, ty }, rest))
}

/// `name = expr`, as used by `let`.
fn binding<'a>(input: Cursor<'a>) -> Reply<'a, (String, Expr)> {
    let (name, rest) = ident(input)?;
    let (_, rest) = op("=")(rest)?;
    let (value, rest) = expr(rest)?;
    Some(((name, value), rest))
}

/// `let a = 1, b = 2 in`
fn prelude<'a>(input: Cursor<'a>) -> Reply<'a, Vec<(String, Expr)>> {
    let (_, rest) = keyword("let")(input)?;
    let (first, rest) = binding(rest)?;
    let (bindings, rest) = many(right(punct(","), binding), vec![first], push)(rest)?;
    let (_, rest) = keyword("in")(rest)?;
    Some((bindings, rest))
}

/// A parameter name, on the same line as the function name.
fn parameter<'a>(input: Cursor<'a>) -> Reply<'a, String> {
    if input.newline_ahead() {
        return None;
    }
    ident(input)
}

fn definition<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (name, rest) = ident(input)?;
    let (params, rest) = many(parameter, vec![], push)(rest)?;
    let (_, rest) = op("=")(rest)?;

    let (prelude, body, rest) = match block(rest) {
        Some((statements, rest)) => (vec![], Body::Block(statements), rest),
        None => {
            let (prelude, rest) = maybe(prelude)(rest)?;
            let (body, rest) = expr(rest)?;
            (prelude.unwrap_or_default(), Body::Expr(body), rest)
        },
    };

    let kind = StmtKind::Def {
        name,
        params,
        prelude,
        body,
    };
    Some((kind, rest))
}

fn ret<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    map(right(keyword("return"), expr), StmtKind::Return)(input)
}

fn while_loop<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (_, rest) = keyword("while")(input)?;
    let (cond, rest) = expr(rest)?;
    let (body, rest) = block(rest)?;
    Some((StmtKind::While { cond, body }, rest))
}

fn if_stmt<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (_, rest) = keyword("if")(input)?;
    let (cond, rest) = expr(rest)?;
    let (then, rest) = block(rest)?;

    let (other, rest) = match keyword("else")(rest) {
        None => (vec![], rest),
        Some((_, rest)) => match block(rest) {
            Some(reply) => reply,
            None => {
                let ((kind, span), rest) = token(spanned(if_stmt))(rest)?;
                (vec![Stmt::new(kind, span)], rest)
            },
        },
    };

    Some((StmtKind::If { cond, then, other }, rest))
}

fn let_stmt<'a>(input: Cursor<'a>) -> Reply<'a, StmtKind> {
    let (_, rest) = keyword("let")(input)?;
    let ((name, value), rest) = binding(rest)?;
    Some((StmtKind::Let { name, value }, rest))
}

fn block<'a>(input: Cursor<'a>) -> Reply<'a, Vec<Stmt>> {
    let (_, rest) = punct("{")(input)?;
    let (statements, rest) = list(statement)(rest)?;
    let (_, rest) = punct("}")(rest)?;
    Some((statements, rest))
}

fn statement<'a>(input: Cursor<'a>) -> Reply<'a, Stmt> {
    let start = input.skip_whitespace();
    let (kind, rest) = choice!(
        comment,
        record,
        declaration,
        definition,
        ret,
        while_loop,
        if_stmt,
        let_stmt,
        map(block, StmtKind::Block),
        map(expr, StmtKind::Expr),
    )(start)?;

    Some((Stmt::new(kind, start.span_to(rest)), rest))
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn program(text: &str) -> Program {
        match parse(Source::source(text)) {
            Ok(program) => program,
            Err(error) => panic!("{}", error),
        }
    }

    /// Parses a single expression statement and prints it.
    fn show(text: &str) -> String {
        let program = program(text);
        assert_eq!(program.statements.len(), 1, "in {:?}", text);
        program.statements[0].to_string()
    }

    fn error_offset(text: &str) -> usize {
        parse(Source::source(text)).unwrap_err().offset
    }

    #[test]
    fn literals() {
        assert_eq!(show("42"), "42");
        assert_eq!(show("-123.5"), "-123.5");
        assert_eq!(show("true"), "true");
        assert_eq!(show("- x"), "(- x)");
        assert_eq!(show("-x"), "(- x)");
        assert_eq!(show("a -1"), "(- a 1)");

        let statement = &program("\"a\\\"b\\n\"").statements[0];
        match &statement.kind {
            StmtKind::Expr(Expr {
                kind: ExprKind::Str(s),
                ..
            }) => assert_eq!(s, "a\"b\n"),
            other => panic!("expected a string, found {:?}", other),
        }
    }

    #[test]
    fn precedence() {
        assert_eq!(show("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(show("10 - 3 - 2"), "(- (- 10 3) 2)");
        assert_eq!(
            show("a || b && c == d < e + f * g"),
            "(|| a (&& b (== c (< d (+ e (* f g))))))"
        );
        assert_eq!(show("(1 + 2) * 3"), "(* (+ 1 2) 3)");
        assert_eq!(show("!a == b"), "(== (! a) b)");
        assert_eq!(show("x := y := 1 + 2"), "(:= x (:= y (+ 1 2)))");
    }

    #[test]
    fn member_access() {
        assert_eq!(show("p.x + 1"), "(+ (. p x) 1)");
        assert_eq!(show("- p.x"), "(- (. p x))");
        assert_eq!(show("f(p).y"), "(. (f p) y)");
        assert_eq!(show("line.from.x"), "(. (. line from) x)");
        assert_eq!(show("xs[i + 1]"), "(@ xs (+ i 1))");
    }

    #[test]
    fn calls() {
        assert_eq!(show("f()"), "(f)");
        assert_eq!(show("f(a b)"), "(f a b)");
        assert_eq!(show("f(g(1) (-2) x.y)"), "(f (g 1) -2 (. x y))");
        assert_eq!(show("f(a -2)"), "(f (- a 2))");
        assert_eq!(show("apply(\\x -> x + 1 5)"), "(apply (\\ (x) (+ x 1)) 5)");
        assert_eq!(show("f(a\n)"), "(f a)");
        assert!(parse(Source::source("f(a\n b)")).is_err());
    }

    #[test]
    fn parameters_end_at_line_breaks() {
        let text = "main = {\n let a = 1\n a\n f x = x\n return a\n}";
        assert_eq!(
            program(text).to_string(),
            "(def main () { (let a 1) a (def f (x) x) (return a) })\n"
        );
        assert_eq!(program("f x y =\n x").to_string(), "(def f (x y) x)\n");
    }

    #[test]
    fn keywords_are_not_names() {
        assert!(parse(Source::source("then")).is_err());
        assert!(parse(Source::source("if := 1")).is_err());
        assert_eq!(show("iffy := 1"), "(:= iffy 1)");
    }

    #[test]
    fn operators_do_not_split() {
        assert_eq!(show("f x = x == 1"), "(def f (x) (== x 1))");
        assert_eq!(show("f : i64 ... -> bool"), "(decl f (i64 ... -> bool))");
        assert_eq!(show("x != y"), "(!= x y)");
    }

    #[test]
    fn statements() {
        let source = "\
# points
set point = (x i64)(y real)
norm : point -> real
norm p = let a = p.y, b = 2.0 in a * b
main : -> i64
main = {
    let i = 0
    while i < 10 {
        i := i + 1
    }
    if i == 10 { return 1 } else if false { return 2 } else { return 3 }
}
";
        let target = "\
(# \"points\")
(set point (x i64) (y real))
(decl norm (point -> real))
(def norm (p) (let a (. p y)) (let b 2.0) (* a b))
(decl main (-> i64))
(def main () { (let i 0) (while (< i 10) { (:= i (+ i 1)) }) \
(if (== i 10) { (return 1) } { (if false { (return 2) } { (return 3) }) }) })
";
        assert_eq!(program(source).to_string(), target);
    }

    #[test]
    fn types() {
        assert_eq!(
            show("apply : (i64 -> i64) [real] -> string"),
            "(decl apply ((i64 -> i64) [real] -> string))"
        );
    }

    #[test]
    fn if_expression() {
        assert_eq!(show("if a then 1 else 2"), "(if a 1 2)");
    }

    #[test]
    fn error_offsets() {
        assert_eq!(error_offset("main = 1\n)"), 9);
        assert_eq!(error_offset("main = (1"), 5);
        assert_eq!(error_offset("x := 1\n  ]"), 9);
    }

    #[test]
    fn spans_cover_nodes() {
        let program = program("  main = 1 + 2  ");
        assert_eq!(program.statements[0].span.contents(), "main = 1 + 2");
    }

    proptest! {
        #[test]
        fn never_panics(text in "\\PC*") {
            let _ = parse(Source::source(&text));
        }

        #[test]
        fn integers(n: i64) {
            prop_assert_eq!(show(&n.to_string()), n.to_string());
        }
    }
}
