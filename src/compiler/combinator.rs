//! A small parser combinator engine.
//!
//! A parser is any function from a `Cursor` to either no
//! match (`None`) or a value paired with the remaining
//! input. Combinators are plain functions that take
//! parsers and return new ones; nothing here keeps state
//! between calls, so any parser can be retried on the same
//! cursor, which is what alternation relies on.
//!
//! There is no memoization. Grammars built on this engine
//! should keep their alternatives cheap to reject.

use std::rc::Rc;

use crate::common::{source::Source, span::Span};

/// An immutable position in a source.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    source: &'a Rc<Source>,
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a Rc<Source>) -> Cursor<'a> {
        Cursor { source, offset: 0 }
    }

    pub fn source(&self) -> &'a Rc<Source> {
        self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// All text after the cursor.
    pub fn rest(&self) -> &'a str {
        &self.source.contents[self.offset..]
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.source.contents.len()
    }

    pub fn advance(self, bytes: usize) -> Cursor<'a> {
        Cursor {
            source: self.source,
            offset: self.offset + bytes,
        }
    }

    /// Moves past spaces, tabs, and newlines.
    pub fn skip_whitespace(self) -> Cursor<'a> {
        let rest = self.rest();
        let stripped = rest.trim_start_matches(is_whitespace);
        self.advance(rest.len() - stripped.len())
    }

    /// Whether the whitespace directly after the cursor
    /// contains a line break.
    pub fn newline_ahead(&self) -> bool {
        self.rest()
            .chars()
            .take_while(|c| is_whitespace(*c))
            .any(|c| c == '\n')
    }

    /// The span between this cursor and a later one.
    pub fn span_to(&self, end: Cursor<'a>) -> Span {
        Span::new(self.source, self.offset, end.offset - self.offset)
    }

    /// A zero-length span at the cursor.
    pub fn point(&self) -> Span {
        Span::point(self.source, self.offset)
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// The result of running a parser.
pub type Reply<'a, T> = Option<(T, Cursor<'a>)>;

/// Anything that can be run on a cursor is a parser.
pub trait Parser<'a, T>: Fn(Cursor<'a>) -> Reply<'a, T> {}

impl<'a, T, F> Parser<'a, T> for F where F: Fn(Cursor<'a>) -> Reply<'a, T> {}

/// Tries each parser in order on the same input,
/// yielding the first match.
macro_rules! choice {
    ($p:expr $(,)?) => { $p };
    ($p:expr, $($rest:expr),+ $(,)?) => {
        $crate::compiler::combinator::alt(
            $p,
            $crate::compiler::combinator::choice!($($rest),+),
        )
    };
}

pub(crate) use choice;

/// Always succeeds without consuming input.
pub fn unit<'a, T: Clone>(value: T) -> impl Parser<'a, T> {
    move |input: Cursor<'a>| Some((value.clone(), input))
}

/// Runs `p`, then the parser `f` builds from its value.
/// If `p` fails, `f` is never called.
pub fn bind<'a, T, U, P, Q, F>(p: P, f: F) -> impl Parser<'a, U>
where
    P: Parser<'a, T>,
    Q: Parser<'a, U>,
    F: Fn(T) -> Q,
{
    move |input: Cursor<'a>| {
        let (value, rest) = p(input)?;
        f(value)(rest)
    }
}

pub fn map<'a, T, U, P, F>(p: P, f: F) -> impl Parser<'a, U>
where
    P: Parser<'a, T>,
    F: Fn(T) -> U,
{
    move |input: Cursor<'a>| p(input).map(|(value, rest)| (f(value), rest))
}

/// Tries `p`, then `q` on the original input.
pub fn alt<'a, T, P, Q>(p: P, q: Q) -> impl Parser<'a, T>
where
    P: Parser<'a, T>,
    Q: Parser<'a, T>,
{
    move |input: Cursor<'a>| p(input).or_else(|| q(input))
}

fn repeat<'a, T, A, P, F>(
    p: &P,
    init: A,
    fold: &F,
    input: Cursor<'a>,
) -> (A, usize, Cursor<'a>)
where
    P: Parser<'a, T>,
    F: Fn(A, T) -> A,
{
    let mut acc = init;
    let mut count = 0;
    let mut input = input;

    while let Some((value, rest)) = p(input) {
        acc = fold(acc, value);
        count += 1;

        // a match that consumes nothing would match forever
        let stalled = rest.offset() == input.offset();
        input = rest;
        if stalled {
            break;
        }
    }

    (acc, count, input)
}

/// Applies `p` zero or more times, folding each value
/// into the accumulator.
pub fn many<'a, T, A, P, F>(p: P, init: A, fold: F) -> impl Parser<'a, A>
where
    A: Clone,
    P: Parser<'a, T>,
    F: Fn(A, T) -> A,
{
    move |input: Cursor<'a>| {
        let (acc, _, rest) = repeat(&p, init.clone(), &fold, input);
        Some((acc, rest))
    }
}

/// Like `many`, but `p` has to match at least once.
pub fn some<'a, T, A, P, F>(p: P, init: A, fold: F) -> impl Parser<'a, A>
where
    A: Clone,
    P: Parser<'a, T>,
    F: Fn(A, T) -> A,
{
    move |input: Cursor<'a>| {
        let (acc, count, rest) = repeat(&p, init.clone(), &fold, input);
        (count > 0).then(|| (acc, rest))
    }
}

/// Collects zero or more matches into a `Vec`.
pub fn list<'a, T, P>(p: P) -> impl Parser<'a, Vec<T>>
where
    T: Clone,
    P: Parser<'a, T>,
{
    many(p, vec![], |mut items, item| {
        items.push(item);
        items
    })
}

/// Concatenates one or more matched characters.
pub fn chars<'a, P>(p: P) -> impl Parser<'a, String>
where
    P: Parser<'a, char>,
{
    some(p, String::new(), |mut string, c| {
        string.push(c);
        string
    })
}

/// Optionally applies `p`. Never fails.
pub fn maybe<'a, T, P>(p: P) -> impl Parser<'a, Option<T>>
where
    P: Parser<'a, T>,
{
    move |input: Cursor<'a>| match p(input) {
        Some((value, rest)) => Some((Some(value), rest)),
        None => Some((None, input)),
    }
}

/// Runs `p` then `q`, keeping both values.
pub fn pair<'a, T, U, P, Q>(p: P, q: Q) -> impl Parser<'a, (T, U)>
where
    P: Parser<'a, T>,
    Q: Parser<'a, U>,
{
    move |input: Cursor<'a>| {
        let (first, rest) = p(input)?;
        let (second, rest) = q(rest)?;
        Some(((first, second), rest))
    }
}

/// Runs `p` then `q`, keeping the value of `p`.
pub fn left<'a, T, U, P, Q>(p: P, q: Q) -> impl Parser<'a, T>
where
    P: Parser<'a, T>,
    Q: Parser<'a, U>,
{
    map(pair(p, q), |(first, _)| first)
}

/// Runs `p` then `q`, keeping the value of `q`.
pub fn right<'a, T, U, P, Q>(p: P, q: Q) -> impl Parser<'a, U>
where
    P: Parser<'a, T>,
    Q: Parser<'a, U>,
{
    map(pair(p, q), |(_, second)| second)
}

/// Fails if the value of `p` does not satisfy `pred`.
pub fn verify<'a, T, P, F>(p: P, pred: F) -> impl Parser<'a, T>
where
    P: Parser<'a, T>,
    F: Fn(&T) -> bool,
{
    move |input: Cursor<'a>| p(input).filter(|(value, _)| pred(value))
}

/// Skips leading whitespace before running `p`.
pub fn token<'a, T, P>(p: P) -> impl Parser<'a, T>
where
    P: Parser<'a, T>,
{
    move |input: Cursor<'a>| p(input.skip_whitespace())
}

/// Matches a single character satisfying `pred`.
pub fn satisfy<'a, F>(pred: F) -> impl Parser<'a, char>
where
    F: Fn(char) -> bool,
{
    move |input: Cursor<'a>| {
        let c = input.rest().chars().next()?;
        pred(c).then(|| (c, input.advance(c.len_utf8())))
    }
}

/// Matches a literal string.
pub fn literal<'a>(expected: &'static str) -> impl Parser<'a, &'static str> {
    move |input: Cursor<'a>| {
        input
            .rest()
            .starts_with(expected)
            .then(|| (expected, input.advance(expected.len())))
    }
}

/// Pairs the value of `p` with the span it consumed.
pub fn spanned<'a, T, P>(p: P) -> impl Parser<'a, (T, Span)>
where
    P: Parser<'a, T>,
{
    move |input: Cursor<'a>| {
        let (value, rest) = p(input)?;
        Some(((value, input.span_to(rest)), rest))
    }
}

/// Parses an operand followed by any number of
/// (operator, operand) pairs, folding them to the left:
/// `a - b - c` becomes `fold(fold(a, (-, b)), (-, c))`.
pub fn chain_left<'a, T, O, P, Q, F>(
    operand: P,
    operator: Q,
    fold: F,
) -> impl Parser<'a, T>
where
    T: Clone,
    P: Parser<'a, T> + Copy,
    Q: Parser<'a, O> + Copy,
    F: Fn(T, (O, T)) -> T + Copy,
{
    bind(operand, move |first: T| {
        many(pair(operator, operand), first, fold)
    })
}
