use std::collections::HashMap;

use crate::common::{span::Span, ty::Type};

/// What a symbol names. A record registers both a `Type`
/// and a `Function` (its constructor) under the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Function,
    Type,
}

/// Global symbols, keyed by name and kind.
/// Entries are never overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    entries: HashMap<(String, Kind), Type>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        Default::default()
    }

    /// Registers a symbol. Returns `false`, leaving the table
    /// untouched, if the name is already taken for `kind`.
    pub fn register(&mut self, name: &str, kind: Kind, ty: Type) -> bool {
        let key = (name.to_string(), kind);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, ty);
        true
    }

    pub fn get(&self, name: &str, kind: Kind) -> Option<&Type> {
        self.entries.get(&(name.to_string(), kind))
    }

    /// The number of registered symbols of a kind.
    pub fn count(&self, kind: Kind) -> usize {
        self.entries.keys().filter(|(_, k)| *k == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}

/// State shared between the passes of one compilation.
/// `check` fills it in; `gen` only reads it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub symbols: SymbolTable,
    /// Functions that have a definition, with the span of
    /// the defining statement.
    pub definitions: HashMap<String, Span>,
    /// The declared return type of the function whose body
    /// is being checked, if any.
    pub current: Option<Type>,
}

impl Context {
    pub fn new() -> Context {
        Default::default()
    }

    /// Clears everything, so the context can be reused
    /// for another program.
    pub fn reset(&mut self) {
        self.symbols.clear();
        self.definitions.clear();
        self.current = None;
    }

    /// The type of a declared function or record constructor.
    pub fn function(&self, name: &str) -> Option<&Type> {
        self.symbols.get(name, Kind::Function)
    }

    /// The full definition of a named record type.
    pub fn record(&self, name: &str) -> Option<&Type> {
        self.symbols.get(name, Kind::Type)
    }

    /// Whether `name` is a record constructor rather than a
    /// user function.
    pub fn is_constructor(&self, name: &str) -> bool {
        self.record(name).is_some()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }
}
