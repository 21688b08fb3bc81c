use std::fmt;

/// Built-in Xi types.
/// Every AST node carries one of these, starting out as
/// `Unknown` until the type assignment pass visits it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Type {
    // Atomic
    I64,
    Real,
    Str,
    Bool,

    /// The `...` marker in a declared parameter list.
    /// Only survives until the declaration is registered.
    Vararg,

    // Compound
    Array(Box<Type>),
    Function {
        ret: Box<Type>,
        params: Vec<Type>,
        vararg: bool,
    },
    /// A named record with ordered members.
    /// The parser produces records without members for
    /// any named type; those are resolved by name later.
    Record {
        name: String,
        members: Vec<(String, Type)>,
    },
    /// The outcome types collected from statements.
    List(Vec<Type>),

    #[default]
    Unknown,
}

impl Type {
    /// Shortcut for creating a `Type::Function` variant.
    pub fn function(ret: Type, params: Vec<Type>, vararg: bool) -> Type {
        Type::Function {
            ret: Box::new(ret),
            params,
            vararg,
        }
    }

    /// Shortcut for a reference to a named type,
    /// resolved against the symbol table later.
    pub fn named(name: &str) -> Type {
        Type::Record {
            name: name.to_string(),
            members: vec![],
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::I64 | Type::Real)
    }

    /// The number of stack cells a value of this type
    /// occupies. Records are laid out member by member.
    pub fn size(&self) -> usize {
        match self {
            Type::I64
            | Type::Real
            | Type::Str
            | Type::Bool
            | Type::Array(_)
            | Type::Function { .. } => 1,
            Type::Record { members, .. } => {
                members.iter().map(|(_, ty)| ty.size()).sum()
            },
            Type::Vararg | Type::List(_) | Type::Unknown => 0,
        }
    }

    /// Looks up a record member, returning its ordinal
    /// index and type.
    pub fn member(&self, name: &str) -> Option<(usize, &Type)> {
        match self {
            Type::Record { members, .. } => members
                .iter()
                .enumerate()
                .find(|(_, (member, _))| member == name)
                .map(|(index, (_, ty))| (index, ty)),
            _ => None,
        }
    }

    /// The cell offset of the member with ordinal `index`
    /// within a record value.
    pub fn member_offset(&self, index: usize) -> Option<usize> {
        match self {
            Type::Record { members, .. } if index < members.len() => Some(
                members[..index].iter().map(|(_, ty)| ty.size()).sum(),
            ),
            _ => None,
        }
    }

    /// The outcome types a statement of this type
    /// contributes to its enclosing block.
    pub fn outcomes(&self) -> &[Type] {
        match self {
            Type::List(types) => types,
            _ => &[],
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I64 => write!(f, "i64"),
            Type::Real => write!(f, "real"),
            Type::Str => write!(f, "string"),
            Type::Bool => write!(f, "bool"),
            Type::Vararg => write!(f, "..."),
            Type::Array(inner) => write!(f, "[{}]", inner),
            Type::Function {
                ret,
                params,
                vararg,
            } => {
                write!(f, "(")?;
                for param in params {
                    write!(f, "{} ", param)?;
                }
                if *vararg {
                    write!(f, "... ")?;
                }
                write!(f, "-> {})", ret)
            },
            Type::Record { name, .. } => write!(f, "{}", name),
            Type::List(types) => {
                let names: Vec<String> =
                    types.iter().map(|t| t.to_string()).collect();
                write!(f, "{{{}}}", names.join(", "))
            },
            Type::Unknown => write!(f, "unknown"),
        }
    }
}
