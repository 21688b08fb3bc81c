use std::fmt;

/// This enum represents a single opcode of the stack
/// machine. Each instruction pairs an opcode with a level
/// delta and an operand, see `common::bytecode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Push the operand as a constant.
    Lit,
    /// Apply the operator selected by the operand
    /// to the top one or two cells.
    Opr,
    /// Push a copy of the variable at (level, offset).
    Lod,
    /// Pop the top cell into the variable at (level, offset).
    Sto,
    /// Reserve (or, when negative, release) operand cells.
    Ini,
    /// Push a frame header for a call that follows.
    Cap,
    /// Call the function whose entry is the operand.
    Cal,
    /// Return the top operand cells to the caller.
    Ret,
    /// Jump to the operand.
    Jmp,
    /// Pop the top cell, jump to the operand if it is zero.
    Jpc,
}

impl Opcode {
    /// The mnemonic used in bytecode dumps.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Lit => "lit",
            Opcode::Opr => "opr",
            Opcode::Lod => "lod",
            Opcode::Sto => "sto",
            Opcode::Ini => "ini",
            Opcode::Cap => "cap",
            Opcode::Cal => "cal",
            Opcode::Ret => "ret",
            Opcode::Jmp => "jmp",
            Opcode::Jpc => "jpc",
        }
    }

    /// Whether the operand of this opcode is a code address.
    pub fn is_jump(&self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jpc | Opcode::Cal)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The operator table consulted by `opr`.
/// The discriminant is the operand emitted in bytecode.
/// Real operators reinterpret cells as IEEE-754 bits.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Operator {
    Neg = 0,
    Add = 1,
    Sub = 2,
    Mul = 3,
    Div = 4,
    Mod = 5,
    Eq = 6,
    Ne = 7,
    Lt = 8,
    Gt = 9,
    Not = 10,
    And = 11,
    Or = 12,
    FNeg = 13,
    FAdd = 14,
    FSub = 15,
    FMul = 16,
    FDiv = 17,
    FEq = 18,
    FNe = 19,
    FLt = 20,
    FGt = 21,
}

impl Operator {
    const TABLE: [Operator; 22] = [
        Operator::Neg,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Mod,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Gt,
        Operator::Not,
        Operator::And,
        Operator::Or,
        Operator::FNeg,
        Operator::FAdd,
        Operator::FSub,
        Operator::FMul,
        Operator::FDiv,
        Operator::FEq,
        Operator::FNe,
        Operator::FLt,
        Operator::FGt,
    ];

    /// Decodes an `opr` operand.
    /// Returns `None` for operands outside the table.
    pub fn from_operand(operand: i64) -> Option<Operator> {
        usize::try_from(operand)
            .ok()
            .and_then(|index| Operator::TABLE.get(index))
            .copied()
    }

    /// The number of cells the operator consumes.
    /// Every operator pushes exactly one cell.
    pub fn arity(&self) -> usize {
        match self {
            Operator::Neg | Operator::Not | Operator::FNeg => 1,
            _ => 2,
        }
    }
}

/// Reinterprets a stack cell as a real.
pub fn real(cell: i64) -> f64 {
    f64::from_bits(cell as u64)
}

/// Packs a real into a stack cell.
pub fn cell(real: f64) -> i64 {
    real.to_bits() as i64
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn decodes_own_operand(op: Operator) {
            prop_assert_eq!(Operator::from_operand(op as i64), Some(op));
        }
    }

    #[test]
    fn out_of_table() {
        assert_eq!(Operator::from_operand(-1), None);
        assert_eq!(Operator::from_operand(Operator::FGt as i64 + 1), None);
    }

    #[test]
    fn real_cells() {
        assert_eq!(real(cell(-123.5)), -123.5);
        assert_eq!(real(cell(0.1)), 0.1);
    }
}
