use std::{collections::BTreeMap, fmt};

use crate::common::opcode::Opcode;

/// A single stack machine instruction:
/// an opcode, the number of static links to follow,
/// and an operand whose meaning depends on the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub level: usize,
    pub operand: i64,
}

impl Instruction {
    pub fn new(op: Opcode, level: usize, operand: i64) -> Instruction {
        Instruction { op, level, operand }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}  {}", self.op, self.level, self.operand)
    }
}

/// Represents a complete compiled program.
/// The code is a flat array of instructions; execution
/// starts at index 0, which jumps to a synthesized call to
/// `main`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bytecode {
    pub code: Vec<Instruction>,
    /// String literals, referenced by index from `lit`.
    pub strings: Vec<String>,
    /// The entry address of every emitted function.
    pub functions: BTreeMap<String, usize>,
}

impl Bytecode {
    /// Creates a new empty `Bytecode` to be filled.
    pub fn empty() -> Bytecode {
        Default::default()
    }

    /// Emits an instruction, returning its index
    /// so that it can be back-patched later.
    pub fn emit(&mut self, op: Opcode, level: usize, operand: i64) -> usize {
        self.code.push(Instruction::new(op, level, operand));
        self.code.len() - 1
    }

    /// Overwrites the operand of a previously emitted
    /// instruction.
    pub fn patch(&mut self, index: usize, operand: i64) {
        self.code[index].operand = operand;
    }

    /// The index the next emitted instruction will have.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Adds a string to the string pool and returns its
    /// index. Equal strings share one entry.
    pub fn index_string(&mut self, string: &str) -> usize {
        match self.strings.iter().position(|s| s == string) {
            Some(index) => index,
            None => {
                self.strings.push(string.to_string());
                self.strings.len() - 1
            },
        }
    }

    /// The entry address of a function, if it was emitted.
    pub fn entry(&self, name: &str) -> Option<usize> {
        self.functions.get(name).copied()
    }
}

impl fmt::Display for Bytecode {
    /// Dump some bytecode for inspection,
    /// one instruction per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, instruction) in self.code.iter().enumerate() {
            writeln!(f, "{}  {}", index, instruction)?;
        }
        Ok(())
    }
}
