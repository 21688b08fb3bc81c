use tracing::{debug, trace};

use crate::common::{
    bytecode::{Bytecode, Instruction},
    opcode::{cell, real, Opcode, Operator},
};

/// The default cell capacity of a `VM`.
pub const DEFAULT_STACK: usize = 65536;

/// What is left when a program halts:
/// the live stack cells, bottom first, and the number of
/// instructions executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitState {
    pub stack: Vec<i64>,
    pub steps: usize,
}

impl ExitState {
    /// The topmost cell, usually the last cell of `main`'s
    /// return value.
    pub fn top(&self) -> Option<i64> {
        self.stack.last().copied()
    }
}

/// A `VM` executes bytecode.
/// Each VM's state is self-contained,
/// So more than one can be spawned if needed.
///
/// Frames live on a single array of cells. Every frame
/// starts with a header of three cells: the static link,
/// the dynamic link, and the return address.
#[derive(Debug)]
pub struct VM {
    cells: Vec<i64>,
    /// The number of live cells.
    top: usize,
    /// Base of the current frame.
    b: usize,
    /// Base of the frame whose header was pushed by the
    /// latest `cap`, waiting for its `cal`.
    nb: usize,
    pc: usize,
    steps: usize,
}

impl VM {
    /// Initialize a new VM with the default capacity.
    /// To run the VM, bytecode must be passed to it through `run`.
    pub fn init() -> VM {
        VM::with_capacity(DEFAULT_STACK)
    }

    /// Initialize a new VM holding at most `capacity` cells.
    /// Running past the capacity panics.
    pub fn with_capacity(capacity: usize) -> VM {
        VM {
            cells: vec![0; capacity],
            top: 0,
            b: 0,
            nb: 0,
            pc: 0,
            steps: 0,
        }
    }

    fn reset(&mut self) {
        self.top = 0;
        self.b = 0;
        self.nb = 0;
        self.pc = 0;
        self.steps = 0;
    }

    fn push(&mut self, cell: i64) {
        self.cells[self.top] = cell;
        self.top += 1;
    }

    fn pop(&mut self) -> i64 {
        self.top -= 1;
        self.cells[self.top]
    }

    /// Follows `level` static links from the current frame.
    fn base(&self, level: usize) -> usize {
        let mut base = self.b;
        for _ in 0..level {
            base = self.cells[base] as usize;
        }
        base
    }

    fn exit_state(&self) -> ExitState {
        ExitState {
            stack: self.cells[..self.top].to_vec(),
            steps: self.steps,
        }
    }

    // core interpreter loop

    /// Runs a program from its first instruction until
    /// the synthesized call to `main` returns.
    pub fn run(&mut self, bytecode: &Bytecode) -> ExitState {
        self.reset();
        self.execute(bytecode)
    }

    /// Runs a single function with the given argument cells,
    /// bypassing `main`. Returns `None` if no function of
    /// that name was emitted.
    pub fn invoke(&mut self, bytecode: &Bytecode, name: &str, args: &[i64]) -> Option<ExitState> {
        let entry = bytecode.entry(name)?;
        self.reset();

        // a frame header that returns past the end of the code
        self.push(0);
        self.push(0);
        self.push(bytecode.code.len() as i64);
        for arg in args {
            self.push(*arg);
        }
        self.pc = entry;

        Some(self.execute(bytecode))
    }

    fn execute(&mut self, bytecode: &Bytecode) -> ExitState {
        while self.pc < bytecode.code.len() {
            let instruction = bytecode.code[self.pc];
            trace!(
                pc = self.pc,
                op = %instruction.op,
                top = self.top,
                base = self.b,
                "step"
            );
            self.step(instruction);
            self.steps += 1;
        }

        debug!(steps = self.steps, cells = self.top, "halted");
        self.exit_state()
    }

    /// Interprets a single instruction.
    /// `pc` advances by one unless the instruction
    /// transfers control.
    fn step(&mut self, instruction: Instruction) {
        let Instruction { op, level, operand } = instruction;

        match op {
            Opcode::Lit => self.push(operand),
            Opcode::Opr => self.opr(operand),
            Opcode::Lod => {
                let cell = self.cells[self.base(level) + operand as usize];
                self.push(cell);
            },
            Opcode::Sto => {
                let cell = self.pop();
                let index = self.base(level) + operand as usize;
                self.cells[index] = cell;
            },
            Opcode::Ini => self.ini(operand),
            Opcode::Cap => self.cap(level),
            Opcode::Cal => return self.cal(operand as usize),
            Opcode::Ret => return self.ret(operand as usize),
            Opcode::Jmp => {
                self.pc = operand as usize;
                return;
            },
            Opcode::Jpc => {
                if self.pop() == 0 {
                    self.pc = operand as usize;
                    return;
                }
            },
        }

        self.pc += 1;
    }

    /// Reserves cells, zeroing them, or drops cells when
    /// `amount` is negative.
    fn ini(&mut self, amount: i64) {
        let top = (self.top as i64 + amount) as usize;
        if top > self.top {
            self.cells[self.top..top].fill(0);
        }
        self.top = top;
    }

    fn cap(&mut self, level: usize) {
        let link = self.base(level);
        let (b, nb) = (self.b, self.nb);
        self.push(link as i64);
        self.push(b as i64);
        // parked in the return address cell until `cal`
        self.push(nb as i64);
        self.nb = self.top - 3;
    }

    fn cal(&mut self, entry: usize) {
        let callee = self.nb;
        self.nb = self.cells[callee + 2] as usize;
        self.cells[callee + 2] = (self.pc + 1) as i64;
        self.b = callee;
        self.pc = entry;
    }

    fn ret(&mut self, size: usize) {
        let base = self.b;
        let link = self.cells[base + 1] as usize;
        let address = self.cells[base + 2] as usize;

        self.cells.copy_within(self.top - size..self.top, base);
        self.top = base + size;
        self.b = link;
        self.pc = address;
    }

    fn opr(&mut self, operand: i64) {
        let operator = match Operator::from_operand(operand) {
            Some(operator) => operator,
            None => unreachable!("`opr {}` is never emitted", operand),
        };

        let right = self.pop();
        let left = if operator.arity() == 2 { self.pop() } else { 0 };
        self.push(apply(operator, left, right));
    }
}

impl Default for VM {
    fn default() -> VM {
        VM::init()
    }
}

/// Applies an operator to cells. Unary operators only
/// look at `right`. Integer arithmetic wraps, and integer
/// division by zero yields zero.
pub fn apply(operator: Operator, left: i64, right: i64) -> i64 {
    let (x, y) = (real(left), real(right));

    match operator {
        Operator::Neg => right.wrapping_neg(),
        Operator::Add => left.wrapping_add(right),
        Operator::Sub => left.wrapping_sub(right),
        Operator::Mul => left.wrapping_mul(right),
        Operator::Div if right == 0 => 0,
        Operator::Div => left.wrapping_div(right),
        Operator::Mod if right == 0 => 0,
        Operator::Mod => left.wrapping_rem(right),
        Operator::Eq => (left == right) as i64,
        Operator::Ne => (left != right) as i64,
        Operator::Lt => (left < right) as i64,
        Operator::Gt => (left > right) as i64,
        Operator::Not => (right == 0) as i64,
        Operator::And => (left != 0 && right != 0) as i64,
        Operator::Or => (left != 0 || right != 0) as i64,

        Operator::FNeg => cell(-y),
        Operator::FAdd => cell(x + y),
        Operator::FSub => cell(x - y),
        Operator::FMul => cell(x * y),
        Operator::FDiv => cell(x / y),
        Operator::FEq => (x == y) as i64,
        Operator::FNe => (x != y) as i64,
        Operator::FLt => (x < y) as i64,
        Operator::FGt => (x > y) as i64,
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::{common::source::Source, compiler::compile};

    fn run(source: &str) -> ExitState {
        let bytecode = compile(Source::source(source)).unwrap();
        VM::init().run(&bytecode)
    }

    #[test]
    fn call() {
        let source = "add : i64 i64 -> i64\nadd a b = a + b\nmain : -> i64\nmain = add(2 3)";
        let exit = run(source);
        assert_eq!(exit.stack, vec![5]);
        assert!(exit.steps > 0);
    }

    #[test]
    fn invoke() {
        let source = "add : i64 i64 -> i64\nadd a b = a - b\nmain : -> i64\nmain = 0";
        let bytecode = compile(Source::source(source)).unwrap();
        let mut vm = VM::init();

        let exit = vm.invoke(&bytecode, "add", &[2, 3]).unwrap();
        assert_eq!(exit.stack, vec![-1]);
        assert_eq!(vm.invoke(&bytecode, "sub", &[]), None);
    }

    #[test]
    fn nested_calls_as_arguments() {
        let source = "\
add : i64 i64 -> i64
add a b = a + b
main : -> i64
main = add(add(1 2) add(3 add(4 0)))
";
        assert_eq!(run(source).stack, vec![10]);
    }

    #[test]
    fn recursion() {
        let source = "\
fact : i64 -> i64
fact n = if n < 2 then 1 else n * fact(n - 1)
main : -> i64
main = fact(10)
";
        assert_eq!(run(source).stack, vec![3628800]);
    }

    #[test]
    fn loops() {
        let source = "\
main : -> i64
main = {
    let i = 0
    let sum = 0
    while i < 10 {
        i := i + 1
        sum := sum + i
    }
    return sum
}
";
        assert_eq!(run(source).stack, vec![55]);
    }

    #[test]
    fn records() {
        let header = "\
set pair = (a i64)(b i64)
swap : pair -> pair
swap p = pair(p.b p.a)
";
        let whole = format!("{}main : -> pair\nmain = swap(pair(1 2))", header);
        assert_eq!(run(&whole).stack, vec![2, 1]);

        let member = format!("{}main : -> i64\nmain = swap(pair(1 2)).a", header);
        assert_eq!(run(&member).stack, vec![2]);
    }

    #[test]
    fn nested_records() {
        let source = "\
set point = (x i64)(y i64)
set line = (from point)(to point)
main : -> i64
main = {
    let l = line(point(1 2) point(3 4))
    return l.to.x * 10 + l.from.y
}
";
        assert_eq!(run(source).stack, vec![32]);
    }

    #[test]
    fn reals_and_booleans() {
        let exit = run("main : -> real\nmain = 1.5 * 2.0 + 0.25");
        assert_eq!(real(exit.stack[0]), 3.25);

        let exit = run("main : -> bool\nmain = 1 < 2 && !(2.0 < 1.0)");
        assert_eq!(exit.stack, vec![1]);
    }

    #[test]
    fn static_scoping() {
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
}
main : -> i64
main = outer(100)
";
        assert_eq!(run(source).stack, vec![111]);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(run("main : -> i64\nmain = 7 / 0").stack, vec![0]);
        assert_eq!(run("main : -> i64\nmain = 7 % 0").stack, vec![0]);
    }

    #[test]
    #[should_panic]
    fn overflow_panics() {
        let source = "loop : i64 -> i64\nloop n = loop(n)\nmain : -> i64\nmain = loop(0)";
        let bytecode = compile(Source::source(source)).unwrap();
        VM::with_capacity(64).run(&bytecode);
    }

    proptest! {
        #[test]
        fn wrapping_arithmetic(
            a in -1_000_000_000_000i64..1_000_000_000_000,
            b in -1_000_000_000_000i64..1_000_000_000_000,
        ) {
            let source = format!(
                "main : -> i64\nmain = {{ let a = {} let b = {} return a * b + a - b }}",
                a, b,
            );
            let expected = a.wrapping_mul(b).wrapping_add(a).wrapping_sub(b);
            prop_assert_eq!(run(&source).stack, vec![expected]);
        }

        #[test]
        fn operators_push_one_cell(operator: Operator, a: i64, b: i64) {
            let mut bytecode = Bytecode::empty();
            bytecode.emit(Opcode::Lit, 0, a);
            bytecode.emit(Opcode::Lit, 0, b);
            bytecode.emit(Opcode::Opr, 0, operator as i64);

            let exit = VM::with_capacity(8).run(&bytecode);
            prop_assert_eq!(exit.stack.len(), 3 - operator.arity());
            prop_assert_eq!(exit.steps, 3);
        }
    }
}
