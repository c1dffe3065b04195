//! Stack-based execution engine
//!
//! Executes one instruction per [`Machine::step`] call over a bounded
//! operand stack. The engine never loops internally and never aborts:
//! every failure is returned as a typed [`ExecError`] and the machine
//! state is left untouched, so continuation is entirely driver policy.

use crate::bytecode::{CapacityError, Inst, Opcode, Program};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Maximum operand stack depth.
pub const STACK_CAPACITY: usize = 1024;

/// Observation channel for `print_dbg` output.
pub type OutputWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// An [`OutputWriter`] backed by stdout (the default channel).
pub fn stdout_writer() -> OutputWriter {
    Arc::new(Mutex::new(Box::new(io::stdout())))
}

/// Execution errors, returned as values from [`Machine::step`].
///
/// None of these is fatal to the engine itself; a failed step applies no
/// state mutation. Unknown opcode tags are caught earlier, when records
/// are decoded (see [`crate::bytecode::LoadError::UnknownOpcode`]): a
/// loaded program cannot hold an invalid tag.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Push attempted at full stack depth
    #[error("Stack overflow")]
    StackOverflow,
    /// Too few operands on the stack
    #[error("Stack underflow")]
    StackUnderflow,
    /// Divisor at top of stack is zero
    #[error("Division by zero")]
    DivisionByZero,
    /// Program counter outside the program
    #[error("Program counter {pc} out of bounds (program size {program_size})")]
    PcOutOfBounds { pc: i64, program_size: usize },
    /// Negative index operand to `dup`
    #[error("Illegal operand {operand}")]
    IllegalOperand { operand: i64 },
}

/// Machine state: program, program counter, operand stack, halt flag.
///
/// An explicitly constructed value owned by the caller; independent
/// machines do not share anything. The program counter is signed so a
/// wild `jmp` lands on a representable (and fetch-rejected) state
/// instead of wrapping.
pub struct Machine {
    program: Program,
    pc: i64,
    stack: Vec<i64>,
    halted: bool,
    output_writer: OutputWriter,
}

impl Machine {
    /// Create a machine with an empty program and stack.
    pub fn new() -> Self {
        Self {
            program: Program::new(),
            pc: 0,
            stack: Vec::with_capacity(STACK_CAPACITY),
            halted: false,
            output_writer: stdout_writer(),
        }
    }

    /// Set the observation channel for `print_dbg` (defaults to stdout).
    pub fn set_output_writer(&mut self, writer: OutputWriter) {
        self.output_writer = writer;
    }

    /// Load a program, fully resetting the machine.
    ///
    /// The previous program is replaced wholesale, the program counter
    /// returns to 0, the stack is cleared, and the halt flag is cleared.
    pub fn load(&mut self, program: Program) {
        self.program = program;
        self.pc = 0;
        self.stack.clear();
        self.halted = false;
    }

    /// Append an instruction to the loaded program.
    ///
    /// Intended for embedding callers and tests that build programs in
    /// memory rather than assembling them.
    pub fn push_inst(&mut self, inst: Inst) -> Result<(), CapacityError> {
        self.program.push(inst)
    }

    /// Current program counter.
    pub fn pc(&self) -> i64 {
        self.pc
    }

    /// Current operand stack, bottom first.
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    /// Current operand stack depth.
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Whether the halt flag is set.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Render the stack contents to `out`, bottom first.
    pub fn dump_stack(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Stack:")?;
        if self.stack.is_empty() {
            writeln!(out, " [empty]")?;
            return Ok(());
        }
        for value in &self.stack {
            writeln!(out, "{}", value)?;
        }
        Ok(())
    }

    /// Execute exactly one instruction.
    ///
    /// Stepping a halted machine is a no-op returning `Ok`. The program
    /// counter is bounds-checked strictly before decoding. Underflow and
    /// overflow are checked before any opcode-specific precondition, so
    /// `div` never inspects a divisor on an unpopulated stack.
    pub fn step(&mut self) -> Result<(), ExecError> {
        if self.halted {
            return Ok(());
        }

        let inst = self.fetch()?;

        match inst.op {
            Opcode::Nop => {
                self.pc += 1;
            }
            Opcode::Push => {
                if self.stack.len() >= STACK_CAPACITY {
                    return Err(ExecError::StackOverflow);
                }
                self.stack.push(inst.operand);
                self.pc += 1;
            }
            Opcode::Add => {
                if self.stack.len() < 2 {
                    return Err(ExecError::StackUnderflow);
                }
                // Capacity check kept for symmetry with push-like ops
                if self.stack.len() >= STACK_CAPACITY {
                    return Err(ExecError::StackOverflow);
                }
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_add(b));
                self.pc += 1;
            }
            Opcode::Sub => {
                if self.stack.len() < 2 {
                    return Err(ExecError::StackUnderflow);
                }
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_sub(b));
                self.pc += 1;
            }
            Opcode::Mul => {
                if self.stack.len() < 2 {
                    return Err(ExecError::StackUnderflow);
                }
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_mul(b));
                self.pc += 1;
            }
            Opcode::Div => {
                // Depth before divisor: never inspect unpopulated slots
                if self.stack.len() < 2 {
                    return Err(ExecError::StackUnderflow);
                }
                if self.stack[self.stack.len() - 1] == 0 {
                    return Err(ExecError::DivisionByZero);
                }
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_div(b));
                self.pc += 1;
            }
            Opcode::Jmp => {
                self.pc = inst.operand;
            }
            Opcode::JmpIf => {
                if self.stack.is_empty() {
                    return Err(ExecError::StackUnderflow);
                }
                let v = self.pop()?;
                if v != 0 {
                    self.pc = inst.operand;
                } else {
                    self.pc += 1;
                }
            }
            Opcode::Eq => {
                if self.stack.len() < 2 {
                    return Err(ExecError::StackUnderflow);
                }
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push((a == b) as i64);
                self.pc += 1;
            }
            Opcode::Dup => {
                if self.stack.len() >= STACK_CAPACITY {
                    return Err(ExecError::StackOverflow);
                }
                // Signed comparison: a negative operand passes depth and
                // is rejected as illegal below
                if self.stack.len() as i64 <= inst.operand {
                    return Err(ExecError::StackUnderflow);
                }
                if inst.operand < 0 {
                    return Err(ExecError::IllegalOperand {
                        operand: inst.operand,
                    });
                }
                let value = self.stack[self.stack.len() - 1 - inst.operand as usize];
                self.stack.push(value);
                self.pc += 1;
            }
            Opcode::Halt => {
                self.halted = true;
            }
            Opcode::PrintDbg => {
                if self.stack.is_empty() {
                    return Err(ExecError::StackUnderflow);
                }
                let v = self.pop()?;
                if let Ok(mut out) = self.output_writer.lock() {
                    let _ = write!(out, "{}", v);
                    let _ = out.flush();
                }
                self.pc += 1;
            }
        }

        Ok(())
    }

    /// Fetch the instruction under the program counter.
    fn fetch(&self) -> Result<Inst, ExecError> {
        usize::try_from(self.pc)
            .ok()
            .and_then(|index| self.program.get(index))
            .ok_or(ExecError::PcOutOfBounds {
                pc: self.pc,
                program_size: self.program.len(),
            })
    }

    fn pop(&mut self) -> Result<i64, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct CaptureWriter {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_output() -> (Arc<Mutex<Vec<u8>>>, OutputWriter) {
        let buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let writer: OutputWriter = Arc::new(Mutex::new(Box::new(CaptureWriter {
            buf: buf.clone(),
        })));
        (buf, writer)
    }

    /// Machine with `stack` as initial contents and `inst` as its single
    /// instruction.
    fn machine_with(stack: &[i64], inst: Inst) -> Machine {
        let mut m = Machine::new();
        m.push_inst(inst).unwrap();
        for &v in stack {
            m.stack.push(v);
        }
        m
    }

    #[rstest]
    #[case::add(Opcode::Add, &[2, 3], &[5])]
    #[case::sub(Opcode::Sub, &[10, 4], &[6])]
    #[case::mul(Opcode::Mul, &[4, 2], &[8])]
    #[case::div(Opcode::Div, &[9, 2], &[4])]
    #[case::eq_true(Opcode::Eq, &[7, 7], &[1])]
    #[case::eq_false(Opcode::Eq, &[7, 8], &[0])]
    fn test_binary_ops(#[case] op: Opcode, #[case] before: &[i64], #[case] after: &[i64]) {
        let mut m = machine_with(before, Inst::plain(op));
        m.step().unwrap();
        assert_eq!(m.stack(), after);
        assert_eq!(m.pc(), 1);
    }

    #[rstest]
    #[case::add(Opcode::Add)]
    #[case::sub(Opcode::Sub)]
    #[case::mul(Opcode::Mul)]
    #[case::div(Opcode::Div)]
    #[case::eq(Opcode::Eq)]
    fn test_binary_ops_underflow_on_single_operand(#[case] op: Opcode) {
        let mut m = machine_with(&[1], Inst::plain(op));
        assert_eq!(m.step(), Err(ExecError::StackUnderflow));
        assert_eq!(m.stack(), &[1]);
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn test_nop_only_advances_pc() {
        let mut m = machine_with(&[42], Inst::plain(Opcode::Nop));
        m.step().unwrap();
        assert_eq!(m.stack(), &[42]);
        assert_eq!(m.pc(), 1);
    }

    #[test]
    fn test_push() {
        let mut m = machine_with(&[], Inst::new(Opcode::Push, -7));
        m.step().unwrap();
        assert_eq!(m.stack(), &[-7]);
    }

    #[test]
    fn test_push_overflow_at_capacity() {
        let mut m = machine_with(&[], Inst::new(Opcode::Push, 1));
        m.stack = vec![0; STACK_CAPACITY];
        assert_eq!(m.step(), Err(ExecError::StackOverflow));
        assert_eq!(m.stack_size(), STACK_CAPACITY);
    }

    #[test]
    fn test_add_capacity_symmetry_check() {
        // A full stack fails add with overflow even though the op shrinks
        // the stack; underflow is still checked first.
        let mut m = machine_with(&[], Inst::plain(Opcode::Add));
        m.stack = vec![1; STACK_CAPACITY];
        assert_eq!(m.step(), Err(ExecError::StackOverflow));
    }

    #[test]
    fn test_div_rounds_toward_zero() {
        let mut m = machine_with(&[-7, 2], Inst::plain(Opcode::Div));
        m.step().unwrap();
        assert_eq!(m.stack(), &[-3]);
    }

    #[test]
    fn test_div_by_zero() {
        let mut m = machine_with(&[5, 0], Inst::plain(Opcode::Div));
        assert_eq!(m.step(), Err(ExecError::DivisionByZero));
        assert_eq!(m.stack(), &[5, 0]);
    }

    #[test]
    fn test_div_underflow_checked_before_divisor() {
        // Lone zero on the stack: depth must fail before the divisor is
        // ever inspected.
        let mut m = machine_with(&[0], Inst::plain(Opcode::Div));
        assert_eq!(m.step(), Err(ExecError::StackUnderflow));
    }

    #[test]
    fn test_div_min_by_minus_one_wraps() {
        let mut m = machine_with(&[i64::MIN, -1], Inst::plain(Opcode::Div));
        m.step().unwrap();
        assert_eq!(m.stack(), &[i64::MIN]);
    }

    #[test]
    fn test_add_wraps() {
        let mut m = machine_with(&[i64::MAX, 1], Inst::plain(Opcode::Add));
        m.step().unwrap();
        assert_eq!(m.stack(), &[i64::MIN]);
    }

    #[test]
    fn test_jmp_sets_pc() {
        let mut m = Machine::new();
        m.push_inst(Inst::new(Opcode::Jmp, 5)).unwrap();
        m.step().unwrap();
        assert_eq!(m.pc(), 5);
    }

    #[test]
    fn test_jmp_if_taken_pops_condition() {
        let mut m = machine_with(&[1], Inst::new(Opcode::JmpIf, 7));
        m.step().unwrap();
        assert_eq!(m.pc(), 7);
        assert_eq!(m.stack(), &[] as &[i64]);
    }

    #[test]
    fn test_jmp_if_not_taken_still_pops() {
        let mut m = machine_with(&[0], Inst::new(Opcode::JmpIf, 7));
        m.step().unwrap();
        assert_eq!(m.pc(), 1);
        assert_eq!(m.stack(), &[] as &[i64]);
    }

    #[test]
    fn test_jmp_if_underflow_on_empty_stack() {
        let mut m = machine_with(&[], Inst::new(Opcode::JmpIf, 7));
        assert_eq!(m.step(), Err(ExecError::StackUnderflow));
    }

    #[test]
    fn test_dup_top() {
        let mut m = machine_with(&[9], Inst::new(Opcode::Dup, 0));
        m.step().unwrap();
        assert_eq!(m.stack(), &[9, 9]);
    }

    #[test]
    fn test_dup_deeper_element() {
        let mut m = machine_with(&[10, 20, 30], Inst::new(Opcode::Dup, 2));
        m.step().unwrap();
        assert_eq!(m.stack(), &[10, 20, 30, 10]);
    }

    #[test]
    fn test_dup_negative_operand_is_illegal() {
        let mut m = machine_with(&[1], Inst::new(Opcode::Dup, -1));
        assert_eq!(m.step(), Err(ExecError::IllegalOperand { operand: -1 }));
    }

    #[test]
    fn test_dup_beyond_depth_underflows() {
        let mut m = machine_with(&[1, 2], Inst::new(Opcode::Dup, 2));
        assert_eq!(m.step(), Err(ExecError::StackUnderflow));
    }

    #[test]
    fn test_dup_overflow_at_capacity() {
        let mut m = machine_with(&[], Inst::new(Opcode::Dup, 0));
        m.stack = vec![0; STACK_CAPACITY];
        assert_eq!(m.step(), Err(ExecError::StackOverflow));
    }

    #[test]
    fn test_halt_leaves_pc_unchanged() {
        let mut m = machine_with(&[], Inst::plain(Opcode::Halt));
        m.step().unwrap();
        assert!(m.is_halted());
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn test_step_after_halt_is_noop() {
        let mut m = machine_with(&[3], Inst::plain(Opcode::Halt));
        m.step().unwrap();
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.pc(), 0);
        assert_eq!(m.stack(), &[3]);
    }

    #[test]
    fn test_print_dbg_emits_and_pops() {
        let (buf, writer) = capture_output();
        let mut m = machine_with(&[1, 42], Inst::plain(Opcode::PrintDbg));
        m.set_output_writer(writer);
        m.step().unwrap();
        assert_eq!(m.stack(), &[1]);
        assert_eq!(String::from_utf8(buf.lock().unwrap().clone()).unwrap(), "42");
    }

    #[test]
    fn test_print_dbg_underflow() {
        let mut m = machine_with(&[], Inst::plain(Opcode::PrintDbg));
        assert_eq!(m.step(), Err(ExecError::StackUnderflow));
    }

    #[test]
    fn test_pc_out_of_bounds_on_empty_program() {
        let mut m = Machine::new();
        assert_eq!(
            m.step(),
            Err(ExecError::PcOutOfBounds {
                pc: 0,
                program_size: 0,
            })
        );
    }

    #[test]
    fn test_pc_one_past_the_end_is_out_of_bounds() {
        let mut m = Machine::new();
        m.push_inst(Inst::plain(Opcode::Nop)).unwrap();
        m.step().unwrap();
        assert_eq!(
            m.step(),
            Err(ExecError::PcOutOfBounds {
                pc: 1,
                program_size: 1,
            })
        );
    }

    #[test]
    fn test_negative_pc_after_wild_jmp() {
        let mut m = Machine::new();
        m.push_inst(Inst::new(Opcode::Jmp, -3)).unwrap();
        m.step().unwrap();
        assert_eq!(
            m.step(),
            Err(ExecError::PcOutOfBounds {
                pc: -3,
                program_size: 1,
            })
        );
    }

    #[test]
    fn test_load_resets_everything() {
        let mut m = machine_with(&[1, 2], Inst::plain(Opcode::Halt));
        m.step().unwrap();

        let mut program = Program::new();
        program.push(Inst::new(Opcode::Push, 5)).unwrap();
        m.load(program);

        assert_eq!(m.pc(), 0);
        assert_eq!(m.stack(), &[] as &[i64]);
        assert!(!m.is_halted());
        m.step().unwrap();
        assert_eq!(m.stack(), &[5]);
    }

    #[test]
    fn test_dump_stack_format() {
        let m = machine_with(&[5, -2], Inst::plain(Opcode::Nop));
        let mut out = Vec::new();
        m.dump_stack(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Stack:\n5\n-2\n");
    }

    #[test]
    fn test_dump_stack_empty() {
        let m = Machine::new();
        let mut out = Vec::new();
        m.dump_stack(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Stack:\n [empty]\n");
    }

    #[test]
    fn test_countdown_loop() {
        // push 3; jmp_if would consume the counter, so duplicate it first:
        //   0: push 3
        //   1: dup 0
        //   2: jmp_if 4
        //   3: halt
        //   4: push 1
        //   5: sub
        //   6: jmp 1
        let mut m = Machine::new();
        for inst in [
            Inst::new(Opcode::Push, 3),
            Inst::new(Opcode::Dup, 0),
            Inst::new(Opcode::JmpIf, 4),
            Inst::plain(Opcode::Halt),
            Inst::new(Opcode::Push, 1),
            Inst::plain(Opcode::Sub),
            Inst::new(Opcode::Jmp, 1),
        ] {
            m.push_inst(inst).unwrap();
        }

        let mut steps = 0;
        while !m.is_halted() && steps < 100 {
            m.step().unwrap();
            steps += 1;
        }
        assert!(m.is_halted());
        assert_eq!(m.stack(), &[0]);
    }
}
