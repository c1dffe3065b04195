//! Bytecode instruction set
//!
//! Stack-based bytecode with 12 opcodes. Every instruction record carries
//! one signed 64-bit operand; most opcodes ignore it.

use std::fmt;

/// Bytecode opcode (12 instructions)
///
/// Stack-based machine with explicit tag values for serialization.
/// The operand is encoded alongside the tag in every record.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Do nothing
    Nop = 0,
    /// Push the operand onto the stack
    Push = 1,
    /// Push a copy of the element `operand` slots from the top
    Dup = 2,
    /// Pop b, pop a, push a + b
    Add = 3,
    /// Pop b, pop a, push a - b
    Sub = 4,
    /// Pop b, pop a, push a * b
    Mul = 5,
    /// Pop b, pop a, push a / b (integer division)
    Div = 6,
    /// Set the program counter to the operand
    Jmp = 7,
    /// Pop v; jump to the operand if v is non-zero
    JmpIf = 8,
    /// Pop b, pop a, push 1 if a == b else 0
    Eq = 9,
    /// Set the halt flag
    Halt = 10,
    /// Pop the top of stack and emit it on the observation channel
    PrintDbg = 11,
}

impl Opcode {
    /// Canonical mnemonic for this opcode in the text assembly format.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Push => "push",
            Opcode::Dup => "dup",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Jmp => "jmp",
            Opcode::JmpIf => "jmp_if",
            Opcode::Eq => "eq",
            Opcode::Halt => "halt",
            Opcode::PrintDbg => "print_dbg",
        }
    }

    /// Whether the operand is semantically meaningful for this opcode.
    ///
    /// The record format always carries one; the assembler encodes 0 for
    /// opcodes that ignore it.
    pub fn takes_operand(self) -> bool {
        matches!(
            self,
            Opcode::Push | Opcode::Dup | Opcode::Jmp | Opcode::JmpIf
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl TryFrom<u32> for Opcode {
    type Error = ();

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Opcode::Nop),
            1 => Ok(Opcode::Push),
            2 => Ok(Opcode::Dup),
            3 => Ok(Opcode::Add),
            4 => Ok(Opcode::Sub),
            5 => Ok(Opcode::Mul),
            6 => Ok(Opcode::Div),
            7 => Ok(Opcode::Jmp),
            8 => Ok(Opcode::JmpIf),
            9 => Ok(Opcode::Eq),
            10 => Ok(Opcode::Halt),
            11 => Ok(Opcode::PrintDbg),
            _ => Err(()),
        }
    }
}
