//! The assembler: text source to bytecode translation
//!
//! One instruction per non-empty line, `<mnemonic> [operand]`, mnemonics
//! matched case-insensitively. Translation stops at the first error; there
//! is no recovery or multi-error reporting.

use crate::bytecode::{Inst, Opcode, Program};
use crate::scan;
use thiserror::Error;

/// Errors while translating assembly text.
///
/// Drivers treat every variant as fatal; `line` numbers are 1-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// Mnemonic outside the instruction set
    #[error("unknown instruction `{mnemonic}` on line {line}")]
    UnknownMnemonic { mnemonic: String, line: usize },
    /// Missing, malformed, or unexpected operand text
    #[error("bad operand `{token}` for `{mnemonic}` on line {line}")]
    BadOperand {
        mnemonic: String,
        token: String,
        line: usize,
    },
    /// Source assembles to more instructions than a program may hold
    #[error("program capacity of 1024 instructions exceeded on line {line}")]
    ProgramTooLarge { line: usize },
}

/// Translate a full assembly source buffer into a program.
///
/// Lines are split on `'\n'`, trimmed, and empty lines skipped (they do
/// not become no-ops).
pub fn assemble(source: &str) -> Result<Program, AsmError> {
    let mut program = Program::new();
    let mut rest = source;
    let mut line_no = 0;

    while !rest.is_empty() {
        let line = scan::chop(&mut rest, '\n');
        line_no += 1;

        let line = scan::trim(line);
        if line.is_empty() {
            continue;
        }

        let inst = translate_line(line, line_no)?;
        program
            .push(inst)
            .map_err(|_| AsmError::ProgramTooLarge { line: line_no })?;
    }

    Ok(program)
}

/// Translate a single trimmed, non-empty line.
fn translate_line(line: &str, line_no: usize) -> Result<Inst, AsmError> {
    let mut rest = line;
    let mnemonic = scan::chop(&mut rest, ' ');
    let folded = scan::fold_lower(mnemonic);

    let op = match folded.as_str() {
        "nop" => Opcode::Nop,
        "push" => Opcode::Push,
        "dup" => Opcode::Dup,
        // `plus` is the historical alias for add
        "add" | "plus" => Opcode::Add,
        "sub" | "minus" => Opcode::Sub,
        "mul" | "mult" => Opcode::Mul,
        "div" => Opcode::Div,
        "jmp" => Opcode::Jmp,
        "jmp_if" => Opcode::JmpIf,
        "eq" => Opcode::Eq,
        "halt" => Opcode::Halt,
        "print_dbg" => Opcode::PrintDbg,
        _ => {
            return Err(AsmError::UnknownMnemonic {
                mnemonic: mnemonic.to_string(),
                line: line_no,
            })
        }
    };

    let token = scan::trim(rest);
    if op.takes_operand() {
        let operand = parse_operand(token, &folded, line_no)?;
        Ok(Inst::new(op, operand))
    } else if token.is_empty() {
        Ok(Inst::plain(op))
    } else {
        // Trailing text after an operand-free mnemonic
        Err(AsmError::BadOperand {
            mnemonic: folded,
            token: token.to_string(),
            line: line_no,
        })
    }
}

/// Parse a signed decimal operand token.
///
/// `scan::parse_digits` is deliberately permissive, so operands go
/// through the strict `scan::parse_int` instead: an optional leading
/// `-`, at least one digit, nothing else, and the value must fit in an
/// `i64` (out-of-range literals are errors, never wrapped).
fn parse_operand(token: &str, mnemonic: &str, line_no: usize) -> Result<i64, AsmError> {
    scan::parse_int(token).ok_or_else(|| AsmError::BadOperand {
        mnemonic: mnemonic.to_string(),
        token: token.to_string(),
        line: line_no,
    })
}
