//! Bytecode model and binary persistence
//!
//! A program is an ordered, bounded sequence of fixed-width instruction
//! records. The wire format is the bare concatenation of records, no
//! header, no checksum: program length is derived from file size.
//!
//! Each record is 16 bytes, little-endian:
//! - Opcode tag (u32)
//! - 4 padding bytes (the operand's natural alignment), always zero
//! - Operand (i64)

mod opcode;

pub use opcode::Opcode;

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Size of one serialized instruction record in bytes.
pub const INST_SIZE: usize = 16;

/// Maximum number of instructions a program may hold.
pub const PROGRAM_CAPACITY: usize = 1024;

/// A single instruction record: opcode tag plus signed 64-bit operand.
///
/// The operand is meaningful only for [`Opcode::takes_operand`] opcodes
/// and ignored (conventionally zero) for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inst {
    pub op: Opcode,
    pub operand: i64,
}

impl Inst {
    /// Create an instruction with an explicit operand.
    pub fn new(op: Opcode, operand: i64) -> Self {
        Self { op, operand }
    }

    /// Create an instruction for an opcode that ignores its operand.
    pub fn plain(op: Opcode) -> Self {
        Self { op, operand: 0 }
    }
}

/// Attempt to grow a program past [`PROGRAM_CAPACITY`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("program capacity of 1024 instructions exceeded")]
pub struct CapacityError;

/// Errors while reading a binary program.
///
/// A malformed program cannot be partially trusted, so loading has no
/// recovery path: drivers treat every variant as fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File size is not a whole number of records
    #[error("program file size {size} is not a multiple of the 16-byte record size")]
    MisalignedFile { size: usize },
    /// More records than the program capacity permits
    #[error("program has {count} instructions, exceeding the capacity of 1024")]
    TooLarge { count: usize },
    /// Record carries a tag outside the instruction set
    #[error("unknown opcode tag {tag} at instruction {index}")]
    UnknownOpcode { tag: u32, index: usize },
    /// Underlying file I/O failure
    #[error("could not read program file: {0}")]
    Io(#[from] std::io::Error),
}

/// Error while writing a binary program to disk.
#[derive(Debug, Error)]
#[error("could not write program file: {0}")]
pub struct SaveError(#[from] std::io::Error);

/// Bounded, ordered instruction sequence addressed by program counter.
///
/// Immutable once handed to a machine; a new load replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    insts: Vec<Inst>,
}

impl Program {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self { insts: Vec::new() }
    }

    /// Append an instruction, failing once the capacity is reached.
    pub fn push(&mut self, inst: Inst) -> Result<(), CapacityError> {
        if self.insts.len() >= PROGRAM_CAPACITY {
            return Err(CapacityError);
        }
        self.insts.push(inst);
        Ok(())
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Fetch the instruction at `index`, if in bounds.
    pub fn get(&self, index: usize) -> Option<Inst> {
        self.insts.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inst> {
        self.insts.iter()
    }

    /// Serialize to the binary wire format, records in program order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.insts.len() * INST_SIZE);
        for inst in &self.insts {
            bytes.extend_from_slice(&(inst.op as u32).to_le_bytes());
            bytes.extend_from_slice(&[0u8; 4]);
            bytes.extend_from_slice(&inst.operand.to_le_bytes());
        }
        bytes
    }

    /// Deserialize from the binary wire format.
    ///
    /// Validates that the buffer is a whole number of records, that the
    /// record count fits the program capacity, and that every tag decodes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() % INST_SIZE != 0 {
            return Err(LoadError::MisalignedFile { size: bytes.len() });
        }
        let count = bytes.len() / INST_SIZE;
        if count > PROGRAM_CAPACITY {
            return Err(LoadError::TooLarge { count });
        }

        let mut insts = Vec::with_capacity(count);
        for (index, record) in bytes.chunks_exact(INST_SIZE).enumerate() {
            let tag = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
            let op = Opcode::try_from(tag).map_err(|_| LoadError::UnknownOpcode { tag, index })?;
            let operand = i64::from_le_bytes([
                record[8], record[9], record[10], record[11], record[12], record[13], record[14],
                record[15],
            ]);
            insts.push(Inst { op, operand });
        }

        Ok(Self { insts })
    }

    /// Write the serialized program to `path`.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), SaveError> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Read and deserialize a program from `path`.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
