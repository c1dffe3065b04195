//! Anvil Runtime - Core virtual machine implementation
//!
//! This library provides the complete Anvil stack machine including:
//! - Text scanning utilities for the assembly dialect
//! - Bytecode model and binary persistence
//! - The assembler (text to bytecode translation)
//! - The execution engine (fetch-decode-execute over a bounded stack)

/// Anvil runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod asm;
pub mod bytecode;
pub mod scan;
pub mod vm;

// Re-export commonly used types
pub use asm::{assemble, AsmError};
pub use bytecode::{
    CapacityError, Inst, LoadError, Opcode, Program, SaveError, INST_SIZE, PROGRAM_CAPACITY,
};
pub use vm::{stdout_writer, ExecError, Machine, OutputWriter, STACK_CAPACITY};
