//! Run command - execute binary Anvil programs

use anyhow::{Context, Result};
use anvil_runtime::{Machine, Program};
use std::io;

/// Execute a binary program up to `limit` steps.
///
/// The full stack is dumped to stdout after every successful step. The
/// first execution error is printed to stderr together with a stack dump
/// for diagnosis; no step is ever retried.
pub fn run(file_path: &str, limit: usize) -> Result<()> {
    let program = Program::load_file(file_path)
        .with_context(|| format!("Failed to load program: {}", file_path))?;

    let mut machine = Machine::new();
    machine.load(program);

    let mut stdout = io::stdout();
    for _ in 0..limit {
        if machine.is_halted() {
            break;
        }
        if let Err(err) = machine.step() {
            eprintln!("ERROR: {}", err);
            let mut stderr = io::stderr();
            let _ = machine.dump_stack(&mut stderr);
            return Err(anyhow::anyhow!("Failed to execute program"));
        }
        machine
            .dump_stack(&mut stdout)
            .context("Failed to write stack dump")?;
    }

    Ok(())
}
