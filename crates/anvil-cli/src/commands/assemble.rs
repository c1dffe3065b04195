//! Assemble command - translate assembly source into a binary program

use anyhow::{Context, Result};
use anvil_runtime::assemble;
use std::fs;

/// Assemble `source_path` and write the binary program to `output_path`.
///
/// Assembly happens entirely in memory before the destination is touched,
/// so a failed translation never leaves a partial output file behind.
pub fn run(source_path: &str, output_path: &str) -> Result<()> {
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("Failed to read source file: {}", source_path))?;

    let program = assemble(&source)
        .with_context(|| format!("Failed to assemble: {}", source_path))?;

    program
        .save_file(output_path)
        .with_context(|| format!("Failed to write program: {}", output_path))?;

    Ok(())
}
