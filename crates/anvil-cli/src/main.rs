use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

/// Anvil stack machine and assembler.
///
/// Anvil is a minimal stack-based virtual machine with a line-oriented
/// assembly dialect. This CLI assembles text programs into the binary
/// instruction format and executes binary programs.
///
/// EXAMPLES:
///     anvil assemble main.anv main.anb    Assemble a source file
///     anvil run main.anb                  Execute a binary program
///     anvil run main.anb --limit 200      Raise the step ceiling
#[derive(Parser)]
#[command(name = "anvil")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a binary Anvil program
    ///
    /// Loads the program and executes it instruction by instruction until
    /// it halts, fails, or reaches the step ceiling. The full stack is
    /// printed after every step.
    ///
    /// EXAMPLES:
    ///     anvil run main.anb              Run with the default ceiling
    ///     anvil run main.anb --limit 500  Allow up to 500 steps
    #[command(visible_alias = "r")]
    Run {
        /// Path to the binary program
        file: String,
        /// Maximum number of instructions to execute
        #[arg(long, default_value_t = 69)]
        limit: usize,
    },

    /// Assemble a source file into a binary program
    ///
    /// Translates the line-oriented assembly text into the fixed-width
    /// binary instruction format. Any unknown mnemonic or malformed
    /// operand aborts the translation.
    ///
    /// EXAMPLES:
    ///     anvil assemble main.anv main.anb
    #[command(visible_alias = "a")]
    Assemble {
        /// Path to the assembly source file
        source: String,
        /// Destination path for the binary program
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, limit } => commands::run::run(&file, limit)?,
        Commands::Assemble { source, output } => commands::assemble::run(&source, &output)?,
    }

    Ok(())
}
