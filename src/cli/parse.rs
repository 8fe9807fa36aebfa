//! CLI parse: clap types for flashbatch. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flashbatch - turn raw text into AI-generated flashcards, line by line
#[derive(Parser)]
#[command(name = "flashbatch")]
#[command(about = "Pausable batch generation of flashcard text through an AI backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Model to use instead of the configured one
    #[arg(long)]
    pub model: Option<String>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every non-blank line of a file. Type p, r or s + Enter to
    /// pause, resume or stop.
    Run {
        /// Input file, one item per line
        file: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Clean a file's text with the cleanup prompt and print the result
    Clean {
        /// Input file
        file: PathBuf,
        /// Replace the file contents with the cleaned text
        #[arg(long)]
        in_place: bool,
    },
    /// Show or edit the cleanup prompt
    Prompt {
        #[command(subcommand)]
        command: PromptCommands,
    },
}

#[derive(Subcommand)]
pub enum PromptCommands {
    /// Print the current cleanup prompt
    Show,
    /// Replace the cleanup prompt
    Set {
        /// New prompt text
        text: String,
    },
}
