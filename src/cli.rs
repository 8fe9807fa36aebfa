//! CLI domain: parse, route and presentation for the `flashbatch` driver.
//!
//! The driver is a headless presentation loop: it owns the controllers, reads
//! control commands from stdin and pumps results to a terminal sink.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands, PromptCommands};
pub use presentation::{
    format_item_table, format_progress, format_summary, parse_control, TerminalSink,
};
pub use route::RunContext;
