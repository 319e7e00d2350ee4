// UI module - headless console shell
//
// This module contains:
// - Cli: clap definition of the command line
// - ConsoleController: runs one job and renders its events in the terminal

pub mod cli;
pub mod controller;

pub use cli::Cli;
pub use controller::{ConsoleController, exit_code};
