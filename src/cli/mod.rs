//! CLI module for autopilot - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
