//! Subcommand implementations.

pub mod caldav;
pub mod config;
