//! CLI subcommand implementations.

pub mod chat;
pub mod config_cmd;
pub mod render;
pub mod run;
pub mod session;
pub mod tools;
