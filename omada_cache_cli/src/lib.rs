//! Operator command line for the Omada response cache
//!
//! The binary in `main.rs` is a thin clap front end; configuration loading
//! and report formatting live here so they can be tested directly.

pub mod config;
pub mod output;
pub mod paths;
pub mod terminal;
