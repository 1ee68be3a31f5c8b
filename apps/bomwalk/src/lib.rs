//! # bomwalk
//!
//! Library target of the bomwalk binary. It exposes the command
//! implementations and the configuration layer so integration tests can
//! drive them without spawning a process.

pub mod cli;
pub mod config;
