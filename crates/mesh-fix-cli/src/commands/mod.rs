//! Subcommand implementations.

pub mod convert;
pub mod fill;
pub mod info;
pub mod repair;
