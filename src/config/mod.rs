//! Configuration module for GD Notes
//!
//! This module resolves where data lives and loads the timer settings that
//! drive saving.

mod persistence;
mod settings;

pub use persistence::*;
pub use settings::*;
