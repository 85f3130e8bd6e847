//! Navigation core: panel cycle, command selection, idle auto-advance, and the
//! fixed command registry.

pub mod commands;
pub mod state;
