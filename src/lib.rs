//! reptracker: coldhead and displacer repair tracking
//!
//! A SQLite-backed record of work-in-progress lots, the coldhead and
//! displacer assemblies they bind, and the test attempts run against them.

pub mod cli;
pub mod core;
pub mod entities;
