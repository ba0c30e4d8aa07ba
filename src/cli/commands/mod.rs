//! CLI command implementations

pub mod coldhead;
pub mod completions;
pub mod displacer;
pub mod init;
pub mod order;
pub mod search;
pub mod test;
pub mod wip;
