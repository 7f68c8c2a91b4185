//! CLI command implementations.

pub mod enqueue;
pub mod inspect;
pub mod queue;
pub mod simulate;
