//! autodev worker library.
//!
//! The `autodevd` binary wires the REST adapters and the agent client into
//! the [`driver::Driver`], which processes pending work items one at a time.

pub mod directive;
pub mod driver;
