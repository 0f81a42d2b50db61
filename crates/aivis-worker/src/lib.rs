//! Worker process internals: env configuration, the store-backed queue,
//! the job consumer, and the planner loops. `main.rs` wires these together
//! and owns process lifecycle (signals, drain, exit codes).

pub mod config;
pub mod planner;
pub mod queue;
pub mod worker;
