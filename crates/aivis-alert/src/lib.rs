//! Change-detection alerts over the citation stream.
//!
//! The engine compares each new citation against the most recent prior one
//! for the same (keyword, platform) and emits alerts for the transitions
//! that matter: a domain appearing, disappearing, moving two or more ranks,
//! or flipping sentiment. Alert writes are best-effort; losing one never
//! fails a tracking job.

pub mod engine;

#[cfg(test)]
mod tests;

pub use engine::{diff_citations, AlertEngine, POSITION_CHANGE_THRESHOLD};
