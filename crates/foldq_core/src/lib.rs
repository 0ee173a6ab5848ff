//! foldq core - a single-worker batch queue for structure prediction runs
//!
//! This crate contains the queue, settings, and orchestration logic.
//! The `foldq` binary is a thin command-line wrapper around it.

pub mod config;
pub mod jobs;
pub mod logging;
pub mod orchestrator;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
