//! Runtime invariant checks with a record of which checks actually ran.
//!
//! The pipeline asserts its ordering rules as it advances. Tests then use
//! [`contract_test`] to prove those rules were exercised rather than silently
//! skipped by a refactor.

use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::error;

lazy_static! {
    /// Descriptions of every invariant that has held at least once in this process.
    static ref CHECKED_INVARIANTS: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// Checks a build invariant and records it.
///
/// A violation is a bug in the orchestrator, not a user error: debug and test
/// builds panic, release builds log it and return `false` so the caller can abort.
pub fn assert_invariant(condition: bool, description: &str, phase: &str) -> bool {
    if !condition {
        let msg = format!("INVARIANT VIOLATION during {}: {}", phase, description);
        error!("{}", msg);
        if cfg!(debug_assertions) || cfg!(test) {
            panic!("{}", msg);
        }
        return false;
    }

    if let Ok(mut set) = CHECKED_INVARIANTS.lock() {
        set.insert(description.to_string());
    }
    true
}

/// Panics unless every description in `required` was asserted at least once.
#[cfg(test)]
pub fn contract_test(context: &str, required: &[&str]) {
    let missing: Vec<&str> = {
        let checked = CHECKED_INVARIANTS.lock().unwrap_or_else(|e| e.into_inner());
        required
            .iter()
            .copied()
            .filter(|req| !checked.contains(*req))
            .collect()
    };

    // Guard released above so a failed contract doesn't poison the log.
    if !missing.is_empty() {
        panic!(
            "Contract '{}' not honoured; these invariants were never checked:\n{:#?}",
            context, missing
        );
    }
    log::debug!("Contract satisfied: {}", context);
}
