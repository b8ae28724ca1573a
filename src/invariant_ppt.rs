//! Runtime invariants for the focus pipeline
//!
//! Hot-path code asserts its contracts through [`assert_invariant!`], which
//! also records the invariant in a thread-local log. Contract tests then use
//! [`contract_test`] to prove a code path really checked what it promises,
//! not merely that the result happened to look right.
//!
//! ```rust,ignore
//! use crabfocus::invariant_ppt::{contract_test, ROI_WITHIN_FRAME};
//!
//! let region = extract_region(&frame, &roi)?;
//! contract_test("region extraction", &[ROI_WITHIN_FRAME]);
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

/// Extracted regions stay inside their source frame.
pub const ROI_WITHIN_FRAME: &str = "Extracted region lies inside the source frame";
/// Extracted regions have exactly the requested dimensions.
pub const REGION_MATCHES_ROI: &str = "Extracted region dimensions equal the ROI dimensions";
/// Normalized regions keep the source region's dimensions.
pub const NORMALIZED_KEEPS_SHAPE: &str = "Normalized region has the source region dimensions";
/// Focus levels are finite and non-negative.
pub const FOCUS_LEVEL_NON_NEGATIVE: &str = "Focus level is finite and non-negative";
/// The tracked best focus never decreases.
pub const BEST_FOCUS_MONOTONIC: &str = "Best focus so far never decreases";

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record that it was checked.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Panic unless every listed invariant was checked on this thread.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let missing: Vec<&str> = INVARIANT_LOG.with(|log| {
        let log = log.borrow();
        required_invariants
            .iter()
            .copied()
            .filter(|invariant| !log.contains(*invariant))
            .collect()
    });

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Whether `invariant` was checked on this thread since the last clear.
pub fn was_checked(invariant: &str) -> bool {
    INVARIANT_LOG.with(|log| log.borrow().contains(invariant))
}

pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}
