//! Status condition tracking
//!
//! Conditions are merged by type: an incoming condition that reports the same
//! state as the persisted one keeps the persisted record (and its transition
//! time), so re-running a pass produces no status write.

use crate::crd::{reason, Condition, ConditionStatus, CONDITION_READY};

/// Merge `incoming` conditions into `existing`.
///
/// Returns the merged set and whether it differs from `existing`. Conditions
/// whose type is not mentioned in `incoming` are kept as they are.
pub fn merge_conditions(
    existing: &[Condition],
    incoming: impl IntoIterator<Item = Condition>,
) -> (Vec<Condition>, bool) {
    let mut merged = existing.to_vec();
    let mut changed = false;

    for condition in incoming {
        match merged.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(current) if current.same_state(&condition) => {}
            Some(current) => {
                *current = condition;
                changed = true;
            }
            None => {
                merged.push(condition);
                changed = true;
            }
        }
    }

    (merged, changed)
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// `Ready=False` while dependents are still provisioning
pub fn installing(message: impl Into<String>) -> Condition {
    Condition::new(
        CONDITION_READY,
        ConditionStatus::False,
        reason::INSTALLING,
        message,
    )
}

/// `Ready=True` once everything is installed
pub fn installed() -> Condition {
    Condition::new(CONDITION_READY, ConditionStatus::True, reason::INSTALLED, "")
}

/// `Ready=False` after a blocking failure
pub fn failed_to_install(message: impl Into<String>) -> Condition {
    Condition::new(
        CONDITION_READY,
        ConditionStatus::False,
        reason::FAILED_TO_INSTALL,
        message,
    )
}
