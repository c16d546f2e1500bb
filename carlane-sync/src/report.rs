//! Run report aggregation

use carlane_feed::RowError;
use serde::Serialize;

use crate::executor::{OperationOutcome, OutcomeStatus};
use crate::plan::OperationKind;

/// Final result of one synchronization run.
///
/// Outcomes keep plan order so output is deterministic, and every
/// failure carries the VIN, the operation kind and the error detail an
/// operator needs to rerun just the failed subset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub created: usize,
    pub updated: usize,
    pub price_changed: usize,
    pub closed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<OperationOutcome>,
    /// Run-level diagnostics: duplicate feed entries, store write
    /// failures, executor hiccups.
    pub warnings: Vec<String>,
    /// Row-level parse errors from the feed layer, passed through
    /// untouched.
    pub feed_errors: Vec<RowError>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and bump the matching counter.
    pub fn push_outcome(&mut self, outcome: OperationOutcome) {
        match outcome.status {
            OutcomeStatus::Succeeded => match outcome.kind {
                OperationKind::Create => self.created += 1,
                OperationKind::UpdateFields => self.updated += 1,
                OperationKind::UpdatePrice => self.price_changed += 1,
                OperationKind::Close => self.closed += 1,
            },
            OutcomeStatus::FailedPermanent | OutcomeStatus::FailedExhausted => {
                self.failed += 1
            }
            OutcomeStatus::Skipped => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Outcomes an operator would want to retry in a follow-up run.
    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.warnings.is_empty() && self.feed_errors.is_empty()
    }

    pub fn total_operations(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(kind: OperationKind, status: OutcomeStatus) -> OperationOutcome {
        OperationOutcome {
            external_id: "VIN1".to_string(),
            kind,
            status,
            attempts: 1,
            error: None,
        }
    }

    #[test]
    fn counters_follow_outcomes() {
        let mut report = RunReport::new();
        report.push_outcome(outcome(OperationKind::Create, OutcomeStatus::Succeeded));
        report.push_outcome(outcome(OperationKind::UpdatePrice, OutcomeStatus::Succeeded));
        report.push_outcome(outcome(OperationKind::UpdateFields, OutcomeStatus::Succeeded));
        report.push_outcome(outcome(OperationKind::Close, OutcomeStatus::Succeeded));
        report.push_outcome(outcome(
            OperationKind::Create,
            OutcomeStatus::FailedPermanent,
        ));
        report.push_outcome(outcome(OperationKind::Close, OutcomeStatus::Skipped));

        assert_eq!(report.created, 1);
        assert_eq!(report.price_changed, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.closed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total_operations(), 6);
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_clean());
    }
}
