//! Plain-text rendering of plans and reports

use carlane_sync::{Operation, RunReport, SyncPlan};

pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("Synchronization finished:\n");
    out.push_str(&format!("  created:       {}\n", report.created));
    out.push_str(&format!("  updated:       {}\n", report.updated));
    out.push_str(&format!("  price changes: {}\n", report.price_changed));
    out.push_str(&format!("  closed:        {}\n", report.closed));
    out.push_str(&format!("  failed:        {}\n", report.failed));
    if report.skipped > 0 {
        out.push_str(&format!("  skipped:       {}\n", report.skipped));
    }

    if report.failures().next().is_some() {
        out.push_str("\nFailed operations (retry with a follow-up run):\n");
        for outcome in report.failures() {
            out.push_str(&format!(
                "  - {} {} after {} attempt(s): {}\n",
                outcome.kind,
                outcome.external_id,
                outcome.attempts,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    if !report.feed_errors.is_empty() {
        out.push_str("\nRejected feed rows:\n");
        for error in &report.feed_errors {
            out.push_str(&format!("  - {error}\n"));
        }
    }

    out
}

pub fn render_plan(plan: &SyncPlan) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        out.push_str("Nothing to do: feed matches known remote state.\n");
    } else {
        out.push_str(&format!("Planned operations ({}):\n", plan.operations.len()));
        for operation in &plan.operations {
            match operation {
                Operation::Create { record } => {
                    out.push_str(&format!(
                        "  create        {} ({} {})\n",
                        record.external_id, record.make, record.model
                    ));
                }
                Operation::UpdatePrice {
                    external_id,
                    new_price,
                    reason,
                    ..
                } => {
                    out.push_str(&format!(
                        "  update-price  {} -> {} ({:?})\n",
                        external_id, new_price, reason
                    ));
                }
                Operation::UpdateFields { record, .. } => {
                    out.push_str(&format!("  update-fields {}\n", record.external_id));
                }
                Operation::Close { external_id, .. } => {
                    out.push_str(&format!("  close         {}\n", external_id));
                }
            }
        }
    }

    if !plan.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &plan.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use carlane_sync::{OperationKind, OperationOutcome, OutcomeStatus};

    #[test]
    fn failed_operations_are_listed_with_detail() {
        let mut report = RunReport::new();
        report.push_outcome(OperationOutcome {
            external_id: "VIN1".to_string(),
            kind: OperationKind::Create,
            status: OutcomeStatus::FailedExhausted,
            attempts: 3,
            error: Some("platform error 503".to_string()),
        });

        let text = render_report(&report);
        assert!(text.contains("failed:        1"));
        assert!(text.contains("create VIN1 after 3 attempt(s): platform error 503"));
    }

    #[test]
    fn empty_plan_renders_a_friendly_line() {
        let text = render_plan(&SyncPlan::default());
        assert!(text.contains("Nothing to do"));
    }
}
