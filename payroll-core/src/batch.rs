//! Payroll batch runs.
//!
//! A batch computes many workers against one [`ResolvedRuleSet`], using
//! [`rayon`] to spread the per-worker calculations across cores. The rule
//! set is resolved once, so every worker in a run is charged under the same
//! rule versions. One worker's bad input never aborts the others.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::ResolvedRuleSet;
use crate::error::InvalidInputError;
use crate::models::DeductionBreakdown;

/// Pay for one worker in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPay {
    pub worker_id: String,
    pub gross_salary: Decimal,
    #[serde(default)]
    pub insurance_premiums: Decimal,
}

impl WorkerPay {
    pub fn new(
        worker_id: impl Into<String>,
        gross_salary: Decimal,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            gross_salary,
            insurance_premiums: Decimal::ZERO,
        }
    }
}

/// Outcome for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDeductions {
    pub worker_id: String,
    pub outcome: Result<DeductionBreakdown, InvalidInputError>,
}

/// Totals over the workers that calculated successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_gross: Decimal,
    pub total_deductions: Decimal,
    pub total_net_pay: Decimal,
    pub worker_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRun {
    pub as_of: NaiveDate,
    /// One entry per input worker, in input order.
    pub items: Vec<WorkerDeductions>,
    pub summary: BatchSummary,
}

impl BatchRun {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &InvalidInputError)> {
        self.items.iter().filter_map(|item| match &item.outcome {
            Ok(_) => None,
            Err(err) => Some((item.worker_id.as_str(), err)),
        })
    }
}

/// Computes every worker in parallel against `rule_set`.
pub fn run_batch(
    rule_set: &ResolvedRuleSet,
    workers: &[WorkerPay],
) -> BatchRun {
    let items: Vec<WorkerDeductions> = workers
        .par_iter()
        .map(|worker| WorkerDeductions {
            worker_id: worker.worker_id.clone(),
            outcome: rule_set.calculate(worker.gross_salary, worker.insurance_premiums),
        })
        .collect();

    let mut summary = BatchSummary::default();
    for item in &items {
        match &item.outcome {
            Ok(breakdown) => {
                summary.total_gross += breakdown.gross_salary;
                summary.total_deductions += breakdown.total_deductions;
                summary.total_net_pay += breakdown.net_pay;
                summary.worker_count += 1;
            }
            Err(err) => {
                warn!(worker_id = %item.worker_id, error = %err, "worker skipped in batch");
                summary.failed_count += 1;
            }
        }
    }

    info!(
        as_of = %rule_set.as_of(),
        workers = summary.worker_count,
        failed = summary.failed_count,
        total_net_pay = %summary.total_net_pay,
        "batch run complete"
    );

    BatchRun {
        as_of: rule_set.as_of(),
        items,
        summary,
    }
}
