//! Plan quality metrics (KPIs).
//!
//! Computes standard indicators from a finished execution plan.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest thread finish + barriers × barrier cost |
//! | Imbalance | Standard deviation of per-thread busy time |
//! | Barrier count | Distinct barriers in the plan |
//! | Utilization | Busy time / makespan, per thread |
//! | Avg Utilization | Mean of per-thread utilization |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use crate::models::ExecutionPlan;

/// Plan performance indicators.
///
/// Time values are in the same abstract unit as `runtime_cost`.
#[derive(Debug, Clone)]
pub struct PlanKpi {
    /// Estimated wall-clock cost.
    pub makespan: f64,
    /// Standard deviation of per-thread busy time.
    pub imbalance: f64,
    /// Distinct barriers.
    pub barrier_count: usize,
    /// Busy time per thread, indexed by thread id.
    pub busy_by_thread: Vec<f64>,
    /// Utilization per thread (0.0..1.0), indexed by thread id.
    pub utilization_by_thread: Vec<f64>,
    /// Average thread utilization (0.0..1.0).
    pub avg_utilization: f64,
}

impl PlanKpi {
    /// Computes KPIs from a plan.
    pub fn calculate(plan: &ExecutionPlan) -> Self {
        let busy_by_thread: Vec<f64> = plan.threads.iter().map(|t| t.busy_time).collect();

        let utilization_by_thread: Vec<f64> = if plan.makespan > 0.0 {
            busy_by_thread
                .iter()
                .map(|b| (b / plan.makespan).min(1.0))
                .collect()
        } else {
            vec![0.0; busy_by_thread.len()]
        };

        let avg_utilization = if utilization_by_thread.is_empty() {
            0.0
        } else {
            utilization_by_thread.iter().sum::<f64>() / utilization_by_thread.len() as f64
        };

        Self {
            makespan: plan.makespan,
            imbalance: std_dev(&busy_by_thread),
            barrier_count: plan.barrier_count,
            busy_by_thread,
            utilization_by_thread,
            avg_utilization,
        }
    }

    /// Whether the plan meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: f64, min_utilization: f64) -> bool {
        self.makespan <= max_makespan && self.avg_utilization >= min_utilization
    }
}

/// Population standard deviation. Zero for an empty slice.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
