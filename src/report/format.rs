//! Formatted terminal output for `biomon once` / `biomon watch`.
//!
//! We keep formatting code in one place so:
//! - the control loop stays free of presentation concerns
//! - output changes are localized

use crate::control::{Plan, RunOutcome};
use crate::domain::{MonitorConfig, ParamMap, Snapshot};
use crate::report::VariableFit;

/// Format the full cycle summary (status, data, estimation, fit quality).
pub fn format_cycle_summary(outcome: &RunOutcome, config: &MonitorConfig, fits: &[VariableFit]) -> String {
    let mut out = String::new();

    out.push_str("=== biomon - bioprocess monitor ===\n");
    out.push_str(&format!("{}\n", outcome.iteration_label));
    out.push_str(&format!(
        "Cycle: {} | {:.2}s\n",
        plan_label(outcome.plan),
        outcome.elapsed.as_secs_f64()
    ));
    out.push_str(&format!(
        "Horizon: {:.2} h | grid={} pts/h\n",
        config.horizon_hours, config.points_per_hour
    ));

    if let Some(message) = outcome.error.message() {
        out.push_str("\nStatus: ERROR\n");
        out.push_str(message);
        out.push('\n');
        return out;
    }
    out.push_str("Status: ok\n");

    out.push_str(&format_dataset(&outcome.snapshot));

    if let Some(report) = &outcome.estimation {
        out.push_str("\nEstimation:\n");
        out.push_str(&format!(
            "- iterations={} evaluations={} converged={}\n",
            report.iterations, report.evaluations, report.converged
        ));
        out.push_str(&format!(
            "- points={} varying={} | SSE={:.6} RMSE={:.6}\n",
            report.n_points, report.n_varying, report.cost, report.rmse
        ));
    }

    if !fits.is_empty() {
        out.push_str("\nFit per variable:\n");
        for f in fits {
            out.push_str(&format!(
                "  {:<8} n={:<4} RMSE={:.4} bias={:+.4}\n",
                f.variable, f.n, f.rmse, f.bias
            ));
        }
    }

    out.push('\n');
    out.push_str(&format_params(&outcome.snapshot.params));
    out
}

fn format_dataset(snapshot: &Snapshot) -> String {
    let mut out = String::from("\nMeasured data:\n");
    for (label, table) in &snapshot.measured_data {
        let counts: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{c}={}", table.count(c)))
            .collect();
        out.push_str(&format!(
            "- {label:<8} rows={:<4} t_max={:.2}h | {}\n",
            table.len(),
            table.t_max().unwrap_or(0.0),
            counts.join(" ")
        ));
    }
    out
}

/// Short description of what a cycle did.
pub fn plan_label(plan: Plan) -> &'static str {
    match plan {
        Plan::FullRefresh => "full refresh",
        Plan::Incremental { estimate: true } => "incremental + estimate",
        Plan::Incremental { estimate: false } => "incremental",
    }
}

/// Format the parameter table in model order.
pub fn format_params(params: &ParamMap) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>12} {:<6} {:>10} {:>10}", "name", "value", "vary", "min", "max").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<6} {:-<10} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');

    for p in params.iter() {
        out.push_str(
            format!(
                "{:<12} {:>12.6} {:<6} {:>10.4} {:>10.4}",
                truncate(&p.name, 12),
                p.value,
                truncate(&p.vary, 6),
                p.min,
                p.max
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
