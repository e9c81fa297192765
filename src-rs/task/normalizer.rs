use std::time::Duration;

use super::types::{Eta, ProgressSummary};
use crate::backend::StatusSnapshot;

/// Builds the caller-facing summary from a raw snapshot and the locally
/// measured time since submission. The backend's clock is never consulted.
pub fn normalize(snapshot: &StatusSnapshot, elapsed: Duration) -> ProgressSummary {
    let percent = clamp_percent(snapshot.progress);
    let elapsed_seconds = elapsed.as_secs_f64();
    let latest = snapshot.log.last();

    ProgressSummary {
        status: snapshot.status,
        percent,
        elapsed_seconds,
        eta: estimate_eta(elapsed_seconds, percent),
        latest_log_description: latest
            .and_then(|entry| entry.description.clone())
            .unwrap_or_default(),
        latest_log_substep: latest
            .and_then(|entry| entry.substep.clone())
            .unwrap_or_default(),
        result_count: snapshot.total_results_found.unwrap_or(0),
        success_ratio_percent: success_ratio(snapshot.successful_queries, snapshot.total_queries),
        result: snapshot.result_text(),
        error: snapshot.error.clone(),
    }
}

/// Linear extrapolation: total = elapsed / (percent / 100), remaining = total - elapsed.
pub fn estimate_eta(elapsed_seconds: f64, percent: u8) -> Eta {
    match percent {
        0 => Eta::Calculating,
        100..=u8::MAX => Eta::Completed,
        p => {
            let estimated_total = elapsed_seconds / (f64::from(p) / 100.0);
            Eta::Remaining((estimated_total - elapsed_seconds).max(0.0))
        }
    }
}

pub fn success_ratio(successful: Option<u64>, total: Option<u64>) -> u32 {
    match total {
        Some(total) if total > 0 => {
            let ratio = successful.unwrap_or(0) as f64 / total as f64 * 100.0;
            ratio.round() as u32
        }
        _ => 0,
    }
}

/// Progress arrives as a 0-100 integer; it is clamped, never rescaled.
/// Fractions round down so only a true 100 reads as finished.
fn clamp_percent(raw: Option<f64>) -> u8 {
    match raw {
        Some(value) if value.is_finite() => value.clamp(0.0, 100.0).floor() as u8,
        _ => 0,
    }
}
