//! Auto-migration overload detector. A worker's trailing CPU samples are
//! checked on every fresh sample; if the whole trailing window exceeds the
//! configured threshold, the node's task is a candidate for a strong
//! migration away from it.
//!
//! The coordinator samples stats once per heartbeat. We don't know a given
//! worker's exact heartbeat cadence, so the "80% of expected samples"
//! coverage check assumes the documented default cadence of one sample per
//! second (`HEARTBEAT_INTERVAL` default) — a node reporting much less often
//! than that simply won't accumulate enough samples to trip the detector,
//! which is the conservative direction to err in.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;

use crate::coordinator::state::CpuSample;

const ASSUMED_SAMPLE_INTERVAL_SECS: f64 = 1.0;
const MIN_COVERAGE_RATIO: f64 = 0.8;

pub fn is_overloaded(history: &VecDeque<CpuSample>, threshold: f32, window: Duration) -> bool {
    let now = Utc::now();
    let Ok(window_chrono) = chrono::Duration::from_std(window) else {
        return false;
    };
    let window_start = now - window_chrono;

    let in_window: Vec<&CpuSample> = history.iter().filter(|s| s.at >= window_start).collect();
    let expected = (window.as_secs_f64() / ASSUMED_SAMPLE_INTERVAL_SECS).max(1.0);
    let required = (expected * MIN_COVERAGE_RATIO).ceil() as usize;

    if in_window.len() < required {
        return false;
    }
    in_window.iter().all(|s| s.cpu_usage > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs_ago: i64, cpu: f32) -> CpuSample {
        CpuSample {
            at: Utc::now() - chrono::Duration::seconds(secs_ago),
            cpu_usage: cpu,
        }
    }

    #[test]
    fn requires_full_window_above_threshold() {
        let mut history = VecDeque::new();
        for secs_ago in (0..5).rev() {
            history.push_back(sample(secs_ago, 95.0));
        }
        assert!(is_overloaded(&history, 90.0, Duration::from_secs(5)));
    }

    #[test]
    fn one_low_sample_prevents_trigger() {
        let mut history = VecDeque::new();
        for secs_ago in (0..5).rev() {
            history.push_back(sample(secs_ago, 95.0));
        }
        history.push_back(sample(0, 10.0));
        assert!(!is_overloaded(&history, 90.0, Duration::from_secs(5)));
    }

    #[test]
    fn insufficient_coverage_prevents_trigger() {
        let mut history = VecDeque::new();
        history.push_back(sample(0, 99.0));
        assert!(!is_overloaded(&history, 90.0, Duration::from_secs(30)));
    }
}
