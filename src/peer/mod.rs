//! Peer Performance Model
//!
//! Rolling per-peer fetch statistics used to rank candidate peers. One model is
//! shared by every reader; scoring happens far more often than recording, so
//! state sits behind a single read-write lock.

use crate::types::PeerID;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default multiplier applied to a peer's error rate when scoring.
pub const DEFAULT_ERROR_PENALTY: u32 = 10;

/// Accumulated outcomes for one peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Sum of durations of successful fetches only
    pub total_time: Duration,
    pub success_count: u64,
    pub error_count: u64,
}

impl Measurement {
    /// Mean duration of successful fetches, if any succeeded
    pub fn average(&self) -> Option<Duration> {
        if self.success_count == 0 {
            return None;
        }
        let nanos = self.total_time.as_nanos() / u128::from(self.success_count);
        Some(nanos_to_duration(nanos))
    }

    /// Fraction of attempts that failed
    pub fn error_rate(&self) -> f64 {
        let attempts = self.success_count + self.error_count;
        if attempts == 0 {
            return 0.0;
        }
        self.error_count as f64 / attempts as f64
    }

    /// `average * (1 + penalty * error_rate)`, or zero with no recorded successes.
    ///
    /// Computed in integer nanoseconds so that equal histories always produce
    /// equal scores.
    fn score(&self, penalty: u32) -> Duration {
        let Some(average) = self.average() else {
            return Duration::ZERO;
        };
        let attempts = u128::from(self.success_count + self.error_count);
        let weighted = attempts + u128::from(penalty) * u128::from(self.error_count);
        nanos_to_duration(average.as_nanos() * weighted / attempts)
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);
    Duration::from_nanos(nanos)
}

/// Per-peer diagnostic row, best peer first in [`PerformanceModel::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStats {
    pub peer: PeerID,
    pub successes: u64,
    pub errors: u64,
    pub error_rate: f64,
    #[serde(with = "duration_millis_opt")]
    pub average: Option<Duration>,
    #[serde(with = "duration_millis")]
    pub score: Duration,
}

/// Shared performance model.
pub struct PerformanceModel {
    measurements: RwLock<HashMap<PeerID, Measurement>>,
    error_penalty: u32,
}

impl PerformanceModel {
    pub fn new() -> Self {
        Self::with_error_penalty(DEFAULT_ERROR_PENALTY)
    }

    /// Create a model with a custom error-rate multiplier.
    pub fn with_error_penalty(error_penalty: u32) -> Self {
        Self {
            measurements: RwLock::new(HashMap::new()),
            error_penalty,
        }
    }

    pub fn error_penalty(&self) -> u32 {
        self.error_penalty
    }

    /// Record the outcome of one fetch attempt.
    ///
    /// The duration of a failed attempt is discarded so timeouts do not skew
    /// the latency average.
    pub fn record<E>(&self, peer: &str, duration: Duration, outcome: Result<(), E>) {
        let mut map = self.measurements.write();
        let entry = map.entry(peer.to_string()).or_default();
        match outcome {
            Ok(()) => {
                entry.total_time += duration;
                entry.success_count += 1;
            }
            Err(_) => entry.error_count += 1,
        }
    }

    /// Score a peer; lower is better and never-successful peers score zero.
    pub fn score(&self, peer: &str) -> Duration {
        self.measurements
            .read()
            .get(peer)
            .map(|m| m.score(self.error_penalty))
            .unwrap_or(Duration::ZERO)
    }

    /// Current measurement for a peer, if it has ever been recorded
    pub fn measurement(&self, peer: &str) -> Option<Measurement> {
        self.measurements.read().get(peer).copied()
    }

    /// Sort candidates ascending by score under one read lock.
    ///
    /// The sort is stable, so equally scored candidates keep their input order.
    pub fn rank<T, F>(&self, candidates: &mut [T], peer_of: F)
    where
        F: Fn(&T) -> &str,
    {
        let map = self.measurements.read();
        let score = |peer: &str| {
            map.get(peer)
                .map(|m| m.score(self.error_penalty))
                .unwrap_or(Duration::ZERO)
        };
        candidates.sort_by_cached_key(|c| score(peer_of(c)));
    }

    /// Diagnostic view of every recorded peer, best first.
    pub fn snapshot(&self) -> Vec<PeerStats> {
        let map = self.measurements.read();
        let mut rows: Vec<PeerStats> = map
            .iter()
            .map(|(peer, m)| PeerStats {
                peer: peer.clone(),
                successes: m.success_count,
                errors: m.error_count,
                error_rate: m.error_rate(),
                average: m.average(),
                score: m.score(self.error_penalty),
            })
            .collect();
        rows.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.peer.cmp(&b.peer)));
        rows
    }
}

impl Default for PerformanceModel {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }
}

mod duration_millis_opt {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_secs_f64() * 1000.0)),
            None => serializer.serialize_none(),
        }
    }
}
