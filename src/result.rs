use crate::util;
use serde::{Deserialize, Serialize};

/// One scored response. Created once per tick and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickResult {
    pub index: usize,
    pub number: u32,
    /// The subject's claim matched the ground truth
    pub was_correct: bool,
    pub was_target: bool,
    /// Recorded without an explicit judgment (a "next" action or a timeout)
    pub was_forced: bool,
    pub elapsed_since_start_ms: u64,
    pub elapsed_since_number_shown_ms: u64,
}

impl TickResult {
    /// What the subject claimed, recovered from correctness and ground truth
    pub fn claimed_target(&self) -> bool {
        self.was_correct == self.was_target
    }
}

/// Append-only record of results in the order they were scored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultLog {
    results: Vec<TickResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, result: TickResult) {
        self.results.push(result);
    }

    pub fn all(&self) -> &[TickResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn last(&self) -> Option<&TickResult> {
        self.results.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TickResult> {
        self.results.iter()
    }

    /// Derived counts and latency figures, recomputed on every call
    pub fn summary_stats(&self) -> SummaryStats {
        let mut stats = SummaryStats {
            total: self.results.len(),
            ..SummaryStats::default()
        };
        let mut latencies = Vec::with_capacity(self.results.len());

        for r in &self.results {
            if r.was_correct {
                stats.correct += 1;
            } else {
                stats.incorrect += 1;
            }
            if r.was_forced {
                stats.forced += 1;
            } else {
                latencies.push(r.elapsed_since_number_shown_ms);
            }
            match (r.was_target, r.claimed_target()) {
                (true, true) => stats.hits += 1,
                (true, false) => stats.misses += 1,
                (false, true) => stats.false_alarms += 1,
                (false, false) => stats.correct_rejections += 1,
            }
        }

        stats.targets = stats.hits + stats.misses;
        stats.mean_latency_ms = util::mean(&latencies);
        stats.latency_std_dev_ms = util::std_dev(&latencies);
        stats.accuracy_pct = util::percentage(stats.correct, stats.total);
        stats
    }
}

impl<'a> IntoIterator for &'a ResultLog {
    type Item = &'a TickResult;
    type IntoIter = std::slice::Iter<'a, TickResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Latency figures only cover responses the subject actually gave; forced
/// results carry no reaction time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryStats {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub targets: usize,
    pub hits: usize,
    pub misses: usize,
    pub false_alarms: usize,
    pub correct_rejections: usize,
    pub forced: usize,
    pub mean_latency_ms: Option<f64>,
    pub latency_std_dev_ms: Option<f64>,
    pub accuracy_pct: Option<f64>,
}
