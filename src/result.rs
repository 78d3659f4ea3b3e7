//! Outcome of a proxy check.

use serde::Serialize;

use crate::proxy::ProxyEndpoint;
use crate::stats::{self, LatencyStats, Quality, Sample};

/// Verdict and latency statistics for one phase of the check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub quality: Quality,
    #[serde(flatten)]
    pub stats: LatencyStats,
    /// One sample per attempt slot, in attempt order.
    #[serde(skip)]
    pub samples: Vec<Sample>,
}

impl PhaseReport {
    /// Derive the verdict and statistics from the per-slot samples.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let successes = count_successes(&samples);
        Self {
            quality: stats::classify(successes, samples.len()),
            stats: stats::aggregate(&samples),
            samples,
        }
    }

    /// Number of attempt slots that produced a measurement.
    pub fn successes(&self) -> usize {
        count_successes(&self.samples)
    }
}

fn count_successes(samples: &[Sample]) -> usize {
    samples.iter().filter(|s| !s.is_failed()).count()
}

/// Result of checking one proxy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyCheckResult {
    /// The endpoint as given by the caller.
    pub proxy: ProxyEndpoint,
    /// The URL requested through the proxy.
    pub url: String,
    /// Reaching the proxy.
    pub connection: PhaseReport,
    /// Getting a full response through it.
    pub response: PhaseReport,
}
