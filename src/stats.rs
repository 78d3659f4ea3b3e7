//! Latency aggregation and quality classification.

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Timestamps of one successful connect + request cycle, both measured from
/// the same start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    /// Until the proxy side transport was ready to carry the request.
    pub connection: Duration,
    /// Until the full response body arrived.
    pub response: Duration,
}

/// Outcome of one attempt slot for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// Latency of the try that succeeded.
    Measured(Duration),
    /// Every try in the slot failed.
    Failed,
}

impl Sample {
    /// The measured latency, `None` for a failed slot.
    pub fn measured(&self) -> Option<Duration> {
        match self {
            Sample::Measured(latency) => Some(*latency),
            Sample::Failed => None,
        }
    }

    /// Whether every try in the slot failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Sample::Failed)
    }
}

/// How consistently the attempt slots succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    /// Every slot succeeded.
    Stable,
    /// Some, but not all, slots succeeded.
    Unstable,
    /// No slot succeeded.
    None,
}

/// Average and extrema over the successful samples.
///
/// All three fields are `None` when no sample succeeded; they are `Some`
/// together otherwise. Serialized as milliseconds, or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LatencyStats {
    #[serde(rename = "latency", serialize_with = "as_millis")]
    pub average: Option<Duration>,
    #[serde(rename = "latencyMin", serialize_with = "as_millis")]
    pub min: Option<Duration>,
    #[serde(rename = "latencyMax", serialize_with = "as_millis")]
    pub max: Option<Duration>,
}

impl LatencyStats {
    /// Whether no sample succeeded.
    pub fn is_failed(&self) -> bool {
        self.average.is_none()
    }
}

/// Reduce samples to average, min and max, ignoring failed ones.
pub fn aggregate(samples: &[Sample]) -> LatencyStats {
    let measured: Vec<Duration> = samples.iter().filter_map(Sample::measured).collect();

    let (Some(min), Some(max)) = (measured.iter().min(), measured.iter().max()) else {
        return LatencyStats::default();
    };
    let total: Duration = measured.iter().sum();

    LatencyStats {
        average: Some(total / measured.len() as u32),
        min: Some(*min),
        max: Some(*max),
    }
}

/// Classify a success count against the number of attempt slots.
pub fn classify(successes: usize, attempts: usize) -> Quality {
    if successes == attempts {
        Quality::Stable
    } else if successes > 0 {
        Quality::Unstable
    } else {
        Quality::None
    }
}

fn as_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(latency) => serializer.serialize_some(&(latency.as_secs_f64() * 1000.0)),
        None => serializer.serialize_none(),
    }
}
