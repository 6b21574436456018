//! Metrics collection

use dashmap::DashMap;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Monotonic counter
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicU64,
    labels: BTreeMap<String, String>,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Recent samples kept per histogram for percentiles
pub const DEFAULT_HISTOGRAM_SAMPLES: usize = 1024;

#[derive(Debug)]
struct HistogramState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    recent: VecDeque<f64>,
}

impl HistogramState {
    fn new(max_samples: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            recent: VecDeque::with_capacity(max_samples),
        }
    }
}

/// Distribution of observed values.
///
/// Count, sum, min and max cover every observation; percentiles are taken
/// over the most recent `max_samples` values only.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    max_samples: usize,
    state: Mutex<HistogramState>,
}

impl Histogram {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_max_samples(name, DEFAULT_HISTOGRAM_SAMPLES)
    }

    pub fn with_max_samples(name: impl Into<String>, max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            name: name.into(),
            max_samples,
            state: Mutex::new(HistogramState::new(max_samples)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HistogramState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn observe(&self, value: f64) {
        let mut state = self.state();
        state.count += 1;
        state.sum += value;
        state.min = state.min.min(value);
        state.max = state.max.max(value);
        if state.recent.len() == self.max_samples {
            state.recent.pop_front();
        }
        state.recent.push_back(value);
    }

    /// Observe a duration in seconds
    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64());
    }

    pub fn count(&self) -> u64 {
        self.state().count
    }

    pub fn sum(&self) -> f64 {
        self.state().sum
    }

    pub fn avg(&self) -> f64 {
        let state = self.state();
        if state.count == 0 {
            0.0
        } else {
            state.sum / state.count as f64
        }
    }

    /// Smallest observed value, 0 when nothing was observed
    pub fn min(&self) -> f64 {
        let state = self.state();
        if state.count == 0 {
            0.0
        } else {
            state.min
        }
    }

    /// Largest observed value, 0 when nothing was observed
    pub fn max(&self) -> f64 {
        let state = self.state();
        if state.count == 0 {
            0.0
        } else {
            state.max
        }
    }

    /// Number of values currently retained for percentiles
    pub fn retained(&self) -> usize {
        self.state().recent.len()
    }

    /// Nearest-rank percentile over the retained values, `p` in 0..=100
    pub fn percentile(&self, p: f64) -> f64 {
        let mut values: Vec<f64> = self.state().recent.iter().copied().collect();
        if values.is_empty() {
            return 0.0;
        }
        values.sort_by(f64::total_cmp);
        let index = ((p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f64).round() as usize;
        values[index]
    }

    pub fn reset(&self) {
        *self.state() = HistogramState::new(self.max_samples);
    }
}

/// Metrics sink
pub trait Metrics: Send + Sync {
    fn counter(&self, name: &str) -> Arc<Counter>;

    fn histogram(&self, name: &str) -> Arc<Histogram>;

    /// Record into the `<operation>_duration` histogram
    fn record_execution_time(&self, operation: &str, duration: Duration);

    /// Bump the `errors_<error_type>` counter
    fn record_error(&self, error_type: &str);
}

/// In-process metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: DashMap<String, Arc<Counter>>,
    histograms: DashMap<String, Arc<Histogram>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.counters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn histogram_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.histograms.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Current value of a counter, 0 when it was never touched
    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters.get(name).map(|c| c.get()).unwrap_or(0)
    }

    pub fn reset_all(&self) {
        for counter in self.counters.iter() {
            counter.reset();
        }
        for histogram in self.histograms.iter() {
            histogram.reset();
        }
    }
}

impl Metrics for MetricsCollector {
    fn counter(&self, name: &str) -> Arc<Counter> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::new(name)))
            .clone()
    }

    fn histogram(&self, name: &str) -> Arc<Histogram> {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new(name)))
            .clone()
    }

    fn record_execution_time(&self, operation: &str, duration: Duration) {
        self.histogram(&format!("{}_duration", operation))
            .observe_duration(duration);
    }

    fn record_error(&self, error_type: &str) {
        self.counter(&format!("errors_{}", error_type)).inc();
    }
}
