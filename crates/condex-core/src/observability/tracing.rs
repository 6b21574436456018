//! Trace spans around evaluations and compilations

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
}

impl SpanContext {
    pub fn new(trace_id: String, span_id: String) -> Self {
        Self {
            trace_id,
            span_id,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: String) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// One traced operation. The operation name is the condition type id.
#[derive(Debug, Clone)]
pub struct Span {
    pub context: SpanContext,
    pub operation: String,
    pub start_time: Instant,
    pub end_time: Option<Instant>,
    pub attributes: BTreeMap<String, String>,
}

impl Span {
    pub fn new(context: SpanContext, operation: impl Into<String>) -> Self {
        Self {
            context,
            operation: operation.into(),
            start_time: Instant::now(),
            end_time: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn end(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end.duration_since(self.start_time))
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Span factory and sink
pub trait Tracer: Send + Sync {
    fn start_span(&self, operation: &str) -> Span;

    fn start_child_span(&self, parent: &Span, operation: &str) -> Span;

    fn record_span(&self, span: Span);
}

/// Finished spans an `InMemoryTracer` keeps by default
pub const DEFAULT_SPAN_CAPACITY: usize = 10_000;

/// Tracer that keeps the most recent finished spans in memory
#[derive(Debug)]
pub struct InMemoryTracer {
    trace_ids: AtomicU64,
    span_ids: AtomicU64,
    capacity: usize,
    dropped: AtomicU64,
    spans: Mutex<VecDeque<Span>>,
}

impl Default for InMemoryTracer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SPAN_CAPACITY)
    }
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` spans; the oldest are evicted first
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trace_ids: AtomicU64::new(0),
            span_ids: AtomicU64::new(0),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            spans: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Spans evicted to stay within capacity
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, VecDeque<Span>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retained spans, oldest first
    pub fn spans(&self) -> Vec<Span> {
        self.guard().iter().cloned().collect()
    }

    /// Recorded spans for one operation name
    pub fn spans_for(&self, operation: &str) -> Vec<Span> {
        self.guard()
            .iter()
            .filter(|s| s.operation == operation)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    fn next_trace_id(&self) -> String {
        format!("trace-{:016x}", self.trace_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn next_span_id(&self) -> String {
        format!("span-{:016x}", self.span_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, operation: &str) -> Span {
        Span::new(
            SpanContext::new(self.next_trace_id(), self.next_span_id()),
            operation,
        )
    }

    fn start_child_span(&self, parent: &Span, operation: &str) -> Span {
        let context = SpanContext::new(parent.context.trace_id.clone(), self.next_span_id())
            .with_parent(parent.context.span_id.clone());
        Span::new(context, operation)
    }

    fn record_span(&self, span: Span) {
        let mut spans = self.guard();
        if spans.len() == self.capacity {
            spans.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        spans.push_back(span);
    }
}
