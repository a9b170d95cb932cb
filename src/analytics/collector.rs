//! Analytics event collection and batching

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{AnalyticsEvent, AnalyticsSink};
use crate::core::utils::generate_uuid;

/// Collector limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Events per batch
    pub batch_size: usize,
    /// Maximum buffered events before the oldest are dropped
    pub max_local_events: usize,
    /// Maximum batches waiting to be drained
    pub max_pending_batches: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_local_events: 500,
            max_pending_batches: 10,
        }
    }
}

/// A batch of analytics events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsBatch {
    pub batch_id: String,
    pub events: Vec<AnalyticsEvent>,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsBatch {
    fn new(events: Vec<AnalyticsEvent>) -> Self {
        Self {
            batch_id: generate_uuid().to_string(),
            events,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[derive(Default)]
struct CollectorState {
    events: VecDeque<AnalyticsEvent>,
    pending_batches: VecDeque<AnalyticsBatch>,
    event_count: usize,
}

/// Buffers events in memory and groups them into batches for a later drain
pub struct AnalyticsCollector {
    config: CollectorConfig,
    state: Mutex<CollectorState>,
}

impl AnalyticsCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CollectorState::default()),
        }
    }

    fn create_batch(&self, state: &mut CollectorState) {
        if state.events.is_empty() {
            return;
        }

        let take = self.config.batch_size.max(1).min(state.events.len());
        let events: Vec<AnalyticsEvent> = state.events.drain(..take).collect();
        state.pending_batches.push_back(AnalyticsBatch::new(events));

        while state.pending_batches.len() > self.config.max_pending_batches {
            state.pending_batches.pop_front();
        }
    }

    /// Close the current partial batch and hand back every pending batch
    pub fn drain_batches(&self) -> Vec<AnalyticsBatch> {
        let mut state = self.state.lock();
        while !state.events.is_empty() {
            self.create_batch(&mut state);
        }
        state.pending_batches.drain(..).collect()
    }

    /// Forward everything buffered to another sink
    pub fn flush_into(&self, sink: &dyn AnalyticsSink) -> usize {
        let mut sent = 0;
        for batch in self.drain_batches() {
            sent += batch.len();
            for event in batch.events {
                sink.track(event);
            }
        }
        tracing::debug!(sent, "Flushed analytics events");
        sent
    }

    /// Total events accepted since creation
    pub fn event_count(&self) -> usize {
        self.state.lock().event_count
    }

    /// Events buffered and not yet drained
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock();
        state.events.len() + state.pending_batches.iter().map(AnalyticsBatch::len).sum::<usize>()
    }

    /// Snapshot of buffered events with the given name
    pub fn events_named(&self, name: &str) -> Vec<AnalyticsEvent> {
        let state = self.state.lock();
        state
            .pending_batches
            .iter()
            .flat_map(|b| b.events.iter())
            .chain(state.events.iter())
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
}

impl Default for AnalyticsCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl AnalyticsSink for AnalyticsCollector {
    fn track(&self, event: AnalyticsEvent) {
        let mut state = self.state.lock();
        state.events.push_back(event);
        state.event_count += 1;

        while state.events.len() > self.config.max_local_events {
            state.events.pop_front();
        }

        if state.events.len() >= self.config.batch_size {
            self.create_batch(&mut state);
        }
    }
}
