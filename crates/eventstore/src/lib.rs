//! The event store: FIFO dispatch queues plus append-only topic
//! streams that replicate into one globally ordered timeline.
//!
//! This is the in-memory backend. A Redis-streams backend could
//! implement the same shape (cursors would then be Redis entry IDs
//! instead of a local counter) without changing any caller — nothing
//! here assumes the counter is process-local other than the format of
//! the cursor string.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Width of a cursor string: `u64::MAX` is 20 decimal digits, so
/// zero-padding to 20 makes lexicographic order match numeric order
/// for every representable value.
const CURSOR_WIDTH: usize = 20;

fn render_cursor(seq: u64) -> String {
    format!("{seq:0width$}", width = CURSOR_WIDTH)
}

/// A structured record appended to a topic stream and replicated into
/// the global timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicEvent {
    pub topic: String,
    pub room_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    /// Monotonic sequence number within `stream`.
    pub sequence: u64,
    pub stream: String,
    /// Opaque, lexicographically ordered position in the global
    /// timeline.
    pub cursor: String,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, VecDeque<Value>>,
    streams: HashMap<String, Vec<TopicEvent>>,
    stream_seq: HashMap<String, u64>,
    timeline: Vec<TopicEvent>,
    timeline_seq: u64,
}

pub struct EventStore {
    inner: Mutex<Inner>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Push a dispatch item onto the queue named `key` (by
    /// convention prefixed `turn:`).
    pub fn push_queue(&self, key: &str, payload: Value) {
        let mut inner = self.inner.lock();
        inner.queues.entry(key.to_string()).or_default().push_back(payload);
    }

    /// Pop the oldest item from `key`, or `None` if empty.
    pub fn pop_queue(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        inner.queues.get_mut(key).and_then(|q| q.pop_front())
    }

    pub fn list_queue(&self, key: &str) -> Vec<Value> {
        let inner = self.inner.lock();
        inner
            .queues
            .get(key)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append `payload` under `topic` to `stream`, replicating the
    /// resulting event into the global timeline. Returns the
    /// augmented event (with its per-stream sequence and timeline
    /// cursor filled in).
    pub fn append_stream(
        &self,
        stream: &str,
        topic: &str,
        room_id: Uuid,
        payload: Value,
    ) -> TopicEvent {
        let mut inner = self.inner.lock();
        let seq_counter = inner.stream_seq.entry(stream.to_string()).or_insert(0);
        *seq_counter += 1;
        let sequence = *seq_counter;

        inner.timeline_seq += 1;
        let cursor = render_cursor(inner.timeline_seq);

        let event = TopicEvent {
            topic: topic.to_string(),
            room_id,
            timestamp: Utc::now(),
            payload,
            sequence,
            stream: stream.to_string(),
            cursor,
        };

        inner
            .streams
            .entry(stream.to_string())
            .or_default()
            .push(event.clone());
        inner.timeline.push(event.clone());
        event
    }

    pub fn list_stream(&self, stream: &str) -> Vec<TopicEvent> {
        let inner = self.inner.lock();
        inner.streams.get(stream).cloned().unwrap_or_default()
    }

    /// The first timeline event strictly after `cursor`, or the very
    /// first event if `cursor` is `None`.
    pub fn next_timeline_event(&self, cursor: Option<&str>) -> Option<TopicEvent> {
        let inner = self.inner.lock();
        match cursor {
            None => inner.timeline.first().cloned(),
            Some(c) => inner
                .timeline
                .iter()
                .find(|e| e.cursor.as_str() > c)
                .cloned(),
        }
    }

    /// Up to `limit` timeline events strictly after `cursor` (or from
    /// the start, if `cursor` is `None`).
    pub fn list_timeline(&self, cursor: Option<&str>, limit: usize) -> Vec<TopicEvent> {
        let inner = self.inner.lock();
        inner
            .timeline
            .iter()
            .filter(|e| cursor.map(|c| e.cursor.as_str() > c).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}
