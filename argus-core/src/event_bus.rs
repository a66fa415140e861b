//! # Event Bus — platform-wide notification backbone
//!
//! Typed publish/subscribe routing between platform components. Events flow
//! as: Scan → Reconcile → Workflow → Ticket, with Health interleaved.
//! Subscribers register a callback with optional category / minimum-severity /
//! tag filters; the recent-event log is bounded and prunes oldest-first.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum events held before the oldest are pruned.
const MAX_EVENT_LOG: usize = 50_000;
/// Maximum concurrent subscribers.
const MAX_SUBSCRIBERS: usize = 128;

// ── Event Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventSeverity { Info, Low, Medium, High, Critical }

/// The stage of the platform an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventCategory {
    /// Scan lifecycle: initiated, scanner reported, all scanners done
    Scan,
    /// Threat/ticket reconciliation outcomes
    Reconcile,
    /// Workflow cycle transitions
    Workflow,
    /// Ticket lifecycle changes
    Ticket,
    /// Component health
    Health,
}

/// An event flowing through the bus.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlatformEvent {
    /// Unique event ID (monotonic)
    pub id: u64,
    /// Unix timestamp (millis)
    pub timestamp_ms: i64,
    /// Component that emitted this event
    pub source: String,
    pub category: EventCategory,
    pub severity: EventSeverity,
    pub title: String,
    /// Structured detail payload (JSON-compatible)
    pub details: HashMap<String, String>,
    /// Tags for filtering (e.g. artifact id, project id)
    pub tags: Vec<String>,
}

pub type SubscriberFn = Arc<dyn Fn(&PlatformEvent) + Send + Sync>;

struct Subscription {
    id: u64,
    name: String,
    filter_category: Option<EventCategory>,
    filter_severity_min: Option<EventSeverity>,
    callback: SubscriberFn,
}

// ── Event Bus ────────────────────────────────────────────────────────────────

pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    event_log: RwLock<Vec<PlatformEvent>>,
    next_event_id: AtomicU64,
    next_sub_id: AtomicU64,
    total_published: AtomicU64,
    total_delivered: AtomicU64,
    total_dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            event_log: RwLock::new(Vec::with_capacity(1024)),
            next_event_id: AtomicU64::new(1),
            next_sub_id: AtomicU64::new(1),
            total_published: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    // ── Publishing ───────────────────────────────────────────────────────

    /// Publish a raw event. Returns the assigned event ID.
    pub fn publish(&self, mut event: PlatformEvent) -> u64 {
        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        event.id = id;
        if event.timestamp_ms == 0 {
            event.timestamp_ms = chrono::Utc::now().timestamp_millis();
        }
        self.total_published.fetch_add(1, Ordering::Relaxed);

        debug!(
            id = id,
            src = %event.source,
            cat = ?event.category,
            sev = ?event.severity,
            title = %event.title,
            "Event published"
        );

        let subs = self.subscriptions.read();
        for sub in subs.iter() {
            if Self::matches_filter(sub, &event) {
                (sub.callback)(&event);
                self.total_delivered.fetch_add(1, Ordering::Relaxed);
            }
        }
        drop(subs);

        let mut log = self.event_log.write();
        if log.len() >= MAX_EVENT_LOG {
            let drain_count = MAX_EVENT_LOG / 10;
            log.drain(..drain_count);
            self.total_dropped.fetch_add(drain_count as u64, Ordering::Relaxed);
        }
        log.push(event);

        id
    }

    /// Convenience: publish an event for a component without building the
    /// struct at every call site.
    pub fn emit(
        &self,
        source: &str,
        category: EventCategory,
        severity: EventSeverity,
        title: &str,
        details: HashMap<String, String>,
        tags: Vec<String>,
    ) -> u64 {
        self.publish(PlatformEvent {
            id: 0,
            timestamp_ms: 0,
            source: source.into(),
            category,
            severity,
            title: title.into(),
            details,
            tags,
        })
    }

    // ── Subscribing ──────────────────────────────────────────────────────

    /// Subscribe to events. Returns a subscription ID for later unsubscribe.
    pub fn subscribe(
        &self,
        name: &str,
        filter_category: Option<EventCategory>,
        filter_severity_min: Option<EventSeverity>,
        callback: SubscriberFn,
    ) -> u64 {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscriptions.write();
        if subs.len() >= MAX_SUBSCRIBERS {
            warn!(name = %name, "Max subscribers reached, dropping oldest");
            subs.remove(0);
        }
        subs.push(Subscription { id, name: name.into(), filter_category, filter_severity_min, callback });
        id
    }

    pub fn unsubscribe(&self, sub_id: u64) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != sub_id);
        subs.len() < before
    }

    // ── Querying ─────────────────────────────────────────────────────────

    /// Most recent events (up to `limit`), optionally filtered by category.
    pub fn recent_events(&self, limit: usize, category: Option<EventCategory>) -> Vec<PlatformEvent> {
        let log = self.event_log.read();
        log.iter()
            .rev()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .take(limit)
            .cloned()
            .collect()
    }

    fn matches_filter(sub: &Subscription, event: &PlatformEvent) -> bool {
        if let Some(cat) = sub.filter_category {
            if event.category != cat {
                return false;
            }
        }
        if let Some(min) = sub.filter_severity_min {
            if event.severity < min {
                return false;
            }
        }
        true
    }

    pub fn total_published(&self) -> u64 { self.total_published.load(Ordering::Relaxed) }
    pub fn total_delivered(&self) -> u64 { self.total_delivered.load(Ordering::Relaxed) }
    pub fn total_dropped(&self) -> u64 { self.total_dropped.load(Ordering::Relaxed) }
}
