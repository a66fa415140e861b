//! # Document Store — per-document atomic state
//!
//! The single source of truth for root aggregates. Each document gets its own
//! mutex, so read-modify-write sequences for one document are serialized while
//! operations on different documents run fully in parallel. This is the
//! in-process equivalent of a database-level conditional update keyed by
//! document id: two triggers racing on the same artifact queue behind one
//! lock instead of overwriting each other.
//!
//! The outer map lock is held only long enough to fetch the per-document
//! handle, never across a caller's update closure.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ArgusError, ArgusResult};

pub struct DocumentStore<T> {
    kind: &'static str,
    docs: RwLock<HashMap<String, Arc<Mutex<T>>>>,
    total_reads: AtomicU64,
    total_updates: AtomicU64,
}

impl<T: Clone> DocumentStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            docs: RwLock::new(HashMap::new()),
            total_reads: AtomicU64::new(0),
            total_updates: AtomicU64::new(0),
        }
    }

    /// Insert or replace a document.
    pub fn insert(&self, id: impl Into<String>, doc: T) {
        let id = id.into();
        debug!(kind = self.kind, id = %id, "Document inserted");
        self.docs.write().insert(id, Arc::new(Mutex::new(doc)));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.read().contains_key(id)
    }

    /// Snapshot of a document by id.
    pub fn get(&self, id: &str) -> Option<T> {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        let handle = self.docs.read().get(id).cloned()?;
        let doc = handle.lock();
        Some(doc.clone())
    }

    /// Snapshot of a document, erroring when it does not exist.
    pub fn fetch(&self, id: &str) -> ArgusResult<T> {
        self.get(id).ok_or_else(|| ArgusError::not_found(self.kind, id))
    }

    /// Serialized read-modify-write on one document. The closure runs under
    /// the document's own mutex; concurrent updates to the same id queue,
    /// updates to other ids proceed in parallel.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> ArgusResult<R> {
        let handle = self
            .docs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ArgusError::not_found(self.kind, id))?;
        let mut doc = handle.lock();
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        Ok(f(&mut doc))
    }

    /// Remove a document, returning its final state.
    pub fn remove(&self, id: &str) -> Option<T> {
        let handle = self.docs.write().remove(id)?;
        debug!(kind = self.kind, id = %id, "Document removed");
        let doc = handle.lock();
        Some(doc.clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs.read().keys().cloned().collect()
    }

    /// Snapshots of all documents matching a predicate.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let handles: Vec<Arc<Mutex<T>>> = self.docs.read().values().cloned().collect();
        handles
            .iter()
            .filter_map(|h| {
                let doc = h.lock();
                if pred(&doc) {
                    Some(doc.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    pub fn total_reads(&self) -> u64 { self.total_reads.load(Ordering::Relaxed) }
    pub fn total_updates(&self) -> u64 { self.total_updates.load(Ordering::Relaxed) }
}
