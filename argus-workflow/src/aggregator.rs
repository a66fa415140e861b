//! Scan Result Aggregator — fan-in barrier for concurrent scanner results.
//!
//! An unknown number of scanners run against one artifact; each completion
//! callback lands here. The merge-then-increment happens as one serialized
//! update on the artifact document, so two scanners finishing in the same
//! millisecond cannot lose each other's findings. The completion gate
//! (`scanners_completed >= total_scanners`) trips inside that same update:
//! exactly one submission observes it, resets the scanning flags, and hands
//! the accumulated staging set to the reconciler. Staging is only cleared
//! once reconciliation has consumed it, and the scanning flags are already
//! down before reconciliation starts, so a reconciliation failure can never
//! leave an artifact stuck mid-scan.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use argus_core::event_bus::{EventBus, EventCategory, EventSeverity};
use argus_core::store::DocumentStore;
use argus_core::{ArgusError, ArgusResult};

use crate::reconciler::{ReconcileSummary, ThreatReconciler};
use crate::types::{Artifact, Vulnerability};

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// More scanners outstanding.
    Accumulated { scanners_completed: u32, total_scanners: u32 },
    /// This submission was the last one; findings were reconciled.
    Finalized { summary: ReconcileSummary },
}

struct MergeState {
    done: bool,
    completed: u32,
    total: u32,
    added: usize,
    duplicates: usize,
}

pub struct ScanAggregator {
    artifacts: Arc<DocumentStore<Artifact>>,
    reconciler: Arc<ThreatReconciler>,
    bus: Arc<EventBus>,
    total_scans_started: AtomicU64,
    total_submissions: AtomicU64,
    total_finalized: AtomicU64,
    duplicates_dropped: AtomicU64,
}

impl ScanAggregator {
    pub fn new(
        artifacts: Arc<DocumentStore<Artifact>>,
        reconciler: Arc<ThreatReconciler>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            artifacts,
            reconciler,
            bus,
            total_scans_started: AtomicU64::new(0),
            total_submissions: AtomicU64::new(0),
            total_finalized: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
        }
    }

    /// Open a scan window expecting `total_scanners` result submissions.
    /// Re-invocation while a scan is in flight resets the window (counters
    /// zeroed, staging cleared) and is logged; it is the recovery path for a
    /// scanner set that died mid-scan.
    pub fn begin_scan(&self, artifact_id: &str, total_scanners: u32) -> ArgusResult<()> {
        if total_scanners == 0 {
            return Err(ArgusError::Validation(
                "begin_scan requires at least one scanner".into(),
            ));
        }
        self.artifacts.update(artifact_id, |a| {
            if a.is_scanning {
                warn!(
                    artifact = %a.artifact_id,
                    completed = a.scanners_completed,
                    total = a.total_scanners,
                    "begin_scan while already scanning; resetting scan window"
                );
            }
            a.is_scanning = true;
            a.scanners_completed = 0;
            a.total_scanners = total_scanners;
            a.temp_vuls.clear();
        })?;
        self.total_scans_started.fetch_add(1, Ordering::Relaxed);
        info!(artifact = %artifact_id, scanners = total_scanners, "Scan initiated");
        self.bus.emit(
            "scan_aggregator",
            EventCategory::Scan,
            EventSeverity::Info,
            "Scan initiated",
            HashMap::from([("scanners".to_string(), total_scanners.to_string())]),
            vec![artifact_id.to_string()],
        );
        Ok(())
    }

    /// Merge one scanner's results and count it toward the completion gate.
    /// First-seen wins on duplicate CVE ids; a later scanner reporting the
    /// same CVE is dropped, not merged field-by-field.
    pub fn submit_scanner_result(
        &self,
        artifact_id: &str,
        vulnerabilities: Vec<Vulnerability>,
    ) -> ArgusResult<ScanOutcome> {
        self.total_submissions.fetch_add(1, Ordering::Relaxed);

        let state = self.artifacts.update(artifact_id, |a| {
            if !a.is_scanning {
                return Err(ArgusError::Validation(format!(
                    "no scan in progress for artifact '{}'",
                    a.artifact_id
                )));
            }
            let mut added = 0;
            let mut duplicates = 0;
            for v in vulnerabilities {
                if a.temp_vuls.iter().any(|e| e.cve_id == v.cve_id) {
                    duplicates += 1;
                } else {
                    a.temp_vuls.push(v);
                    added += 1;
                }
            }
            a.scanners_completed = (a.scanners_completed + 1).min(a.total_scanners);
            let done = a.scanners_completed >= a.total_scanners;
            let state = MergeState {
                done,
                completed: a.scanners_completed,
                total: a.total_scanners,
                added,
                duplicates,
            };
            if done {
                // Gate tripped: scanning is over no matter what happens in
                // reconciliation. Staging stays until the reconciler takes it.
                a.is_scanning = false;
                a.scanners_completed = 0;
                a.total_scanners = 0;
            }
            Ok(state)
        })??;

        self.duplicates_dropped.fetch_add(state.duplicates as u64, Ordering::Relaxed);
        debug!(
            artifact = %artifact_id,
            added = state.added,
            duplicates = state.duplicates,
            completed = state.completed,
            total = state.total,
            "Scanner result merged"
        );

        if !state.done {
            return Ok(ScanOutcome::Accumulated {
                scanners_completed: state.completed,
                total_scanners: state.total,
            });
        }

        self.total_finalized.fetch_add(1, Ordering::Relaxed);
        info!(artifact = %artifact_id, scanners = state.total, "All scanners reported, reconciling");
        self.bus.emit(
            "scan_aggregator",
            EventCategory::Scan,
            EventSeverity::Info,
            "All scanners reported",
            HashMap::from([("scanners".to_string(), state.total.to_string())]),
            vec![artifact_id.to_string()],
        );

        match self.reconciler.reconcile(artifact_id) {
            Ok(summary) => Ok(ScanOutcome::Finalized { summary }),
            Err(e) => {
                // is_scanning already forced false above; surface the error.
                error!(artifact = %artifact_id, error = %e, "Reconciliation failed after scan finalize");
                Err(e)
            }
        }
    }

    pub fn total_scans_started(&self) -> u64 { self.total_scans_started.load(Ordering::Relaxed) }
    pub fn total_submissions(&self) -> u64 { self.total_submissions.load(Ordering::Relaxed) }
    pub fn total_finalized(&self) -> u64 { self.total_finalized.load(Ordering::Relaxed) }
    pub fn duplicates_dropped(&self) -> u64 { self.duplicates_dropped.load(Ordering::Relaxed) }
}
