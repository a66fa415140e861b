//! Threat Reconciler — diffs merged scan findings against linked threats.
//!
//! Two passes, in this order, so a vulnerability that persists across a
//! rescan is never transiently flagged as resolved:
//! 1. New-vulnerability pass: findings whose CVE id was not in the previous
//!    confirmed list get a threat (reused by name when one exists anywhere
//!    in the registry, otherwise classified and created) and, when newly
//!    linked to the artifact, exactly one auto-created ticket.
//! 2. Existing-threat pass over the threat list as it stood before pass 1:
//!    threats still matched by a current finding get their tickets moved to
//!    Processing; threats with no matching finding get their tickets
//!    Resolved and are unlinked from the artifact. Threat and ticket rows
//!    are kept for audit, never deleted here.
//!
//! Afterwards the confirmed list is replaced by the merged findings, a
//! scan-history entry is recorded, and the workflow engine is nudged through
//! steps 1–3 with idempotent advance attempts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use argus_core::event_bus::{EventBus, EventCategory, EventSeverity};
use argus_core::store::DocumentStore;
use argus_core::stride::ClassifierConfig;
use argus_core::ArgusResult;

use crate::classifier::classify;
use crate::cycle_engine::WorkflowEngine;
use crate::threats::{Threat, ThreatStatus, ThreatStore};
use crate::tickets::TicketCollaborator;
use crate::types::{Artifact, ScanRecord, SecurityState, WorkflowStep};

/// Scan-history entries kept per artifact before the oldest are dropped.
const MAX_SCAN_HISTORY: usize = 100;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ReconcileSummary {
    pub vulnerabilities: usize,
    pub new_threats: usize,
    pub reused_threats: usize,
    pub resolved_threats: usize,
    pub tickets_opened: usize,
}

pub struct ThreatReconciler {
    artifacts: Arc<DocumentStore<Artifact>>,
    threats: Arc<ThreatStore>,
    tickets: Arc<dyn TicketCollaborator>,
    engine: Arc<WorkflowEngine>,
    config: Arc<ClassifierConfig>,
    bus: Arc<EventBus>,
    total_reconciliations: AtomicU64,
    total_threats_created: AtomicU64,
    total_threats_resolved: AtomicU64,
}

impl ThreatReconciler {
    pub fn new(
        artifacts: Arc<DocumentStore<Artifact>>,
        threats: Arc<ThreatStore>,
        tickets: Arc<dyn TicketCollaborator>,
        engine: Arc<WorkflowEngine>,
        config: Arc<ClassifierConfig>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            artifacts,
            threats,
            tickets,
            engine,
            config,
            bus,
            total_reconciliations: AtomicU64::new(0),
            total_threats_created: AtomicU64::new(0),
            total_threats_resolved: AtomicU64::new(0),
        }
    }

    /// Reconcile the artifact's staged findings into its threat/ticket
    /// state. Exactly one reconciliation runs per artifact at a time; the
    /// aggregator's completion gate trips once per scan window.
    pub fn reconcile(&self, artifact_id: &str) -> ArgusResult<ReconcileSummary> {
        let snapshot = self.artifacts.fetch(artifact_id)?;
        let pending = snapshot.temp_vuls.clone();
        let prior_threats = snapshot.threat_list.clone();

        let mut summary = ReconcileSummary {
            vulnerabilities: pending.len(),
            ..ReconcileSummary::default()
        };

        // Pass 1: threats and tickets for findings new to this artifact.
        let mut new_links: Vec<String> = Vec::new();
        for vuln in &pending {
            if snapshot.has_vulnerability(&vuln.cve_id) {
                continue;
            }
            let threat = match self.threats.get(&vuln.cve_id) {
                Some(existing) => {
                    summary.reused_threats += 1;
                    existing
                }
                None => {
                    let classification = classify(vuln, &self.config);
                    let threat = Threat::from_vulnerability(vuln, &classification);
                    debug!(
                        cve = %vuln.cve_id,
                        category = threat.category.label(),
                        confidence = classification.confidence,
                        "Threat classified"
                    );
                    self.threats.save(threat.clone());
                    self.total_threats_created.fetch_add(1, Ordering::Relaxed);
                    summary.new_threats += 1;
                    threat
                }
            };

            let already_linked = prior_threats.iter().any(|n| *n == threat.name)
                || new_links.iter().any(|n| *n == threat.name);
            if !already_linked {
                new_links.push(threat.name.clone());
                self.tickets.create_for_threat(&threat, &snapshot);
                summary.tickets_opened += 1;
            }
        }

        // Pass 2: reconcile the threats that were linked before this scan.
        let mut removals: Vec<String> = Vec::new();
        for name in &prior_threats {
            let still_present = pending.iter().any(|v| v.cve_id == *name);
            if still_present {
                // Finding persists (or reappeared): remediation is not done.
                self.tickets.set_threat_resolved(artifact_id, name, false);
                if let Err(e) = self.threats.set_status(name, ThreatStatus::NonMitigated) {
                    warn!(threat = %name, error = %e, "Could not update persisting threat");
                }
            } else {
                self.tickets.set_threat_resolved(artifact_id, name, true);
                if let Err(e) = self.threats.set_status(name, ThreatStatus::FullyMitigated) {
                    warn!(threat = %name, error = %e, "Could not update resolved threat");
                }
                removals.push(name.clone());
                self.total_threats_resolved.fetch_add(1, Ordering::Relaxed);
                summary.resolved_threats += 1;
            }
        }

        // Commit the new confirmed state; staging is cleared only now that
        // every side effect above has succeeded.
        let now = chrono::Utc::now().timestamp();
        self.artifacts.update(artifact_id, |a| {
            for name in &new_links {
                if !a.has_threat(name) {
                    a.threat_list.push(name.clone());
                }
            }
            a.threat_list.retain(|n| !removals.contains(n));

            if a.scan_history.len() >= MAX_SCAN_HISTORY {
                a.scan_history.remove(0);
            }
            a.scan_history.push(ScanRecord { timestamp: now, vulnerabilities: pending.clone() });
            a.vulnerability_list = pending;
            a.temp_vuls.clear();
            a.state = if a.vulnerability_list.is_empty() {
                SecurityState::S3
            } else {
                SecurityState::S1
            };
        })?;

        self.total_reconciliations.fetch_add(1, Ordering::Relaxed);
        info!(
            artifact = %artifact_id,
            vulns = summary.vulnerabilities,
            new_threats = summary.new_threats,
            resolved = summary.resolved_threats,
            "Reconciliation complete"
        );
        self.bus.emit(
            "threat_reconciler",
            EventCategory::Reconcile,
            if summary.new_threats > 0 { EventSeverity::Medium } else { EventSeverity::Info },
            "Scan reconciled",
            HashMap::from([
                ("vulnerabilities".to_string(), summary.vulnerabilities.to_string()),
                ("new_threats".to_string(), summary.new_threats.to_string()),
                ("resolved_threats".to_string(), summary.resolved_threats.to_string()),
            ]),
            vec![artifact_id.to_string()],
        );

        // Nudge the workflow forward. Each call no-ops unless its step is
        // live and satisfied.
        for step in [WorkflowStep::Detection, WorkflowStep::Classification, WorkflowStep::Assignment] {
            self.engine.update_status(artifact_id, step)?;
        }

        Ok(summary)
    }

    pub fn total_reconciliations(&self) -> u64 { self.total_reconciliations.load(Ordering::Relaxed) }
    pub fn total_threats_created(&self) -> u64 { self.total_threats_created.load(Ordering::Relaxed) }
    pub fn total_threats_resolved(&self) -> u64 { self.total_threats_resolved.load(Ordering::Relaxed) }
}
