//! Workflow Cycle Engine — per-artifact five-step remediation state machine.
//!
//! Steps: 1 Detection → 2 Classification → 3 Assignment → 4 Remediation →
//! 5 Verification, then either a fresh cycle (unresolved work remains) or
//! workflow termination. There is no scheduler loop; external triggers
//! (scan finalization, ticket status changes) call `update_status` and each
//! step's check decides from persisted state whether its condition currently
//! holds. Every check is idempotent: premature, stale or repeated calls
//! no-op, so at-least-once triggering converges without transactional
//! delivery.
//!
//! Consistency: the live cycle is stored twice, as `current_cycle` and as the
//! same-numbered entry of the `cycles` log. Divergence between the two is
//! repaired in favor of `current_cycle` before any step logic runs, logged
//! as a warning and counted, never surfaced to the caller.
//!
//! Every transition lands in an LZ4-compressed audit trail.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use argus_core::compression;
use argus_core::event_bus::{EventBus, EventCategory, EventSeverity};
use argus_core::store::DocumentStore;
use argus_core::ArgusResult;

use crate::tickets::{TicketCollaborator, TicketStatus};
use crate::types::{Artifact, WorkflowCycle, WorkflowStep};

const MAX_AUDIT_RECORDS: usize = 10_000;

/// What a step check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Redundant or premature call (wrong step, or workflow already done).
    NoOp,
    /// The step's completion condition does not hold yet. Steps that
    /// snapshot counts on every call (Assignment, Remediation) have still
    /// refreshed their records.
    Waiting,
    Advanced(WorkflowStep),
    /// Verification looped into a new cycle with this number.
    CycleRestarted(u32),
    WorkflowCompleted,
}

pub struct WorkflowEngine {
    artifacts: Arc<DocumentStore<Artifact>>,
    tickets: Arc<dyn TicketCollaborator>,
    bus: Arc<EventBus>,
    compressed_audit: RwLock<Vec<Vec<u8>>>,
    total_transitions: AtomicU64,
    total_cycles_started: AtomicU64,
    total_workflows_completed: AtomicU64,
    consistency_heals: AtomicU64,
}

impl WorkflowEngine {
    pub fn new(
        artifacts: Arc<DocumentStore<Artifact>>,
        tickets: Arc<dyn TicketCollaborator>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            artifacts,
            tickets,
            bus,
            compressed_audit: RwLock::new(Vec::new()),
            total_transitions: AtomicU64::new(0),
            total_cycles_started: AtomicU64::new(0),
            total_workflows_completed: AtomicU64::new(0),
            consistency_heals: AtomicU64::new(0),
        }
    }

    // ── Public surface ───────────────────────────────────────────────────

    /// Evaluate one step's completion check for an artifact. Safe to call
    /// redundantly; the whole evaluation runs as one serialized update on
    /// the artifact document.
    pub fn update_status(&self, artifact_id: &str, step: WorkflowStep) -> ArgusResult<StepOutcome> {
        let outcome = self.artifacts.update(artifact_id, |a| self.evaluate(a, step))?;
        self.publish_outcome(artifact_id, step, outcome);
        Ok(outcome)
    }

    /// Re-evaluate whatever step the artifact currently sits on. Invoked
    /// after ticket status changes.
    pub fn reevaluate_current(&self, artifact_id: &str) -> ArgusResult<StepOutcome> {
        let (step, outcome) = self.artifacts.update(artifact_id, |a| {
            let step = a.current_step;
            (step, self.evaluate(a, step))
        })?;
        self.publish_outcome(artifact_id, step, outcome);
        Ok(outcome)
    }

    /// The artifact's full cycle log, including the live cycle's mirror.
    pub fn history(&self, artifact_id: &str) -> ArgusResult<Vec<WorkflowCycle>> {
        Ok(self.artifacts.fetch(artifact_id)?.cycles)
    }

    pub fn total_transitions(&self) -> u64 { self.total_transitions.load(Ordering::Relaxed) }
    pub fn total_cycles_started(&self) -> u64 { self.total_cycles_started.load(Ordering::Relaxed) }
    pub fn total_workflows_completed(&self) -> u64 { self.total_workflows_completed.load(Ordering::Relaxed) }
    pub fn consistency_heals(&self) -> u64 { self.consistency_heals.load(Ordering::Relaxed) }

    /// Most recent audit entries, newest first.
    pub fn recent_audit(&self, limit: usize) -> Vec<String> {
        let audit = self.compressed_audit.read();
        audit
            .iter()
            .rev()
            .take(limit)
            .filter_map(|c| compression::decompress_lz4(c).ok())
            .filter_map(|b| String::from_utf8(b).ok())
            .collect()
    }

    // ── Step evaluation ──────────────────────────────────────────────────

    fn evaluate(&self, a: &mut Artifact, step: WorkflowStep) -> StepOutcome {
        if a.workflow_completed {
            return StepOutcome::NoOp;
        }

        self.ensure_cycle(a);
        self.heal_cycle_mirror(a);

        // Only the live step is evaluated; anything else is a stale or
        // premature trigger.
        if step != a.current_step {
            return StepOutcome::NoOp;
        }

        let outcome = match step {
            WorkflowStep::Detection => self.check_detection(a),
            WorkflowStep::Classification => self.check_classification(a),
            WorkflowStep::Assignment => self.check_assignment(a),
            WorkflowStep::Remediation => self.check_remediation(a),
            WorkflowStep::Verification => self.check_verification(a),
        };

        if outcome != StepOutcome::NoOp {
            self.total_transitions.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Step 1: complete as soon as no scan is in flight. Snapshots the
    /// confirmed findings into the cycle.
    fn check_detection(&self, a: &mut Artifact) -> StepOutcome {
        if a.is_scanning {
            return StepOutcome::Waiting;
        }
        let now = chrono::Utc::now().timestamp();
        let mut cycle = match a.current_cycle.clone() {
            Some(c) => c,
            None => return StepOutcome::NoOp,
        };
        cycle.detection.number_vuls = a.vulnerability_list.len();
        cycle.detection.list_vuls = a.vulnerability_list.clone();
        cycle.detection.completed_at = Some(now);
        self.advance(a, cycle, WorkflowStep::Classification);
        self.record_audit(&format!("step|{}|{}|detection|advanced", a.artifact_id, a.cycles_count));
        StepOutcome::Advanced(WorkflowStep::Classification)
    }

    /// Step 2: complete when threats are linked. An artifact with neither
    /// threats nor vulnerabilities has nothing to remediate: the whole
    /// workflow terminates here instead of advancing.
    fn check_classification(&self, a: &mut Artifact) -> StepOutcome {
        let now = chrono::Utc::now().timestamp();
        let mut cycle = match a.current_cycle.clone() {
            Some(c) => c,
            None => return StepOutcome::NoOp,
        };

        if a.threat_list.is_empty() && a.vulnerability_list.is_empty() {
            cycle.classification.number_threats = 0;
            cycle.classification.list_threats.clear();
            cycle.classification.completed_at = Some(now);
            cycle.completed_at = Some(now);
            a.current_cycle = Some(cycle);
            Self::mirror_live_cycle(a);
            a.workflow_completed = true;
            self.total_workflows_completed.fetch_add(1, Ordering::Relaxed);
            info!(artifact = %a.artifact_id, cycle = a.cycles_count, "Workflow completed: no threats, no vulnerabilities");
            self.record_audit(&format!("workflow|{}|{}|completed|clean", a.artifact_id, a.cycles_count));
            return StepOutcome::WorkflowCompleted;
        }

        if a.threat_list.is_empty() {
            return StepOutcome::Waiting;
        }

        cycle.classification.number_threats = a.threat_list.len();
        cycle.classification.list_threats = a.threat_list.clone();
        cycle.classification.completed_at = Some(now);
        self.advance(a, cycle, WorkflowStep::Assignment);
        self.record_audit(&format!("step|{}|{}|classification|advanced", a.artifact_id, a.cycles_count));
        StepOutcome::Advanced(WorkflowStep::Assignment)
    }

    /// Step 3: complete when at least one ticket left "Not accepted".
    /// Assigned/unassigned counts are snapshotted on every call, completion
    /// or not.
    fn check_assignment(&self, a: &mut Artifact) -> StepOutcome {
        let tickets = self.tickets.tickets_for_threats(&a.artifact_id, &a.threat_list);
        let assigned = tickets.iter().filter(|t| t.status != TicketStatus::NotAccepted).count();

        let mut cycle = match a.current_cycle.clone() {
            Some(c) => c,
            None => return StepOutcome::NoOp,
        };
        cycle.assignment.number_tickets_assigned = assigned;
        cycle.assignment.number_tickets_not_assigned = tickets.len() - assigned;
        cycle.assignment.list_tickets = tickets.iter().map(|t| t.ticket_id).collect();

        if assigned == 0 {
            a.current_cycle = Some(cycle);
            Self::mirror_live_cycle(a);
            return StepOutcome::Waiting;
        }

        self.advance(a, cycle, WorkflowStep::Remediation);
        self.record_audit(&format!("step|{}|{}|assignment|advanced", a.artifact_id, a.cycles_count));
        StepOutcome::Advanced(WorkflowStep::Remediation)
    }

    /// Step 4: complete when at least one ticket is Submitted or Resolved.
    /// Counts snapshot on every call; `completed_at` only stamps on
    /// completion.
    fn check_remediation(&self, a: &mut Artifact) -> StepOutcome {
        let tickets = self.tickets.tickets_for_threats(&a.artifact_id, &a.threat_list);
        let submitted = tickets
            .iter()
            .filter(|t| matches!(t.status, TicketStatus::Submitted | TicketStatus::Resolved))
            .count();
        let resolved = tickets.iter().filter(|t| t.status == TicketStatus::Resolved).count();

        let mut cycle = match a.current_cycle.clone() {
            Some(c) => c,
            None => return StepOutcome::NoOp,
        };
        cycle.remediation.number_tickets_submitted = submitted;
        cycle.remediation.number_tickets_not_submitted = tickets.len() - submitted;
        cycle.remediation.number_threats_resolved = resolved;
        cycle.remediation.list_tickets = tickets.iter().map(|t| t.ticket_id).collect();

        if submitted == 0 {
            a.current_cycle = Some(cycle);
            Self::mirror_live_cycle(a);
            return StepOutcome::Waiting;
        }

        cycle.remediation.completed_at = Some(chrono::Utc::now().timestamp());
        self.advance(a, cycle, WorkflowStep::Verification);
        self.record_audit(&format!("step|{}|{}|remediation|advanced", a.artifact_id, a.cycles_count));
        StepOutcome::Advanced(WorkflowStep::Verification)
    }

    /// Step 5: the restart-vs-terminate decision. A ticket counts as
    /// returned when it sits in Processing after having been Submitted.
    /// Unresolved work (returned tickets, or vulnerabilities still present)
    /// loops into cycle N+1; otherwise the workflow terminates with the
    /// step pointer parked on Verification.
    ///
    /// This decision is owned here: a generic advance past step 5 must land
    /// in this check rather than terminating on its own.
    fn check_verification(&self, a: &mut Artifact) -> StepOutcome {
        if a.is_scanning {
            return StepOutcome::Waiting;
        }
        let now = chrono::Utc::now().timestamp();
        let tickets = self.tickets.tickets_for_threats(&a.artifact_id, &a.threat_list);
        let resolved = tickets.iter().filter(|t| t.status == TicketStatus::Resolved).count();
        let returned = tickets.iter().filter(|t| t.is_returned()).count();

        let mut cycle = match a.current_cycle.clone() {
            Some(c) => c,
            None => return StepOutcome::NoOp,
        };
        cycle.verification.number_tickets_resolved = resolved;
        cycle.verification.number_tickets_returned = returned;
        cycle.verification.completed_at = Some(now);
        cycle.completed_at = Some(now);
        a.current_cycle = Some(cycle);
        Self::mirror_live_cycle(a);

        if returned > 0 || !a.vulnerability_list.is_empty() {
            let number = a.cycles_count + 1;
            let fresh = WorkflowCycle::start(number, now, &a.vulnerability_list, &a.threat_list);
            a.current_step = WorkflowStep::Detection;
            a.cycles.push(fresh.clone());
            a.cycles_count = number;
            a.current_cycle = Some(fresh);
            self.total_cycles_started.fetch_add(1, Ordering::Relaxed);
            info!(
                artifact = %a.artifact_id,
                cycle = number,
                returned = returned,
                vulns = a.vulnerability_list.len(),
                "Verification found unresolved work, starting new cycle"
            );
            self.record_audit(&format!("cycle|{}|{}|restarted", a.artifact_id, number));
            return StepOutcome::CycleRestarted(number);
        }

        a.workflow_completed = true;
        self.total_workflows_completed.fetch_add(1, Ordering::Relaxed);
        info!(artifact = %a.artifact_id, cycle = a.cycles_count, "Workflow completed");
        self.record_audit(&format!("workflow|{}|{}|completed", a.artifact_id, a.cycles_count));
        StepOutcome::WorkflowCompleted
    }

    // ── Cycle lifecycle and consistency ──────────────────────────────────

    /// Initialize cycle #(count+1) when no cycle is live. Detection and
    /// classification records start prepopulated from current counts.
    fn ensure_cycle(&self, a: &mut Artifact) {
        if a.current_cycle.is_some() {
            return;
        }
        let number = a.cycles_count + 1;
        let cycle = WorkflowCycle::start(
            number,
            chrono::Utc::now().timestamp(),
            &a.vulnerability_list,
            &a.threat_list,
        );
        a.current_step = WorkflowStep::Detection;
        a.cycles_count = number;
        a.current_cycle = Some(cycle);
        Self::mirror_live_cycle(a);
        self.total_cycles_started.fetch_add(1, Ordering::Relaxed);
        debug!(artifact = %a.artifact_id, cycle = number, "Workflow cycle initialized");
        self.record_audit(&format!("cycle|{}|{}|started", a.artifact_id, number));
    }

    /// Repair any divergence between the live cycle and its mirror in the
    /// cycle log, in favor of `current_cycle`. Also re-pins `cycles_count`
    /// to the live cycle number and collapses duplicate log entries.
    fn heal_cycle_mirror(&self, a: &mut Artifact) {
        let cur = match &a.current_cycle {
            Some(c) => c.clone(),
            None => return,
        };
        let mut healed = false;

        if a.cycles_count != cur.cycle_number {
            a.cycles_count = cur.cycle_number;
            healed = true;
        }

        let duplicates = a.cycles.iter().filter(|c| c.cycle_number == cur.cycle_number).count();
        if duplicates > 1 {
            a.cycles.retain(|c| c.cycle_number != cur.cycle_number);
            a.cycles.push(cur.clone());
            a.cycles.sort_by_key(|c| c.cycle_number);
            healed = true;
        } else {
            match a.cycles.iter_mut().find(|c| c.cycle_number == cur.cycle_number) {
                Some(entry) => {
                    if *entry != cur {
                        *entry = cur.clone();
                        healed = true;
                    }
                }
                None => {
                    a.cycles.push(cur.clone());
                    healed = true;
                }
            }
        }

        if healed {
            self.consistency_heals.fetch_add(1, Ordering::Relaxed);
            warn!(
                artifact = %a.artifact_id,
                cycle = cur.cycle_number,
                "Cycle log diverged from live cycle; healed from current state"
            );
        }
    }

    /// Move the live cycle (and the artifact's step pointer) to `next` and
    /// sync the mirror. `next` is always within the five steps here; the
    /// restart-vs-terminate decision past Verification belongs to
    /// `check_verification`, never to a generic advance.
    fn advance(&self, a: &mut Artifact, mut cycle: WorkflowCycle, next: WorkflowStep) {
        cycle.current_step = next;
        a.current_step = next;
        a.current_cycle = Some(cycle);
        Self::mirror_live_cycle(a);
        debug!(artifact = %a.artifact_id, step = next.label(), "Workflow advanced");
    }

    /// Write the live cycle into the same-numbered slot of the cycle log
    /// (replace or append) and keep the count pinned to it.
    fn mirror_live_cycle(a: &mut Artifact) {
        let cur = match &a.current_cycle {
            Some(c) => c.clone(),
            None => return,
        };
        match a.cycles.iter_mut().find(|c| c.cycle_number == cur.cycle_number) {
            Some(entry) => *entry = cur.clone(),
            None => a.cycles.push(cur.clone()),
        }
        a.cycles_count = cur.cycle_number;
    }

    // ── Audit and events ─────────────────────────────────────────────────

    fn record_audit(&self, entry: &str) {
        let compressed = compression::compress_lz4(entry.as_bytes());
        let mut audit = self.compressed_audit.write();
        if audit.len() >= MAX_AUDIT_RECORDS {
            let half = audit.len() / 2;
            audit.drain(..half);
        }
        audit.push(compressed);
    }

    fn publish_outcome(&self, artifact_id: &str, step: WorkflowStep, outcome: StepOutcome) {
        let (title, severity) = match outcome {
            StepOutcome::NoOp | StepOutcome::Waiting => return,
            StepOutcome::Advanced(next) => (format!("Advanced to {}", next.label()), EventSeverity::Info),
            StepOutcome::CycleRestarted(n) => (format!("Cycle {} started", n), EventSeverity::Medium),
            StepOutcome::WorkflowCompleted => ("Workflow completed".to_string(), EventSeverity::Info),
        };
        self.bus.emit(
            "workflow_engine",
            EventCategory::Workflow,
            severity,
            &title,
            HashMap::from([("step".to_string(), step.label().to_string())]),
            vec![artifact_id.to_string()],
        );
    }
}
