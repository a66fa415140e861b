//! Assessment platform facade.
//!
//! Wires the artifact store, threat registry, ticket manager, aggregator,
//! reconciler and workflow engine together and exposes the surface the rest
//! of the platform (API layer, webhook handlers) calls into. All entry
//! points are reactive; there is no background loop to start or stop.

use std::collections::HashMap;
use std::sync::Arc;

use argus_core::event_bus::{EventBus, EventCategory, EventSeverity};
use argus_core::store::DocumentStore;
use argus_core::stride::ClassifierConfig;
use argus_core::ArgusResult;

use crate::aggregator::{ScanAggregator, ScanOutcome};
use crate::cycle_engine::{StepOutcome, WorkflowEngine};
use crate::reconciler::ThreatReconciler;
use crate::stats::{ProjectWorkflowStats, WorkflowStats};
use crate::threats::ThreatStore;
use crate::tickets::{Ticket, TicketManager, TicketStatus};
use crate::types::{Artifact, Vulnerability, WorkflowCycle, WorkflowStep};

pub struct AssessmentPlatform {
    artifacts: Arc<DocumentStore<Artifact>>,
    threats: Arc<ThreatStore>,
    tickets: Arc<TicketManager>,
    bus: Arc<EventBus>,
    engine: Arc<WorkflowEngine>,
    aggregator: ScanAggregator,
    stats: WorkflowStats,
}

impl AssessmentPlatform {
    pub fn new() -> Self {
        Self::with_config(Arc::new(ClassifierConfig::builtin()))
    }

    pub fn with_config(config: Arc<ClassifierConfig>) -> Self {
        let artifacts: Arc<DocumentStore<Artifact>> = Arc::new(DocumentStore::new("artifact"));
        let threats = Arc::new(ThreatStore::new());
        let tickets = Arc::new(TicketManager::new());
        let bus = Arc::new(EventBus::new());

        let engine = Arc::new(WorkflowEngine::new(
            artifacts.clone(),
            tickets.clone(),
            bus.clone(),
        ));
        let reconciler = Arc::new(ThreatReconciler::new(
            artifacts.clone(),
            threats.clone(),
            tickets.clone(),
            engine.clone(),
            config,
            bus.clone(),
        ));
        let aggregator = ScanAggregator::new(artifacts.clone(), reconciler, bus.clone());
        let stats = WorkflowStats::new(artifacts.clone());

        Self { artifacts, threats, tickets, bus, engine, aggregator, stats }
    }

    // ── Artifact lifecycle ───────────────────────────────────────────────

    pub fn register_artifact(&self, artifact: Artifact) {
        self.artifacts.insert(artifact.artifact_id.clone(), artifact);
    }

    pub fn artifact(&self, artifact_id: &str) -> ArgusResult<Artifact> {
        self.artifacts.fetch(artifact_id)
    }

    /// Remove an artifact; its open tickets are cascade-resolved (rows kept
    /// for audit) and threat rows stay in the shared registry.
    pub fn remove_artifact(&self, artifact_id: &str) -> ArgusResult<Artifact> {
        let removed = self
            .artifacts
            .remove(artifact_id)
            .ok_or_else(|| argus_core::ArgusError::not_found("artifact", artifact_id))?;
        let resolved = self.tickets.resolve_all_for_artifact(artifact_id);
        self.bus.emit(
            "platform",
            EventCategory::Health,
            EventSeverity::Info,
            "Artifact removed",
            HashMap::from([("tickets_resolved".to_string(), resolved.to_string())]),
            vec![artifact_id.to_string()],
        );
        Ok(removed)
    }

    // ── Scan ingestion ───────────────────────────────────────────────────

    pub fn begin_scan(&self, artifact_id: &str, total_scanners: u32) -> ArgusResult<()> {
        self.aggregator.begin_scan(artifact_id, total_scanners)
    }

    pub fn submit_scanner_result(
        &self,
        artifact_id: &str,
        vulnerabilities: Vec<Vulnerability>,
    ) -> ArgusResult<ScanOutcome> {
        self.aggregator.submit_scanner_result(artifact_id, vulnerabilities)
    }

    // ── Workflow ─────────────────────────────────────────────────────────

    /// Explicit idempotent re-evaluation trigger.
    pub fn update_workflow_status(&self, artifact_id: &str, step: WorkflowStep) -> ArgusResult<StepOutcome> {
        self.engine.update_status(artifact_id, step)
    }

    pub fn workflow_history(&self, artifact_id: &str) -> ArgusResult<Vec<WorkflowCycle>> {
        self.engine.history(artifact_id)
    }

    // ── Tickets ──────────────────────────────────────────────────────────

    /// External ticket transition; re-evaluates the owning artifact's
    /// current workflow step afterwards.
    pub fn ticket_status_changed(&self, ticket_id: u64, status: TicketStatus) -> ArgusResult<StepOutcome> {
        let ticket = self.tickets.update_status(ticket_id, status)?;
        self.bus.emit(
            "platform",
            EventCategory::Ticket,
            EventSeverity::Info,
            "Ticket status changed",
            HashMap::from([
                ("ticket".to_string(), ticket.ticket_id.to_string()),
                ("threat".to_string(), ticket.threat_name.clone()),
            ]),
            vec![ticket.artifact_id.clone()],
        );
        self.engine.reevaluate_current(&ticket.artifact_id)
    }

    pub fn assign_ticket(&self, ticket_id: u64, assignee: &str, assigner: &str) -> ArgusResult<()> {
        self.tickets.assign(ticket_id, assignee, assigner)
    }

    pub fn tickets_for_artifact(&self, artifact_id: &str) -> Vec<Ticket> {
        self.tickets.tickets_for_artifact(artifact_id)
    }

    // ── Reporting ────────────────────────────────────────────────────────

    pub fn project_stats(&self, project_id: &str) -> ProjectWorkflowStats {
        self.stats.project_stats(project_id)
    }

    pub fn artifacts_by_step(&self, project_id: &str, step: Option<WorkflowStep>) -> Vec<Artifact> {
        self.stats.artifacts_by_step(project_id, step)
    }

    // ── Component access ─────────────────────────────────────────────────

    pub fn threats(&self) -> &ThreatStore { &self.threats }
    pub fn ticket_manager(&self) -> &TicketManager { &self.tickets }
    pub fn engine(&self) -> &WorkflowEngine { &self.engine }
    pub fn aggregator(&self) -> &ScanAggregator { &self.aggregator }
    pub fn bus(&self) -> &EventBus { &self.bus }
}
