//! Ticket lifecycle.
//!
//! One ticket is auto-created per newly linked threat; assignment and
//! submission are driven by external ticket-management flows, while the
//! reconciler resolves/reopens tickets as the matching vulnerability
//! disappears or reappears across rescans. Every transition records the
//! prior status, which is what lets Verification detect a ticket "returned
//! to processing" (`Processing` with `previous_status == Submitted`).

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use argus_core::{ArgusError, ArgusResult};

use crate::threats::Threat;
use crate::types::{Artifact, Severity};

const MAX_TICKETS: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TicketStatus { NotAccepted, Processing, Submitted, Resolved }

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum TicketPriority { Low, Medium, High, Critical }

impl From<Severity> for TicketPriority {
    fn from(sev: Severity) -> Self {
        match sev {
            Severity::Critical => Self::Critical,
            Severity::High => Self::High,
            Severity::Medium | Severity::Unknown => Self::Medium,
            Severity::Low => Self::Low,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Ticket {
    pub ticket_id: u64,
    pub title: String,
    pub assignee: Option<String>,
    pub assigner: Option<String>,
    pub status: TicketStatus,
    /// Status before the most recent transition.
    pub previous_status: Option<TicketStatus>,
    pub priority: TicketPriority,
    /// The threat this ticket remediates.
    pub threat_name: String,
    pub project_id: String,
    pub artifact_id: String,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

impl Ticket {
    /// A ticket counts as returned when a submitted fix was pushed back to
    /// processing by verification.
    pub fn is_returned(&self) -> bool {
        self.status == TicketStatus::Processing && self.previous_status == Some(TicketStatus::Submitted)
    }
}

// ── Collaborator seam ───────────────────────────────────────────────────────

/// The ticket operations the reconciler and the workflow engine consume.
/// The engine only ever reads; the reconciler creates and resolves/reopens.
pub trait TicketCollaborator: Send + Sync {
    /// Open exactly one ticket for a threat newly linked to an artifact.
    fn create_for_threat(&self, threat: &Threat, artifact: &Artifact) -> Ticket;

    /// All tickets of one artifact targeting any of the given threats.
    fn tickets_for_threats(&self, artifact_id: &str, threat_names: &[String]) -> Vec<Ticket>;

    /// Resolve (`resolved = true`) or reopen to Processing (`resolved =
    /// false`) every ticket of this artifact targeting the threat.
    fn set_threat_resolved(&self, artifact_id: &str, threat_name: &str, resolved: bool);
}

// ── In-memory implementation ────────────────────────────────────────────────

pub struct TicketManager {
    tickets: RwLock<Vec<Ticket>>,
    next_id: AtomicU64,
    total_created: AtomicU64,
    total_resolved: AtomicU64,
    total_reopened: AtomicU64,
}

impl TicketManager {
    pub fn new() -> Self {
        Self {
            tickets: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            total_created: AtomicU64::new(0),
            total_resolved: AtomicU64::new(0),
            total_reopened: AtomicU64::new(0),
        }
    }

    pub fn get(&self, ticket_id: u64) -> Option<Ticket> {
        self.tickets.read().iter().find(|t| t.ticket_id == ticket_id).cloned()
    }

    /// External ticket-management transition (accept, submit, return...).
    /// Records the prior status and clears `resolved_at` when a resolved
    /// ticket is reopened.
    pub fn update_status(&self, ticket_id: u64, status: TicketStatus) -> ArgusResult<Ticket> {
        let mut tickets = self.tickets.write();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.ticket_id == ticket_id)
            .ok_or_else(|| ArgusError::not_found("ticket", ticket_id.to_string()))?;

        let old = ticket.status;
        ticket.previous_status = Some(old);
        ticket.status = status;
        match status {
            TicketStatus::Resolved => ticket.resolved_at = Some(chrono::Utc::now().timestamp()),
            _ => ticket.resolved_at = None,
        }
        debug!(ticket = ticket_id, from = ?old, to = ?status, "Ticket status updated");
        Ok(ticket.clone())
    }

    pub fn assign(&self, ticket_id: u64, assignee: &str, assigner: &str) -> ArgusResult<()> {
        let mut tickets = self.tickets.write();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.ticket_id == ticket_id)
            .ok_or_else(|| ArgusError::not_found("ticket", ticket_id.to_string()))?;
        ticket.assignee = Some(assignee.into());
        ticket.assigner = Some(assigner.into());
        Ok(())
    }

    /// Resolve every open ticket of an artifact. Called when the artifact is
    /// removed; ticket rows are retained for audit.
    pub fn resolve_all_for_artifact(&self, artifact_id: &str) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut tickets = self.tickets.write();
        let mut resolved = 0;
        for t in tickets.iter_mut().filter(|t| t.artifact_id == artifact_id && t.status != TicketStatus::Resolved) {
            t.previous_status = Some(t.status);
            t.status = TicketStatus::Resolved;
            t.resolved_at = Some(now);
            resolved += 1;
        }
        if resolved > 0 {
            self.total_resolved.fetch_add(resolved as u64, Ordering::Relaxed);
            info!(artifact = %artifact_id, count = resolved, "Cascade-resolved tickets for removed artifact");
        }
        resolved
    }

    pub fn tickets_for_artifact(&self, artifact_id: &str) -> Vec<Ticket> {
        self.tickets.read().iter().filter(|t| t.artifact_id == artifact_id).cloned().collect()
    }

    pub fn total_created(&self) -> u64 { self.total_created.load(Ordering::Relaxed) }
    pub fn total_resolved(&self) -> u64 { self.total_resolved.load(Ordering::Relaxed) }
    pub fn total_reopened(&self) -> u64 { self.total_reopened.load(Ordering::Relaxed) }
}

impl TicketCollaborator for TicketManager {
    fn create_for_threat(&self, threat: &Threat, artifact: &Artifact) -> Ticket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.total_created.fetch_add(1, Ordering::Relaxed);
        let ticket = Ticket {
            ticket_id: id,
            title: format!("Remediate {} on {}", threat.name, artifact.name),
            assignee: None,
            assigner: Some("auto".into()),
            status: TicketStatus::NotAccepted,
            previous_status: None,
            priority: Severity::from_score(threat.score.total).into(),
            threat_name: threat.name.clone(),
            project_id: artifact.project_id.clone(),
            artifact_id: artifact.artifact_id.clone(),
            created_at: chrono::Utc::now().timestamp(),
            resolved_at: None,
        };
        let mut tickets = self.tickets.write();
        if tickets.len() >= MAX_TICKETS {
            tickets.remove(0);
        }
        tickets.push(ticket.clone());
        debug!(ticket = id, threat = %threat.name, artifact = %artifact.artifact_id, "Ticket auto-created");
        ticket
    }

    fn tickets_for_threats(&self, artifact_id: &str, threat_names: &[String]) -> Vec<Ticket> {
        self.tickets
            .read()
            .iter()
            .filter(|t| t.artifact_id == artifact_id && threat_names.iter().any(|n| *n == t.threat_name))
            .cloned()
            .collect()
    }

    fn set_threat_resolved(&self, artifact_id: &str, threat_name: &str, resolved: bool) {
        let now = chrono::Utc::now().timestamp();
        let mut tickets = self.tickets.write();
        for t in tickets.iter_mut().filter(|t| t.artifact_id == artifact_id && t.threat_name == threat_name) {
            let target = if resolved { TicketStatus::Resolved } else { TicketStatus::Processing };
            if t.status == target {
                continue;
            }
            t.previous_status = Some(t.status);
            t.status = target;
            if resolved {
                t.resolved_at = Some(now);
                self.total_resolved.fetch_add(1, Ordering::Relaxed);
            } else {
                t.resolved_at = None;
                self.total_reopened.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
