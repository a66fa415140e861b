//! Project-level workflow reporting.
//!
//! Read-only projections over the artifact store: which step each artifact
//! sits on, how many workflows have terminated, and cycle counts per
//! project.

use std::sync::Arc;

use argus_core::store::DocumentStore;

use crate::types::{Artifact, WorkflowStep};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProjectWorkflowStats {
    pub artifact_count: usize,
    /// Artifacts currently sitting on steps 1..=5 (index 0 = Detection).
    /// Completed workflows are counted separately.
    pub per_step_counts: [usize; 5],
    pub completed_count: usize,
    pub total_cycles: u64,
    pub average_cycles: f64,
}

pub struct WorkflowStats {
    artifacts: Arc<DocumentStore<Artifact>>,
}

impl WorkflowStats {
    pub fn new(artifacts: Arc<DocumentStore<Artifact>>) -> Self {
        Self { artifacts }
    }

    pub fn project_stats(&self, project_id: &str) -> ProjectWorkflowStats {
        let artifacts = self.artifacts.filter(|a| a.project_id == project_id);
        let mut stats = ProjectWorkflowStats {
            artifact_count: artifacts.len(),
            ..ProjectWorkflowStats::default()
        };
        for a in &artifacts {
            if a.workflow_completed {
                stats.completed_count += 1;
            } else {
                stats.per_step_counts[(a.current_step.index() - 1) as usize] += 1;
            }
            stats.total_cycles += a.cycles_count as u64;
        }
        if !artifacts.is_empty() {
            stats.average_cycles = stats.total_cycles as f64 / artifacts.len() as f64;
        }
        stats
    }

    /// Artifacts of a project, optionally narrowed to one live step.
    /// Completed workflows are excluded when a step filter is given.
    pub fn artifacts_by_step(&self, project_id: &str, step: Option<WorkflowStep>) -> Vec<Artifact> {
        self.artifacts.filter(|a| {
            a.project_id == project_id
                && match step {
                    Some(s) => !a.workflow_completed && a.current_step == s,
                    None => true,
                }
        })
    }

    pub fn artifacts_in_project(&self, project_id: &str) -> Vec<Artifact> {
        self.artifacts.filter(|a| a.project_id == project_id)
    }
}
