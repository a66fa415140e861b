//! Threat registry.
//!
//! Threats are shared across artifacts by name (the originating CVE id for
//! vulnerability-derived threats): before creating a new threat the
//! reconciler looks the name up here, so a CVE that shows up on five
//! artifacts produces one threat row linked five times. Reconciliation never
//! deletes a threat, it only unlinks it from an artifact; the row stays for
//! audit.

use std::sync::atomic::{AtomicU64, Ordering};

use argus_core::store::DocumentStore;
use argus_core::stride::StrideCategory;
use argus_core::ArgusResult;
use tracing::debug;

use crate::classifier::Classification;
use crate::types::Vulnerability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ThreatStatus { NonMitigated, PartiallyMitigated, FullyMitigated }

/// DREAD-style score. `total` is derived, never set directly: every save
/// recomputes it as the arithmetic mean of the five sub-scores.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThreatScore {
    pub total: f64,
    pub damage: f64,
    pub reproducibility: f64,
    pub exploitability: f64,
    pub affected_users: f64,
    pub discoverability: f64,
}

impl ThreatScore {
    /// All five sub-scores seeded from one value (a CVSS score or severity
    /// band), so `total` starts equal to it.
    pub fn uniform(value: f64) -> Self {
        Self {
            total: value,
            damage: value,
            reproducibility: value,
            exploitability: value,
            affected_users: value,
            discoverability: value,
        }
    }

    pub fn mean(&self) -> f64 {
        (self.damage + self.reproducibility + self.exploitability + self.affected_users + self.discoverability) / 5.0
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Threat {
    /// Originating CVE id for vulnerability-derived threats. Lookup key.
    pub name: String,
    pub description: String,
    pub category: StrideCategory,
    /// Classifier confidence in `category`, 0–1.
    pub confidence: f64,
    /// Free-text mitigation guidance.
    pub mitigation: Vec<String>,
    /// Ids of structured mitigation entries managed elsewhere.
    #[serde(default)]
    pub mitigations: Vec<String>,
    pub status: ThreatStatus,
    pub score: ThreatScore,
    pub created_at: i64,
}

impl Threat {
    pub fn from_vulnerability(vuln: &Vulnerability, classification: &Classification) -> Self {
        Self {
            name: vuln.cve_id.clone(),
            description: vuln.description.clone(),
            category: classification.category,
            confidence: classification.confidence,
            mitigation: Vec::new(),
            mitigations: Vec::new(),
            status: ThreatStatus::NonMitigated,
            score: ThreatScore::uniform(vuln.effective_score()),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Name-keyed threat store.
pub struct ThreatStore {
    docs: DocumentStore<Threat>,
    total_saved: AtomicU64,
}

impl ThreatStore {
    pub fn new() -> Self {
        Self {
            docs: DocumentStore::new("threat"),
            total_saved: AtomicU64::new(0),
        }
    }

    /// Insert or replace, recomputing the derived score total.
    pub fn save(&self, mut threat: Threat) {
        threat.score.total = threat.score.mean();
        self.total_saved.fetch_add(1, Ordering::Relaxed);
        debug!(name = %threat.name, category = threat.category.label(), "Threat saved");
        self.docs.insert(threat.name.clone(), threat);
    }

    pub fn get(&self, name: &str) -> Option<Threat> {
        self.docs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.docs.contains(name)
    }

    /// Targeted field update; the score total is re-derived afterwards.
    pub fn update(&self, name: &str, f: impl FnOnce(&mut Threat)) -> ArgusResult<()> {
        self.docs.update(name, |t| {
            f(t);
            t.score.total = t.score.mean();
        })
    }

    pub fn set_status(&self, name: &str, status: ThreatStatus) -> ArgusResult<()> {
        self.update(name, |t| t.status = status)
    }

    pub fn len(&self) -> usize { self.docs.len() }
    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
    pub fn total_saved(&self) -> u64 { self.total_saved.load(Ordering::Relaxed) }
}
