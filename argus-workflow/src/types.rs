//! Shared types for the Artifact Workflow Engine.
//!
//! The `Artifact` is the root aggregate and the unit of locking: scanning
//! state, confirmed/staged findings, linked threats and the live workflow
//! cycle all hang off it. Cycle history is mirrored into `cycles` for audit,
//! with the live cycle kept structurally identical to `current_cycle`.

// ── Severity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Severity { Unknown, Low, Medium, High, Critical }

impl Severity {
    /// Normalize a scanner-reported severity string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" | "negligible" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// CVSS v3.1 severity bands.
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::Unknown
        }
    }

    /// Representative score used when a finding carries no CVSS score.
    pub fn default_score(&self) -> f64 {
        match self {
            Self::Critical => 9.0,
            Self::High => 7.0,
            Self::Medium => 5.0,
            Self::Low => 2.0,
            Self::Unknown => 5.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }
}

// ── Vulnerability ───────────────────────────────────────────────────────────

/// A normalized finding. Identity for merge/diff purposes is `cve_id` only;
/// two records with the same id are the same vulnerability regardless of the
/// reporting scanner.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vulnerability {
    pub cve_id: String,
    pub description: String,
    pub severity: Severity,
    /// CVSS base score, 0–10.
    pub score: Option<f64>,
    pub cvss_vector: Option<String>,
    #[serde(default)]
    pub cwes: Vec<String>,
}

impl Vulnerability {
    pub fn new(cve_id: &str, description: &str, severity: Severity) -> Self {
        Self {
            cve_id: cve_id.into(),
            description: description.into(),
            severity,
            score: None,
            cvss_vector: None,
            cwes: Vec::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_cwes(mut self, cwes: &[&str]) -> Self {
        self.cwes = cwes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// CVSS score, falling back to the severity band's representative value.
    pub fn effective_score(&self) -> f64 {
        self.score.unwrap_or_else(|| self.severity.default_score())
    }
}

// ── Artifact taxonomy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArtifactKind {
    Docs,
    SourceCode,
    Image,
    TestReport,
    VersionRelease,
    DeploymentConfig,
    Log,
    MonitoringDashboard,
}

/// Validation/security state. S1 = non-compliant/insecure, S3 = clean; the
/// remaining states are reserved for other validators and passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SecurityState { S1, S2, S3, S4, S5, S6, S7 }

/// Audit entry: one completed scan's merged findings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanRecord {
    pub timestamp: i64,
    pub vulnerabilities: Vec<Vulnerability>,
}

// ── Workflow steps ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum WorkflowStep { Detection, Classification, Assignment, Remediation, Verification }

impl WorkflowStep {
    /// 1-based step index.
    pub fn index(&self) -> u8 {
        match self {
            Self::Detection => 1,
            Self::Classification => 2,
            Self::Assignment => 3,
            Self::Remediation => 4,
            Self::Verification => 5,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Detection),
            2 => Some(Self::Classification),
            3 => Some(Self::Assignment),
            4 => Some(Self::Remediation),
            5 => Some(Self::Verification),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Detection => "Detection",
            Self::Classification => "Classification",
            Self::Assignment => "Assignment",
            Self::Remediation => "Remediation",
            Self::Verification => "Verification",
        }
    }
}

// ── Per-step records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionRecord {
    pub completed_at: Option<i64>,
    pub number_vuls: usize,
    pub list_vuls: Vec<Vulnerability>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassificationRecord {
    pub number_threats: usize,
    pub list_threats: Vec<String>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssignmentRecord {
    pub number_tickets_assigned: usize,
    pub number_tickets_not_assigned: usize,
    pub list_tickets: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RemediationRecord {
    pub number_tickets_submitted: usize,
    pub number_tickets_not_submitted: usize,
    pub number_threats_resolved: usize,
    pub list_tickets: Vec<u64>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VerificationRecord {
    pub number_tickets_resolved: usize,
    pub number_tickets_returned: usize,
    pub completed_at: Option<i64>,
}

// ── Workflow cycle ──────────────────────────────────────────────────────────

/// One Detection→Verification pass. Embedded in the artifact, never a
/// separate collection; the live cycle is additionally mirrored into the
/// artifact's `cycles` log under the same `cycle_number`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WorkflowCycle {
    /// 1-based, monotonic per artifact.
    pub cycle_number: u32,
    pub current_step: WorkflowStep,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub detection: DetectionRecord,
    pub classification: ClassificationRecord,
    pub assignment: AssignmentRecord,
    pub remediation: RemediationRecord,
    pub verification: VerificationRecord,
}

impl WorkflowCycle {
    /// Fresh cycle at Detection. Detection and classification are
    /// prepopulated from the artifact's current counts so a cycle started
    /// after reconciliation reflects what is already known.
    pub fn start(cycle_number: u32, started_at: i64, vulns: &[Vulnerability], threats: &[String]) -> Self {
        Self {
            cycle_number,
            current_step: WorkflowStep::Detection,
            started_at,
            completed_at: None,
            detection: DetectionRecord {
                completed_at: None,
                number_vuls: vulns.len(),
                list_vuls: vulns.to_vec(),
            },
            classification: ClassificationRecord {
                number_threats: threats.len(),
                list_threats: threats.to_vec(),
                completed_at: None,
            },
            assignment: AssignmentRecord::default(),
            remediation: RemediationRecord::default(),
            verification: VerificationRecord::default(),
        }
    }
}

// ── Artifact ────────────────────────────────────────────────────────────────

/// Root aggregate. Scanning fields are owned by the aggregator, the
/// threat/vulnerability lists by the reconciler, the workflow fields by the
/// cycle engine; all mutations go through the per-document store so they
/// serialize per artifact.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Artifact {
    pub artifact_id: String,
    pub project_id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub url: String,
    pub version: String,
    pub cpe: Option<String>,

    /// Confirmed findings, replaced on each completed scan cycle.
    pub vulnerability_list: Vec<Vulnerability>,
    /// Mid-scan staging, accumulated across scanners, cleared after
    /// reconciliation consumes it.
    pub temp_vuls: Vec<Vulnerability>,
    /// Names of the threats currently linked to this artifact.
    pub threat_list: Vec<String>,

    pub is_scanning: bool,
    pub scanners_completed: u32,
    pub total_scanners: u32,

    pub state: SecurityState,

    pub current_step: WorkflowStep,
    pub current_cycle: Option<WorkflowCycle>,
    /// Historical cycle log, including a mirror of the live cycle.
    pub cycles: Vec<WorkflowCycle>,
    /// Must equal `current_cycle.cycle_number` while a cycle is active.
    pub cycles_count: u32,
    pub workflow_completed: bool,

    pub scan_history: Vec<ScanRecord>,
    pub created_at: i64,
}

impl Artifact {
    pub fn new(artifact_id: &str, project_id: &str, name: &str, kind: ArtifactKind) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            project_id: project_id.into(),
            name: name.into(),
            kind,
            url: String::new(),
            version: String::new(),
            cpe: None,
            vulnerability_list: Vec::new(),
            temp_vuls: Vec::new(),
            threat_list: Vec::new(),
            is_scanning: false,
            scanners_completed: 0,
            total_scanners: 0,
            state: SecurityState::S3,
            current_step: WorkflowStep::Detection,
            current_cycle: None,
            cycles: Vec::new(),
            cycles_count: 0,
            workflow_completed: false,
            scan_history: Vec::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.into();
        self
    }

    pub fn has_vulnerability(&self, cve_id: &str) -> bool {
        self.vulnerability_list.iter().any(|v| v.cve_id == cve_id)
    }

    pub fn has_threat(&self, name: &str) -> bool {
        self.threat_list.iter().any(|t| t == name)
    }
}
