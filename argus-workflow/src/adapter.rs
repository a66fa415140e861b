//! Scanner adapters and CVE enrichment.
//!
//! One adapter per tool family normalizes raw scanner output into the common
//! vulnerability shape: severity into the five-band enum, score clamped into
//! 0–10 or absent. The enrichment service is best-effort; lookup failures are
//! logged and leave the affected fields empty rather than failing the scan.

use tracing::warn;

use argus_core::{ArgusError, ArgusResult};

use crate::types::{Severity, Vulnerability};

// ── Normalization ───────────────────────────────────────────────────────────

/// Clamp a reported score into the CVSS 0–10 range; non-finite scores are
/// treated as absent.
pub fn clamp_score(raw: f64) -> Option<f64> {
    if raw.is_finite() {
        Some(raw.clamp(0.0, 10.0))
    } else {
        None
    }
}

// ── Adapter seam ────────────────────────────────────────────────────────────

/// Normalizes one tool family's raw report into vulnerability records.
/// Implementations exist per family (SAST, SCA, image, DAST); the workflow
/// core only ever sees the normalized shape.
pub trait ScannerAdapter: Send + Sync {
    /// Tool family identifier, e.g. "sca-json".
    fn tool(&self) -> &str;

    fn adapt(&self, raw: &str) -> ArgusResult<Vec<Vulnerability>>;
}

// ── Generic JSON report adapter ─────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct RawFinding {
    #[serde(alias = "cveId", alias = "cve", alias = "id")]
    cve_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, alias = "cvss", alias = "cvssScore")]
    score: Option<f64>,
    #[serde(default, alias = "cvssVector", alias = "vector")]
    cvss_vector: Option<String>,
    #[serde(default, alias = "cweIds")]
    cwes: Vec<String>,
}

/// Adapter for the JSON findings-array shape most scanner CLIs can emit.
pub struct JsonReportAdapter {
    tool: String,
}

impl JsonReportAdapter {
    pub fn new(tool: &str) -> Self {
        Self { tool: tool.into() }
    }
}

impl ScannerAdapter for JsonReportAdapter {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn adapt(&self, raw: &str) -> ArgusResult<Vec<Vulnerability>> {
        let findings: Vec<RawFinding> = serde_json::from_str(raw)?;
        let mut out = Vec::with_capacity(findings.len());
        for f in findings {
            if f.cve_id.trim().is_empty() {
                return Err(ArgusError::Validation(format!(
                    "{}: finding without an id",
                    self.tool
                )));
            }
            let score = f.score.and_then(clamp_score);
            let severity = match f.severity.as_deref() {
                Some(s) => Severity::parse(s),
                None => score.map(Severity::from_score).unwrap_or(Severity::Unknown),
            };
            out.push(Vulnerability {
                cve_id: f.cve_id,
                description: f.description,
                severity,
                score,
                cvss_vector: f.cvss_vector,
                cwes: f.cwes,
            });
        }
        Ok(out)
    }
}

// ── Enrichment seam ─────────────────────────────────────────────────────────

/// Gap-filling details for a CVE id.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CveDetails {
    pub score: Option<f64>,
    pub cvss_vector: Option<String>,
    pub cwes: Vec<String>,
}

/// Rate-limited, best-effort CVE lookup. The core never depends on it
/// succeeding.
pub trait CveEnrichment: Send + Sync {
    fn lookup(&self, cve_id: &str) -> ArgusResult<Option<CveDetails>>;
}

/// Fill only the missing fields of each vulnerability. Lookup failures are
/// logged per CVE and skipped; the findings themselves always survive.
pub fn enrich(vulns: &mut [Vulnerability], service: &dyn CveEnrichment) {
    for v in vulns.iter_mut() {
        let needs_score = v.score.is_none();
        let needs_vector = v.cvss_vector.is_none();
        let needs_cwes = v.cwes.is_empty();
        if !needs_score && !needs_vector && !needs_cwes {
            continue;
        }
        match service.lookup(&v.cve_id) {
            Ok(Some(details)) => {
                if needs_score {
                    v.score = details.score.and_then(clamp_score);
                    if let Some(s) = v.score {
                        if v.severity == Severity::Unknown {
                            v.severity = Severity::from_score(s);
                        }
                    }
                }
                if needs_vector {
                    v.cvss_vector = details.cvss_vector;
                }
                if needs_cwes {
                    v.cwes = details.cwes;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(cve = %v.cve_id, error = %e, "CVE enrichment lookup failed, continuing with partial data");
            }
        }
    }
}

/// Fixed-table enrichment, for deployments with a mirrored CVE feed and for
/// tests.
pub struct StaticEnrichment {
    entries: std::collections::HashMap<String, CveDetails>,
}

impl StaticEnrichment {
    pub fn new() -> Self {
        Self { entries: std::collections::HashMap::new() }
    }

    pub fn with_entry(mut self, cve_id: &str, details: CveDetails) -> Self {
        self.entries.insert(cve_id.into(), details);
        self
    }
}

impl CveEnrichment for StaticEnrichment {
    fn lookup(&self, cve_id: &str) -> ArgusResult<Option<CveDetails>> {
        Ok(self.entries.get(cve_id).cloned())
    }
}
