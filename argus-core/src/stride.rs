//! STRIDE Threat Model Integration
//!
//! Standardized CWE→STRIDE and keyword→STRIDE mappings used to classify
//! vulnerability findings into threat categories. The tables are built in
//! code and frozen; classification consumers receive a `ClassifierConfig`
//! by reference instead of reaching for process-wide state, so voting stays
//! deterministic and unit-testable without any I/O.

use std::collections::HashMap;

// ─── STRIDE Categories ──────────────────────────────────────────────────────

/// STRIDE threat category. Variant order is the registration order used for
/// tie-breaking during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StrideCategory {
    Spoofing,
    Tampering,
    Repudiation,
    InformationDisclosure,
    DenialOfService,
    ElevationOfPrivilege,
}

/// All categories, in registration order.
pub const STRIDE_ORDER: [StrideCategory; 6] = [
    StrideCategory::Spoofing,
    StrideCategory::Tampering,
    StrideCategory::Repudiation,
    StrideCategory::InformationDisclosure,
    StrideCategory::DenialOfService,
    StrideCategory::ElevationOfPrivilege,
];

impl StrideCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Spoofing => "Spoofing",
            Self::Tampering => "Tampering",
            Self::Repudiation => "Repudiation",
            Self::InformationDisclosure => "Information Disclosure",
            Self::DenialOfService => "Denial of Service",
            Self::ElevationOfPrivilege => "Elevation of Privilege",
        }
    }

    /// Position in the registration order, for deterministic tie-breaking.
    pub fn order(&self) -> usize {
        STRIDE_ORDER.iter().position(|c| c == self).unwrap_or(STRIDE_ORDER.len())
    }
}

// ─── Classifier Configuration ───────────────────────────────────────────────

/// Immutable classification tables: CWE id → STRIDE categories and
/// lowercase description keyword → STRIDE category.
pub struct ClassifierConfig {
    cwe_map: HashMap<String, Vec<StrideCategory>>,
    keywords: Vec<(&'static str, StrideCategory)>,
}

impl ClassifierConfig {
    /// The built-in tables. Derived from the common CWE Top-25 entries plus
    /// the weakness families scanners report most often.
    pub fn builtin() -> Self {
        let mut m: HashMap<String, Vec<StrideCategory>> = HashMap::new();
        Self::seed_spoofing(&mut m);
        Self::seed_tampering(&mut m);
        Self::seed_repudiation(&mut m);
        Self::seed_disclosure(&mut m);
        Self::seed_dos(&mut m);
        Self::seed_privilege(&mut m);

        Self { cwe_map: m, keywords: Self::seed_keywords() }
    }

    /// Categories mapped for a CWE id (accepts "CWE-79" or bare "79").
    pub fn categories_for_cwe(&self, cwe: &str) -> Option<&[StrideCategory]> {
        let key = if cwe.to_ascii_uppercase().starts_with("CWE-") {
            cwe.to_ascii_uppercase()
        } else {
            format!("CWE-{}", cwe)
        };
        self.cwe_map.get(&key).map(|v| v.as_slice())
    }

    /// Keyword table: (lowercase needle, category).
    pub fn keywords(&self) -> &[(&'static str, StrideCategory)] {
        &self.keywords
    }

    pub fn cwe_count(&self) -> usize { self.cwe_map.len() }

    fn ins(m: &mut HashMap<String, Vec<StrideCategory>>, cwe: &str, cats: &[StrideCategory]) {
        m.entry(cwe.into()).or_default().extend_from_slice(cats);
    }

    fn seed_spoofing(m: &mut HashMap<String, Vec<StrideCategory>>) {
        use StrideCategory::*;
        Self::ins(m, "CWE-287", &[Spoofing]); // improper authentication
        Self::ins(m, "CWE-290", &[Spoofing]); // authentication bypass by spoofing
        Self::ins(m, "CWE-295", &[Spoofing]); // improper certificate validation
        Self::ins(m, "CWE-306", &[Spoofing]); // missing authentication
        Self::ins(m, "CWE-346", &[Spoofing]); // origin validation error
        Self::ins(m, "CWE-352", &[Spoofing]); // CSRF
        Self::ins(m, "CWE-798", &[Spoofing, ElevationOfPrivilege]); // hardcoded credentials
        Self::ins(m, "CWE-640", &[Spoofing]); // weak password recovery
    }

    fn seed_tampering(m: &mut HashMap<String, Vec<StrideCategory>>) {
        use StrideCategory::*;
        Self::ins(m, "CWE-20", &[Tampering]); // improper input validation
        Self::ins(m, "CWE-79", &[Tampering]); // XSS
        Self::ins(m, "CWE-89", &[Tampering]); // SQL injection
        Self::ins(m, "CWE-78", &[Tampering, ElevationOfPrivilege]); // OS command injection
        Self::ins(m, "CWE-94", &[Tampering, ElevationOfPrivilege]); // code injection
        Self::ins(m, "CWE-502", &[Tampering]); // unsafe deserialization
        Self::ins(m, "CWE-494", &[Tampering]); // download without integrity check
        Self::ins(m, "CWE-345", &[Tampering]); // insufficient data authenticity
        Self::ins(m, "CWE-915", &[Tampering]); // mass assignment
    }

    fn seed_repudiation(m: &mut HashMap<String, Vec<StrideCategory>>) {
        use StrideCategory::*;
        Self::ins(m, "CWE-117", &[Repudiation]); // log injection
        Self::ins(m, "CWE-223", &[Repudiation]); // omission of security-relevant info
        Self::ins(m, "CWE-778", &[Repudiation]); // insufficient logging
    }

    fn seed_disclosure(m: &mut HashMap<String, Vec<StrideCategory>>) {
        use StrideCategory::*;
        Self::ins(m, "CWE-22", &[InformationDisclosure]); // path traversal
        Self::ins(m, "CWE-200", &[InformationDisclosure]); // sensitive info exposure
        Self::ins(m, "CWE-209", &[InformationDisclosure]); // error message leak
        Self::ins(m, "CWE-311", &[InformationDisclosure]); // missing encryption
        Self::ins(m, "CWE-319", &[InformationDisclosure]); // cleartext transmission
        Self::ins(m, "CWE-327", &[InformationDisclosure]); // broken crypto
        Self::ins(m, "CWE-330", &[InformationDisclosure]); // insufficient randomness
        Self::ins(m, "CWE-532", &[InformationDisclosure]); // info exposure via logs
        Self::ins(m, "CWE-125", &[InformationDisclosure, DenialOfService]); // out-of-bounds read
    }

    fn seed_dos(m: &mut HashMap<String, Vec<StrideCategory>>) {
        use StrideCategory::*;
        Self::ins(m, "CWE-400", &[DenialOfService]); // uncontrolled resource consumption
        Self::ins(m, "CWE-770", &[DenialOfService]); // allocation without limits
        Self::ins(m, "CWE-835", &[DenialOfService]); // infinite loop
        Self::ins(m, "CWE-190", &[DenialOfService]); // integer overflow
        Self::ins(m, "CWE-401", &[DenialOfService]); // memory leak
        Self::ins(m, "CWE-476", &[DenialOfService]); // NULL dereference
    }

    fn seed_privilege(m: &mut HashMap<String, Vec<StrideCategory>>) {
        use StrideCategory::*;
        Self::ins(m, "CWE-250", &[ElevationOfPrivilege]); // execution with unnecessary privileges
        Self::ins(m, "CWE-269", &[ElevationOfPrivilege]); // improper privilege management
        Self::ins(m, "CWE-284", &[ElevationOfPrivilege]); // improper access control
        Self::ins(m, "CWE-285", &[ElevationOfPrivilege]); // improper authorization
        Self::ins(m, "CWE-434", &[ElevationOfPrivilege, Tampering]); // unrestricted upload
        Self::ins(m, "CWE-787", &[ElevationOfPrivilege, DenialOfService]); // out-of-bounds write
        Self::ins(m, "CWE-416", &[ElevationOfPrivilege, DenialOfService]); // use after free
        Self::ins(m, "CWE-863", &[ElevationOfPrivilege]); // incorrect authorization
        Self::ins(m, "CWE-276", &[ElevationOfPrivilege]); // incorrect default permissions
    }

    fn seed_keywords() -> Vec<(&'static str, StrideCategory)> {
        use StrideCategory::*;
        vec![
            ("spoof", Spoofing),
            ("impersonat", Spoofing),
            ("authentication bypass", Spoofing),
            ("session fixation", Spoofing),
            ("man-in-the-middle", Spoofing),
            ("forgery", Spoofing),
            ("tamper", Tampering),
            ("injection", Tampering),
            ("cross-site scripting", Tampering),
            ("deserialization", Tampering),
            ("integrity", Tampering),
            ("repudiat", Repudiation),
            ("audit trail", Repudiation),
            ("logging", Repudiation),
            ("disclos", InformationDisclosure),
            ("exposure", InformationDisclosure),
            ("leak", InformationDisclosure),
            ("sensitive data", InformationDisclosure),
            ("plaintext", InformationDisclosure),
            ("traversal", InformationDisclosure),
            ("denial of service", DenialOfService),
            ("resource exhaustion", DenialOfService),
            ("crash", DenialOfService),
            ("infinite loop", DenialOfService),
            ("out of memory", DenialOfService),
            ("privilege escalation", ElevationOfPrivilege),
            ("escalat", ElevationOfPrivilege),
            ("arbitrary code", ElevationOfPrivilege),
            ("remote code execution", ElevationOfPrivilege),
            ("root access", ElevationOfPrivilege),
        ]
    }
}
