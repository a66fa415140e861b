//! STRIDE classification by weighted voting.
//!
//! Pure and deterministic: the only inputs are the vulnerability and the
//! injected tables. Each matched CWE casts 3 votes for every category it maps
//! to, each matched description keyword casts 2; the highest cumulative score
//! wins, ties break toward the first-registered category. No votes at all
//! defaults to Information Disclosure.

use std::collections::HashMap;

use argus_core::stride::{ClassifierConfig, StrideCategory};

use crate::types::Vulnerability;

const CWE_VOTE_WEIGHT: u32 = 3;
const KEYWORD_VOTE_WEIGHT: u32 = 2;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    pub category: StrideCategory,
    /// min(top score / 5, 1)
    pub confidence: f64,
    /// The winning category's cumulative vote score.
    pub top_score: u32,
}

/// Assign a STRIDE category to a vulnerability.
pub fn classify(vuln: &Vulnerability, config: &ClassifierConfig) -> Classification {
    let mut votes: HashMap<StrideCategory, u32> = HashMap::new();

    for cwe in &vuln.cwes {
        if let Some(categories) = config.categories_for_cwe(cwe) {
            for cat in categories {
                *votes.entry(*cat).or_insert(0) += CWE_VOTE_WEIGHT;
            }
        }
    }

    let description = vuln.description.to_ascii_lowercase();
    for (needle, cat) in config.keywords() {
        if description.contains(needle) {
            *votes.entry(*cat).or_insert(0) += KEYWORD_VOTE_WEIGHT;
        }
    }

    let winner = votes
        .iter()
        .max_by(|a, b| {
            // lower registration order wins ties
            a.1.cmp(b.1).then_with(|| b.0.order().cmp(&a.0.order()))
        })
        .map(|(cat, score)| (*cat, *score));

    match winner {
        Some((category, top_score)) => Classification {
            category,
            confidence: (top_score as f64 / 5.0).min(1.0),
            top_score,
        },
        None => Classification {
            category: StrideCategory::InformationDisclosure,
            confidence: 0.0,
            top_score: 0,
        },
    }
}
