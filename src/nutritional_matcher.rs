use std::collections::BTreeSet;
use tracing::debug;

use crate::reference::normalize::{name_forms, normalize_name};
use crate::reference::ReferenceTable;

/// Result of matching one recognized name against the reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Resolved(String),
    /// More than one canonical key matched by substring. Candidates are in key order.
    Ambiguous(Vec<String>),
    NotFound,
}

impl MatchOutcome {
    pub fn resolved_key(&self) -> Option<&str> {
        match self {
            MatchOutcome::Resolved(key) => Some(key),
            _ => None,
        }
    }
}

/// Matches a raw recognized name: exact alias first, then substring containment in
/// either direction. A substring scan that hits several keys is `Ambiguous`; no
/// tie-breaking is attempted.
pub fn match_recognized_name(table: &ReferenceTable, raw_name: &str) -> MatchOutcome {
    let normalized = normalize_name(raw_name);
    if normalized.is_empty() {
        return MatchOutcome::NotFound;
    }

    if let Some(key) = table.resolve_alias(&normalized) {
        debug!(name = raw_name, key, "exact alias match");
        return MatchOutcome::Resolved(key.to_string());
    }

    let forms = name_forms(&normalized);
    let hits: BTreeSet<&str> = table
        .aliases()
        .filter(|(alias, _)| {
            forms
                .iter()
                .any(|form| alias.contains(form) || form.contains(alias))
        })
        .map(|(_, key)| key)
        .collect();

    match hits.len() {
        0 => {
            debug!(name = raw_name, "no reference match");
            MatchOutcome::NotFound
        }
        1 => {
            let key = hits.into_iter().next().map(str::to_string).unwrap_or_default();
            debug!(name = raw_name, key = key.as_str(), "substring match");
            MatchOutcome::Resolved(key)
        }
        _ => {
            debug!(name = raw_name, candidates = ?hits, "ambiguous substring match");
            MatchOutcome::Ambiguous(hits.into_iter().map(str::to_string).collect())
        }
    }
}
