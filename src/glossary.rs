//! Controlled vocabularies for street-name correction.
//!
//! Two independent glossaries are loaded at process start and shared
//! read-only for the process lifetime: hierarchy tokens (street-type
//! qualifiers such as AVENIDA or PASAJE) and general abbreviations. The
//! on-disk format is an ordered JSON array, not an object: fuzzy-match ties
//! must break to the first-listed entry, so the order is part of the data.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::error::{GeoError, Result};
use crate::matching;

/// Canonical key plus its accepted variant spellings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub canonical: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

/// An ordered, immutable set of glossary entries.
#[derive(Debug, Clone)]
pub struct Glossary {
    entries: Vec<GlossaryEntry>,
}

impl Glossary {
    pub fn new(entries: Vec<GlossaryEntry>) -> Self {
        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| GeoError::Config {
            message: format!("failed to read glossary {}: {}", path.as_ref().display(), e),
        })?;
        let entries: Vec<GlossaryEntry> =
            serde_json::from_str(&content).map_err(|e| GeoError::Config {
                message: format!("failed to parse glossary {}: {}", path.as_ref().display(), e),
            })?;
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Exact lookup: the word is a canonical key or a listed variant.
    /// Inputs are expected pre-normalized (uppercase, no periods).
    pub fn canonicalize(&self, word: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.canonical == word || e.variants.iter().any(|v| v == word))
            .map(|e| e.canonical.as_str())
    }

    /// Fuzzy lookup against the canonical keys. Returns the first entry (in
    /// file order) whose similarity strictly beats every earlier candidate
    /// and reaches `threshold`; ties therefore keep the first-listed key.
    pub fn correct(&self, word: &str, threshold: u32) -> Option<&str> {
        let mut best: Option<&str> = None;
        let mut best_sim = 0;
        for entry in &self.entries {
            let sim = matching::ratio(word, &entry.canonical);
            if sim > best_sim && sim >= threshold {
                best = Some(entry.canonical.as_str());
                best_sim = sim;
            }
        }
        best
    }

    /// Exact lookup first, fuzzy fallback second.
    pub fn resolve(&self, word: &str, threshold: u32) -> Option<&str> {
        self.canonicalize(word).or_else(|| self.correct(word, threshold))
    }
}

/// Both glossaries, constructed once and passed into the token normalizer.
#[derive(Debug, Clone)]
pub struct GlossaryStore {
    pub hierarchies: Glossary,
    pub abbreviations: Glossary,
}

impl GlossaryStore {
    pub fn load<P: AsRef<Path>>(hierarchy_path: P, abbreviation_path: P) -> Result<Arc<Self>> {
        let hierarchies = Glossary::load(hierarchy_path)?;
        let abbreviations = Glossary::load(abbreviation_path)?;
        tracing::info!(
            hierarchy_entries = hierarchies.len(),
            abbreviation_entries = abbreviations.len(),
            "glossaries loaded"
        );
        Ok(Arc::new(Self { hierarchies, abbreviations }))
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> Arc<GlossaryStore> {
    let hierarchies = Glossary::new(vec![
        GlossaryEntry {
            canonical: "AVENIDA".to_string(),
            variants: vec!["AV".to_string(), "AVDA".to_string(), "AVE".to_string()],
        },
        GlossaryEntry {
            canonical: "PASAJE".to_string(),
            variants: vec!["PJE".to_string(), "PSJE".to_string()],
        },
        GlossaryEntry {
            canonical: "CALLE".to_string(),
            variants: vec!["CLL".to_string()],
        },
    ]);
    let abbreviations = Glossary::new(vec![
        GlossaryEntry {
            canonical: "GENERAL".to_string(),
            variants: vec!["GRAL".to_string()],
        },
        GlossaryEntry {
            canonical: "PRESIDENTE".to_string(),
            variants: vec!["PDTE".to_string()],
        },
    ]);
    Arc::new(GlossaryStore { hierarchies, abbreviations })
}
