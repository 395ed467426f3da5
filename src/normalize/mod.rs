//! Token-level correction of raw street names against the glossaries, plus
//! the rural short-circuit and house-number sentinel handling.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::NormalizedAddress;
use crate::glossary::GlossaryStore;
use crate::observability::metrics;

/// Minimum similarity for a glossary correction to be accepted.
pub const GLOSSARY_ACCEPT_THRESHOLD: u32 = 80;

/// Terms that mark an address as rural. Matched case-insensitively as
/// substrings of the raw street name; rural addresses skip token
/// normalization entirely, since the glossaries only describe urban
/// gazetteer-style street names.
pub const RURAL_MARKERS: &[&str] =
    &["RUTA", "KILOMETRO", "KM.", "FUNDO", "PARCELA", "SECTOR", "LOTE"];

static NO_NUMBER_SENTINEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^s[\s/.-]?n\.?$").expect("sentinel regex"));

/// Trims the house number and collapses the "sin número" sentinels
/// (`S/N`, `SN`, `S-N`, `S N`) to the empty string.
pub fn normalize_house_number(raw: &str) -> String {
    let trimmed = raw.trim();
    if NO_NUMBER_SENTINEL.is_match(trimmed) {
        return String::new();
    }
    trimmed.to_string()
}

/// Whether the raw street name carries any rural indicator term.
pub fn is_rural(street_name: &str) -> bool {
    let upper = street_name.to_uppercase();
    RURAL_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// Uppercases a word and drops periods, the form every glossary entry uses.
fn normalize_token(word: &str) -> String {
    word.replace('.', "").trim().to_uppercase()
}

/// Corrects each word of the street name against the hierarchy glossary
/// first and the abbreviation glossary second, recording the first word that
/// resolves to a hierarchy key as the address's street-type qualifier.
pub struct TokenNormalizer {
    glossaries: Arc<GlossaryStore>,
}

impl TokenNormalizer {
    pub fn new(glossaries: Arc<GlossaryStore>) -> Self {
        Self { glossaries }
    }

    /// Rewrites `addr.street_name` with corrected tokens and derives
    /// `addr.hierarchy`. Rural addresses are flagged and passed through
    /// verbatim.
    pub fn normalize(&self, addr: &mut NormalizedAddress) {
        if is_rural(&addr.street_name) {
            addr.rural = true;
            metrics::normalize::rural_bypass();
            debug!(street = %addr.street_name, "rural marker found, skipping normalization");
            return;
        }

        let mut corrected = Vec::new();
        for word in addr.street_name.split_whitespace() {
            let token = normalize_token(word);
            if let Some(key) = self
                .glossaries
                .hierarchies
                .resolve(&token, GLOSSARY_ACCEPT_THRESHOLD)
            {
                if addr.hierarchy.is_empty() {
                    addr.hierarchy = key.to_string();
                }
                corrected.push(key.to_string());
            } else if let Some(key) = self
                .glossaries
                .abbreviations
                .resolve(&token, GLOSSARY_ACCEPT_THRESHOLD)
            {
                corrected.push(key.to_string());
            } else {
                corrected.push(token);
            }
        }

        addr.street_name = corrected.join(" ");
        metrics::normalize::street_normalized();
        debug!(street = %addr.street_name, hierarchy = %addr.hierarchy, "street name normalized");
    }
}
