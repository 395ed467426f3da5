//! Decides how much of the gazetteer's correction to trust.
//!
//! Trust is all-or-nothing: any shortfall from 100 discards the gazetteer's
//! wording and keeps the user's original street name. The administrative
//! codes and centroid from the match survive regardless; they feed the
//! cadastral lookup keys and the centroid fallback.

use tracing::debug;

use crate::domain::{AddressQuery, MatchCandidate, NormalizedAddress};
use crate::matching;
use crate::observability::metrics;

/// Points granted when the gazetteer street survives both agreement checks.
pub const STREET_AGREEMENT_POINTS: u32 = 34;
/// Points granted for an exact commune match.
pub const COMMUNE_POINTS: u32 = 33;
/// Points granted for an exact region match.
pub const REGION_POINTS: u32 = 33;
/// Confidence required to trust the gazetteer wording at all.
pub const FULL_TRUST: u32 = 100;
/// Similarity floor between working street and the user's original; below
/// it every gazetteer-derived mutation is rolled back.
pub const STREET_SIMILARITY_FLOOR: u32 = 50;

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Scores the gazetteer match against the user's original input and
    /// settles the working street name.
    ///
    /// `normalized_street` is the token-normalizer output captured before the
    /// matcher replaced the street name; `pristine` is the untouched
    /// pre-normalization address.
    pub fn score(
        query: &AddressQuery,
        pristine: &NormalizedAddress,
        normalized_street: &str,
        candidate: Option<&MatchCandidate>,
        addr: &mut NormalizedAddress,
    ) {
        let original_street = query.street_name.to_uppercase();

        let Some(candidate) = candidate else {
            // The gazetteer contributed nothing; restore the user's fields.
            addr.confidence = 0;
            addr.street_name = query.street_name.clone();
            addr.comuna = query.comuna.clone();
            addr.region = query.region.clone();
            metrics::confidence::score_recorded(0);
            return;
        };

        let corrected = candidate.row.qualified_street().to_uppercase();
        let mut confidence = 0;

        let similarity_to_original = matching::ratio(&corrected, &original_street);
        if corrected == normalized_street.to_uppercase()
            && similarity_to_original > STREET_SIMILARITY_FLOOR
        {
            confidence += STREET_AGREEMENT_POINTS;
        } else {
            // Over-aggressive correction; keep the user's wording.
            addr.street_name = query.street_name.clone();
        }

        if candidate.row.comuna.to_uppercase() == query.comuna.to_uppercase() {
            confidence += COMMUNE_POINTS;
        }
        if candidate.row.region.to_uppercase() == query.region.to_uppercase() {
            confidence += REGION_POINTS;
        }

        // Full trust is all-or-nothing: any shortfall keeps the original
        // street name, never a blend.
        if confidence < FULL_TRUST {
            addr.street_name = query.street_name.clone();
        }
        addr.confidence = confidence;
        metrics::confidence::score_recorded(confidence);

        // Second check: if even the settled street has drifted too far from
        // what the user typed, the gazetteer's answer is judged too divergent
        // to trust at all.
        let working = addr.street_name.to_uppercase();
        if matching::ratio(&working, &original_street) < STREET_SIMILARITY_FLOOR {
            debug!(
                working = %addr.street_name,
                original = %query.street_name,
                "gazetteer correction too divergent, reverting to pristine address"
            );
            let rural = addr.rural;
            let record = addr.street_record.clone();
            *addr = pristine.clone();
            addr.rural = rural;
            // Codes and centroid stay available for later cascade stages.
            addr.street_record = record;
            addr.confidence = 0;
            metrics::confidence::reverted();
        }
    }
}
