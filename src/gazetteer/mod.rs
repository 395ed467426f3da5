//! The authoritative street gazetteer: a loose pre-filter over the catalog
//! followed by per-row composite scoring to pick the single best street.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::debug;

use crate::common::error::Result;
use crate::domain::{GazetteerRow, MatchCandidate, NormalizedAddress, StreetRecord};
use crate::matching;
use crate::observability::metrics;

/// Gate for the hierarchy sub-score. Strictly greater-than: a hierarchy
/// match at exactly 70 contributes nothing.
pub const HIERARCHY_GATE: u32 = 70;
/// Gate for the commune sub-score (inclusive).
pub const COMMUNE_GATE: u32 = 70;
/// Gate for the region sub-score (inclusive).
pub const REGION_GATE: u32 = 70;
/// Gate for the street-name sub-score (inclusive).
pub const STREET_GATE: u32 = 50;

/// Read-only snapshot access to the street catalog. The pre-filter is an
/// inexpensive candidate cut, not the final decision.
#[async_trait]
pub trait GazetteerProvider: Send + Sync {
    async fn candidates(
        &self,
        street: &str,
        comuna: &str,
        region: &str,
    ) -> Result<Vec<GazetteerRow>>;
}

/// SQLite-backed gazetteer over the `maestro_calles` table.
pub struct SqliteGazetteer {
    conn: Mutex<Connection>,
}

impl SqliteGazetteer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS maestro_calles (
                jerarquia   TEXT,
                nombre_via  TEXT NOT NULL,
                comuna      TEXT NOT NULL,
                provincia   TEXT,
                region      TEXT NOT NULL,
                cut         TEXT NOT NULL,
                cut_r       TEXT NOT NULL,
                cen_lat     REAL,
                cen_lon     REAL
            );
            CREATE INDEX IF NOT EXISTS idx_maestro_comuna ON maestro_calles (comuna);
            "#,
        )
    }
}

#[async_trait]
impl GazetteerProvider for SqliteGazetteer {
    async fn candidates(
        &self,
        street: &str,
        comuna: &str,
        region: &str,
    ) -> Result<Vec<GazetteerRow>> {
        let conn = self.conn.lock().expect("gazetteer connection poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT jerarquia, nombre_via, comuna, provincia, region, cut, cut_r, cen_lat, cen_lon
            FROM maestro_calles
            WHERE upper(comuna) LIKE '%' || ?1 || '%'
               OR upper(region) LIKE '%' || ?2 || '%'
               OR upper(nombre_via) LIKE '%' || ?3 || '%'
            "#,
        )?;
        let rows = stmt.query_map(
            [
                comuna.trim().to_uppercase(),
                region.trim().to_uppercase(),
                street.trim().to_uppercase(),
            ],
            |row| {
                Ok(GazetteerRow {
                    hierarchy: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    street_name: row.get(1)?,
                    comuna: row.get(2)?,
                    province: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    region: row.get(4)?,
                    commune_code: row.get(5)?,
                    region_code: row.get(6)?,
                    centroid_lat: row.get(7)?,
                    centroid_lon: row.get(8)?,
                })
            },
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Scores gazetteer candidates against the working address and applies the
/// winning row to it.
pub struct GazetteerMatcher {
    provider: Arc<dyn GazetteerProvider>,
}

impl GazetteerMatcher {
    pub fn new(provider: Arc<dyn GazetteerProvider>) -> Self {
        Self { provider }
    }

    /// Four gated sub-scores summed into the composite. Gating each term
    /// individually rewards rows plausible on several fields at once and
    /// zeroes out single coincidental matches.
    fn score_row(
        row: GazetteerRow,
        hierarchy: &str,
        street: &str,
        comuna: &str,
        region: &str,
    ) -> MatchCandidate {
        let hierarchy_sim = if row.hierarchy.is_empty() {
            0
        } else {
            matching::ratio(&row.hierarchy.to_uppercase(), hierarchy)
        };
        let commune_sim = matching::ratio(&row.comuna.to_uppercase(), comuna);
        let region_sim = matching::ratio(&row.region.to_uppercase(), region);
        let street_sim = matching::ratio(&row.street_name.to_uppercase(), street);

        let score = (if hierarchy_sim > HIERARCHY_GATE { hierarchy_sim } else { 0 })
            + (if commune_sim >= COMMUNE_GATE { commune_sim } else { 0 })
            + (if region_sim >= REGION_GATE { region_sim } else { 0 })
            + (if street_sim >= STREET_GATE { street_sim } else { 0 });

        MatchCandidate { row, hierarchy_sim, commune_sim, region_sim, street_sim, score }
    }

    /// Scans the pre-filtered candidate set and keeps the single
    /// highest-scoring row; ties keep the first-encountered row in storage
    /// order. A composite of zero is "no match", not an error.
    pub async fn best_match(&self, addr: &NormalizedAddress) -> Result<Option<MatchCandidate>> {
        let street = addr.street_name.trim().to_uppercase();
        let comuna = addr.comuna.trim().to_uppercase();
        let region = addr.region.trim().to_uppercase();
        let hierarchy = addr.hierarchy.trim().to_uppercase();

        let rows = self.provider.candidates(&street, &comuna, &region).await?;
        debug!(candidates = rows.len(), "scoring gazetteer candidates");

        let mut best: Option<MatchCandidate> = None;
        for row in rows {
            let candidate = Self::score_row(row, &hierarchy, &street, &comuna, &region);
            if candidate.score > best.as_ref().map(|b| b.score).unwrap_or(0) {
                best = Some(candidate);
            }
        }

        match &best {
            Some(c) => metrics::gazetteer::match_found(c.score),
            None => metrics::gazetteer::match_missed(),
        }
        Ok(best)
    }

    /// Attaches the winning row: street record (codes + centroid), corrected
    /// street name (hierarchy-qualified), and the canonical formatted address.
    pub fn apply(addr: &mut NormalizedAddress, candidate: &MatchCandidate) {
        let row = &candidate.row;
        addr.street_record = Some(StreetRecord::from_row(row));
        addr.street_name = row.qualified_street();
        addr.formatted_address = format!(
            "{} {} {}, {}, {}, {}",
            row.hierarchy, row.street_name, addr.house_number, row.comuna, row.province, row.region
        );
    }
}
