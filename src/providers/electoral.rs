//! Electoral roll: voter-registration addresses and localities, matched with
//! trigram similarity the way the upstream registry ranks them.
//!
//! The similarity thresholds are load-bearing business rules shared with the
//! registry operators; do not adjust them here.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::common::error::Result;
use crate::domain::{ElectoralAddress, ElectoralLocality};
use crate::matching;

/// Street-name similarity floor for person-address matches.
pub const STREET_SIMILARITY_THRESHOLD: f64 = 0.6;
/// Commune/region name similarity accepted in place of a code match.
pub const ADMIN_SIMILARITY_THRESHOLD: f64 = 0.9;
/// Locality-name similarity floor.
pub const LOCALITY_SIMILARITY_THRESHOLD: f64 = 0.9;

/// Fuzzy lookups against the electoral datasets. Both calls return the
/// top-scoring row (similarity desc, then most recently created) or nothing.
#[async_trait]
pub trait ElectoralProvider: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn match_person_address(
        &self,
        street: &str,
        number: &str,
        comuna: &str,
        region: &str,
        commune_code: &str,
        region_code: &str,
    ) -> Result<Option<ElectoralAddress>>;

    async fn match_locality(
        &self,
        name: &str,
        comuna: &str,
        region: &str,
        commune_code: &str,
        region_code: &str,
    ) -> Result<Option<ElectoralLocality>>;
}

/// Whether a row's administrative unit matches the query, by code equality
/// or by name similarity above the admin threshold.
fn admin_matches(row_code: &str, query_code: &str, row_name: &str, query_name: &str) -> bool {
    (!row_code.is_empty() && row_code == query_code)
        || matching::trigram_similarity(row_name, query_name) > ADMIN_SIMILARITY_THRESHOLD
}

/// SQLite-backed electoral provider. The registry computes similarity
/// server-side; here the narrowing happens in SQL (exact number) and the
/// trigram ranking client-side, which preserves the same ordering contract.
pub struct SqliteElectoral {
    conn: Mutex<Connection>,
}

impl SqliteElectoral {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self { conn: Mutex::new(Connection::open(path)?) })
    }

    pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS direccion_persona (
                nombre_via   TEXT NOT NULL,
                numero       TEXT NOT NULL,
                comuna       TEXT,
                provincia    TEXT,
                region       TEXT,
                cut_comuna   TEXT,
                cut_region   TEXT,
                localidad    TEXT,
                latitud      REAL,
                longitud     REAL,
                created_at   TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_dp_numero ON direccion_persona (numero);
            CREATE TABLE IF NOT EXISTS localidades_servel (
                nombre       TEXT NOT NULL,
                comuna       TEXT,
                region       TEXT,
                cut_comuna   TEXT,
                cut_region   TEXT,
                latitud      REAL,
                longitud     REAL,
                created_date TEXT
            );
            "#,
        )
    }
}

#[async_trait]
impl ElectoralProvider for SqliteElectoral {
    async fn match_person_address(
        &self,
        street: &str,
        number: &str,
        comuna: &str,
        region: &str,
        commune_code: &str,
        region_code: &str,
    ) -> Result<Option<ElectoralAddress>> {
        let conn = self.conn.lock().expect("electoral connection poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT nombre_via, numero, comuna, provincia, region, cut_comuna, cut_region,
                   localidad, latitud, longitud, created_at
            FROM direccion_persona
            WHERE numero = ?1
            "#,
        )?;
        let rows = stmt.query_map(params![number], |row| {
            Ok(ElectoralAddress {
                score: 0.0,
                street_name: row.get(0)?,
                number: row.get(1)?,
                comuna: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                province: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                region: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                commune_code: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                region_code: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                locality: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                latitude: row.get(8)?,
                longitude: row.get(9)?,
                created_at: row
                    .get::<_, Option<String>>(10)?
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
            })
        })?;

        let mut candidates: Vec<ElectoralAddress> = Vec::new();
        for row in rows {
            let mut address = row?;
            let street_sim = matching::trigram_similarity(&address.street_name, street);
            if street_sim <= STREET_SIMILARITY_THRESHOLD {
                continue;
            }
            if !admin_matches(&address.region_code, region_code, &address.region, region) {
                continue;
            }
            if !admin_matches(&address.commune_code, commune_code, &address.comuna, comuna) {
                continue;
            }
            address.score = street_sim;
            candidates.push(address);
        }

        // similarity desc, then most recently created
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(candidates.into_iter().next())
    }

    async fn match_locality(
        &self,
        name: &str,
        comuna: &str,
        region: &str,
        commune_code: &str,
        region_code: &str,
    ) -> Result<Option<ElectoralLocality>> {
        let conn = self.conn.lock().expect("electoral connection poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT nombre, comuna, region, cut_comuna, cut_region, latitud, longitud, created_date
            FROM localidades_servel
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                ElectoralLocality {
                    score: 0.0,
                    name: row.get(0)?,
                    comuna: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    region: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    latitude: row.get(5)?,
                    longitude: row.get(6)?,
                    created_at: row
                        .get::<_, Option<String>>(7)?
                        .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
                },
                row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            ))
        })?;

        let mut candidates: Vec<ElectoralLocality> = Vec::new();
        for row in rows {
            let (mut locality, row_cut_com, row_cut_reg) = row?;
            let name_sim = matching::trigram_similarity(&locality.name, name);
            if name_sim <= LOCALITY_SIMILARITY_THRESHOLD {
                continue;
            }
            if !admin_matches(&row_cut_reg, region_code, &locality.region, region) {
                continue;
            }
            if !admin_matches(&row_cut_com, commune_code, &locality.comuna, comuna) {
                continue;
            }
            locality.score = name_sim;
            candidates.push(locality);
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(candidates.into_iter().next())
    }
}
