//! Point-in-commune containment check against stored boundary polygons.
//!
//! Polygons are stored as JSON rings of `[lon, lat]` pairs, one row per
//! commune. The check classifies the resolved point as inside, on the
//! boundary, or outside; the caller treats its failure as an explicit error
//! marker, never as a resolution failure.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::common::error::{GeoError, Result};
use crate::domain::{AdminUnit, Containment};

/// Distance (in degrees) under which a point counts as on the boundary.
const EDGE_EPSILON: f64 = 1e-9;

#[async_trait]
pub trait BoundaryProvider: Send + Sync {
    /// Classifies the point against the commune's polygon. `None` when the
    /// commune code is unknown.
    async fn containing_admin_unit(
        &self,
        commune_code: &str,
        lat: f64,
        lon: f64,
    ) -> Result<Option<AdminUnit>>;
}

/// Squared distance from point `p` to segment `a`-`b`, all in degrees.
fn point_segment_distance_sq(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (px, py) = p;
    let (ax, ay) = a;
    let (bx, by) = b;
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx) * (px - cx) + (py - cy) * (py - cy)
}

/// Ray-casting containment for a single ring of `[lon, lat]` vertices.
fn point_in_ring(lon: f64, lat: f64, ring: &[(f64, f64)]) -> Containment {
    let mut inside = false;
    let n = ring.len();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if point_segment_distance_sq((lon, lat), a, b) < EDGE_EPSILON {
            return Containment::Boundary;
        }
        let (ax, ay) = a;
        let (bx, by) = b;
        if (ay > lat) != (by > lat) {
            let x_cross = ax + (lat - ay) / (by - ay) * (bx - ax);
            if lon < x_cross {
                inside = !inside;
            }
        }
    }
    if inside {
        Containment::Inside
    } else {
        Containment::Outside
    }
}

/// SQLite-backed boundary provider over the `comunas` table.
pub struct SqliteBoundary {
    conn: Mutex<Connection>,
}

impl SqliteBoundary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self { conn: Mutex::new(Connection::open(path)?) })
    }

    pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS comunas (
                cut_com TEXT PRIMARY KEY,
                comuna  TEXT NOT NULL,
                geom    TEXT NOT NULL
            );
            "#,
        )
    }

    fn parse_rings(geom: &str) -> Result<Vec<Vec<(f64, f64)>>> {
        let rings: Vec<Vec<[f64; 2]>> =
            serde_json::from_str(geom).map_err(|e| GeoError::Provider {
                message: format!("malformed commune geometry: {}", e),
            })?;
        Ok(rings
            .into_iter()
            .map(|ring| ring.into_iter().map(|[lon, lat]| (lon, lat)).collect())
            .collect())
    }
}

#[async_trait]
impl BoundaryProvider for SqliteBoundary {
    async fn containing_admin_unit(
        &self,
        commune_code: &str,
        lat: f64,
        lon: f64,
    ) -> Result<Option<AdminUnit>> {
        let (comuna, geom) = {
            let conn = self.conn.lock().expect("boundary connection poisoned");
            let row = conn
                .query_row(
                    "SELECT comuna, geom FROM comunas WHERE cut_com = ?1",
                    params![commune_code],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            match row {
                Some(pair) => pair,
                None => return Ok(None),
            }
        };

        let rings = Self::parse_rings(&geom)?;
        let mut relation = Containment::Outside;
        for ring in &rings {
            match point_in_ring(lon, lat, ring) {
                Containment::Boundary => {
                    relation = Containment::Boundary;
                    break;
                }
                Containment::Inside => relation = Containment::Inside,
                Containment::Outside => {}
            }
        }

        Ok(Some(AdminUnit {
            comuna,
            commune_code: commune_code.to_string(),
            relation,
        }))
    }
}
