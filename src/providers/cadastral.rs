//! Cadastral registry: property-level records with exact house numbers, plus
//! the locality table used when the query carries no number.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::common::error::Result;
use crate::domain::{CadastralAddress, CadastralLocality};

/// Exact-match semantics on number; partial (`%word%…%word%`) semantics on
/// street and locality names.
#[async_trait]
pub trait CadastralProvider: Send + Sync {
    async fn lookup_by_number(
        &self,
        commune_code: i64,
        street: &str,
        number: &str,
    ) -> Result<Option<CadastralAddress>>;

    async fn lookup_locality(
        &self,
        commune_code: i64,
        name: &str,
    ) -> Result<Option<CadastralLocality>>;
}

/// Joins the words of a partial name with `%` so every word must appear in
/// order, the same shape the registry's ILIKE queries use.
fn like_pattern(name: &str) -> String {
    let joined: Vec<&str> = name.split_whitespace().collect();
    format!("%{}%", joined.join("%"))
}

/// SQLite-backed cadastral provider over two datasets: `apt_chile`
/// (numbered addresses) and `localidades`.
pub struct SqliteCadastral {
    addresses: Mutex<Connection>,
    localities: Mutex<Connection>,
}

impl SqliteCadastral {
    pub fn open<P: AsRef<Path>>(addresses_path: P, localities_path: P) -> Result<Self> {
        Ok(Self {
            addresses: Mutex::new(Connection::open(addresses_path)?),
            localities: Mutex::new(Connection::open(localities_path)?),
        })
    }

    pub fn create_address_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS apt_chile (
                cod_direccion   TEXT,
                nombre_direcc   TEXT NOT NULL,
                numero          TEXT NOT NULL,
                coordenada_x    TEXT,
                coordenada_y    TEXT,
                cod_comuna_ine  INTEGER NOT NULL,
                fuente          TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_apt_comuna_numero
                ON apt_chile (cod_comuna_ine, numero);
            "#,
        )
    }

    pub fn create_locality_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS localidades (
                id_localid       INTEGER,
                cod_comuna       TEXT NOT NULL,
                comuna           TEXT,
                cod_r            TEXT,
                region           TEXT,
                nombre_localidad TEXT NOT NULL,
                longitud         REAL,
                latitud          REAL
            );
            CREATE INDEX IF NOT EXISTS idx_localidades_comuna ON localidades (cod_comuna);
            "#,
        )
    }
}

#[async_trait]
impl CadastralProvider for SqliteCadastral {
    async fn lookup_by_number(
        &self,
        commune_code: i64,
        street: &str,
        number: &str,
    ) -> Result<Option<CadastralAddress>> {
        let conn = self.addresses.lock().expect("cadastral connection poisoned");
        let row = conn
            .query_row(
                r#"
                SELECT cod_direccion, nombre_direcc, numero, coordenada_x, coordenada_y,
                       cod_comuna_ine, fuente
                FROM apt_chile
                WHERE cod_comuna_ine = ?1
                  AND upper(nombre_direcc) LIKE upper(?2)
                  AND numero = ?3
                LIMIT 1
                "#,
                params![commune_code, like_pattern(street), number],
                |row| {
                    Ok(CadastralAddress {
                        code: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        street_name: row.get(1)?,
                        number: row.get(2)?,
                        coord_x: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        coord_y: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        commune_code: row.get(5)?,
                        source: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    async fn lookup_locality(
        &self,
        commune_code: i64,
        name: &str,
    ) -> Result<Option<CadastralLocality>> {
        let conn = self.localities.lock().expect("locality connection poisoned");
        let row = conn
            .query_row(
                r#"
                SELECT id_localid, cod_comuna, comuna, cod_r, region, nombre_localidad,
                       longitud, latitud
                FROM localidades
                WHERE cod_comuna = ?1
                  AND upper(nombre_localidad) LIKE upper(?2)
                LIMIT 1
                "#,
                params![commune_code.to_string(), like_pattern(name)],
                |row| {
                    Ok(CadastralLocality {
                        id: row.get::<_, Option<i64>>(0)?.unwrap_or_default(),
                        commune_code: row.get(1)?,
                        comuna: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        region_code: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        region: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        name: row.get(5)?,
                        longitude: row.get(6)?,
                        latitude: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
