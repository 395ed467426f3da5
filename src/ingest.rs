//! CSV import for the reference datasets the providers read. One-shot
//! utility driven by the `load-data` subcommand; each import recreates the
//! target table schema if needed and inserts inside a single transaction.

use std::path::Path;

use rusqlite::{params, Connection};
use serde::Deserialize;
use tracing::info;

use crate::common::error::{GeoError, Result};
use crate::config::AppConfig;
use crate::gazetteer::SqliteGazetteer;
use crate::providers::boundary::SqliteBoundary;
use crate::providers::cadastral::SqliteCadastral;
use crate::providers::electoral::SqliteElectoral;

/// Reference datasets that can be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Dataset {
    Gazetteer,
    Cadastral,
    Localities,
    ElectoralAddresses,
    ElectoralLocalities,
    Boundaries,
}

#[derive(Debug, Deserialize)]
struct GazetteerCsvRow {
    #[serde(rename = "JERARQUIA", default)]
    jerarquia: String,
    #[serde(rename = "NOMBRE_VIA")]
    nombre_via: String,
    #[serde(rename = "COMUNA")]
    comuna: String,
    #[serde(rename = "PROVINCIA", default)]
    provincia: String,
    #[serde(rename = "REGION")]
    region: String,
    #[serde(rename = "CUT")]
    cut: String,
    #[serde(rename = "CUT_R")]
    cut_r: String,
    #[serde(rename = "CEN_LAT")]
    cen_lat: Option<f64>,
    #[serde(rename = "CEN_LON")]
    cen_lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CadastralCsvRow {
    #[serde(rename = "COD_DIRECCION", default)]
    cod_direccion: String,
    #[serde(rename = "NOMBRE_DIRECC")]
    nombre_direcc: String,
    #[serde(rename = "NUMERO")]
    numero: String,
    #[serde(rename = "COORDENADA_X", default)]
    coordenada_x: String,
    #[serde(rename = "COORDENADA_Y", default)]
    coordenada_y: String,
    #[serde(rename = "COD_COMUNA_INE")]
    cod_comuna_ine: i64,
    #[serde(rename = "FUENTE", default)]
    fuente: String,
}

#[derive(Debug, Deserialize)]
struct LocalityCsvRow {
    #[serde(rename = "ID_LOCALID", default)]
    id_localid: Option<i64>,
    #[serde(rename = "COD_COMUNA")]
    cod_comuna: String,
    #[serde(rename = "COMUNA", default)]
    comuna: String,
    #[serde(rename = "COD_R", default)]
    cod_r: String,
    #[serde(rename = "REGION", default)]
    region: String,
    #[serde(rename = "NOMBRE_LOCALIDAD")]
    nombre_localidad: String,
    #[serde(rename = "LONGITUD")]
    longitud: Option<f64>,
    #[serde(rename = "LATITUD")]
    latitud: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ElectoralAddressCsvRow {
    #[serde(rename = "NOMBRE_VIA")]
    nombre_via: String,
    #[serde(rename = "NUMERO")]
    numero: String,
    #[serde(rename = "COMUNA", default)]
    comuna: String,
    #[serde(rename = "PROVINCIA", default)]
    provincia: String,
    #[serde(rename = "REGION", default)]
    region: String,
    #[serde(rename = "CUT_COMUNA", default)]
    cut_comuna: String,
    #[serde(rename = "CUT_REGION", default)]
    cut_region: String,
    #[serde(rename = "LOCALIDAD", default)]
    localidad: String,
    #[serde(rename = "LATITUD")]
    latitud: Option<f64>,
    #[serde(rename = "LONGITUD")]
    longitud: Option<f64>,
    #[serde(rename = "CREATED_AT", default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct ElectoralLocalityCsvRow {
    #[serde(rename = "NOMBRE")]
    nombre: String,
    #[serde(rename = "COMUNA", default)]
    comuna: String,
    #[serde(rename = "REGION", default)]
    region: String,
    #[serde(rename = "CUT_COMUNA", default)]
    cut_comuna: String,
    #[serde(rename = "CUT_REGION", default)]
    cut_region: String,
    #[serde(rename = "LATITUD")]
    latitud: Option<f64>,
    #[serde(rename = "LONGITUD")]
    longitud: Option<f64>,
    #[serde(rename = "CREATED_DATE", default)]
    created_date: String,
}

#[derive(Debug, Deserialize)]
struct BoundaryCsvRow {
    #[serde(rename = "CUT_COM")]
    cut_com: String,
    #[serde(rename = "COMUNA")]
    comuna: String,
    #[serde(rename = "GEOM")]
    geom: String,
}

fn open_target(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Connection::open(path)?)
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::Reader::from_path(path).map_err(|e| GeoError::Config {
        message: format!("failed to open CSV {}: {}", path.display(), e),
    })
}

fn csv_row_error(path: &Path, e: csv::Error) -> GeoError {
    GeoError::Config { message: format!("malformed CSV row in {}: {}", path.display(), e) }
}

/// Imports `csv_path` into the dataset's SQLite file named by the config.
pub fn load(config: &AppConfig, dataset: Dataset, csv_path: &Path) -> Result<usize> {
    let count = match dataset {
        Dataset::Gazetteer => {
            let mut conn = open_target(&config.data.gazetteer_db)?;
            SqliteGazetteer::create_schema(&conn)?;
            let tx = conn.transaction()?;
            let mut count = 0;
            for row in csv_reader(csv_path)?.deserialize::<GazetteerCsvRow>() {
                let row = row.map_err(|e| csv_row_error(csv_path, e))?;
                tx.execute(
                    "INSERT INTO maestro_calles VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.jerarquia,
                        row.nombre_via,
                        row.comuna,
                        row.provincia,
                        row.region,
                        row.cut,
                        row.cut_r,
                        row.cen_lat,
                        row.cen_lon
                    ],
                )?;
                count += 1;
            }
            tx.commit()?;
            count
        }
        Dataset::Cadastral => {
            let mut conn = open_target(&config.data.cadastral_db)?;
            SqliteCadastral::create_address_schema(&conn)?;
            let tx = conn.transaction()?;
            let mut count = 0;
            for row in csv_reader(csv_path)?.deserialize::<CadastralCsvRow>() {
                let row = row.map_err(|e| csv_row_error(csv_path, e))?;
                tx.execute(
                    "INSERT INTO apt_chile VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        row.cod_direccion,
                        row.nombre_direcc,
                        row.numero,
                        row.coordenada_x,
                        row.coordenada_y,
                        row.cod_comuna_ine,
                        row.fuente
                    ],
                )?;
                count += 1;
            }
            tx.commit()?;
            count
        }
        Dataset::Localities => {
            let mut conn = open_target(&config.data.localities_db)?;
            SqliteCadastral::create_locality_schema(&conn)?;
            let tx = conn.transaction()?;
            let mut count = 0;
            for row in csv_reader(csv_path)?.deserialize::<LocalityCsvRow>() {
                let row = row.map_err(|e| csv_row_error(csv_path, e))?;
                tx.execute(
                    "INSERT INTO localidades VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row.id_localid,
                        row.cod_comuna,
                        row.comuna,
                        row.cod_r,
                        row.region,
                        row.nombre_localidad,
                        row.longitud,
                        row.latitud
                    ],
                )?;
                count += 1;
            }
            tx.commit()?;
            count
        }
        Dataset::ElectoralAddresses => {
            let mut conn = open_target(&config.data.electoral_db)?;
            SqliteElectoral::create_schema(&conn)?;
            let tx = conn.transaction()?;
            let mut count = 0;
            for row in csv_reader(csv_path)?.deserialize::<ElectoralAddressCsvRow>() {
                let row = row.map_err(|e| csv_row_error(csv_path, e))?;
                tx.execute(
                    "INSERT INTO direccion_persona VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        row.nombre_via,
                        row.numero,
                        row.comuna,
                        row.provincia,
                        row.region,
                        row.cut_comuna,
                        row.cut_region,
                        row.localidad,
                        row.latitud,
                        row.longitud,
                        row.created_at
                    ],
                )?;
                count += 1;
            }
            tx.commit()?;
            count
        }
        Dataset::ElectoralLocalities => {
            let mut conn = open_target(&config.data.electoral_db)?;
            SqliteElectoral::create_schema(&conn)?;
            let tx = conn.transaction()?;
            let mut count = 0;
            for row in csv_reader(csv_path)?.deserialize::<ElectoralLocalityCsvRow>() {
                let row = row.map_err(|e| csv_row_error(csv_path, e))?;
                tx.execute(
                    "INSERT INTO localidades_servel VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row.nombre,
                        row.comuna,
                        row.region,
                        row.cut_comuna,
                        row.cut_region,
                        row.latitud,
                        row.longitud,
                        row.created_date
                    ],
                )?;
                count += 1;
            }
            tx.commit()?;
            count
        }
        Dataset::Boundaries => {
            let mut conn = open_target(&config.data.boundaries_db)?;
            SqliteBoundary::create_schema(&conn)?;
            let tx = conn.transaction()?;
            let mut count = 0;
            for row in csv_reader(csv_path)?.deserialize::<BoundaryCsvRow>() {
                let row = row.map_err(|e| csv_row_error(csv_path, e))?;
                tx.execute(
                    "INSERT OR REPLACE INTO comunas VALUES (?1, ?2, ?3)",
                    params![row.cut_com, row.comuna, row.geom],
                )?;
                count += 1;
            }
            tx.commit()?;
            count
        }
    };

    info!(?dataset, rows = count, csv = %csv_path.display(), "dataset imported");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn gazetteer_csv_imports() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("maestro.csv");
        let mut file = std::fs::File::create(&csv_path).unwrap();
        writeln!(file, "JERARQUIA,NOMBRE_VIA,COMUNA,PROVINCIA,REGION,CUT,CUT_R,CEN_LAT,CEN_LON").unwrap();
        writeln!(file, "AVENIDA,PROVIDENCIA,PROVIDENCIA,SANTIAGO,METROPOLITANA,13123,13,-33.43,-70.61").unwrap();
        writeln!(file, "CALLE,LOS ALERCES,ARICA,ARICA,ARICA Y PARINACOTA,15101,15,,").unwrap();

        let db_path = dir.path().join("maestro.db");
        let config_raw = format!(
            r#"
            [data]
            gazetteer_db = "{db}"
            cadastral_db = "{dir}/apt.db"
            localities_db = "{dir}/loc.db"
            electoral_db = "{dir}/servel.db"
            boundaries_db = "{dir}/comunas.db"
            hierarchy_glossary = "unused"
            abbreviation_glossary = "unused"
            "#,
            db = db_path.display(),
            dir = dir.path().display(),
        );
        let config: AppConfig = toml::from_str(&config_raw).unwrap();

        let imported = load(&config, Dataset::Gazetteer, &csv_path).unwrap();
        assert_eq!(imported, 2);

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM maestro_calles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let missing_centroid: Option<f64> = conn
            .query_row(
                "SELECT cen_lat FROM maestro_calles WHERE comuna = 'ARICA'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(missing_centroid.is_none());
    }
}
