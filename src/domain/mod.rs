//! Domain types shared across the resolution pipeline.
//!
//! One `NormalizedAddress` is created per inbound query and threaded through
//! every stage; it doubles as the observability trace (`traza`) attached to
//! the final response. Reference rows (`GazetteerRow`, cadastral and electoral
//! records) are read-only snapshots of the underlying datasets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable inbound query. `house_number` has already been run through the
/// sentinel normalization (`S/N` and friends become empty) by the time a
/// query is constructed through [`AddressQuery::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressQuery {
    pub street_name: String,
    pub house_number: String,
    pub comuna: String,
    pub region: String,
    pub province: String,
}

impl AddressQuery {
    pub fn new(
        street_name: &str,
        house_number: &str,
        comuna: &str,
        region: &str,
        province: &str,
    ) -> Self {
        Self {
            street_name: street_name.trim().to_string(),
            house_number: crate::normalize::normalize_house_number(house_number),
            comuna: comuna.trim().to_string(),
            region: region.trim().to_string(),
            province: province.trim().to_string(),
        }
    }

    /// Names of required fields that are empty. A query only enters the
    /// cascade when this is empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.street_name.is_empty() {
            missing.push("nombre_via");
        }
        if self.comuna.is_empty() {
            missing.push("comuna");
        }
        if self.region.is_empty() {
            missing.push("region");
        }
        missing
    }
}

/// Which data source ultimately answered. The string forms are wire literals
/// consumed by downstream systems and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "APT CHILE")]
    AptChile,
    #[serde(rename = "APT LOCALIDADES")]
    AptLocalidades,
    #[serde(rename = "SERVEL_DIRECCION_PERSONA")]
    ServelDireccionPersona,
    #[serde(rename = "SERVEL_LOCALIDADES")]
    ServelLocalidades,
    #[serde(rename = "Nominatim")]
    Nominatim,
    #[serde(rename = "Google Maps")]
    GoogleMaps,
    #[serde(rename = "DIRECCION NO ENCONTRADA")]
    NotFound,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::AptChile => "APT CHILE",
            Origin::AptLocalidades => "APT LOCALIDADES",
            Origin::ServelDireccionPersona => "SERVEL_DIRECCION_PERSONA",
            Origin::ServelLocalidades => "SERVEL_LOCALIDADES",
            Origin::Nominatim => "Nominatim",
            Origin::GoogleMaps => "Google Maps",
            Origin::NotFound => "DIRECCION NO ENCONTRADA",
        }
    }
}

/// A row of the authoritative street gazetteer. Read-only reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazetteerRow {
    pub hierarchy: String,
    pub street_name: String,
    pub comuna: String,
    pub province: String,
    pub region: String,
    /// Unique territorial code of the commune (CUT).
    pub commune_code: String,
    /// Unique territorial code of the region.
    pub region_code: String,
    pub centroid_lat: Option<f64>,
    pub centroid_lon: Option<f64>,
}

impl GazetteerRow {
    /// The street as users write it: hierarchy qualifier plus bare name.
    /// The catalog stores them in separate columns.
    pub fn qualified_street(&self) -> String {
        if self.hierarchy.is_empty() {
            self.street_name.clone()
        } else {
            format!("{} {}", self.hierarchy, self.street_name)
        }
    }
}

/// Gazetteer match attached to the working address: the administrative codes
/// and commune centroid survive even when the textual correction is later
/// rolled back by the confidence scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetRecord {
    pub hierarchy: String,
    #[serde(rename = "cut")]
    pub commune_code: String,
    #[serde(rename = "cut_r")]
    pub region_code: String,
    #[serde(rename = "cen_lat")]
    pub centroid_lat: Option<f64>,
    #[serde(rename = "cen_lon")]
    pub centroid_lon: Option<f64>,
}

impl StreetRecord {
    pub fn from_row(row: &GazetteerRow) -> Self {
        Self {
            hierarchy: row.hierarchy.clone(),
            commune_code: row.commune_code.clone(),
            region_code: row.region_code.clone(),
            centroid_lat: row.centroid_lat,
            centroid_lon: row.centroid_lon,
        }
    }
}

/// Transient scoring record produced while scanning gazetteer candidates.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub row: GazetteerRow,
    pub hierarchy_sim: u32,
    pub commune_sim: u32,
    pub region_sim: u32,
    pub street_sim: u32,
    pub score: u32,
}

/// Property-level cadastral record (number-exact).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadastralAddress {
    pub code: String,
    pub street_name: String,
    pub number: String,
    /// Longitude as stored by the registry. Kept as text; parsing is lenient
    /// and happens only at emission.
    pub coord_x: String,
    /// Latitude as stored by the registry.
    pub coord_y: String,
    pub commune_code: i64,
    pub source: String,
}

/// Cadastral locality record (no house number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadastralLocality {
    pub id: i64,
    pub commune_code: String,
    pub comuna: String,
    pub region_code: String,
    pub region: String,
    pub name: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

/// Electoral-roll person address, ranked by server-side-style similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectoralAddress {
    pub score: f64,
    pub street_name: String,
    pub number: String,
    pub comuna: String,
    pub province: String,
    pub region: String,
    pub commune_code: String,
    pub region_code: String,
    pub locality: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Electoral-roll locality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectoralLocality {
    pub score: f64,
    pub name: String,
    pub comuna: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Location precision reported by the secondary geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionTag {
    #[serde(rename = "ROOFTOP")]
    Rooftop,
    #[serde(rename = "RANGE_INTERPOLATED")]
    RangeInterpolated,
    #[serde(rename = "GEOMETRIC_CENTER")]
    GeometricCenter,
    #[serde(rename = "APPROXIMATE")]
    Approximate,
}

impl PrecisionTag {
    /// Rooftop- or interpolated-range accuracy, the only tags the cascade
    /// accepts for numbered queries.
    pub fn is_precise(&self) -> bool {
        matches!(self, PrecisionTag::Rooftop | PrecisionTag::RangeInterpolated)
    }
}

/// One candidate returned by an external geocoder. Coordinates stay textual
/// until emission so a malformed value degrades instead of aborting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderCandidate {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<PrecisionTag>,
}

/// Mutable working record owned by a single resolution run. Serialized
/// verbatim as the `traza` member of the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAddress {
    #[serde(rename = "origen", skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(rename = "confianza")]
    pub confidence: u32,
    #[serde(rename = "nombre_via")]
    pub street_name: String,
    #[serde(rename = "numero")]
    pub house_number: String,
    #[serde(rename = "provincia")]
    pub province: String,
    pub comuna: String,
    pub region: String,
    #[serde(rename = "direccion_formateada")]
    pub formatted_address: String,
    #[serde(rename = "jerarquia")]
    pub hierarchy: String,
    pub rural: bool,
    #[serde(rename = "callejero", skip_serializing_if = "Option::is_none")]
    pub street_record: Option<StreetRecord>,
    #[serde(rename = "apt", skip_serializing_if = "Option::is_none")]
    pub cadastral: Option<CadastralAddress>,
    #[serde(rename = "apt_localidades", skip_serializing_if = "Option::is_none")]
    pub cadastral_locality: Option<CadastralLocality>,
    #[serde(rename = "servel_direccion_persona", skip_serializing_if = "Option::is_none")]
    pub electoral_address: Option<ElectoralAddress>,
    #[serde(rename = "servel_localidades", skip_serializing_if = "Option::is_none")]
    pub electoral_locality: Option<ElectoralLocality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominatim: Option<GeocoderCandidate>,
    #[serde(rename = "google_maps", skip_serializing_if = "Option::is_none")]
    pub google_maps: Option<GeocoderCandidate>,
}

impl NormalizedAddress {
    pub fn from_query(query: &AddressQuery) -> Self {
        Self {
            origin: None,
            confidence: 0,
            street_name: query.street_name.clone(),
            house_number: query.house_number.clone(),
            province: query.province.clone(),
            comuna: query.comuna.clone(),
            region: query.region.clone(),
            formatted_address: String::new(),
            hierarchy: String::new(),
            rural: false,
            street_record: None,
            cadastral: None,
            cadastral_locality: None,
            electoral_address: None,
            electoral_locality: None,
            nominatim: None,
            google_maps: None,
        }
    }

    /// Commune code from the gazetteer match, `0` when no street matched.
    pub fn commune_code(&self) -> String {
        self.street_record
            .as_ref()
            .map(|r| r.commune_code.clone())
            .unwrap_or_else(|| "0".to_string())
    }

    /// Region code from the gazetteer match, `0` when no street matched.
    pub fn region_code(&self) -> String {
        self.street_record
            .as_ref()
            .map(|r| r.region_code.clone())
            .unwrap_or_else(|| "0".to_string())
    }
}

/// Final coordinates plus provenance. Invariant: `latitud` and `longitud` are
/// either both present, or both absent with origin `DIRECCION NO ENCONTRADA`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    #[serde(rename = "origen")]
    pub origin: Origin,
    pub direccion: String,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
}

/// Containment relation reported by the boundary provider. Wire literals are
/// the Spanish forms consumed by existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Containment {
    #[serde(rename = "Dentro")]
    Inside,
    #[serde(rename = "Limite")]
    Boundary,
    #[serde(rename = "Fuera")]
    Outside,
}

/// Administrative unit resolved by the boundary provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUnit {
    pub comuna: String,
    #[serde(rename = "cod_comuna")]
    pub commune_code: String,
    #[serde(rename = "resultado")]
    pub relation: Containment,
}

/// Outcome of the final point-in-commune check. Never fails the request;
/// errors are carried as an explicit marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundaryOutcome {
    Checked(AdminUnit),
    Error { error: String },
}

/// Everything the pipeline hands back for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    pub coords: ResolutionResult,
    pub geopanda: BoundaryOutcome,
    pub traza: NormalizedAddress,
}
