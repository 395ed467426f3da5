//! Wire request/response shapes for the resolution endpoint. Field names are
//! the Spanish literals existing clients already send.

use serde::{Deserialize, Serialize};

use crate::domain::AddressQuery;

fn default_show() -> String {
    "coords".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetGeoRequest {
    #[serde(default)]
    pub nombre_via: String,
    #[serde(default)]
    pub numero: String,
    #[serde(default)]
    pub comuna: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub provincia: String,
    /// `"coords"` returns the coordinates object alone; anything else
    /// returns coordinates, boundary check and the full trace.
    #[serde(default = "default_show")]
    pub show: String,
}

impl GetGeoRequest {
    pub fn to_query(&self) -> AddressQuery {
        AddressQuery::new(&self.nombre_via, &self.numero, &self.comuna, &self.region, &self.provincia)
    }
}

/// Returned when required fields are missing; a warning, not a hard failure.
#[derive(Debug, Clone, Serialize)]
pub struct WarningsResponse {
    pub message: String,
    pub warnings: String,
}

impl WarningsResponse {
    pub fn missing_fields(missing: &[&str]) -> Self {
        Self {
            message: "Petición recibida con advertencias".to_string(),
            warnings: format!(
                "Faltan los siguientes campos requeridos: {}",
                missing.join(", ")
            ),
        }
    }
}
