//! The resolution cascade: a strict-precedence state machine over the data
//! sources. Each state either accepts (terminal) or falls through; the
//! commune-centroid fallback at the end guarantees the cascade always
//! returns a structurally valid result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::error::Result;
use crate::confidence::ConfidenceScorer;
use crate::domain::{
    AddressQuery, BoundaryOutcome, Containment, NormalizedAddress, Origin, ResolutionOutcome,
    ResolutionResult,
};
use crate::gazetteer::GazetteerMatcher;
use crate::matching;
use crate::normalize::TokenNormalizer;
use crate::observability::metrics;
use crate::providers::{BoundaryProvider, CadastralProvider, ElectoralProvider, Geocoder};

/// Similarity floor between a secondary-geocoder result and the query text.
pub const GEOCODER_TEXT_RATIO_FLOOR: u32 = 50;
/// Alternative acceptance criterion: share of query words present in the
/// secondary-geocoder result.
pub const WORD_COVERAGE_FLOOR: f64 = 75.0;

/// A terminal answer produced by one cascade state. Coordinates stay textual
/// until emission so malformed provider values degrade instead of erroring.
struct Accepted {
    origin: Origin,
    direccion: String,
    lat: String,
    lon: String,
}

/// Lenient coordinate parsing: a malformed or missing value becomes `None`
/// and is handled downstream, never an error.
fn parse_coord(raw: &str, field: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(field, value = %raw, "coordinate did not parse, downgrading");
            None
        }
    }
}

/// `{street} {number}, {province}, {comuna}, {region}` as the electoral roll
/// formats person addresses.
fn format_electoral_address(row: &crate::domain::ElectoralAddress) -> String {
    format!(
        "{} {}, {}, {}, {}",
        row.street_name, row.number, row.province, row.comuna, row.region
    )
}

/// One pipeline instance serves all requests; every per-request mutation
/// lives in the `NormalizedAddress` owned by that resolution run.
pub struct ResolutionPipeline {
    normalizer: TokenNormalizer,
    matcher: GazetteerMatcher,
    cadastral: Arc<dyn CadastralProvider>,
    electoral: Arc<dyn ElectoralProvider>,
    primary_geocoder: Arc<dyn Geocoder>,
    secondary_geocoder: Arc<dyn Geocoder>,
    boundary: Arc<dyn BoundaryProvider>,
    call_timeout: Duration,
}

impl ResolutionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        normalizer: TokenNormalizer,
        matcher: GazetteerMatcher,
        cadastral: Arc<dyn CadastralProvider>,
        electoral: Arc<dyn ElectoralProvider>,
        primary_geocoder: Arc<dyn Geocoder>,
        secondary_geocoder: Arc<dyn Geocoder>,
        boundary: Arc<dyn BoundaryProvider>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            normalizer,
            matcher,
            cadastral,
            electoral,
            primary_geocoder,
            secondary_geocoder,
            boundary,
            call_timeout,
        }
    }

    /// Bounds a provider call and downgrades both errors and deadline expiry
    /// to "no match" so the cascade can fall through.
    async fn guard<T, F>(&self, stage: &'static str, call: F) -> Option<T>
    where
        F: Future<Output = Result<Option<T>>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(stage, error = %e, "provider call failed, falling through");
                metrics::cascade::provider_error();
                None
            }
            Err(_) => {
                warn!(stage, timeout_secs = self.call_timeout.as_secs(), "provider call timed out, falling through");
                metrics::cascade::provider_timeout();
                None
            }
        }
    }

    /// Same guard for candidate-list calls; failures become an empty list.
    async fn guard_candidates<F>(
        &self,
        stage: &'static str,
        call: F,
    ) -> Vec<crate::domain::GeocoderCandidate>
    where
        F: Future<Output = Result<Vec<crate::domain::GeocoderCandidate>>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!(stage, error = %e, "geocoder call failed, falling through");
                metrics::cascade::provider_error();
                Vec::new()
            }
            Err(_) => {
                warn!(stage, timeout_secs = self.call_timeout.as_secs(), "geocoder call timed out, falling through");
                metrics::cascade::provider_timeout();
                Vec::new()
            }
        }
    }

    pub async fn resolve(&self, query: AddressQuery) -> ResolutionOutcome {
        let request_id = Uuid::new_v4();
        info!(%request_id, street = %query.street_name, comuna = %query.comuna, "resolving address");

        let pristine = NormalizedAddress::from_query(&query);
        let mut addr = pristine.clone();

        // Token correction, gazetteer scoring, confidence.
        self.normalizer.normalize(&mut addr);
        let normalized_street = addr.street_name.clone();

        let candidate = match self.matcher.best_match(&addr).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(%request_id, error = %e, "gazetteer scan failed, continuing without a match");
                metrics::cascade::provider_error();
                None
            }
        };
        if let Some(c) = &candidate {
            GazetteerMatcher::apply(&mut addr, c);
        }
        ConfidenceScorer::score(&query, &pristine, &normalized_street, candidate.as_ref(), &mut addr);
        debug!(%request_id, confidence = addr.confidence, street = %addr.street_name, "confidence settled");

        let mut accepted = self.cadastral_stage(&mut addr).await;
        if accepted.is_none() {
            accepted = self.electoral_stage(&mut addr).await;
        }
        if accepted.is_none() {
            accepted = self.geocoder_stages(&mut addr).await;
        }
        let accepted = accepted.unwrap_or_else(|| Self::centroid_fallback(&addr));

        self.emit(request_id, accepted, addr).await
    }

    /// State 1: cadastral registry. A hit is always recorded in the trace
    /// but only a full-trust address (confidence exactly 100) is terminal.
    async fn cadastral_stage(&self, addr: &mut NormalizedAddress) -> Option<Accepted> {
        let commune_code: i64 = addr.commune_code().parse().unwrap_or(0);

        if !addr.house_number.is_empty() {
            let row = self
                .guard(
                    "cadastral_address",
                    self.cadastral
                        .lookup_by_number(commune_code, &addr.street_name, &addr.house_number),
                )
                .await?;
            addr.cadastral = Some(row.clone());
            if addr.confidence == 100 {
                return Some(Accepted {
                    origin: Origin::AptChile,
                    direccion: addr.formatted_address.clone(),
                    lat: row.coord_y,
                    lon: row.coord_x,
                });
            }
        } else {
            let row = self
                .guard(
                    "cadastral_locality",
                    self.cadastral.lookup_locality(commune_code, &addr.street_name),
                )
                .await?;
            addr.cadastral_locality = Some(row.clone());
            if addr.confidence == 100 {
                return Some(Accepted {
                    origin: Origin::AptLocalidades,
                    direccion: addr.formatted_address.clone(),
                    lat: row.latitude.map(|v| v.to_string()).unwrap_or_default(),
                    lon: row.longitude.map(|v| v.to_string()).unwrap_or_default(),
                });
            }
        }
        None
    }

    /// State 2: electoral roll. The top-scoring row is terminal.
    async fn electoral_stage(&self, addr: &mut NormalizedAddress) -> Option<Accepted> {
        let commune_code = addr.commune_code();
        let region_code = addr.region_code();

        if !addr.house_number.is_empty() {
            let row = self
                .guard(
                    "electoral_address",
                    self.electoral.match_person_address(
                        &addr.street_name,
                        &addr.house_number,
                        &addr.comuna,
                        &addr.region,
                        &commune_code,
                        &region_code,
                    ),
                )
                .await?;
            addr.electoral_address = Some(row.clone());
            Some(Accepted {
                origin: Origin::ServelDireccionPersona,
                direccion: format_electoral_address(&row),
                lat: row.latitude.map(|v| v.to_string()).unwrap_or_default(),
                lon: row.longitude.map(|v| v.to_string()).unwrap_or_default(),
            })
        } else {
            let row = self
                .guard(
                    "electoral_locality",
                    self.electoral.match_locality(
                        &addr.street_name,
                        &addr.comuna,
                        &addr.region,
                        &commune_code,
                        &region_code,
                    ),
                )
                .await?;
            addr.electoral_locality = Some(row.clone());
            Some(Accepted {
                origin: Origin::ServelLocalidades,
                direccion: row.name.clone(),
                lat: row.latitude.map(|v| v.to_string()).unwrap_or_default(),
                lon: row.longitude.map(|v| v.to_string()).unwrap_or_default(),
            })
        }
    }

    /// States 3 and 4: the external geocoders, primary first.
    async fn geocoder_stages(&self, addr: &mut NormalizedAddress) -> Option<Accepted> {
        let free_text = format!(
            "{} {}, {}, {}",
            addr.street_name, addr.house_number, addr.comuna, addr.region
        );

        // State 3: accept the top candidate only if the house number appears
        // verbatim in its display text (vacuously true without a number) or
        // the address is rural.
        let candidates = self
            .guard_candidates(
                "primary_geocoder",
                self.primary_geocoder.geocode(&free_text, addr.rural),
            )
            .await;
        if let Some(top) = candidates.into_iter().next() {
            addr.nominatim = Some(top.clone());
            if addr.house_number.is_empty()
                || top.display_name.contains(&addr.house_number)
                || addr.rural
            {
                return Some(Accepted {
                    origin: Origin::Nominatim,
                    direccion: top.display_name,
                    lat: top.lat,
                    lon: top.lon,
                });
            }
            debug!("primary geocoder result lacked the house number, falling through");
        }

        // State 4: precision-gated candidates, validated against the query
        // text by edit-distance ratio or word coverage.
        let candidates = self
            .guard_candidates(
                "secondary_geocoder",
                self.secondary_geocoder.geocode(&free_text, addr.rural),
            )
            .await;
        let valid = candidates.into_iter().find(|c| {
            addr.house_number.is_empty() || c.precision.map(|p| p.is_precise()).unwrap_or(false)
        });
        if let Some(candidate) = valid {
            addr.google_maps = Some(candidate.clone());
            let text_ratio = matching::ratio(
                &candidate.display_name.to_lowercase(),
                &free_text.to_lowercase(),
            );
            let coverage = matching::word_coverage(&free_text, &candidate.display_name);
            if text_ratio > GEOCODER_TEXT_RATIO_FLOOR || coverage > WORD_COVERAGE_FLOOR {
                return Some(Accepted {
                    origin: Origin::GoogleMaps,
                    direccion: candidate.display_name,
                    lat: candidate.lat,
                    lon: candidate.lon,
                });
            }
            debug!(text_ratio, coverage, "secondary geocoder result failed validation");
        }

        None
    }

    /// State 5: commune centroid, always reachable.
    fn centroid_fallback(addr: &NormalizedAddress) -> Accepted {
        let (lat, lon) = addr
            .street_record
            .as_ref()
            .map(|r| {
                (
                    r.centroid_lat.map(|v| v.to_string()).unwrap_or_default(),
                    r.centroid_lon.map(|v| v.to_string()).unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        Accepted { origin: Origin::NotFound, direccion: String::new(), lat, lon }
    }

    /// Assembles the final result: lenient coordinate parsing, the invariant
    /// that coordinates are both present or both absent, and the boundary
    /// check as a soft post-condition.
    async fn emit(
        &self,
        request_id: Uuid,
        accepted: Accepted,
        mut addr: NormalizedAddress,
    ) -> ResolutionOutcome {
        let mut accepted = accepted;
        let mut latitud = parse_coord(&accepted.lat, "latitud");
        let mut longitud = parse_coord(&accepted.lon, "longitud");

        // A source whose coordinates do not parse downgrades to the
        // centroid fallback instead of emitting a half-filled answer.
        if (latitud.is_none() || longitud.is_none()) && accepted.origin != Origin::NotFound {
            warn!(%request_id, origin = accepted.origin.as_str(), "accepted source had unusable coordinates, downgrading to centroid");
            accepted = Self::centroid_fallback(&addr);
            latitud = parse_coord(&accepted.lat, "latitud");
            longitud = parse_coord(&accepted.lon, "longitud");
        }
        if latitud.is_none() || longitud.is_none() {
            latitud = None;
            longitud = None;
        }

        addr.origin = Some(accepted.origin);
        metrics::cascade::accepted(accepted.origin);
        info!(
            %request_id,
            origin = accepted.origin.as_str(),
            latitud = ?latitud,
            longitud = ?longitud,
            "resolution finished"
        );

        let geopanda = self.boundary_check(&addr, latitud, longitud).await;

        ResolutionOutcome {
            coords: ResolutionResult {
                origin: accepted.origin,
                direccion: accepted.direccion,
                latitud,
                longitud,
            },
            geopanda,
            traza: addr,
        }
    }

    /// Soft expectation: a resolved point should fall inside (or on the
    /// edge of) the matched commune. Mismatches are logged, never fatal.
    async fn boundary_check(
        &self,
        addr: &NormalizedAddress,
        latitud: Option<f64>,
        longitud: Option<f64>,
    ) -> BoundaryOutcome {
        let (Some(lat), Some(lon)) = (latitud, longitud) else {
            return BoundaryOutcome::Error {
                error: "no existe latitud y longitud a calcular".to_string(),
            };
        };

        let commune_code = addr.commune_code();
        match tokio::time::timeout(
            self.call_timeout,
            self.boundary.containing_admin_unit(&commune_code, lat, lon),
        )
        .await
        {
            Ok(Ok(Some(unit))) => {
                match unit.relation {
                    Containment::Inside | Containment::Boundary => metrics::boundary::inside(),
                    Containment::Outside => {
                        metrics::boundary::mismatch();
                        if addr.origin != Some(Origin::NotFound) {
                            warn!(
                                comuna = %unit.comuna,
                                lat,
                                lon,
                                "resolved point falls outside the matched commune"
                            );
                        }
                    }
                }
                BoundaryOutcome::Checked(unit)
            }
            Ok(Ok(None)) => BoundaryOutcome::Error {
                error: format!("no se encontro la comuna con cut_com: {}", commune_code),
            },
            Ok(Err(e)) => {
                metrics::boundary::error();
                BoundaryOutcome::Error { error: e.to_string() }
            }
            Err(_) => {
                metrics::boundary::error();
                BoundaryOutcome::Error { error: "boundary check timed out".to_string() }
            }
        }
    }
}
