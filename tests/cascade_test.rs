//! End-to-end cascade scenarios with mock providers. Call counters verify
//! the strict short-circuit: once a state accepts, later providers are
//! never consulted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use georesolver::cascade::ResolutionPipeline;
use georesolver::domain::{
    AddressQuery, AdminUnit, BoundaryOutcome, CadastralAddress, CadastralLocality, Containment,
    ElectoralAddress, ElectoralLocality, GazetteerRow, GeocoderCandidate, Origin, PrecisionTag,
};
use georesolver::gazetteer::{GazetteerMatcher, GazetteerProvider};
use georesolver::glossary::{Glossary, GlossaryEntry, GlossaryStore};
use georesolver::normalize::TokenNormalizer;
use georesolver::providers::{BoundaryProvider, CadastralProvider, ElectoralProvider, Geocoder};
use georesolver::Result;

fn glossaries() -> Arc<GlossaryStore> {
    Arc::new(GlossaryStore {
        hierarchies: Glossary::new(vec![
            GlossaryEntry {
                canonical: "AVENIDA".to_string(),
                variants: vec!["AV".to_string(), "AVDA".to_string()],
            },
            GlossaryEntry {
                canonical: "PASAJE".to_string(),
                variants: vec!["PJE".to_string()],
            },
        ]),
        abbreviations: Glossary::new(vec![GlossaryEntry {
            canonical: "GENERAL".to_string(),
            variants: vec!["GRAL".to_string()],
        }]),
    })
}

fn providencia_row() -> GazetteerRow {
    GazetteerRow {
        hierarchy: "AVENIDA".to_string(),
        street_name: "PROVIDENCIA".to_string(),
        comuna: "PROVIDENCIA".to_string(),
        province: "SANTIAGO".to_string(),
        region: "METROPOLITANA".to_string(),
        commune_code: "13123".to_string(),
        region_code: "13".to_string(),
        centroid_lat: Some(-33.4314),
        centroid_lon: Some(-70.6093),
    }
}

fn cadastral_row() -> CadastralAddress {
    CadastralAddress {
        code: "D-77".to_string(),
        street_name: "PROVIDENCIA".to_string(),
        number: "1000".to_string(),
        coord_x: "-70.6109".to_string(),
        coord_y: "-33.4263".to_string(),
        commune_code: 13123,
        source: "MUNICIPAL".to_string(),
    }
}

fn electoral_row() -> ElectoralAddress {
    ElectoralAddress {
        score: 0.95,
        street_name: "PROVIDENCIA".to_string(),
        number: "1000".to_string(),
        comuna: "PROVIDENCIA".to_string(),
        province: "SANTIAGO".to_string(),
        region: "METROPOLITANA".to_string(),
        commune_code: "13123".to_string(),
        region_code: "13".to_string(),
        locality: String::new(),
        latitude: Some(-33.4270),
        longitude: Some(-70.6101),
        created_at: None,
    }
}

#[derive(Default)]
struct MockGazetteer {
    rows: Vec<GazetteerRow>,
    calls: AtomicUsize,
    seen_street: Mutex<Option<String>>,
}

#[async_trait]
impl GazetteerProvider for MockGazetteer {
    async fn candidates(&self, street: &str, _: &str, _: &str) -> Result<Vec<GazetteerRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_street.lock().unwrap() = Some(street.to_string());
        Ok(self.rows.clone())
    }
}

#[derive(Default)]
struct MockCadastral {
    address: Option<CadastralAddress>,
    locality: Option<CadastralLocality>,
    address_calls: AtomicUsize,
    locality_calls: AtomicUsize,
}

#[async_trait]
impl CadastralProvider for MockCadastral {
    async fn lookup_by_number(&self, _: i64, _: &str, _: &str) -> Result<Option<CadastralAddress>> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn lookup_locality(&self, _: i64, _: &str) -> Result<Option<CadastralLocality>> {
        self.locality_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.locality.clone())
    }
}

#[derive(Default)]
struct MockElectoral {
    address: Option<ElectoralAddress>,
    locality: Option<ElectoralLocality>,
    address_calls: AtomicUsize,
    locality_calls: AtomicUsize,
}

#[async_trait]
impl ElectoralProvider for MockElectoral {
    async fn match_person_address(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<Option<ElectoralAddress>> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn match_locality(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<Option<ElectoralLocality>> {
        self.locality_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.locality.clone())
    }
}

struct MockGeocoder {
    name: &'static str,
    candidates: Vec<GeocoderCandidate>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    fn new(name: &'static str, candidates: Vec<GeocoderCandidate>) -> Self {
        Self { name, candidates, calls: AtomicUsize::new(0) }
    }

    fn empty(name: &'static str) -> Self {
        Self::new(name, Vec::new())
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn geocode(&self, _: &str, _: bool) -> Result<Vec<GeocoderCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

#[derive(Default)]
struct MockBoundary {
    calls: AtomicUsize,
}

#[async_trait]
impl BoundaryProvider for MockBoundary {
    async fn containing_admin_unit(
        &self,
        commune_code: &str,
        _: f64,
        _: f64,
    ) -> Result<Option<AdminUnit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(AdminUnit {
            comuna: "PROVIDENCIA".to_string(),
            commune_code: commune_code.to_string(),
            relation: Containment::Inside,
        }))
    }
}

struct Harness {
    gazetteer: Arc<MockGazetteer>,
    cadastral: Arc<MockCadastral>,
    electoral: Arc<MockElectoral>,
    nominatim: Arc<MockGeocoder>,
    google: Arc<MockGeocoder>,
    boundary: Arc<MockBoundary>,
    pipeline: ResolutionPipeline,
}

fn harness(
    gazetteer: MockGazetteer,
    cadastral: MockCadastral,
    electoral: MockElectoral,
    nominatim: MockGeocoder,
    google: MockGeocoder,
) -> Harness {
    let gazetteer = Arc::new(gazetteer);
    let cadastral = Arc::new(cadastral);
    let electoral = Arc::new(electoral);
    let nominatim = Arc::new(nominatim);
    let google = Arc::new(google);
    let boundary = Arc::new(MockBoundary::default());

    let pipeline = ResolutionPipeline::new(
        TokenNormalizer::new(glossaries()),
        GazetteerMatcher::new(gazetteer.clone()),
        cadastral.clone(),
        electoral.clone(),
        nominatim.clone(),
        google.clone(),
        boundary.clone(),
        Duration::from_secs(2),
    );

    Harness { gazetteer, cadastral, electoral, nominatim, google, boundary, pipeline }
}

fn providencia_query() -> AddressQuery {
    AddressQuery::new("AV PROVIDENCIA", "1000", "PROVIDENCIA", "METROPOLITANA", "")
}

#[tokio::test]
async fn cadastral_exact_match_short_circuits_the_cascade() {
    let h = harness(
        MockGazetteer { rows: vec![providencia_row()], ..Default::default() },
        MockCadastral { address: Some(cadastral_row()), ..Default::default() },
        MockElectoral { address: Some(electoral_row()), ..Default::default() },
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::empty("Google Maps"),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::AptChile);
    assert_eq!(outcome.coords.latitud, Some(-33.4263));
    assert_eq!(outcome.coords.longitud, Some(-70.6109));
    assert_eq!(
        outcome.coords.direccion,
        "AVENIDA PROVIDENCIA 1000, PROVIDENCIA, SANTIAGO, METROPOLITANA"
    );
    assert_eq!(outcome.traza.confidence, 100);

    // Strict short-circuit: nothing after the cadastral registry ran.
    assert_eq!(h.cadastral.address_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.electoral.address_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.electoral.locality_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.nominatim.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.google.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn partial_confidence_records_cadastral_but_continues_to_electoral() {
    // The gazetteer row disagrees on the commune, so confidence stays below
    // 100 and the cadastral hit cannot be terminal.
    let mut row = providencia_row();
    row.comuna = "SANTIAGO".to_string();

    let h = harness(
        MockGazetteer { rows: vec![row], ..Default::default() },
        MockCadastral { address: Some(cadastral_row()), ..Default::default() },
        MockElectoral { address: Some(electoral_row()), ..Default::default() },
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::empty("Google Maps"),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::ServelDireccionPersona);
    assert_eq!(outcome.coords.latitud, Some(-33.4270));
    assert_eq!(
        outcome.coords.direccion,
        "PROVIDENCIA 1000, SANTIAGO, PROVIDENCIA, METROPOLITANA"
    );
    // The cadastral hit is still recorded in the trace.
    assert!(outcome.traza.cadastral.is_some());
    assert!(outcome.traza.confidence < 100);

    assert_eq!(h.cadastral.address_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.electoral.address_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.nominatim.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.google.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn locality_path_is_used_when_the_query_has_no_number() {
    let h = harness(
        MockGazetteer { rows: vec![providencia_row()], ..Default::default() },
        MockCadastral::default(),
        MockElectoral {
            locality: Some(ElectoralLocality {
                score: 0.97,
                name: "LOS LEONES".to_string(),
                comuna: "PROVIDENCIA".to_string(),
                region: "METROPOLITANA".to_string(),
                latitude: Some(-33.44),
                longitude: Some(-70.60),
                created_at: None,
            }),
            ..Default::default()
        },
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::empty("Google Maps"),
    );

    let query = AddressQuery::new("AV PROVIDENCIA", "S/N", "PROVIDENCIA", "METROPOLITANA", "");
    let outcome = h.pipeline.resolve(query).await;

    assert_eq!(outcome.coords.origin, Origin::ServelLocalidades);
    assert_eq!(outcome.coords.direccion, "LOS LEONES");
    // The sentinel number routed the query through the locality lookups.
    assert_eq!(h.cadastral.locality_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.cadastral.address_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.electoral.locality_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.electoral.address_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn primary_geocoder_accepts_when_display_text_contains_the_number() {
    let h = harness(
        MockGazetteer { rows: vec![providencia_row()], ..Default::default() },
        MockCadastral::default(),
        MockElectoral::default(),
        MockGeocoder::new(
            "Nominatim",
            vec![GeocoderCandidate {
                display_name: "Avenida Providencia 1000, Providencia, Chile".to_string(),
                lat: "-33.4265".to_string(),
                lon: "-70.6110".to_string(),
                precision: None,
            }],
        ),
        MockGeocoder::empty("Google Maps"),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::Nominatim);
    assert_eq!(outcome.coords.latitud, Some(-33.4265));
    assert_eq!(h.nominatim.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.google.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn primary_result_without_the_number_falls_to_the_secondary() {
    let h = harness(
        MockGazetteer::default(),
        MockCadastral::default(),
        MockElectoral::default(),
        MockGeocoder::new(
            "Nominatim",
            vec![GeocoderCandidate {
                display_name: "Avenida Providencia, Providencia, Chile".to_string(),
                lat: "-33.43".to_string(),
                lon: "-70.61".to_string(),
                precision: None,
            }],
        ),
        MockGeocoder::new(
            "Google Maps",
            vec![GeocoderCandidate {
                display_name: "Av Providencia 1000, Providencia, Metropolitana, Chile".to_string(),
                lat: "-33.4262".to_string(),
                lon: "-70.6108".to_string(),
                precision: Some(PrecisionTag::Rooftop),
            }],
        ),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::GoogleMaps);
    assert_eq!(outcome.coords.latitud, Some(-33.4262));
    assert_eq!(h.nominatim.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.google.calls.load(Ordering::SeqCst), 1);
    // The rejected primary candidate still shows up in the trace.
    assert!(outcome.traza.nominatim.is_some());
}

#[tokio::test]
async fn secondary_geocoder_skips_imprecise_candidates_for_numbered_queries() {
    let h = harness(
        MockGazetteer::default(),
        MockCadastral::default(),
        MockElectoral::default(),
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::new(
            "Google Maps",
            vec![
                GeocoderCandidate {
                    display_name: "Providencia, Chile".to_string(),
                    lat: "-33.43".to_string(),
                    lon: "-70.61".to_string(),
                    precision: Some(PrecisionTag::Approximate),
                },
                GeocoderCandidate {
                    display_name: "Av Providencia 1000, Providencia, Metropolitana, Chile"
                        .to_string(),
                    lat: "-33.4262".to_string(),
                    lon: "-70.6108".to_string(),
                    precision: Some(PrecisionTag::RangeInterpolated),
                },
            ],
        ),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::GoogleMaps);
    // The approximate first candidate was passed over.
    assert_eq!(outcome.coords.latitud, Some(-33.4262));
}

#[tokio::test]
async fn unrelated_secondary_result_fails_validation_and_falls_to_centroid() {
    let h = harness(
        MockGazetteer { rows: vec![providencia_row()], ..Default::default() },
        MockCadastral::default(),
        MockElectoral::default(),
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::new(
            "Google Maps",
            vec![GeocoderCandidate {
                display_name: "Calle Larga 22, Arica, Chile".to_string(),
                lat: "-18.47".to_string(),
                lon: "-70.29".to_string(),
                precision: Some(PrecisionTag::Rooftop),
            }],
        ),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::NotFound);
    assert_eq!(outcome.coords.direccion, "");
    // Commune centroid from the gazetteer match.
    assert_eq!(outcome.coords.latitud, Some(-33.4314));
    assert_eq!(outcome.coords.longitud, Some(-70.6093));
}

#[tokio::test]
async fn rural_addresses_bypass_normalization_and_relax_the_primary_geocoder() {
    let h = harness(
        MockGazetteer::default(),
        MockCadastral::default(),
        MockElectoral::default(),
        MockGeocoder::new(
            "Nominatim",
            vec![GeocoderCandidate {
                display_name: "Fundo Santa Elena, Melipilla, Chile".to_string(),
                lat: "-33.68".to_string(),
                lon: "-71.21".to_string(),
                precision: None,
            }],
        ),
        MockGeocoder::empty("Google Maps"),
    );

    let query = AddressQuery::new("Fundo Santa Elena", "77", "MELIPILLA", "METROPOLITANA", "");
    let outcome = h.pipeline.resolve(query).await;

    // The display text lacks "77" but the rural flag accepts it anyway.
    assert_eq!(outcome.coords.origin, Origin::Nominatim);
    assert!(outcome.traza.rural);
    // The raw street reached the gazetteer verbatim.
    assert_eq!(
        h.gazetteer.seen_street.lock().unwrap().as_deref(),
        Some("FUNDO SANTA ELENA")
    );
}

#[tokio::test]
async fn total_miss_without_gazetteer_match_has_no_coordinates() {
    let h = harness(
        MockGazetteer::default(),
        MockCadastral::default(),
        MockElectoral::default(),
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::empty("Google Maps"),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(outcome.coords.origin, Origin::NotFound);
    assert_eq!(outcome.coords.latitud, None);
    assert_eq!(outcome.coords.longitud, None);
    // Without coordinates the boundary check degrades to an error marker.
    assert!(matches!(outcome.geopanda, BoundaryOutcome::Error { .. }));
    assert_eq!(h.boundary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_provider_coordinates_downgrade_to_centroid() {
    let mut bad_row = cadastral_row();
    bad_row.coord_y = "no-data".to_string();

    let h = harness(
        MockGazetteer { rows: vec![providencia_row()], ..Default::default() },
        MockCadastral { address: Some(bad_row), ..Default::default() },
        MockElectoral::default(),
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::empty("Google Maps"),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    // Accepted by the cadastral stage, then downgraded at emission.
    assert_eq!(outcome.coords.origin, Origin::NotFound);
    assert_eq!(outcome.coords.latitud, Some(-33.4314));
}

#[tokio::test]
async fn boundary_check_runs_for_resolved_coordinates() {
    let h = harness(
        MockGazetteer { rows: vec![providencia_row()], ..Default::default() },
        MockCadastral { address: Some(cadastral_row()), ..Default::default() },
        MockElectoral::default(),
        MockGeocoder::empty("Nominatim"),
        MockGeocoder::empty("Google Maps"),
    );

    let outcome = h.pipeline.resolve(providencia_query()).await;

    assert_eq!(h.boundary.calls.load(Ordering::SeqCst), 1);
    match outcome.geopanda {
        BoundaryOutcome::Checked(unit) => {
            assert_eq!(unit.relation, Containment::Inside);
            assert_eq!(unit.commune_code, "13123");
        }
        BoundaryOutcome::Error { error } => panic!("expected containment, got error: {}", error),
    }
}
