//! Metrics for the resolution pipeline, following Prometheus naming
//! conventions. A `MetricName` enum keeps the catalog free of magic strings.

use std::fmt;
use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalizer metrics
    NormalizeStreetsProcessed,
    NormalizeRuralBypass,

    // Gazetteer metrics
    GazetteerMatches,
    GazetteerMisses,
    GazetteerMatchScore,

    // Confidence metrics
    ConfidenceScore,
    ConfidenceFullTrust,
    ConfidenceReverted,

    // Cascade metrics
    CascadeCadastralAccepted,
    CascadeElectoralAccepted,
    CascadePrimaryGeocoderAccepted,
    CascadeSecondaryGeocoderAccepted,
    CascadeCentroidFallback,
    CascadeProviderErrors,
    CascadeProviderTimeouts,

    // Boundary metrics
    BoundaryInside,
    BoundaryMismatch,
    BoundaryErrors,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeStreetsProcessed => "geo_normalize_streets_processed_total",
            MetricName::NormalizeRuralBypass => "geo_normalize_rural_bypass_total",

            MetricName::GazetteerMatches => "geo_gazetteer_matches_total",
            MetricName::GazetteerMisses => "geo_gazetteer_misses_total",
            MetricName::GazetteerMatchScore => "geo_gazetteer_match_score",

            MetricName::ConfidenceScore => "geo_confidence_score",
            MetricName::ConfidenceFullTrust => "geo_confidence_full_trust_total",
            MetricName::ConfidenceReverted => "geo_confidence_reverted_total",

            MetricName::CascadeCadastralAccepted => "geo_cascade_cadastral_accepted_total",
            MetricName::CascadeElectoralAccepted => "geo_cascade_electoral_accepted_total",
            MetricName::CascadePrimaryGeocoderAccepted => "geo_cascade_primary_geocoder_accepted_total",
            MetricName::CascadeSecondaryGeocoderAccepted => "geo_cascade_secondary_geocoder_accepted_total",
            MetricName::CascadeCentroidFallback => "geo_cascade_centroid_fallback_total",
            MetricName::CascadeProviderErrors => "geo_cascade_provider_errors_total",
            MetricName::CascadeProviderTimeouts => "geo_cascade_provider_timeouts_total",

            MetricName::BoundaryInside => "geo_boundary_inside_total",
            MetricName::BoundaryMismatch => "geo_boundary_mismatch_total",
            MetricName::BoundaryErrors => "geo_boundary_errors_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installs the Prometheus exporter on the given address. Safe to skip in
/// tests; recorder installation failures are logged and ignored so a second
/// init (or a missing port) never takes the service down.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::warn!(error = %e, "failed to install Prometheus exporter");
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn street_normalized() {
        ::metrics::counter!(MetricName::NormalizeStreetsProcessed.as_str()).increment(1);
    }

    pub fn rural_bypass() {
        ::metrics::counter!(MetricName::NormalizeRuralBypass.as_str()).increment(1);
    }
}

pub mod gazetteer {
    use super::MetricName;

    pub fn match_found(score: u32) {
        ::metrics::counter!(MetricName::GazetteerMatches.as_str()).increment(1);
        ::metrics::histogram!(MetricName::GazetteerMatchScore.as_str()).record(score as f64);
    }

    pub fn match_missed() {
        ::metrics::counter!(MetricName::GazetteerMisses.as_str()).increment(1);
    }
}

pub mod confidence {
    use super::MetricName;

    pub fn score_recorded(score: u32) {
        ::metrics::histogram!(MetricName::ConfidenceScore.as_str()).record(score as f64);
        if score == 100 {
            ::metrics::counter!(MetricName::ConfidenceFullTrust.as_str()).increment(1);
        }
    }

    pub fn reverted() {
        ::metrics::counter!(MetricName::ConfidenceReverted.as_str()).increment(1);
    }
}

pub mod cascade {
    use super::MetricName;
    use crate::domain::Origin;

    pub fn accepted(origin: Origin) {
        let name = match origin {
            Origin::AptChile | Origin::AptLocalidades => MetricName::CascadeCadastralAccepted,
            Origin::ServelDireccionPersona | Origin::ServelLocalidades => {
                MetricName::CascadeElectoralAccepted
            }
            Origin::Nominatim => MetricName::CascadePrimaryGeocoderAccepted,
            Origin::GoogleMaps => MetricName::CascadeSecondaryGeocoderAccepted,
            Origin::NotFound => MetricName::CascadeCentroidFallback,
        };
        ::metrics::counter!(name.as_str()).increment(1);
    }

    pub fn provider_error() {
        ::metrics::counter!(MetricName::CascadeProviderErrors.as_str()).increment(1);
    }

    pub fn provider_timeout() {
        ::metrics::counter!(MetricName::CascadeProviderTimeouts.as_str()).increment(1);
    }
}

pub mod boundary {
    use super::MetricName;

    pub fn inside() {
        ::metrics::counter!(MetricName::BoundaryInside.as_str()).increment(1);
    }

    pub fn mismatch() {
        ::metrics::counter!(MetricName::BoundaryMismatch.as_str()).increment(1);
    }

    pub fn error() {
        ::metrics::counter!(MetricName::BoundaryErrors.as_str()).increment(1);
    }
}
