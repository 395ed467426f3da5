//! Wires configuration into a ready resolution pipeline.

use std::sync::Arc;

use crate::cascade::ResolutionPipeline;
use crate::common::error::Result;
use crate::config::AppConfig;
use crate::gazetteer::{GazetteerMatcher, SqliteGazetteer};
use crate::glossary::GlossaryStore;
use crate::normalize::TokenNormalizer;
use crate::providers::{
    GoogleMapsClient, NominatimClient, SqliteBoundary, SqliteCadastral, SqliteElectoral,
};

/// Loads the glossaries, opens every reference dataset and builds the
/// pipeline. Called once at startup; the pipeline is shared across requests.
pub fn build_pipeline(config: &AppConfig) -> Result<ResolutionPipeline> {
    let glossaries = GlossaryStore::load(
        &config.data.hierarchy_glossary,
        &config.data.abbreviation_glossary,
    )?;
    let normalizer = TokenNormalizer::new(glossaries);

    let gazetteer = Arc::new(SqliteGazetteer::open(&config.data.gazetteer_db)?);
    let matcher = GazetteerMatcher::new(gazetteer);

    let cadastral = Arc::new(SqliteCadastral::open(
        &config.data.cadastral_db,
        &config.data.localities_db,
    )?);
    let electoral = Arc::new(SqliteElectoral::open(&config.data.electoral_db)?);
    let boundary = Arc::new(SqliteBoundary::open(&config.data.boundaries_db)?);

    let timeout = config.call_timeout();
    let nominatim = Arc::new(NominatimClient::new(
        config.geocoders.nominatim_url.clone(),
        config.geocoders.user_agent.clone(),
        timeout,
    ));
    let google = Arc::new(GoogleMapsClient::new(
        config.geocoders.google_url.clone(),
        config.geocoders.google_api_key.clone(),
        timeout,
    ));

    Ok(ResolutionPipeline::new(
        normalizer, matcher, cadastral, electoral, nominatim, google, boundary, timeout,
    ))
}
