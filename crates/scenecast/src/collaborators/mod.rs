//! External capabilities the workflow steps call out to.
//!
//! The interpreter only sees these traits; the HTTP clients below are the
//! production implementations.

pub mod clock;
mod http;
pub mod location;
pub mod mapbox;
pub mod nominatim;
pub mod openweather;
pub mod stability;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::{
    config::Config,
    workflow::{prompt::PromptSynthesizer, Coordinates, LocationError},
    Result,
};

pub use clock::{FixedClock, SystemClock};
pub use location::ConfiguredLocationResolver;
pub use mapbox::MapboxPlaces;
pub use nominatim::NominatimGeocoder;
pub use openweather::OpenWeather;
pub use stability::StabilityGenerator;

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self) -> std::result::Result<Coordinates, LocationError>;
}

/// Returns a place record with at least `display_name`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, at: Coordinates) -> Result<Value>;
}

/// Returns `{ "features": [{ "properties": { "category": "a,b" } }] }`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlacesLookup: Send + Sync {
    async fn nearby(&self, at: Coordinates) -> Result<Value>;
}

/// Returns `{ "weather": [{ "description": .. }], "main": { "temp": .. } }`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn current(&self, at: Coordinates) -> Result<Value>;
}

/// Returns `{ "artifacts": [{ "base64": .. }] }`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Value>;
}

/// Everything the step executor needs to run the workflow's invocations.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub location: Arc<dyn LocationResolver>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub places: Arc<dyn PlacesLookup>,
    pub weather: Arc<dyn WeatherLookup>,
    pub generator: Arc<dyn ArtifactGenerator>,
    pub prompts: Arc<PromptSynthesizer>,
}

impl Collaborators {
    /// Production collaborators built from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::build_client(config.http.timeout)?;

        Ok(Self {
            clock: Arc::new(SystemClock),
            location: Arc::new(ConfiguredLocationResolver::from_config(&config.location)),
            geocoder: Arc::new(NominatimGeocoder::new(
                client.clone(),
                config.upstream.nominatim_url.clone(),
            )),
            places: Arc::new(MapboxPlaces::new(
                client.clone(),
                config.upstream.mapbox_url.clone(),
                config.upstream.mapbox_token.clone(),
            )),
            weather: Arc::new(OpenWeather::new(
                client.clone(),
                config.upstream.openweather_url.clone(),
                config.upstream.openweather_key.clone(),
            )),
            generator: Arc::new(StabilityGenerator::new(
                client,
                config.upstream.stability_url.clone(),
                config.upstream.stability_key.clone(),
                config.upstream.stability_engine.clone(),
            )),
            prompts: Arc::new(PromptSynthesizer::new(&config.prompt_template)?),
        })
    }
}
