#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use scenecast::{
    collaborators::{
        ArtifactGenerator, Collaborators, FixedClock, LocationResolver, PlacesLookup,
        ReverseGeocoder, WeatherLookup,
    },
    workflow::{
        prompt::{PromptSynthesizer, DEFAULT_PROMPT_TEMPLATE},
        Coordinates, LocationError,
    },
    Error, Result,
};
use serde_json::{json, Value};

/// Wednesday 2024-06-05, 13:05 in Paris summer time.
pub fn wednesday_afternoon() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 5, 13, 5, 0)
        .unwrap()
}

/// Ordered log of collaborator calls.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct FakeLocation {
    outcome: std::result::Result<Coordinates, LocationError>,
    calls: Calls,
}

#[async_trait]
impl LocationResolver for FakeLocation {
    async fn resolve(&self) -> std::result::Result<Coordinates, LocationError> {
        self.calls.record("location");
        self.outcome.clone()
    }
}

struct FakeLookup {
    outcome: std::result::Result<Value, String>,
    calls: Calls,
}

impl FakeLookup {
    fn answer(&self, name: &str, at: Coordinates) -> Result<Value> {
        self.calls
            .record(format!("{}({},{})", name, at.latitude, at.longitude));
        self.outcome.clone().map_err(Error::UpstreamFetch)
    }
}

#[async_trait]
impl ReverseGeocoder for FakeLookup {
    async fn reverse(&self, at: Coordinates) -> Result<Value> {
        self.answer("reverse", at)
    }
}

#[async_trait]
impl PlacesLookup for FakeLookup {
    async fn nearby(&self, at: Coordinates) -> Result<Value> {
        self.answer("nearby", at)
    }
}

#[async_trait]
impl WeatherLookup for FakeLookup {
    async fn current(&self, at: Coordinates) -> Result<Value> {
        self.answer("weather", at)
    }
}

struct FakeGenerator {
    outcome: std::result::Result<Value, String>,
    calls: Calls,
}

#[async_trait]
impl ArtifactGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<Value> {
        self.calls.record(format!("generate: {}", prompt));
        self.outcome.clone().map_err(Error::UpstreamFetch)
    }
}

/// Canned collaborator outcomes for one run.
pub struct Scenario {
    pub now: DateTime<FixedOffset>,
    pub location: std::result::Result<Coordinates, LocationError>,
    pub place: std::result::Result<Value, String>,
    pub nearby: std::result::Result<Value, String>,
    pub weather: std::result::Result<Value, String>,
    pub artifacts: std::result::Result<Value, String>,
    pub calls: Calls,
}

impl Scenario {
    /// Everything succeeds at the Eiffel Tower on a clear day.
    pub fn eiffel_tower() -> Self {
        Self {
            now: wednesday_afternoon(),
            location: Ok(Coordinates::new(48.8584, 2.2945)),
            place: Ok(json!({ "display_name": "Eiffel Tower, Paris" })),
            nearby: Ok(json!({
                "features": [
                    { "properties": { "category": "monument, landmark" } },
                    { "properties": { "name": "no category" } },
                    { "properties": { "category": "park" } }
                ]
            })),
            weather: Ok(json!({
                "weather": [{ "description": "clear sky" }],
                "main": { "temp": 21.4 }
            })),
            artifacts: Ok(json!({
                "artifacts": [{ "base64": "iVBORw0KGgo=", "seed": 42, "finishReason": "SUCCESS" }]
            })),
            calls: Calls::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let lookup = |outcome: &std::result::Result<Value, String>| FakeLookup {
            outcome: outcome.clone(),
            calls: self.calls.clone(),
        };
        Collaborators {
            clock: Arc::new(FixedClock(self.now)),
            location: Arc::new(FakeLocation {
                outcome: self.location.clone(),
                calls: self.calls.clone(),
            }),
            geocoder: Arc::new(lookup(&self.place)),
            places: Arc::new(lookup(&self.nearby)),
            weather: Arc::new(lookup(&self.weather)),
            generator: Arc::new(FakeGenerator {
                outcome: self.artifacts.clone(),
                calls: self.calls.clone(),
            }),
            prompts: Arc::new(PromptSynthesizer::new(DEFAULT_PROMPT_TEMPLATE).unwrap()),
        }
    }
}
