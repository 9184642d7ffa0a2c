use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback coordinates used until a location-resolution event arrives.
pub const FALLBACK_LOCATION: Coordinates = Coordinates {
    latitude: 48.8584,
    longitude: 2.2945,
};

/// Temperature assumed when the weather payload carries none.
pub const DEFAULT_TEMPERATURE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        FALLBACK_LOCATION
    }
}

/// The part of a reverse-geocode record the workflow keeps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationDescription {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub data: Vec<u8>,
    pub seed: Option<u64>,
    pub finish_reason: Option<String>,
}

impl Artifact {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// A single field write produced by a reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextUpdate {
    Timestamp(DateTime<FixedOffset>),
    Location(Coordinates),
    LocationDescription(LocationDescription),
    NearbyPlaceCategories(String),
    WeatherDescription(String),
    Temperature(f64),
    GeneratedPrompt(String),
    GeneratedArtifacts(Vec<Artifact>),
    LastError(String),
}

/// Everything a run has accumulated so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub location: Coordinates,
    pub location_description: LocationDescription,
    pub nearby_place_categories: String,
    pub weather_description: String,
    pub temperature: Option<f64>,
    pub generated_prompt: String,
    pub generated_artifacts: Vec<Artifact>,
    pub last_error: Option<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            timestamp: None,
            location: FALLBACK_LOCATION,
            location_description: LocationDescription::default(),
            nearby_place_categories: String::new(),
            weather_description: String::new(),
            temperature: None,
            generated_prompt: String::new(),
            generated_artifacts: Vec::new(),
            last_error: None,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(location: Coordinates) -> Self {
        Self {
            location,
            ..Self::default()
        }
    }

    /// Only the interpreter applies updates, and only ones produced by the
    /// reducers of the transition that is firing.
    pub(crate) fn apply(&mut self, update: ContextUpdate) {
        match update {
            ContextUpdate::Timestamp(ts) => self.timestamp = Some(ts),
            ContextUpdate::Location(coords) => self.location = coords,
            ContextUpdate::LocationDescription(desc) => self.location_description = desc,
            ContextUpdate::NearbyPlaceCategories(categories) => {
                self.nearby_place_categories = categories
            }
            ContextUpdate::WeatherDescription(desc) => self.weather_description = desc,
            ContextUpdate::Temperature(temp) => self.temperature = Some(temp),
            ContextUpdate::GeneratedPrompt(prompt) => self.generated_prompt = prompt,
            ContextUpdate::GeneratedArtifacts(artifacts) => self.generated_artifacts = artifacts,
            ContextUpdate::LastError(message) => self.last_error = Some(message),
        }
    }

    pub fn place_name(&self) -> &str {
        self.location_description
            .display_name
            .as_deref()
            .unwrap_or_default()
    }

    /// JSON view of the context. Artifact bytes are only included, as
    /// base64, when asked for.
    pub fn to_json(&self, include_artifacts: bool) -> Value {
        let artifacts = if include_artifacts {
            Value::Array(
                self.generated_artifacts
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "base64": a.to_base64(),
                            "seed": a.seed,
                            "finishReason": a.finish_reason,
                        })
                    })
                    .collect(),
            )
        } else {
            Value::Null
        };

        serde_json::json!({
            "timestamp": self.timestamp.map(|ts| ts.to_rfc3339()),
            "location": self.location,
            "locationDescription": self.location_description,
            "nearbyPlaceCategories": self.nearby_place_categories,
            "weatherDescription": self.weather_description,
            "temperature": self.temperature,
            "generatedPrompt": self.generated_prompt,
            "generatedArtifactCount": self.generated_artifacts.len(),
            "generatedArtifacts": artifacts,
            "lastError": self.last_error,
        })
    }
}
