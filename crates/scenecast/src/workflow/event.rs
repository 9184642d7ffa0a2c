use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::context::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationErrorCode {
    UserDenied,
    Unsupported,
}

impl LocationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationErrorCode::UserDenied => "USER_DENIED",
            LocationErrorCode::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for LocationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The device refused or could not produce a position.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct LocationError {
    pub code: LocationErrorCode,
    pub message: String,
}

impl LocationError {
    pub fn new(code: LocationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_denied() -> Self {
        Self::new(
            LocationErrorCode::UserDenied,
            "User denied permission to use Location",
        )
    }

    pub fn unsupported() -> Self {
        Self::new(
            LocationErrorCode::Unsupported,
            "Device does not support fetching geo location",
        )
    }
}

/// Commands and step outcomes consumed by the interpreter.
///
/// Completion events carry the raw upstream body; reducers decide what to
/// keep from it.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    Start,
    DelayElapsed,
    LocationResolved(Coordinates),
    LocationFailed(LocationError),
    LocationNameResolved(Value),
    LocationNameFailed(String),
    NearbyPlacesResolved(Value),
    NearbyPlacesFailed(String),
    WeatherResolved(Value),
    WeatherFailed(String),
    PromptReady(String),
    PromptFailed(String),
    ArtifactsGenerated(Value),
    ArtifactsFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    DelayElapsed,
    LocationResolved,
    LocationFailed,
    LocationNameResolved,
    LocationNameFailed,
    NearbyPlacesResolved,
    NearbyPlacesFailed,
    WeatherResolved,
    WeatherFailed,
    PromptReady,
    PromptFailed,
    ArtifactsGenerated,
    ArtifactsFailed,
}

impl FlowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FlowEvent::Start => EventKind::Start,
            FlowEvent::DelayElapsed => EventKind::DelayElapsed,
            FlowEvent::LocationResolved(_) => EventKind::LocationResolved,
            FlowEvent::LocationFailed(_) => EventKind::LocationFailed,
            FlowEvent::LocationNameResolved(_) => EventKind::LocationNameResolved,
            FlowEvent::LocationNameFailed(_) => EventKind::LocationNameFailed,
            FlowEvent::NearbyPlacesResolved(_) => EventKind::NearbyPlacesResolved,
            FlowEvent::NearbyPlacesFailed(_) => EventKind::NearbyPlacesFailed,
            FlowEvent::WeatherResolved(_) => EventKind::WeatherResolved,
            FlowEvent::WeatherFailed(_) => EventKind::WeatherFailed,
            FlowEvent::PromptReady(_) => EventKind::PromptReady,
            FlowEvent::PromptFailed(_) => EventKind::PromptFailed,
            FlowEvent::ArtifactsGenerated(_) => EventKind::ArtifactsGenerated,
            FlowEvent::ArtifactsFailed(_) => EventKind::ArtifactsFailed,
        }
    }

    /// Human-readable failure carried by the event, if it is a failure.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            FlowEvent::LocationFailed(err) => Some(&err.message),
            FlowEvent::LocationNameFailed(msg)
            | FlowEvent::NearbyPlacesFailed(msg)
            | FlowEvent::WeatherFailed(msg)
            | FlowEvent::PromptFailed(msg)
            | FlowEvent::ArtifactsFailed(msg) => Some(msg),
            _ => None,
        }
    }
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::DelayElapsed => "DELAY_ELAPSED",
            EventKind::LocationResolved => "LOCATION_RESOLVED",
            EventKind::LocationFailed => "LOCATION_FAILED",
            EventKind::LocationNameResolved => "LOCATION_NAME_RESOLVED",
            EventKind::LocationNameFailed => "LOCATION_NAME_FAILED",
            EventKind::NearbyPlacesResolved => "NEARBY_PLACES_RESOLVED",
            EventKind::NearbyPlacesFailed => "NEARBY_PLACES_FAILED",
            EventKind::WeatherResolved => "WEATHER_RESOLVED",
            EventKind::WeatherFailed => "WEATHER_FAILED",
            EventKind::PromptReady => "PROMPT_READY",
            EventKind::PromptFailed => "PROMPT_FAILED",
            EventKind::ArtifactsGenerated => "ARTIFACTS_GENERATED",
            EventKind::ArtifactsFailed => "ARTIFACTS_FAILED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
