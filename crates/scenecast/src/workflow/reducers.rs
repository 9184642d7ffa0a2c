//! Pure context reducers.
//!
//! Each reducer looks at the current context and the event that fired and
//! returns the field write it wants, or `None` when the event carries
//! nothing for it. Missing upstream fields fall back to defaults rather than
//! failing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::context::{Artifact, Context, ContextUpdate, LocationDescription, DEFAULT_TEMPERATURE};
use super::event::FlowEvent;

pub type Reducer = fn(&Context, &FlowEvent) -> Option<ContextUpdate>;

/// Entry action of `resolvingTime`: keep an existing timestamp, otherwise
/// take `now`.
pub fn stamp_time(ctx: &Context, now: DateTime<FixedOffset>) -> Option<ContextUpdate> {
    match ctx.timestamp {
        Some(_) => None,
        None => Some(ContextUpdate::Timestamp(now)),
    }
}

pub fn set_location(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::LocationResolved(coords) => Some(ContextUpdate::Location(*coords)),
        _ => None,
    }
}

pub fn set_error(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    event
        .failure_message()
        .map(|message| ContextUpdate::LastError(message.to_string()))
}

pub fn set_location_description(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::LocationNameResolved(body) => {
            Some(ContextUpdate::LocationDescription(LocationDescription {
                display_name: body
                    .get("display_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }))
        }
        _ => None,
    }
}

pub fn set_nearby_places(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::NearbyPlacesResolved(body) => {
            Some(ContextUpdate::NearbyPlaceCategories(nearby_categories(body)))
        }
        _ => None,
    }
}

/// Places lookup failed: continue with no nearby categories.
pub fn clear_nearby_places(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::NearbyPlacesFailed(_) => {
            Some(ContextUpdate::NearbyPlaceCategories(String::new()))
        }
        _ => None,
    }
}

pub fn set_weather(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::WeatherResolved(body) => {
            Some(ContextUpdate::WeatherDescription(weather_description(body)))
        }
        _ => None,
    }
}

pub fn set_temperature(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::WeatherResolved(body) => Some(ContextUpdate::Temperature(temperature(body))),
        _ => None,
    }
}

pub fn set_prompt(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::PromptReady(prompt) => Some(ContextUpdate::GeneratedPrompt(prompt.clone())),
        _ => None,
    }
}

pub fn set_artifacts(_: &Context, event: &FlowEvent) -> Option<ContextUpdate> {
    match event {
        FlowEvent::ArtifactsGenerated(body) => {
            Some(ContextUpdate::GeneratedArtifacts(artifacts(body)))
        }
        _ => None,
    }
}

/// First comma-delimited token of every feature's category, joined by commas.
/// Features without a category are skipped.
pub fn nearby_categories(body: &Value) -> String {
    body.get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .filter_map(|feature| {
                    feature
                        .pointer("/properties/category")
                        .and_then(Value::as_str)
                })
                .filter_map(|category| category.split(',').next())
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

pub fn weather_description(body: &Value) -> String {
    body.pointer("/weather/0/description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

pub fn temperature(body: &Value) -> f64 {
    match body.pointer("/main/temp") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_TEMPERATURE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_TEMPERATURE),
        _ => DEFAULT_TEMPERATURE,
    }
}

/// Decoded `artifacts[].base64` payloads, in response order. Entries that
/// are not valid base64 are dropped.
pub fn artifacts(body: &Value) -> Vec<Artifact> {
    body.get("artifacts")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let encoded = item.get("base64")?.as_str()?;
                    let data = STANDARD.decode(encoded).ok()?;
                    Some(Artifact {
                        data,
                        seed: item.get("seed").and_then(Value::as_u64),
                        finish_reason: item
                            .get("finishReason")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
