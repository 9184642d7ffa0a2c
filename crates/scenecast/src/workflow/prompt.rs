//! Local prompt synthesis.
//!
//! Turns the accumulated context into one descriptive sentence followed by a
//! fixed photographic style suffix.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::Serialize;

use super::context::{Context, DEFAULT_TEMPERATURE};
use crate::template::Template;
use crate::Result;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "A colorful photo taken during {{ time_of_day }} at {{ place }}. \
The weather is {{ weather }} with temperature of {{ temperature }} degrees. \
The day is {{ day }}. Near by places are {{ nearby }}. \
highly detailed face, depth of field,  golden hour, style by Dan Winters, Russell James, \
Steve McCurry, centered, extremely detailed, Nikon D850, award winning photography";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// (0,12) morning, [12,15) afternoon, [15,19) evening, anything else night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            1..=11 => TimeOfDay::Morning,
            12..=14 => TimeOfDay::Afternoon,
            15..=18 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

/// Full English weekday name of the timestamp in its own offset.
pub fn day_name(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%A").to_string()
}

/// Half-up rounding, so 21.5 -> 22 and -2.5 -> -2.
pub fn round_temperature(temperature: f64) -> i64 {
    (temperature + 0.5).floor() as i64
}

/// The values the template sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptInputs {
    pub time_of_day: &'static str,
    pub day: String,
    pub place: String,
    pub weather: String,
    pub temperature: i64,
    pub nearby: String,
}

impl PromptInputs {
    /// `now` stands in for the timestamp when the context has none.
    pub fn from_context(ctx: &Context, now: DateTime<FixedOffset>) -> Self {
        let ts = ctx.timestamp.unwrap_or(now);
        Self {
            time_of_day: TimeOfDay::from_hour(ts.hour()).as_str(),
            day: day_name(&ts),
            place: ctx.place_name().to_string(),
            weather: ctx.weather_description.clone(),
            temperature: round_temperature(ctx.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            nearby: ctx.nearby_place_categories.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptSynthesizer {
    template: Template,
}

impl PromptSynthesizer {
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self {
            template: Template::parse(template)?,
        })
    }

    pub fn synthesize(&self, inputs: &PromptInputs) -> Result<String> {
        self.template.render(&serde_json::to_value(inputs)?)
    }
}
