use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::{
    template::Template,
    workflow::{
        graph::{Route, StateGraph, DEFAULT_TIME_DELAY},
        prompt::DEFAULT_PROMPT_TEMPLATE,
        Coordinates, FALLBACK_LOCATION,
    },
    Error, Result,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub location: LocationConfig,
    pub flow: FlowConfig,
    pub http: HttpConfig,
    pub upstream: UpstreamConfig,
    pub output: OutputConfig,
    pub prompt_template: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone)]
pub struct LocationConfig {
    /// Coordinates the context starts with.
    pub fallback: Coordinates,
    /// Position reported by the device location resolver, if any.
    pub device: Option<Coordinates>,
    pub permission_granted: bool,
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub time_delay: Duration,
    /// Ask the device for a position instead of using the fallback.
    pub resolve_device_location: bool,
}

impl FlowConfig {
    pub fn graph(&self) -> StateGraph {
        let route = if self.resolve_device_location {
            Route::DeviceLocation
        } else {
            Route::Default
        };
        StateGraph::new(route, self.time_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct UpstreamConfig {
    pub nominatim_url: Url,
    pub mapbox_url: Url,
    pub mapbox_token: String,
    pub openweather_url: Url,
    pub openweather_key: String,
    pub stability_url: Url,
    pub stability_key: String,
    pub stability_engine: String,
}

// Keys stay out of logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("nominatim_url", &self.nominatim_url.as_str())
            .field("mapbox_url", &self.mapbox_url.as_str())
            .field("openweather_url", &self.openweather_url.as_str())
            .field("stability_url", &self.stability_url.as_str())
            .field("stability_engine", &self.stability_engine)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            server: ServerConfig {
                addr: var("SCENECAST_SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            },
            location: LocationConfig {
                fallback: var("SCENECAST_FALLBACK_LOCATION")
                    .map(|v| parse_coordinates("SCENECAST_FALLBACK_LOCATION", &v))
                    .transpose()?
                    .unwrap_or(FALLBACK_LOCATION),
                device: var("SCENECAST_DEVICE_LOCATION")
                    .map(|v| parse_coordinates("SCENECAST_DEVICE_LOCATION", &v))
                    .transpose()?,
                permission_granted: var("SCENECAST_LOCATION_PERMISSION")
                    .map(|v| parse_permission("SCENECAST_LOCATION_PERMISSION", &v))
                    .transpose()?
                    .unwrap_or(true),
            },
            flow: FlowConfig {
                time_delay: var("SCENECAST_TIME_DELAY_MS")
                    .map(|v| parse_number::<u64>("SCENECAST_TIME_DELAY_MS", &v))
                    .transpose()?
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_TIME_DELAY),
                resolve_device_location: var("SCENECAST_RESOLVE_DEVICE_LOCATION")
                    .map(|v| parse_bool("SCENECAST_RESOLVE_DEVICE_LOCATION", &v))
                    .transpose()?
                    .unwrap_or(false),
            },
            http: HttpConfig {
                timeout: Duration::from_secs(
                    var("SCENECAST_HTTP_TIMEOUT_SECS")
                        .map(|v| parse_number::<u64>("SCENECAST_HTTP_TIMEOUT_SECS", &v))
                        .transpose()?
                        .unwrap_or(60),
                ),
            },
            upstream: UpstreamConfig {
                nominatim_url: base_url(
                    "NOMINATIM_URL",
                    var("NOMINATIM_URL"),
                    "https://nominatim.openstreetmap.org/",
                )?,
                mapbox_url: base_url("MAPBOX_URL", var("MAPBOX_URL"), "https://api.mapbox.com/")?,
                mapbox_token: var("MAPBOX_KEY").unwrap_or_default(),
                openweather_url: base_url(
                    "OPEN_WEATHER_URL",
                    var("OPEN_WEATHER_URL"),
                    "https://api.openweathermap.org/",
                )?,
                openweather_key: var("OPEN_WEATHER_KEY").unwrap_or_default(),
                stability_url: base_url(
                    "STABILITY_URL",
                    var("STABILITY_URL"),
                    "https://api.stability.ai/",
                )?,
                stability_key: var("STABILITY_AI_KEY").unwrap_or_default(),
                stability_engine: var("STABILITY_ENGINE")
                    .unwrap_or_else(|| "stable-diffusion-xl-beta-v2-2-2".to_string()),
            },
            output: OutputConfig {
                dir: var("SCENECAST_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("output")),
            },
            prompt_template: var("SCENECAST_PROMPT_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        };

        // Validate required fields
        if config.upstream.mapbox_token.is_empty() {
            tracing::warn!("MAPBOX_KEY is not set. Nearby places lookups will fail and be skipped.");
        }
        if config.upstream.openweather_key.is_empty() {
            tracing::warn!("OPEN_WEATHER_KEY is not set. Weather lookups will fail.");
        }
        if config.upstream.stability_key.is_empty() {
            tracing::warn!("STABILITY_AI_KEY is not set. Image generation will fail.");
        }

        if config.flow.resolve_device_location && config.location.device.is_none() {
            tracing::warn!(
                "SCENECAST_RESOLVE_DEVICE_LOCATION is set without SCENECAST_DEVICE_LOCATION; runs will fail with UNSUPPORTED"
            );
        }

        Template::parse(&config.prompt_template).map_err(|e| {
            Error::Config(format!("SCENECAST_PROMPT_TEMPLATE is invalid: {}", e))
        })?;

        Ok(config)
    }
}

fn parse_coordinates(key: &str, value: &str) -> Result<Coordinates> {
    let (lat, long) = value
        .split_once(',')
        .ok_or_else(|| Error::Config(format!("{} must be \"lat,long\", got {:?}", key, value)))?;
    let latitude: f64 = parse_number(key, lat)?;
    let longitude: f64 = parse_number(key, long)?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::Config(format!(
            "{} is out of range: {}",
            key, value
        )));
    }
    Ok(Coordinates::new(latitude, longitude))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}

/// `granted`/`denied`, or any boolean spelling.
fn parse_permission(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "granted" => Ok(true),
        "denied" => Ok(false),
        _ => parse_bool(key, value).map_err(|_| {
            Error::Config(format!("{} must be \"granted\" or \"denied\", got {:?}", key, value))
        }),
    }
}

/// Parse a base URL and make sure it ends with `/` so relative joins keep
/// its path.
fn base_url(key: &str, value: Option<String>, default: &str) -> Result<Url> {
    let mut raw = value.unwrap_or_else(|| default.to_string());
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| Error::Config(format!("{} is not a valid URL: {}", key, e)))
}
