use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{http, WeatherLookup};
use crate::{workflow::Coordinates, Result};

/// OpenWeather current conditions, metric units.
#[derive(Debug, Clone)]
pub struct OpenWeather {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl OpenWeather {
    pub fn new(client: Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl WeatherLookup for OpenWeather {
    async fn current(&self, at: Coordinates) -> Result<Value> {
        let url = http::endpoint(&self.base_url, "data/2.5/weather")?;
        let request = self.client.get(url).query(&[
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ]);
        http::fetch_json(request, "weather lookup").await
    }
}
