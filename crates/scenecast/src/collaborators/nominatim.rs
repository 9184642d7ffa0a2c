use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{http, ReverseGeocoder};
use crate::{workflow::Coordinates, Result};

/// OpenStreetMap Nominatim reverse geocoding.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: Url,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: Coordinates) -> Result<Value> {
        let url = http::endpoint(&self.base_url, "reverse")?;
        let request = self.client.get(url).query(&[
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("format", "json".to_string()),
        ]);
        http::fetch_json(request, "reverse geocode").await
    }
}
