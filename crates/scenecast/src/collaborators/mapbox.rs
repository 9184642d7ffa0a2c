use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{http, PlacesLookup};
use crate::{workflow::Coordinates, Result};

/// Mapbox forward/reverse geocoding restricted to points of interest.
#[derive(Debug, Clone)]
pub struct MapboxPlaces {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl MapboxPlaces {
    pub fn new(client: Client, base_url: Url, access_token: String) -> Self {
        Self {
            client,
            base_url,
            access_token,
        }
    }
}

#[async_trait]
impl PlacesLookup for MapboxPlaces {
    async fn nearby(&self, at: Coordinates) -> Result<Value> {
        // Mapbox takes longitude first.
        let path = format!(
            "geocoding/v5/mapbox.places/{},{}.json",
            at.longitude, at.latitude
        );
        let url = http::endpoint(&self.base_url, &path)?;
        let request = self.client.get(url).query(&[
            ("types", "poi"),
            ("access_token", self.access_token.as_str()),
        ]);
        http::fetch_json(request, "places lookup").await
    }
}
