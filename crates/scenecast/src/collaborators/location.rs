use async_trait::async_trait;
use tracing::debug;

use super::LocationResolver;
use crate::{
    config::LocationConfig,
    workflow::{Coordinates, LocationError},
};

/// Stands in for a device position prompt: answers with the configured
/// coordinates, refuses when permission is off, and reports itself
/// unsupported when no position is configured.
#[derive(Debug, Clone)]
pub struct ConfiguredLocationResolver {
    coordinates: Option<Coordinates>,
    permission_granted: bool,
}

impl ConfiguredLocationResolver {
    pub fn new(coordinates: Option<Coordinates>, permission_granted: bool) -> Self {
        Self {
            coordinates,
            permission_granted,
        }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self::new(config.device, config.permission_granted)
    }
}

#[async_trait]
impl LocationResolver for ConfiguredLocationResolver {
    async fn resolve(&self) -> Result<Coordinates, LocationError> {
        let coordinates = self.coordinates.ok_or_else(LocationError::unsupported)?;
        if !self.permission_granted {
            return Err(LocationError::user_denied());
        }
        debug!(
            latitude = coordinates.latitude,
            longitude = coordinates.longitude,
            "Resolved device location"
        );
        Ok(coordinates)
    }
}
