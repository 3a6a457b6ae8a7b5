//! Location Resolver
//!
//! Turns the device position into a short human-readable place such as
//! `"Austin, TX"`. Positioning is platform specific and sits behind the
//! [`Geolocator`] trait; reverse geocoding defaults to the BigDataCloud client
//! endpoint. A failed lookup never blocks the intake form.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

const BIGDATACLOUD_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";

/// How long a position lookup may take before giving up.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a resolved place is reused.
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device")]
    Unsupported,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location information unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Geocoding request failed: {0}")]
    Geocoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Source of the device position.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Maps a position to a place name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, position: Coordinates) -> Result<String, LocationError>;
}

/// The subset of the BigDataCloud response we read.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodingResponse {
    pub city: Option<String>,
    pub locality: Option<String>,
    pub principal_subdivision: Option<String>,
    pub principal_subdivision_code: Option<String>,
    pub country_code: Option<String>,
}

/// Formats a geocoding response as `"City, ST"`, or just the city when no
/// region is known. US subdivision codes lose their `US-` prefix.
pub fn format_place(response: &GeocodingResponse) -> String {
    let filled = |field: &Option<String>| field.clone().filter(|s| !s.is_empty());

    let city = filled(&response.city)
        .or_else(|| filled(&response.locality))
        .unwrap_or_else(|| "Unknown City".to_string());
    let state = filled(&response.principal_subdivision_code)
        .map(|code| code.replacen("US-", "", 1))
        .filter(|code| !code.is_empty())
        .or_else(|| filled(&response.principal_subdivision));

    match state {
        Some(state) => format!("{}, {}", city, state),
        None => city,
    }
}

/// Reverse geocoder backed by the BigDataCloud client API.
pub struct BigDataCloudGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl BigDataCloudGeocoder {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, BIGDATACLOUD_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for BigDataCloudGeocoder {
    async fn reverse_geocode(&self, position: Coordinates) -> Result<String, LocationError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", position.latitude.to_string()),
                ("longitude", position.longitude.to_string()),
                ("localityLanguage", "en".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Geocoding(format!(
                "status {}",
                response.status()
            )));
        }

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;
        Ok(format_place(&body))
    }
}

struct CachedPlace {
    place: String,
    resolved_at: Instant,
}

/// Combines a [`Geolocator`] and a [`ReverseGeocoder`] with a timeout and a short-lived cache.
pub struct LocationResolver {
    geolocator: Arc<dyn Geolocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
    timeout: Duration,
    max_age: Duration,
    cache: Mutex<Option<CachedPlace>>,
}

impl LocationResolver {
    pub fn new(geolocator: Arc<dyn Geolocator>, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            geolocator,
            geocoder,
            timeout: LOOKUP_TIMEOUT,
            max_age: CACHE_MAX_AGE,
            cache: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the current place, reusing a recent result when there is one.
    pub async fn resolve(&self) -> Result<String, LocationError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.resolved_at.elapsed() < self.max_age {
                return Ok(cached.place.clone());
            }
        }

        let position = tokio::time::timeout(self.timeout, self.geolocator.current_position())
            .await
            .map_err(|_| LocationError::Timeout)
            .and_then(|result| result)
            .inspect_err(|e| warn!(error = %e, "Position lookup failed"))?;

        let place = self
            .geocoder
            .reverse_geocode(position)
            .await
            .inspect_err(|e| warn!(error = %e, "Reverse geocoding failed"))?;

        info!(place = %place, "Location resolved");
        *cache = Some(CachedPlace {
            place: place.clone(),
            resolved_at: Instant::now(),
        });
        Ok(place)
    }
}
