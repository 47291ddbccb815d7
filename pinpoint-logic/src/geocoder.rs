use std::time::Duration;

use log::{debug, warn};

use crate::{
    error::{GeocodeError, LocationError, ProviderLoadError},
    location::{DeviceLocation, GeoPoint, ResolvedAddress},
    widget::{MapSurface, MapWidget, WidgetInputs},
};

/// Upper bound on waiting for the device to report a position
pub const DEVICE_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);
/// How many times loading the provider is tried before the widget gives up
pub const LOAD_ATTEMPTS: u32 = 3;
const LOAD_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A mapping provider able to turn coordinates into addresses
pub trait GeocodingProvider: Send + Sync {
    /// Bring the provider up (load its script, check credentials, etc.)
    fn load(&self) -> impl Future<Output = Result<(), ProviderLoadError>> + Send {
        async { Ok(()) }
    }

    /// Reverse geocode a point, returning the provider's best formatted address
    fn reverse_geocode(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<String, GeocodeError>> + Send;
}

/// Sits between the map workflow and the [GeocodingProvider] / [DeviceLocation], converting every
/// failure from them into one of our error kinds or a fallback value.
pub struct GeocodingAdapter<P: GeocodingProvider, D: DeviceLocation> {
    provider: P,
    device: D,
    location_timeout: Duration,
}

impl<P: GeocodingProvider, D: DeviceLocation> GeocodingAdapter<P, D> {
    pub fn new(provider: P, device: D) -> Self {
        Self {
            provider,
            device,
            location_timeout: DEVICE_LOCATION_TIMEOUT,
        }
    }

    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Load the provider, retrying up to [LOAD_ATTEMPTS] times. A missing API key is never
    /// retried.
    pub async fn load(&self) -> Result<(), ProviderLoadError> {
        let mut last_err = String::new();

        for attempt in 1..=LOAD_ATTEMPTS {
            match self.provider.load().await {
                Ok(()) => return Ok(()),
                Err(ProviderLoadError::MissingApiKey) => {
                    return Err(ProviderLoadError::MissingApiKey);
                }
                Err(why) => {
                    warn!("Maps provider load attempt {attempt}/{LOAD_ATTEMPTS} failed: {why}");
                    last_err = why.to_string();
                }
            }

            if attempt < LOAD_ATTEMPTS {
                tokio::time::sleep(LOAD_RETRY_DELAY).await;
            }
        }

        Err(ProviderLoadError::Exhausted {
            attempts: LOAD_ATTEMPTS,
            reason: last_err,
        })
    }

    /// Get an address for `point`. This never fails, if the provider can't give us anything
    /// usable the coordinates themselves are the address.
    pub async fn resolve_address(&self, point: GeoPoint) -> ResolvedAddress {
        match self.provider.reverse_geocode(point).await {
            Ok(text) if !text.trim().is_empty() => ResolvedAddress {
                formatted_text: text,
                point: Some(point),
            },
            Ok(_) => {
                debug!("Provider gave an empty address for {point}");
                ResolvedAddress::fallback(point)
            }
            Err(GeocodeError::NoResults) => {
                debug!("No address found for {point}");
                ResolvedAddress::fallback(point)
            }
            Err(why) => {
                warn!("Reverse geocoding {point} failed: {why}");
                ResolvedAddress::fallback(point)
            }
        }
    }

    pub async fn current_device_location(&self) -> Result<GeoPoint, LocationError> {
        match tokio::time::timeout(self.location_timeout, self.device.current_position()).await {
            Ok(Ok(point)) if point.is_valid() => Ok(point),
            Ok(Ok(point)) => {
                warn!("Device reported an out of range position: {point}");
                Err(LocationError::Unavailable)
            }
            Ok(Err(why)) => {
                debug!("Device location failed: {why}");
                Err(why)
            }
            Err(_) => {
                debug!(
                    "Device location timed out after {}s",
                    self.location_timeout.as_secs()
                );
                Err(LocationError::Timeout)
            }
        }
    }

    /// Put the widget's marker at `point` and resolve its address, for pages that pick a single
    /// address. Returns [None] if the widget isn't accepting input.
    pub async fn place_marker_and_resolve<M: MapSurface>(
        &self,
        widget: &mut MapWidget<M>,
        point: GeoPoint,
    ) -> Option<ResolvedAddress> {
        if !widget.is_ready() || !point.is_valid() {
            return None;
        }

        widget.sync(WidgetInputs {
            point: Some(point),
            address: Some(ResolvedAddress::pending(point)),
            locating: false,
        });

        let resolved = self.resolve_address(point).await;

        widget.sync(WidgetInputs {
            point: Some(point),
            address: Some(resolved.clone()),
            locating: false,
        });

        Some(resolved)
    }
}
