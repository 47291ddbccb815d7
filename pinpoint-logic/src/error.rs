use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to bring the mapping provider up for a widget mount
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderLoadError {
    #[error("No maps API key is configured")]
    MissingApiKey,

    #[error("Maps provider failed to load after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },

    #[error("Maps provider failed to load: {0}")]
    Failed(String),
}

/// Reverse geocoding failed; callers recover with the coordinate string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("No address found for this location")]
    NoResults,

    #[error("Geocoding provider returned status {status}")]
    Provider {
        status: String,
        message: Option<String>,
    },

    #[error("Geocoding request failed: {0}")]
    Request(String),
}

/// Why the device location could not be obtained
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationError {
    #[error("Location permission was denied")]
    PermissionDenied,

    #[error("Location information is unavailable")]
    Unavailable,

    #[error("Location request timed out")]
    Timeout,
}

impl LocationError {
    /// Message shown to the user in a notification
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location access was denied. Please allow location access and try again."
            }
            Self::Unavailable => "Your location is currently unavailable.",
            Self::Timeout => "Getting your location took too long. Please try again.",
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Coordinate ({latitude}, {longitude}) is out of range")]
pub struct InvalidCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}
