mod config;
mod google;

pub use config::ProviderConfig;
pub use google::{GoogleGeolocator, GoogleMaps};
