use log::{debug, warn};
use pinpoint_logic::{
    DeviceLocation, GeoPoint, GeocodeError, GeocodingProvider, LocationError, ProviderLoadError,
    prelude::*,
};
use reqwest::{Client, StatusCode, Url, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderConfig;

const SCRIPT_PATH: &str = "/maps/api/js";
const GEOCODE_PATH: &str = "/maps/api/geocode/json";
const GEOLOCATE_PATH: &str = "/geolocation/v1/geolocate";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct GeolocateResponse {
    location: LatLng,
    accuracy: f64,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn request_err(err: reqwest::Error) -> GeocodeError {
    GeocodeError::Request(err.to_string())
}

/// Google Maps Platform as a [GeocodingProvider]
pub struct GoogleMaps {
    client: Client,
    config: ProviderConfig,
}

impl GoogleMaps {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Device location through the Geolocation API, sharing this provider's client
    pub fn geolocator(&self) -> GoogleGeolocator {
        GoogleGeolocator {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

impl GeocodingProvider for GoogleMaps {
    async fn load(&self) -> Result<(), ProviderLoadError> {
        let key = self
            .config
            .api_key()
            .ok_or(ProviderLoadError::MissingApiKey)?;
        let url = Url::parse_with_params(&self.config.url(SCRIPT_PATH), [("key", key)])
            .map_err(|err| ProviderLoadError::Failed(format!("Bad maps URL: {err}")))?;

        self.client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| ProviderLoadError::Failed(err.to_string()))?;

        debug!("Maps script reachable");
        Ok(())
    }

    async fn reverse_geocode(&self, point: GeoPoint) -> Result<String, GeocodeError> {
        let key = self
            .config
            .api_key()
            .ok_or_else(|| GeocodeError::Request("No maps API key is configured".to_string()))?;
        let latlng = format!("{},{}", point.latitude, point.longitude);
        let url = Url::parse_with_params(
            &self.config.url(GEOCODE_PATH),
            [("latlng", latlng.as_str()), ("key", key)],
        )
        .map_err(|err| GeocodeError::Request(format!("Bad geocode URL: {err}")))?;

        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(request_err)?
            .text()
            .await
            .map_err(request_err)?;

        let resp = serde_json::from_str::<GeocodeResponse>(&body)
            .map_err(|err| GeocodeError::Request(format!("Malformed geocode response: {err}")))?;

        match resp.status.as_str() {
            "OK" => resp
                .results
                .into_iter()
                .next()
                .map(|r| r.formatted_address)
                .ok_or(GeocodeError::NoResults),
            "ZERO_RESULTS" => Err(GeocodeError::NoResults),
            _ => Err(GeocodeError::Provider {
                status: resp.status,
                message: resp.error_message,
            }),
        }
    }
}

/// Device position from the Geolocation API (network based)
pub struct GoogleGeolocator {
    client: Client,
    config: ProviderConfig,
}

fn location_err(err: reqwest::Error) -> LocationError {
    if err.is_timeout() {
        LocationError::Timeout
    } else {
        warn!("Geolocation request failed: {err}");
        LocationError::Unavailable
    }
}

impl DeviceLocation for GoogleGeolocator {
    async fn current_position(&self) -> Result<GeoPoint, LocationError> {
        let Some(key) = self.config.api_key() else {
            warn!("No maps API key, treating geolocation as denied");
            return Err(LocationError::PermissionDenied);
        };
        let url = Url::parse_with_params(&self.config.url(GEOLOCATE_PATH), [("key", key)])
            .map_err(|err| {
                warn!("Bad geolocation URL: {err}");
                LocationError::Unavailable
            })?;
        let body = serde_json::to_vec(&json!({ "considerIp": true })).map_err(|err| {
            warn!("Failed to encode geolocation request: {err}");
            LocationError::Unavailable
        })?;

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(location_err)?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN => return Err(LocationError::PermissionDenied),
            StatusCode::NOT_FOUND => return Err(LocationError::Unavailable),
            status => {
                warn!("Geolocation returned {status}");
                return Err(LocationError::Unavailable);
            }
        }

        let body = resp.text().await.map_err(location_err)?;
        let parsed = serde_json::from_str::<GeolocateResponse>(&body).map_err(|err| {
            warn!("Malformed geolocation response: {err}");
            LocationError::Unavailable
        })?;

        debug!("Geolocated within {}m", parsed.accuracy);

        GeoPoint::new(parsed.location.lat, parsed.location.lng).map_err(|why| {
            warn!("Geolocation gave {why}");
            LocationError::Unavailable
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pinpoint_logic::GeocodingAdapter;
    use tokio::test;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path, query_param},
    };

    use super::*;

    fn config(server: &MockServer, key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            base_url: server.uri(),
            api_key: key.map(str::to_string),
            timeout: Duration::from_secs(5),
        }
    }

    fn bengaluru() -> GeoPoint {
        GeoPoint::new(12.9716, 77.5946).unwrap()
    }

    async fn mount_geocode(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(GEOCODE_PATH))
            .and(query_param("latlng", "12.9716,77.5946"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    async fn test_reverse_geocode_first_result() {
        let server = MockServer::start().await;
        mount_geocode(
            &server,
            json!({
                "status": "OK",
                "results": [
                    { "formatted_address": "MG Road, Bengaluru, Karnataka 560001, India" },
                    { "formatted_address": "Bengaluru, Karnataka, India" }
                ]
            }),
        )
        .await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.reverse_geocode(bengaluru()).await,
            Ok("MG Road, Bengaluru, Karnataka 560001, India".to_string())
        );
    }

    #[test]
    async fn test_zero_results_falls_back_to_coordinates() {
        let server = MockServer::start().await;
        mount_geocode(&server, json!({ "status": "ZERO_RESULTS", "results": [] })).await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.reverse_geocode(bengaluru()).await,
            Err(GeocodeError::NoResults)
        );

        let geolocator = maps.geolocator();
        let adapter = GeocodingAdapter::new(maps, geolocator);
        let resolved = adapter.resolve_address(bengaluru()).await;
        assert_eq!(resolved.formatted_text, "12.971600, 77.594600");
    }

    #[test]
    async fn test_ok_without_results_is_no_results() {
        let server = MockServer::start().await;
        mount_geocode(&server, json!({ "status": "OK", "results": [] })).await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.reverse_geocode(bengaluru()).await,
            Err(GeocodeError::NoResults)
        );
    }

    #[test]
    async fn test_key_is_query_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SCRIPT_PATH))
            .and(query_param("key", "a&b=c d"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let maps = GoogleMaps::new(config(&server, Some("a&b=c d"))).unwrap();
        assert_eq!(maps.load().await, Ok(()));
    }

    #[test]
    async fn test_provider_status_error() {
        let server = MockServer::start().await;
        mount_geocode(
            &server,
            json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            }),
        )
        .await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.reverse_geocode(bengaluru()).await,
            Err(GeocodeError::Provider {
                status: "REQUEST_DENIED".to_string(),
                message: Some("The provided API key is invalid.".to_string()),
            })
        );
    }

    #[test]
    async fn test_server_error_is_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GEOCODE_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert!(matches!(
            maps.reverse_geocode(bengaluru()).await,
            Err(GeocodeError::Request(_))
        ));
    }

    #[test]
    async fn test_load_requires_key() {
        let server = MockServer::start().await;
        let maps = GoogleMaps::new(config(&server, None)).unwrap();
        assert_eq!(maps.load().await, Err(ProviderLoadError::MissingApiKey));
    }

    #[test]
    async fn test_load_checks_script() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SCRIPT_PATH))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("/* maps */"))
            .expect(1)
            .mount(&server)
            .await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(maps.load().await, Ok(()));
    }

    #[test]
    async fn test_load_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SCRIPT_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert!(matches!(
            maps.load().await,
            Err(ProviderLoadError::Failed(_))
        ));
    }

    async fn mount_geolocate(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(GEOLOCATE_PATH))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({ "considerIp": true })))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[test]
    async fn test_geolocate() {
        let server = MockServer::start().await;
        mount_geolocate(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "location": { "lat": 12.9716, "lng": 77.5946 },
                "accuracy": 1200.0
            })),
        )
        .await;

        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.geolocator().current_position().await,
            Ok(bengaluru())
        );
    }

    #[test]
    async fn test_geolocate_status_mapping() {
        let server = MockServer::start().await;
        mount_geolocate(&server, ResponseTemplate::new(404)).await;
        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.geolocator().current_position().await,
            Err(LocationError::Unavailable)
        );

        let server = MockServer::start().await;
        mount_geolocate(&server, ResponseTemplate::new(403)).await;
        let maps = GoogleMaps::new(config(&server, Some("test-key"))).unwrap();
        assert_eq!(
            maps.geolocator().current_position().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[test]
    async fn test_geolocate_without_key_is_denied() {
        let server = MockServer::start().await;
        let maps = GoogleMaps::new(config(&server, None)).unwrap();
        assert_eq!(
            maps.geolocator().current_position().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[test]
    async fn test_geolocate_timeout() {
        let server = MockServer::start().await;
        mount_geolocate(
            &server,
            ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
        )
        .await;

        let mut config = config(&server, Some("test-key"));
        config.timeout = Duration::from_millis(200);
        let maps = GoogleMaps::new(config).unwrap();
        assert_eq!(
            maps.geolocator().current_position().await,
            Err(LocationError::Timeout)
        );
    }
}
