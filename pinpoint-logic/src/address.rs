use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    location::{GeoPoint, ResolvedAddress},
    prelude::*,
};

/// Prefix of ids handed out to addresses picked on the map
pub const TEMP_ID_PREFIX: &str = "temp-";

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Home,
    Work,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// An address from the user's profile
pub struct SavedAddress {
    pub id: String,
    pub kind: AddressKind,
    pub street: String,
    pub point: Option<GeoPoint>,
    pub is_default: bool,
}

/// Find the address the user flagged as their default
pub fn default_address(addresses: &[SavedAddress]) -> Option<&SavedAddress> {
    addresses.iter().find(|a| a.is_default)
}

/// Source of the user's saved addresses, read-only from our side
pub trait AddressBook: Send + Sync {
    fn list_addresses(&self) -> impl Future<Output = Result<Vec<SavedAddress>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// An address picked on the map rather than from the saved list
pub struct AdHocAddress {
    /// Synthetic id, always starts with [TEMP_ID_PREFIX]
    pub id: String,
    /// Where the marker currently sits
    pub marker: GeoPoint,
    pub address: ResolvedAddress,
}

impl AdHocAddress {
    pub fn new(marker: GeoPoint) -> Self {
        Self {
            id: format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()),
            marker,
            address: ResolvedAddress::pending(marker),
        }
    }

    /// Move the marker, the address goes back to pending until re-resolved
    pub fn move_marker(&mut self, marker: GeoPoint) {
        self.marker = marker;
        self.address = ResolvedAddress::pending(marker);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// What the booking form receives for one slot
pub struct FormValue {
    pub address_id: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl From<&SavedAddress> for FormValue {
    fn from(saved: &SavedAddress) -> Self {
        Self {
            address_id: saved.id.clone(),
            street: saved.street.clone(),
            latitude: saved.point.map(|p| p.latitude),
            longitude: saved.point.map(|p| p.longitude),
        }
    }
}

impl From<&AdHocAddress> for FormValue {
    fn from(ad_hoc: &AdHocAddress) -> Self {
        Self {
            address_id: ad_hoc.id.clone(),
            street: ad_hoc.address.formatted_text.clone(),
            latitude: Some(ad_hoc.marker.latitude),
            longitude: Some(ad_hoc.marker.longitude),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSelection {
    #[error("Please select a pickup location")]
    Pickup,
    #[error("Please select a dropoff location")]
    Dropoff,
    #[error("Please select pickup and dropoff locations")]
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Both locations of a booking, only constructible when neither is missing
pub struct BookingLocations {
    pub pickup: FormValue,
    pub dropoff: FormValue,
}

impl BookingLocations {
    pub fn from_values(
        pickup: Option<FormValue>,
        dropoff: Option<FormValue>,
    ) -> Result<Self, MissingSelection> {
        match (pickup, dropoff) {
            (Some(pickup), Some(dropoff)) => Ok(Self { pickup, dropoff }),
            (None, Some(_)) => Err(MissingSelection::Pickup),
            (Some(_), None) => Err(MissingSelection::Dropoff),
            (None, None) => Err(MissingSelection::Both),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> SavedAddress {
        SavedAddress {
            id: "addr-home".to_string(),
            kind: AddressKind::Home,
            street: "12 MG Road".to_string(),
            point: None,
            is_default: true,
        }
    }

    #[test]
    fn test_ad_hoc_ids_are_temporary() {
        let point = GeoPoint::new(1.0, 1.0).unwrap();
        let a = AdHocAddress::new(point);
        let b = AdHocAddress::new(point);
        assert!(is_temporary_id(&a.id));
        assert_ne!(a.id, b.id);
        assert!(!is_temporary_id(&home().id));
    }

    #[test]
    fn test_saved_form_value_omits_missing_coords() {
        let value = FormValue::from(&home());
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "addressId": "addr-home", "street": "12 MG Road" })
        );
    }

    #[test]
    fn test_ad_hoc_form_value_uses_marker() {
        let point = GeoPoint::new(12.9716, 77.5946).unwrap();
        let mut ad_hoc = AdHocAddress::new(point);
        ad_hoc.address = ResolvedAddress {
            formatted_text: "MG Road, Bengaluru".to_string(),
            point: Some(point),
        };
        let value = FormValue::from(&ad_hoc);
        assert_eq!(value.street, "MG Road, Bengaluru");
        assert_eq!(value.latitude, Some(12.9716));
        assert_eq!(value.longitude, Some(77.5946));
    }

    #[test]
    fn test_booking_requires_both() {
        let value = FormValue::from(&home());
        assert_eq!(
            BookingLocations::from_values(None, None),
            Err(MissingSelection::Both)
        );
        assert_eq!(
            BookingLocations::from_values(Some(value.clone()), None),
            Err(MissingSelection::Dropoff)
        );
        assert_eq!(
            BookingLocations::from_values(None, Some(value.clone())),
            Err(MissingSelection::Pickup)
        );
        assert!(BookingLocations::from_values(Some(value.clone()), Some(value)).is_ok());
    }

    #[test]
    fn test_default_address() {
        let mut work = home();
        work.id = "addr-work".to_string();
        work.kind = AddressKind::Work;
        work.is_default = false;
        let list = vec![work, home()];
        assert_eq!(default_address(&list).map(|a| a.id.as_str()), Some("addr-home"));
        assert!(default_address(&list[..1]).is_none());
    }
}
