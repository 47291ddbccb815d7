mod address;
mod error;
mod geocoder;
mod location;
mod projection;
mod scope;
mod selector;
mod slot;
mod widget;

pub use address::{
    AdHocAddress, AddressBook, AddressKind, BookingLocations, FormValue, MissingSelection,
    SavedAddress, TEMP_ID_PREFIX, default_address, is_temporary_id,
};
pub use error::{GeocodeError, InvalidCoordinate, LocationError, ProviderLoadError};
pub use geocoder::{DEVICE_LOCATION_TIMEOUT, GeocodingAdapter, GeocodingProvider, LOAD_ATTEMPTS};
pub use location::{DeviceLocation, GeoPoint, ResolvedAddress};
pub use projection::{MAX_MERCATOR_LATITUDE, Viewport};
pub use scope::{AppScope, ConfirmDialogs, DialogRequest, PushChannel};
pub use selector::{AddressSelector, Notice, StateUpdateSender};
pub use slot::{Selection, SelectionSlot, SelectorSnapshot, SlotKind, SlotMode};
pub use widget::{MapIntent, MapSurface, MapWidget, Readout, WidgetInputs, WidgetStatus};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
