use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::ProviderLoadError,
    geocoder::{GeocodingAdapter, GeocodingProvider},
    location::{DeviceLocation, GeoPoint, ResolvedAddress},
    projection::Viewport,
};

/// The map instance of a single widget, this is the only thing that draws markers.
pub trait MapSurface: Send {
    /// Show the marker at `point`, replacing any existing marker in the same call
    fn show_marker(&mut self, point: GeoPoint);
    fn remove_marker(&mut self);
    /// Tear down the map instance and every listener attached to it
    fn release(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetStatus {
    /// Provider not ready yet, input is ignored
    Loading,
    Ready,
    /// Provider failed to come up, only a reload is possible
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Something the user asked the map to do
pub enum MapIntent {
    MapClicked(GeoPoint),
    MarkerDragged(GeoPoint),
    CurrentLocationRequested,
    ClearRequested,
    /// Only offered when the widget is in [WidgetStatus::Error], the owner should mount a new
    /// widget
    ReloadRequested,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Everything the widget displays, owned by whoever drives the widget
pub struct WidgetInputs {
    pub point: Option<GeoPoint>,
    pub address: Option<ResolvedAddress>,
    /// A current location request is outstanding
    pub locating: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Text shown under the map
pub struct Readout {
    pub address: String,
    pub coordinates: String,
}

/// Interactive map showing at most one marker.
///
/// The widget turns user input into [MapIntent]s and draws whatever [WidgetInputs] it was last
/// given, it never decides on a selection itself.
pub struct MapWidget<M: MapSurface> {
    surface: M,
    status: WidgetStatus,
    inputs: WidgetInputs,
    /// What the surface is displaying right now
    shown: Option<GeoPoint>,
    viewport: Option<Viewport>,
}

impl<M: MapSurface> MapWidget<M> {
    pub fn new(surface: M) -> Self {
        Self {
            surface,
            status: WidgetStatus::Loading,
            inputs: WidgetInputs::default(),
            shown: None,
            viewport: None,
        }
    }

    pub fn status(&self) -> &WidgetStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == WidgetStatus::Ready
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            WidgetStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn marker(&self) -> Option<GeoPoint> {
        self.shown
    }

    pub fn is_locating(&self) -> bool {
        self.inputs.locating
    }

    /// Load the provider through `adapter` and move out of [WidgetStatus::Loading]
    pub async fn load<P: GeocodingProvider, D: DeviceLocation>(
        &mut self,
        adapter: &GeocodingAdapter<P, D>,
    ) -> Result<(), ProviderLoadError> {
        if self.status != WidgetStatus::Loading {
            return Ok(());
        }

        match adapter.load().await {
            Ok(()) => {
                self.mark_ready();
                Ok(())
            }
            Err(why) => {
                self.mark_failed(why.to_string());
                Err(why)
            }
        }
    }

    pub fn mark_ready(&mut self) {
        if self.status == WidgetStatus::Loading {
            self.status = WidgetStatus::Ready;
            self.render();
        }
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        if self.status == WidgetStatus::Loading {
            self.status = WidgetStatus::Error(message.into());
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Take new inputs, the marker is updated right away when ready, otherwise once the widget
    /// becomes ready
    pub fn sync(&mut self, inputs: WidgetInputs) {
        self.inputs = inputs;
        if self.is_ready() {
            self.render();
        }
    }

    fn render(&mut self) {
        if self.inputs.point == self.shown {
            return;
        }

        match self.inputs.point {
            Some(point) => self.surface.show_marker(point),
            None => self.surface.remove_marker(),
        }

        self.shown = self.inputs.point;
    }

    fn accepting(&self, what: &str) -> bool {
        if self.is_ready() {
            true
        } else {
            debug!("Ignoring {what} while map is {:?}", self.status);
            false
        }
    }

    pub fn click(&self, point: GeoPoint) -> Option<MapIntent> {
        if !self.accepting("click") {
            return None;
        }

        if point.is_valid() {
            Some(MapIntent::MapClicked(point))
        } else {
            warn!("Discarding click at invalid point {point}");
            None
        }
    }

    /// Click given as a pixel offset into the map element
    pub fn click_pixel(&self, x: f64, y: f64) -> Option<MapIntent> {
        if !self.accepting("click") {
            return None;
        }

        let Some(viewport) = self.viewport else {
            warn!("Discarding pixel click, map has no viewport yet");
            return None;
        };

        match viewport.pixel_to_point(x, y) {
            Ok(point) => Some(MapIntent::MapClicked(point)),
            Err(why) => {
                warn!("Discarding click at ({x}, {y}): {why}");
                None
            }
        }
    }

    pub fn drag_marker(&self, point: GeoPoint) -> Option<MapIntent> {
        if !self.accepting("marker drag") || self.shown.is_none() {
            return None;
        }

        if point.is_valid() {
            Some(MapIntent::MarkerDragged(point))
        } else {
            warn!("Discarding marker drag to invalid point {point}");
            None
        }
    }

    pub fn request_current_location(&self) -> Option<MapIntent> {
        if self.accepting("location request") && !self.inputs.locating {
            Some(MapIntent::CurrentLocationRequested)
        } else {
            None
        }
    }

    pub fn request_clear(&self) -> Option<MapIntent> {
        self.accepting("clear").then_some(MapIntent::ClearRequested)
    }

    pub fn request_reload(&self) -> Option<MapIntent> {
        matches!(self.status, WidgetStatus::Error(_)).then_some(MapIntent::ReloadRequested)
    }

    pub fn readout(&self) -> Option<Readout> {
        let point = self.inputs.point?;
        let address = self
            .inputs
            .address
            .as_ref()
            .map(|a| a.formatted_text.clone())
            .unwrap_or_else(|| point.coordinate_text());
        Some(Readout {
            address,
            coordinates: point.coordinate_text(),
        })
    }

    /// Drop this widget and its map instance
    pub fn unmount(self) {}
}

impl<M: MapSurface> Drop for MapWidget<M> {
    fn drop(&mut self) {
        self.surface.release();
    }
}
