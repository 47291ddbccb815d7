use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    address::{AdHocAddress, FormValue, SavedAddress},
    location::{GeoPoint, ResolvedAddress},
    widget::WidgetInputs,
};

/// Write token used to tell whether an async result is still wanted
pub type Token = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Pickup,
    Dropoff,
}

impl SlotKind {
    pub const ALL: [Self; 2] = [Self::Pickup, Self::Dropoff];
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pickup => f.write_str("pickup"),
            Self::Dropoff => f.write_str("dropoff"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Where the user is picking this slot's address from
pub enum SlotMode {
    #[default]
    Saved,
    Map,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    Saved(SavedAddress),
    AdHoc(AdHocAddress),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One of the two locations of a booking
pub struct SelectionSlot {
    pub mode: SlotMode,
    pub selection: Option<Selection>,
    /// Token of the last write to this slot
    #[serde(skip)]
    pub(crate) token: Token,
    /// Token of an outstanding current location request
    #[serde(skip)]
    pub(crate) locating: Option<Token>,
}

impl SelectionSlot {
    pub fn is_empty(&self) -> bool {
        self.selection.is_none()
    }

    pub fn is_locating(&self) -> bool {
        self.locating.is_some()
    }

    pub fn ad_hoc(&self) -> Option<&AdHocAddress> {
        match &self.selection {
            Some(Selection::AdHoc(ad_hoc)) => Some(ad_hoc),
            _ => None,
        }
    }

    pub fn form_value(&self) -> Option<FormValue> {
        self.selection.as_ref().map(|s| match s {
            Selection::Saved(saved) => FormValue::from(saved),
            Selection::AdHoc(ad_hoc) => FormValue::from(ad_hoc),
        })
    }

    pub fn widget_inputs(&self) -> WidgetInputs {
        let locating = self.is_locating();
        match self.ad_hoc() {
            Some(ad_hoc) => WidgetInputs {
                point: Some(ad_hoc.marker),
                address: Some(ad_hoc.address.clone()),
                locating,
            },
            None => WidgetInputs {
                locating,
                ..Default::default()
            },
        }
    }

    /// Overwrite this slot with a write identified by `token`, any outstanding location request
    /// is superseded
    fn stamp(&mut self, token: Token) {
        self.token = token;
        self.locating = None;
    }

    pub(crate) fn set_saved(&mut self, saved: SavedAddress, token: Token) {
        self.mode = SlotMode::Saved;
        self.selection = Some(Selection::Saved(saved));
        self.stamp(token);
    }

    /// Put the marker at `point`. An existing ad-hoc address keeps its id and goes back to
    /// pending, anything else is replaced by a new ad-hoc address.
    pub(crate) fn place_marker(&mut self, point: GeoPoint, token: Token) {
        match &mut self.selection {
            Some(Selection::AdHoc(ad_hoc)) => ad_hoc.move_marker(point),
            _ => self.selection = Some(Selection::AdHoc(AdHocAddress::new(point))),
        }
        self.mode = SlotMode::Map;
        self.stamp(token);
    }

    pub(crate) fn apply_resolved(&mut self, resolved: ResolvedAddress) {
        if let Some(Selection::AdHoc(ad_hoc)) = &mut self.selection {
            ad_hoc.address = resolved;
        }
    }

    pub(crate) fn clear(&mut self, token: Token) {
        self.selection = None;
        self.stamp(token);
    }

    pub(crate) fn set_mode(&mut self, mode: SlotMode, token: Token) {
        self.mode = mode;
        self.clear(token);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorSnapshot {
    pub pickup: SelectionSlot,
    pub dropoff: SelectionSlot,
}

impl SelectorSnapshot {
    pub fn slot(&self, kind: SlotKind) -> &SelectionSlot {
        match kind {
            SlotKind::Pickup => &self.pickup,
            SlotKind::Dropoff => &self.dropoff,
        }
    }
}
