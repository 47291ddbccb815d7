use std::sync::Arc;

use anyhow::anyhow;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    address::{
        AddressBook, BookingLocations, FormValue, MissingSelection, SavedAddress, default_address,
    },
    error::LocationError,
    geocoder::{GeocodingAdapter, GeocodingProvider},
    location::{DeviceLocation, GeoPoint},
    prelude::*,
    slot::{SelectionSlot, SelectorSnapshot, SlotKind, SlotMode, Token},
    widget::{MapIntent, WidgetInputs},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Short-lived message for the user, never blocks the form
pub enum Notice {
    LocationFailed(LocationError),
    MapUnavailable(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Self::LocationFailed(why) => why.user_message().to_string(),
            Self::MapUnavailable(why) => format!("The map could not be loaded: {why}"),
        }
    }
}

pub trait StateUpdateSender: Send + Sync {
    /// The given slot changed, re-read it
    fn send_update(&self, slot: SlotKind);
    fn send_notice(&self, notice: Notice);
}

#[derive(Default)]
struct SelectorState {
    pickup: SelectionSlot,
    dropoff: SelectionSlot,
    saved: Vec<SavedAddress>,
    last_token: Token,
}

impl SelectorState {
    fn issue_token(&mut self) -> Token {
        self.last_token += 1;
        self.last_token
    }

    fn slot(&self, kind: SlotKind) -> &SelectionSlot {
        match kind {
            SlotKind::Pickup => &self.pickup,
            SlotKind::Dropoff => &self.dropoff,
        }
    }

    fn slot_mut(&mut self, kind: SlotKind) -> &mut SelectionSlot {
        match kind {
            SlotKind::Pickup => &mut self.pickup,
            SlotKind::Dropoff => &mut self.dropoff,
        }
    }

    /// Find the slot whose last write is `token`, slots move on swap so this may not be the
    /// slot the write was made to.
    fn slot_with_token(&mut self, token: Token) -> Option<(SlotKind, &mut SelectionSlot)> {
        if self.pickup.token == token {
            Some((SlotKind::Pickup, &mut self.pickup))
        } else if self.dropoff.token == token {
            Some((SlotKind::Dropoff, &mut self.dropoff))
        } else {
            None
        }
    }

    fn slot_locating(&mut self, request: Token) -> Option<(SlotKind, &mut SelectionSlot)> {
        if self.pickup.locating == Some(request) {
            Some((SlotKind::Pickup, &mut self.pickup))
        } else if self.dropoff.locating == Some(request) {
            Some((SlotKind::Dropoff, &mut self.dropoff))
        } else {
            None
        }
    }
}

/// Holds the pickup and dropoff selections of a booking form.
///
/// Every write to a slot gets a fresh [Token]. Async work (reverse geocoding, device location)
/// remembers the token it was started for and only lands if that token is still current, so the
/// last issued write always wins. Tokens travel with the slot on [AddressSelector::swap].
pub struct AddressSelector<P: GeocodingProvider, D: DeviceLocation, S: StateUpdateSender> {
    adapter: Arc<GeocodingAdapter<P, D>>,
    state: Mutex<SelectorState>,
    updates: S,
    cancel: CancellationToken,
}

impl<P: GeocodingProvider, D: DeviceLocation, S: StateUpdateSender> AddressSelector<P, D, S> {
    pub fn new(adapter: Arc<GeocodingAdapter<P, D>>, saved: Vec<SavedAddress>, updates: S) -> Self {
        Self {
            adapter,
            updates,
            state: Mutex::new(SelectorState {
                saved,
                ..Default::default()
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Tie this selector to an outer lifetime, cancelling `cancel` is the same as
    /// [AddressSelector::shutdown]
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn adapter(&self) -> Arc<GeocodingAdapter<P, D>> {
        self.adapter.clone()
    }

    fn emit_update(&self, slot: SlotKind) {
        if !self.cancel.is_cancelled() {
            self.updates.send_update(slot);
        }
    }

    fn emit_notice(&self, notice: Notice) {
        if !self.cancel.is_cancelled() {
            self.updates.send_notice(notice);
        }
    }

    pub async fn saved_addresses(&self) -> Vec<SavedAddress> {
        self.state.lock().await.saved.clone()
    }

    /// Replace the saved address list. Slots keep what they already selected.
    pub async fn set_saved_addresses(&self, saved: Vec<SavedAddress>) {
        self.state.lock().await.saved = saved;
    }

    pub async fn refresh_saved<B: AddressBook>(&self, book: &B) -> Result {
        let saved = book
            .list_addresses()
            .await
            .context("Failed to load saved addresses")?;
        info!("Loaded {} saved addresses", saved.len());
        self.set_saved_addresses(saved).await;
        Ok(())
    }

    pub async fn select_saved(&self, slot: SlotKind, id: &str) -> Result {
        let mut state = self.state.lock().await;
        let saved = state
            .saved
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("No saved address with id {id}"))?;
        let token = state.issue_token();
        state.slot_mut(slot).set_saved(saved, token);
        drop(state);
        self.emit_update(slot);
        Ok(())
    }

    /// Select the user's default address, returns whether there was one
    pub async fn select_default(&self, slot: SlotKind) -> Result<bool> {
        let id = {
            let state = self.state.lock().await;
            default_address(&state.saved).map(|a| a.id.clone())
        };
        match id {
            Some(id) => self.select_saved(slot, &id).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Put the slot's marker at `point` and resolve its address. The slot shows the coordinates
    /// until the address arrives.
    pub async fn select_from_map(&self, slot: SlotKind, point: GeoPoint) {
        if !point.is_valid() {
            warn!("Ignoring {slot} selection at invalid point {point}");
            return;
        }

        let token = {
            let mut state = self.state.lock().await;
            let token = state.issue_token();
            state.slot_mut(slot).place_marker(point, token);
            token
        };
        self.emit_update(slot);

        self.resolve_into(token, point).await;
    }

    async fn resolve_into(&self, token: Token, point: GeoPoint) {
        let resolved = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                return;
            }

            resolved = self.adapter.resolve_address(point) => resolved,
        };

        if self.cancel.is_cancelled() {
            return;
        }

        let mut state = self.state.lock().await;
        let applied = state.slot_with_token(token).map(|(kind, target)| {
            target.apply_resolved(resolved);
            kind
        });
        drop(state);

        match applied {
            Some(kind) => self.emit_update(kind),
            None => debug!("Dropping address for {point}, a newer selection replaced it"),
        }
    }

    /// Select the device's current position. On failure the user gets a notice and the slot is
    /// left as it was.
    pub async fn use_current_location(&self, slot: SlotKind) -> Result<(), LocationError> {
        let request = {
            let mut state = self.state.lock().await;
            let request = state.issue_token();
            state.slot_mut(slot).locating = Some(request);
            request
        };
        self.emit_update(slot);

        let res = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                return Ok(());
            }

            res = self.adapter.current_device_location() => res,
        };

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let mut state = self.state.lock().await;

        match res {
            Ok(point) => {
                let token = state.issue_token();
                let Some((kind, target)) = state.slot_locating(request) else {
                    debug!("Dropping device location {point}, a newer selection replaced it");
                    return Ok(());
                };
                target.place_marker(point, token);
                drop(state);
                self.emit_update(kind);
                self.resolve_into(token, point).await;
                Ok(())
            }
            Err(why) => {
                let Some((kind, target)) = state.slot_locating(request) else {
                    debug!("Dropping location failure ({why}), a newer selection replaced it");
                    return Ok(());
                };
                target.locating = None;
                drop(state);
                self.emit_update(kind);
                warn!("Couldn't get current location for {slot}: {why}");
                self.emit_notice(Notice::LocationFailed(why));
                Err(why)
            }
        }
    }

    /// Switch a slot between saved and map picking, the slot is emptied if the mode changes
    pub async fn set_mode(&self, slot: SlotKind, mode: SlotMode) {
        let mut state = self.state.lock().await;
        if state.slot(slot).mode == mode {
            return;
        }
        let token = state.issue_token();
        state.slot_mut(slot).set_mode(mode, token);
        drop(state);
        self.emit_update(slot);
    }

    /// Exchange everything about the two slots, including pending address lookups
    pub async fn swap(&self) {
        {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            std::mem::swap(&mut state.pickup, &mut state.dropoff);
        }
        self.emit_update(SlotKind::Pickup);
        self.emit_update(SlotKind::Dropoff);
    }

    pub async fn clear(&self, slot: SlotKind) {
        let mut state = self.state.lock().await;
        let token = state.issue_token();
        state.slot_mut(slot).clear(token);
        drop(state);
        self.emit_update(slot);
    }

    /// Clear `slot` only if it still holds exactly `seen`, for clears that waited on the user.
    /// Returns whether the slot was cleared.
    pub async fn clear_if_unchanged(&self, slot: SlotKind, seen: &SelectionSlot) -> bool {
        let mut state = self.state.lock().await;
        if state.slot(slot) != seen {
            return false;
        }
        let token = state.issue_token();
        state.slot_mut(slot).clear(token);
        drop(state);
        self.emit_update(slot);
        true
    }

    /// Route an intent coming from the slot's map widget
    pub async fn handle_intent(&self, slot: SlotKind, intent: MapIntent) {
        match intent {
            MapIntent::MapClicked(point) | MapIntent::MarkerDragged(point) => {
                self.select_from_map(slot, point).await
            }
            MapIntent::CurrentLocationRequested => {
                // Failure was already reported through a notice
                self.use_current_location(slot).await.ok();
            }
            MapIntent::ClearRequested => self.clear(slot).await,
            MapIntent::ReloadRequested => {
                debug!("Reload of the {slot} map is up to the widget owner");
            }
        }
    }

    pub async fn slot(&self, kind: SlotKind) -> SelectionSlot {
        self.state.lock().await.slot(kind).clone()
    }

    pub async fn snapshot(&self) -> SelectorSnapshot {
        let state = self.state.lock().await;
        SelectorSnapshot {
            pickup: state.pickup.clone(),
            dropoff: state.dropoff.clone(),
        }
    }

    pub async fn form_value(&self, slot: SlotKind) -> Option<FormValue> {
        self.state.lock().await.slot(slot).form_value()
    }

    pub async fn widget_inputs(&self, slot: SlotKind) -> WidgetInputs {
        self.state.lock().await.slot(slot).widget_inputs()
    }

    pub async fn empty_slots(&self) -> Vec<SlotKind> {
        let state = self.state.lock().await;
        SlotKind::ALL
            .into_iter()
            .filter(|kind| state.slot(*kind).is_empty())
            .collect()
    }

    pub async fn booking(&self) -> Result<BookingLocations, MissingSelection> {
        let state = self.state.lock().await;
        BookingLocations::from_values(state.pickup.form_value(), state.dropoff.form_value())
    }

    /// Stop all work, results still in flight are dropped and no more updates are sent
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
