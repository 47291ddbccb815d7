use std::{collections::HashMap, path::PathBuf, sync::Arc};

use log::{error, info, warn};
use pinpoint_logic::{
    AddressBook, AddressSelector, AppScope, ConfirmDialogs, DeviceLocation, DialogRequest,
    GeoPoint, GeocodeError, GeocodingAdapter, GeocodingProvider, LocationError, MapIntent,
    MapSurface, MapWidget, Notice, ProviderLoadError, PushChannel, SavedAddress, SlotKind,
    StateUpdateSender, Viewport,
};
use pinpoint_provider::{GoogleGeolocator, GoogleMaps, ProviderConfig};
use pinpoint_test_shared::*;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};

const DEVICE_LOCATION_VAR: &str = "PINPOINT_DEVICE_LOCATION";

/// What every mounted map is looking at, pixel clicks are relative to this
const VIEWPORT: Viewport = Viewport {
    center: GeoPoint {
        latitude: 12.9716,
        longitude: 77.5946,
    },
    zoom: 12.0,
    width: 640.0,
    height: 480.0,
};

/// Geocoding through Google, or nothing at all when no key is configured
enum Geocoder {
    Google(GoogleMaps),
    Offline,
}

impl GeocodingProvider for Geocoder {
    async fn load(&self) -> Result<(), ProviderLoadError> {
        match self {
            Self::Google(maps) => maps.load().await,
            Self::Offline => Ok(()),
        }
    }

    async fn reverse_geocode(&self, point: GeoPoint) -> Result<String, GeocodeError> {
        match self {
            Self::Google(maps) => maps.reverse_geocode(point).await,
            Self::Offline => Err(GeocodeError::NoResults),
        }
    }
}

enum Device {
    Google(GoogleGeolocator),
    Fixed(Result<GeoPoint, LocationError>),
}

impl DeviceLocation for Device {
    async fn current_position(&self) -> Result<GeoPoint, LocationError> {
        match self {
            Self::Google(geolocator) => geolocator.current_position().await,
            Self::Fixed(res) => *res,
        }
    }
}

/// Device position from `PINPOINT_DEVICE_LOCATION` ("lat,lng"), denied when unset
fn fixed_location() -> Result<GeoPoint, LocationError> {
    let Ok(raw) = std::env::var(DEVICE_LOCATION_VAR) else {
        return Err(LocationError::PermissionDenied);
    };

    raw.split_once(',')
        .and_then(|(lat, lng)| Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?)))
        .and_then(|(lat, lng)| GeoPoint::new(lat, lng).ok())
        .ok_or_else(|| {
            warn!("Ignoring malformed {DEVICE_LOCATION_VAR}: {raw}");
            LocationError::Unavailable
        })
}

struct JsonAddressBook(PathBuf);

impl AddressBook for JsonAddressBook {
    async fn list_addresses(&self) -> Result<Vec<SavedAddress>> {
        let raw = tokio::fs::read_to_string(&self.0)
            .await
            .with_context(|| format!("Failed to read {}", self.0.display()))?;
        serde_json::from_str(&raw).context("Failed to parse saved addresses")
    }
}

struct LoggingChannel;

impl PushChannel for LoggingChannel {
    async fn connect(&self) -> Result {
        info!("Notification channel connected");
        Ok(())
    }

    async fn disconnect(&self) {
        info!("Notification channel disconnected");
    }
}

struct LoggingSurface(SlotKind);

impl MapSurface for LoggingSurface {
    fn show_marker(&mut self, point: GeoPoint) {
        info!("[{}] Marker at {point}", self.0);
    }

    fn remove_marker(&mut self) {
        info!("[{}] Marker removed", self.0);
    }

    fn release(&mut self) {
        info!("[{}] Map released", self.0);
    }
}

enum DaemonEvent {
    Slot(SlotKind),
    Notice(Notice),
    Dialog(Option<DialogRequest>),
}

struct EventSender(mpsc::UnboundedSender<DaemonEvent>);

impl StateUpdateSender for EventSender {
    fn send_update(&self, slot: SlotKind) {
        self.0.send(DaemonEvent::Slot(slot)).ok();
    }

    fn send_notice(&self, notice: Notice) {
        self.0.send(DaemonEvent::Notice(notice)).ok();
    }
}

type Adapter = GeocodingAdapter<Geocoder, Device>;
type Selector = AddressSelector<Geocoder, Device, EventSender>;
type Widget = MapWidget<LoggingSurface>;

struct DaemonState {
    selector: Arc<Selector>,
    adapter: Arc<Adapter>,
    dialogs: Arc<ConfirmDialogs>,
    widgets: HashMap<SlotKind, Widget>,
    events: mpsc::UnboundedSender<DaemonEvent>,
}

impl DaemonState {
    /// Mount a fresh map for `slot`, replacing (and releasing) any existing one
    async fn mount_widget(&mut self, slot: SlotKind) {
        let mut widget = MapWidget::new(LoggingSurface(slot));
        widget.set_viewport(VIEWPORT);
        if let Err(why) = widget.load(&*self.adapter).await {
            warn!("The {slot} map failed to load: {why}");
            self.events
                .send(DaemonEvent::Notice(Notice::MapUnavailable(why.to_string())))
                .ok();
        }
        widget.sync(self.selector.widget_inputs(slot).await);
        self.widgets.insert(slot, widget);
    }

    async fn sync_widget(&mut self, slot: SlotKind) {
        let inputs = self.selector.widget_inputs(slot).await;
        if let Some(widget) = self.widgets.get_mut(&slot) {
            widget.sync(inputs);
        }
    }

    async fn process_map_req(&mut self, slot: SlotKind, req: MapRequest) -> Result<TestingResponse> {
        let widget = self
            .widgets
            .get(&slot)
            .ok_or_else(|| anyhow!("No map mounted for {slot}"))?;

        let intent = match req {
            MapRequest::Click(point) => widget.click(point),
            MapRequest::ClickPixel { x, y } => widget.click_pixel(x, y),
            MapRequest::Drag(point) => widget.drag_marker(point),
            MapRequest::Locate => widget.request_current_location(),
            MapRequest::Clear => widget.request_clear(),
            MapRequest::Reload => widget.request_reload(),
        };

        let Some(intent) = intent else {
            return Ok(TestingResponse::Ignored);
        };

        match intent {
            MapIntent::ReloadRequested => self.mount_widget(slot).await,
            MapIntent::ClearRequested => {
                let dialogs = self.dialogs.clone();
                let selector = self.selector.clone();
                let seen = selector.slot(slot).await;
                tokio::spawn(async move {
                    let title = format!("Clear {slot}?");
                    if !dialogs
                        .confirm(title, "The pin on the map will be removed")
                        .await
                    {
                        info!("Kept the {slot} selection");
                    } else if !selector.clear_if_unchanged(slot, &seen).await {
                        info!("The {slot} selection changed while confirming, not clearing");
                    }
                });
            }
            intent => {
                let selector = self.selector.clone();
                tokio::spawn(async move {
                    selector.handle_intent(slot, intent).await;
                });
            }
        }

        Ok(TestingResponse::Complete)
    }

    async fn process_req(&mut self, req: TestingRequest) -> Result<TestingResponse> {
        let resp = match req {
            TestingRequest::SelectSaved { slot, id } => {
                self.selector.select_saved(slot, &id).await?;
                TestingResponse::Complete
            }
            TestingRequest::SelectDefault(slot) => {
                if self.selector.select_default(slot).await? {
                    TestingResponse::Complete
                } else {
                    TestingResponse::Ignored
                }
            }
            TestingRequest::SetMode { slot, mode } => {
                self.selector.set_mode(slot, mode).await;
                TestingResponse::Complete
            }
            TestingRequest::Map { slot, req } => self.process_map_req(slot, req).await?,
            TestingRequest::AnswerDialog { id, accepted } => {
                if !self.dialogs.answer(id, accepted).await {
                    bail!("Dialog {id} isn't open");
                }
                TestingResponse::Complete
            }
            TestingRequest::Swap => {
                self.selector.swap().await;
                TestingResponse::Complete
            }
            TestingRequest::Snapshot => self.selector.snapshot().await.into(),
            TestingRequest::Readout(slot) => {
                self.widgets.get(&slot).and_then(|w| w.readout()).into()
            }
            TestingRequest::Submit => match self.selector.booking().await {
                Ok(booking) => TestingResponse::Booking(booking),
                Err(why) => {
                    info!("Booking incomplete: {why}");
                    TestingResponse::Missing(self.selector.empty_slots().await)
                }
            },
        };
        Ok(resp)
    }

    async fn process_event(&mut self, event: DaemonEvent) -> TestingResponse {
        match event {
            DaemonEvent::Slot(slot) => {
                self.sync_widget(slot).await;
                TestingResponse::SlotUpdated {
                    slot,
                    value: self.selector.slot(slot).await,
                }
            }
            DaemonEvent::Notice(notice) => notice.into(),
            DaemonEvent::Dialog(dialog) => TestingResponse::Dialog(dialog),
        }
    }
}

use interprocess::local_socket::{ListenerOptions, tokio::prelude::*};

const CLI_MSG: &str = "Usage: pinpoint-test-daemon SOCKET_NAME [SAVED_ADDRESSES_JSON]";

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let raw_socket_name = args.get(1).cloned().context(CLI_MSG)?;
    let book = args.get(2).map(|path| JsonAddressBook(PathBuf::from(path)));
    let socket_name = get_socket_name(raw_socket_name)?;

    let config = ProviderConfig::from_env()?;
    let (geocoder, device) = if config.api_key().is_some() {
        let maps = GoogleMaps::new(config)?;
        let geolocator = maps.geolocator();
        (Geocoder::Google(maps), Device::Google(geolocator))
    } else {
        warn!("No maps API key, geocoding offline");
        (Geocoder::Offline, Device::Fixed(fixed_location()))
    };

    let scope = AppScope::enter(LoggingChannel).await?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let adapter = Arc::new(GeocodingAdapter::new(geocoder, device));
    let selector = Arc::new(
        Selector::new(adapter.clone(), Vec::new(), EventSender(events_tx.clone()))
            .with_cancel_token(scope.child_token()),
    );

    if let Some(book) = &book {
        selector.refresh_saved(book).await?;
    }
    selector.select_default(SlotKind::Pickup).await?;

    let mut dialog_rx = scope.dialogs().subscribe();
    tokio::spawn({
        let events = events_tx.clone();
        async move {
            while dialog_rx.changed().await.is_ok() {
                let current = dialog_rx.borrow_and_update().clone();
                if events.send(DaemonEvent::Dialog(current)).is_err() {
                    break;
                }
            }
        }
    });

    let mut state = DaemonState {
        selector: selector.clone(),
        adapter,
        dialogs: scope.dialogs(),
        widgets: HashMap::new(),
        events: events_tx,
    };

    for slot in SlotKind::ALL {
        state.mount_widget(slot).await;
    }

    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;

    info!("Testing daemon ready");

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => {
                res
            },
            Some(event) = events_rx.recv() => {
                // Nobody is listening, keep the maps in sync anyway
                state.process_event(event).await;
                continue 'server;
            }
            Ok(_) = tokio::signal::ctrl_c() => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => {
                let mut lines = BufReader::new(&stream).lines();
                let mut send = &stream;

                loop {
                    let resp = tokio::select! {
                        Ok(_) = tokio::signal::ctrl_c() => {
                            break 'server;
                        }
                        res = lines.next_line() => {
                            match res {
                                Ok(Some(line)) => match serde_json::from_str::<TestingRequest>(&line) {
                                    Ok(req) => state
                                        .process_req(req)
                                        .await
                                        .unwrap_or_else(TestingResponse::from),
                                    Err(why) => TestingResponse::Error(format!("Bad request: {why}")),
                                },
                                Ok(None) => {
                                    break;
                                }
                                Err(why) => {
                                    error!("Read error: {why:?}");
                                    break;
                                }
                            }
                        }
                        Some(event) = events_rx.recv() => {
                            state.process_event(event).await
                        }
                    };

                    let mut encoded =
                        serde_json::to_vec(&resp).context("Failed to encode response")?;
                    encoded.push(b'\n');
                    if let Err(why) = send.write_all(&encoded).await {
                        error!("Failed to send response: {why:?}");
                        break;
                    }
                }
            }
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    selector.shutdown();
    drop(state);
    scope.exit().await;

    Ok(())
}
