use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use pinpoint_logic::{
    BookingLocations, DialogRequest, GeoPoint, Notice, Readout, SelectionSlot, SelectorSnapshot,
    SlotKind, SlotMode,
};
use serde::{Deserialize, Serialize};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Input a user could give to one slot's map widget
pub enum MapRequest {
    Click(GeoPoint),
    ClickPixel { x: f64, y: f64 },
    Drag(GeoPoint),
    Locate,
    Clear,
    Reload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingRequest {
    SelectSaved { slot: SlotKind, id: String },
    SelectDefault(SlotKind),
    SetMode { slot: SlotKind, mode: SlotMode },
    Map { slot: SlotKind, req: MapRequest },
    AnswerDialog { id: u64, accepted: bool },
    Swap,
    Snapshot,
    Readout(SlotKind),
    Submit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingResponse {
    Complete,
    /// The widget wasn't in a state to take this input
    Ignored,
    Snapshot(SelectorSnapshot),
    Readout(Option<Readout>),
    Booking(BookingLocations),
    Missing(Vec<SlotKind>),
    SlotUpdated {
        slot: SlotKind,
        value: SelectionSlot,
    },
    Notice(String),
    Dialog(Option<DialogRequest>),
    Error(String),
}

impl TestingResponse {
    /// Whether this answers a request, as opposed to an event pushed by the daemon
    pub fn is_reply(&self) -> bool {
        !matches!(
            self,
            Self::SlotUpdated { .. } | Self::Notice(_) | Self::Dialog(_)
        )
    }
}

impl From<anyhow::Error> for TestingResponse {
    fn from(value: anyhow::Error) -> Self {
        TestingResponse::Error(value.to_string())
    }
}

impl From<Notice> for TestingResponse {
    fn from(val: Notice) -> Self {
        TestingResponse::Notice(val.message())
    }
}

impl From<SelectorSnapshot> for TestingResponse {
    fn from(val: SelectorSnapshot) -> Self {
        TestingResponse::Snapshot(val)
    }
}

impl From<Option<Readout>> for TestingResponse {
    fn from(val: Option<Readout>) -> Self {
        TestingResponse::Readout(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_not_replies() {
        assert!(TestingResponse::Complete.is_reply());
        assert!(TestingResponse::Missing(vec![SlotKind::Dropoff]).is_reply());
        assert!(!TestingResponse::Notice("Location permission denied".into()).is_reply());
        assert!(
            !TestingResponse::SlotUpdated {
                slot: SlotKind::Pickup,
                value: SelectionSlot::default(),
            }
            .is_reply()
        );
    }

    #[test]
    fn test_request_line_format() {
        let req = TestingRequest::SetMode {
            slot: SlotKind::Dropoff,
            mode: SlotMode::Map,
        };
        let line = serde_json::to_string(&req).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(
            line,
            r#"{"SetMode":{"slot":"dropoff","mode":"map"}}"#
        );
    }
}
