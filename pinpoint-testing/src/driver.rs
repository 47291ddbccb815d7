use clap::{Parser, Subcommand, ValueEnum};
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use pinpoint_logic::{GeoPoint, SlotKind, SlotMode};
use pinpoint_test_shared::{
    MapRequest, TestingRequest, TestingResponse, get_socket_name, prelude::*,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket the test daemon is listening on
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Slot {
    Pickup,
    Dropoff,
}

impl From<Slot> for SlotKind {
    fn from(value: Slot) -> Self {
        match value {
            Slot::Pickup => SlotKind::Pickup,
            Slot::Dropoff => SlotKind::Dropoff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Saved,
    Map,
}

impl From<Mode> for SlotMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Saved => SlotMode::Saved,
            Mode::Map => SlotMode::Map,
        }
    }
}

#[derive(Subcommand)]
enum MapCommand {
    /// Click the map at a coordinate
    #[command(allow_negative_numbers = true)]
    Click { lat: f64, lng: f64 },
    /// Click the map at a pixel of the rendered viewport
    ClickPixel { x: f64, y: f64 },
    /// Drag the marker to a coordinate
    #[command(allow_negative_numbers = true)]
    Drag { lat: f64, lng: f64 },
    /// Use the device's current location
    Locate,
    /// Remove the pin, the daemon asks for confirmation first
    Clear,
    /// Remount a map that failed to load
    Reload,
}

impl TryFrom<MapCommand> for MapRequest {
    type Error = anyhow::Error;

    fn try_from(value: MapCommand) -> Result<Self> {
        let req = match value {
            MapCommand::Click { lat, lng } => {
                MapRequest::Click(GeoPoint::new(lat, lng).context("Invalid click")?)
            }
            MapCommand::ClickPixel { x, y } => MapRequest::ClickPixel { x, y },
            MapCommand::Drag { lat, lng } => {
                MapRequest::Drag(GeoPoint::new(lat, lng).context("Invalid drag target")?)
            }
            MapCommand::Locate => MapRequest::Locate,
            MapCommand::Clear => MapRequest::Clear,
            MapCommand::Reload => MapRequest::Reload,
        };
        Ok(req)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pick one of the user's saved addresses
    SelectSaved {
        #[arg(value_enum)]
        slot: Slot,
        /// Id of the saved address
        id: String,
    },
    /// Pick the user's default saved address
    SelectDefault {
        #[arg(value_enum)]
        slot: Slot,
    },
    /// Switch between saved addresses and the map
    Mode {
        #[arg(value_enum)]
        slot: Slot,
        #[arg(value_enum)]
        mode: Mode,
    },
    /// Interact with a slot's map
    Map {
        #[arg(value_enum)]
        slot: Slot,
        #[command(subcommand)]
        command: MapCommand,
    },
    /// Answer the open confirm dialog
    Answer {
        id: u64,
        /// Decline instead of accepting
        #[arg(long)]
        decline: bool,
    },
    /// Swap pickup and dropoff
    Swap,
    /// Print both slots
    Snapshot,
    /// Print the text under a slot's map
    Readout {
        #[arg(value_enum)]
        slot: Slot,
    },
    /// Try to submit the booking
    Submit,
    /// Print events from the daemon until it disconnects
    Watch,
}

impl Commands {
    fn into_request(self) -> Result<Option<TestingRequest>> {
        let req = match self {
            Self::SelectSaved { slot, id } => TestingRequest::SelectSaved {
                slot: slot.into(),
                id,
            },
            Self::SelectDefault { slot } => TestingRequest::SelectDefault(slot.into()),
            Self::Mode { slot, mode } => TestingRequest::SetMode {
                slot: slot.into(),
                mode: mode.into(),
            },
            Self::Map { slot, command } => TestingRequest::Map {
                slot: slot.into(),
                req: command.try_into()?,
            },
            Self::Answer { id, decline } => TestingRequest::AnswerDialog {
                id,
                accepted: !decline,
            },
            Self::Swap => TestingRequest::Swap,
            Self::Snapshot => TestingRequest::Snapshot,
            Self::Readout { slot } => TestingRequest::Readout(slot.into()),
            Self::Submit => TestingRequest::Submit,
            Self::Watch => return Ok(None),
        };
        Ok(Some(req))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;
    let req = cli.command.into_request()?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;
    let mut lines = BufReader::new(&stream).lines();
    let mut send = &stream;

    let watching = req.is_none();

    if let Some(req) = req {
        let mut encoded = serde_json::to_vec(&req).context("Failed to encode request")?;
        encoded.push(b'\n');
        send.write_all(&encoded)
            .await
            .context("Failed to send request")?;
    }

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from daemon")?
    {
        let resp = serde_json::from_str::<TestingResponse>(&line)
            .context("Failed to parse response")?;
        println!("{line}");

        if !watching && resp.is_reply() {
            if let TestingResponse::Error(why) = resp {
                bail!(why);
            }
            break;
        }
    }

    Ok(())
}
