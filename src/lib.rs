//! Read sensor telemetry from an NTAG I2C plus 2k tag over NFC
//!
//! Written for the NTAG I2C plus explorer kit, where a microcontroller on the tag's I2C side
//! exchanges data with the phone or reader through the tag's 64 byte SRAM mirror.
//!
//! The reader talks to the tag with NFC-A block commands. On top of that the SRAM mirror is used as a
//! mailbox: the session writes a command into it (enable the temperature sensor, LED mode), waits for the
//! board to sample its sensors, and reads the mirror back.
//!
//! Currently the following data can be accessed:
//!
//! - Supply voltage (V)
//! - Temperature (°C)
//! - Button state (3 buttons)
//!
//! The NFC link itself is supplied by the caller as a [`Transceiver`]. [`sim::SimulatedTag`] stands in
//! for real hardware, and [`framing::CrcFramed`] adapts readers that exchange raw frames.
//!
//! # Example
//!
//! ```rust
//! # use ntagread::{Session, SessionConfig, TagIdentity, TagPresence};
//! # use ntagread::sim::SimulatedTag;
//! #
//! # #[tokio::main]
//! # pub async fn main(){
//!     let identity = TagIdentity::new(vec![0x04, 0xa1, 0xb2, 0xc3, 0xd4, 0xe5, 0xf6]);
//!     let presence = TagPresence::new(identity, SimulatedTag::new());
//!     let (mut session, _handle) = Session::new(presence, &SessionConfig::default());
//!     session.establish().await.unwrap();
//!     for _ in 0..3 {
//!         let telemetry = session.next_telemetry().await.unwrap();
//!         println!("{telemetry}");
//!     }
//!     session.close().await;
//! # }
//! ```

mod config;
mod error;
pub mod framing;
mod link;
mod message;
pub mod presence;
mod sector;
mod session;
pub mod sim;
mod tag_client;
mod telemetry;
mod transceiver;

pub use config::SessionConfig;
pub use error::{LinkError, SessionError};
pub use message::sram_message::{SramBuffer, SRAM_SIZE};
pub use message::status_message::StatusRegister;
pub use message::version_message::VersionInfo;
pub use presence::TagEvent;
pub use sector::Sector;
pub use session::{Session, SessionHandle, SessionState};
pub use telemetry::{decode, Buttons, TelemetryRecord};
pub use transceiver::{TagIdentity, TagPresence, Transceiver};
