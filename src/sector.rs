use tracing::{debug, warn};

use crate::error::LinkError;
use crate::link::Link;
use crate::transceiver::Transceiver;

/// An 8 bit memory bank index on the tag
pub type Sector = u8;

/// Tracks which sector block operations currently address.
///
/// The tag's acknowledgement of a sector select is unreliable, so only the
/// select command having gone out counts.
#[derive(Debug)]
pub(crate) struct SectorTracker {
    current: Sector,
}

impl SectorTracker {
    /// The sector a tag addresses when it powers up in the field
    pub const POWER_ON_SECTOR: Sector = 0;

    // SECTOR_SELECT packet 1; 0xFF is the fixed key byte
    const SELECT: [u8; 2] = [0xC2, 0xFF];
    // SECTOR_SELECT packet 2; the tag acknowledges passively by staying silent
    const PASSIVE_ACK_PROBE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

    pub fn new() -> Self {
        Self {
            current: Self::POWER_ON_SECTOR,
        }
    }

    pub fn current(&self) -> Sector {
        self.current
    }

    /// Forget any earlier select; a freshly connected tag is back at sector 0.
    pub fn reset(&mut self) {
        self.current = Self::POWER_ON_SECTOR;
    }

    pub async fn select<T: Transceiver>(&mut self, link: &mut Link<T>, target: Sector) -> Result<(), LinkError> {
        if self.current == target {
            return Ok(());
        }

        debug!("Selecting sector {target} (was {})", self.current());
        link.exchange(&Self::SELECT).await?;

        match link.exchange(&Self::PASSIVE_ACK_PROBE).await {
            Ok(_) | Err(LinkError::Timeout) => {}
            Err(LinkError::Closed) => return Err(LinkError::Closed),
            Err(err) => warn!("Sector select acknowledgement failed: {err}"),
        }

        self.current = target;
        Ok(())
    }
}
