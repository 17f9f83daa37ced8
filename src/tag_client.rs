use std::time::Duration;

use tokio::sync::watch;

use crate::config::SessionConfig;
use crate::error::LinkError;
use crate::link::Link;
use crate::message::version_message::{self, VersionInfo};
use crate::sector::{Sector, SectorTracker};
use crate::transceiver::Transceiver;

/// Block level access to one connected tag.
pub(crate) struct TagClient<T> {
    link: Link<T>,
    sector: SectorTracker,
}

impl<T: Transceiver> TagClient<T> {
    const READ: u8 = 0x30;
    const FAST_READ: u8 = 0x3A;
    const FAST_WRITE: u8 = 0xA6;

    pub fn new(transceiver: T, config: &SessionConfig, closed: watch::Receiver<bool>) -> Self {
        Self {
            link: Link::new(transceiver, config, closed),
            sector: SectorTracker::new(),
        }
    }

    /// Open the link. The tag starts out at its power-on sector, so no select is sent.
    pub async fn connect(&mut self) -> Result<(), LinkError> {
        self.sector.reset();
        self.link.connect().await
    }

    pub async fn close(&mut self) -> Result<(), LinkError> {
        self.sector.reset();
        self.link.close().await
    }

    pub async fn get_version(&mut self) -> Result<VersionInfo, LinkError> {
        let rsp = self.link.exchange(&version_message::REQUEST).await?;
        Ok(VersionInfo::new(rsp))
    }

    pub async fn select_sector(&mut self, sector: Sector) -> Result<(), LinkError> {
        self.sector.select(&mut self.link, sector).await
    }

    /// Read the 16 bytes starting at `block` in the current sector.
    pub async fn read_block(&mut self, block: u8) -> Result<Vec<u8>, LinkError> {
        self.link.exchange(&[Self::READ, block]).await
    }

    /// Read blocks `start..=end` of the current sector in one exchange.
    pub async fn fast_read(&mut self, start: u8, end: u8) -> Result<Vec<u8>, LinkError> {
        self.link.bulk_exchange(&[Self::FAST_READ, start, end]).await
    }

    /// Write `data` to blocks `start..=end` of the current sector in one exchange.
    pub async fn fast_write(&mut self, data: &[u8], start: u8, end: u8) -> Result<(), LinkError> {
        let mut rq = Vec::with_capacity(3 + data.len());
        rq.extend_from_slice(&[Self::FAST_WRITE, start, end]);
        rq.extend_from_slice(data);
        self.link.bulk_exchange(&rq).await?;
        Ok(())
    }

    pub async fn settle(&mut self, delay: Duration) -> Result<(), LinkError> {
        self.link.settle(delay).await
    }

    #[cfg(test)]
    pub fn current_sector(&self) -> Sector {
        self.sector.current()
    }
}
