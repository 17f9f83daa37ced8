//! The per-tag protocol state machine.
//!
//! ```text
//! Idle -> Connected -> IdentityVerified -> Ready -> Streaming -> Closed
//!   \__________\_______________\____________\__________\_____-> Faulted
//! ```
//!
//! A session is built fresh for every tag presence and never reused.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{LinkError, SessionError};
use crate::message::sram_message::{self, CommandBuffer, SRAM_SIZE};
use crate::message::status_message::{self, StatusRegister};
use crate::message::version_message::VersionInfo;
use crate::sector::SectorTracker;
use crate::tag_client::TagClient;
use crate::telemetry::{self, TelemetryRecord};
use crate::transceiver::{TagIdentity, TagPresence, Transceiver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    IdentityVerified,
    Ready,
    Streaming,
    Closed,
    Faulted,
}

/// Closes a running session from outside, e.g. when the tag leaves the field.
///
/// Dropping every handle leaves the session running.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    close: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Fail the in-flight operation and every later one with [`LinkError::Closed`].
    pub fn close(&self) {
        self.close.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.close.borrow()
    }
}

/// A session with exactly one tag.
pub struct Session<T> {
    client: TagClient<T>,
    identity: TagIdentity,
    state: SessionState,
    version: Option<VersionInfo>,
    handshake_deadline: Duration,
    settle_delay: Duration,
}

impl<T: Transceiver> Session<T> {
    pub fn new(presence: TagPresence<T>, config: &SessionConfig) -> (Self, SessionHandle) {
        let (close, closed) = watch::channel(false);
        let session = Self {
            client: TagClient::new(presence.transceiver, config, closed),
            identity: presence.identity,
            state: SessionState::Idle,
            version: None,
            handshake_deadline: config.handshake_deadline(),
            settle_delay: config.settle_delay(),
        };
        (session, SessionHandle { close: Arc::new(close) })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &TagIdentity {
        &self.identity
    }

    /// The version reply, once the identity check passed
    pub fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    /// Connect, check the tag is a supported chip and wait until its SRAM
    /// mirror is ready. Ends in [`SessionState::Ready`].
    pub async fn establish(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                expected: "Idle",
                actual: self.state,
            });
        }
        let result = self.try_establish().await;
        self.fault_on_error(result).await
    }

    async fn try_establish(&mut self) -> Result<(), SessionError> {
        self.client.connect().await?;
        self.transition(SessionState::Connected);

        self.verify_identity().await?;
        self.transition(SessionState::IdentityVerified);

        let polls = self.await_ready().await?;
        info!("Tag {} ready after {polls} status polls", self.identity);
        self.transition(SessionState::Ready);
        Ok(())
    }

    async fn verify_identity(&mut self) -> Result<(), SessionError> {
        if !self.identity.is_nxp() {
            return Err(SessionError::UnsupportedDevice(format!(
                "tag {} is not an NXP tag",
                self.identity
            )));
        }

        let version = self.client.get_version().await?;
        if !version.is_supported() {
            return Err(SessionError::UnsupportedDevice(format!(
                "version {version} is not an NTAG I2C plus 2k"
            )));
        }

        debug!(
            "Tag version: vendor {:?}, type {:?}, subtype {:?}, v{:?}.{:?}, storage {:?}",
            version.vendor_id(),
            version.product_type(),
            version.product_subtype(),
            version.major_version(),
            version.minor_version(),
            version.storage_size(),
        );
        self.version = Some(version);
        Ok(())
    }

    /// Poll the status block until the mirror is enabled, the I2C side is
    /// active and pass-through data is ready. Returns the number of reads taken.
    ///
    /// Failed or short reads are retried straight away; the I2C side usually
    /// needs a few attempts to wake up.
    async fn await_ready(&mut self) -> Result<u32, SessionError> {
        let started = Instant::now();
        let mut polls = 0;
        loop {
            if started.elapsed() > self.handshake_deadline {
                return Err(SessionError::Timeout);
            }

            self.client.select_sector(SectorTracker::POWER_ON_SECTOR).await?;
            polls += 1;
            let data = match self.client.read_block(status_message::BLOCK).await {
                Ok(data) => data,
                Err(err @ (LinkError::Timeout | LinkError::Corrupted(_))) => {
                    debug!("Status read {polls} failed: {err}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match StatusRegister::new(&data) {
                Some(status) if status.is_ready() => return Ok(polls),
                Some(status) => debug!("Status read {polls}: not ready {status:?}"),
                None => debug!("Status read {polls}: short reply {}", hex::encode(&data)),
            }
        }
    }

    /// Run one write, settle, read, settle cycle and decode what came back.
    pub async fn next_telemetry(&mut self) -> Result<TelemetryRecord, SessionError> {
        match self.state {
            SessionState::Ready => self.transition(SessionState::Streaming),
            SessionState::Streaming => {}
            actual => {
                return Err(SessionError::InvalidState {
                    expected: "Ready or Streaming",
                    actual,
                })
            }
        }
        let result = self.exchange_mirror().await;
        self.fault_on_error(result).await
    }

    async fn exchange_mirror(&mut self) -> Result<TelemetryRecord, SessionError> {
        let command = CommandBuffer::sensor_poll();
        self.client.select_sector(SectorTracker::POWER_ON_SECTOR).await?;
        self.client
            .fast_write(command.as_bytes(), sram_message::FIRST_BLOCK, sram_message::LAST_BLOCK)
            .await?;

        // The tag samples its sensors on its own clock
        self.client.settle(self.settle_delay).await?;

        self.client.select_sector(SectorTracker::POWER_ON_SECTOR).await?;
        let rsp = self
            .client
            .fast_read(sram_message::FIRST_BLOCK, sram_message::LAST_BLOCK)
            .await?;
        let mirror = sram_message::mirror_from_reply(&rsp).map_err(|actual| SessionError::DataLoss {
            expected: SRAM_SIZE,
            actual,
        })?;

        self.client.settle(self.settle_delay).await?;

        let record = telemetry::decode(&mirror);
        debug!("Tag {}: {record}", self.identity);
        Ok(record)
    }

    /// Establish if needed, then stream telemetry into `sink` until something
    /// fails. Returns `Ok` only when the receiving side hangs up.
    pub async fn run(mut self, sink: mpsc::Sender<TelemetryRecord>) -> Result<(), SessionError> {
        if self.state == SessionState::Idle {
            self.establish().await?;
        }
        loop {
            let record = self.next_telemetry().await?;
            if sink.send(record).await.is_err() {
                info!("Telemetry receiver dropped, closing session with tag {}", self.identity);
                self.close().await;
                return Ok(());
            }
        }
    }

    /// Release the link. A faulted session has already released it.
    pub async fn close(&mut self) {
        if matches!(self.state, SessionState::Closed | SessionState::Faulted) {
            return;
        }
        if let Err(err) = self.client.close().await {
            warn!("Failed to close link to tag {}: {err}", self.identity);
        }
        self.transition(SessionState::Closed);
    }

    async fn fault_on_error<R>(&mut self, result: Result<R, SessionError>) -> Result<R, SessionError> {
        if let Err(err) = &result {
            warn!("Session with tag {} failed in state {:?}: {err}", self.identity, self.state);
        } else {
            return result;
        }
        if let Err(err) = self.client.close().await {
            warn!("Failed to close link to tag {}: {err}", self.identity);
        }
        self.transition(SessionState::Faulted);
        result
    }

    fn transition(&mut self, state: SessionState) {
        debug!("Tag {}: {:?} -> {:?}", self.identity, self.state, state);
        self.state = state;
    }
}
