//! An in-process NTAG I2C plus 2k with a sensor board attached.
//!
//! Good enough to drive a whole session without hardware: it answers
//! GET_VERSION, sector selects, status reads and SRAM mirror transfers, and
//! fills the mirror with configurable sensor samples once the temperature
//! sensor has been enabled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::sleep;

use crate::error::LinkError;
use crate::message::sram_message::{
    self, SramBuffer, BUTTONS, ENABLE_TEMPERATURE_SENSOR, SENSOR_ENABLE, SRAM_SIZE, TEMPERATURE_HIGH,
    TEMPERATURE_LOW, VOLTAGE_HIGH, VOLTAGE_LOW,
};
use crate::message::status_message;
use crate::message::version_message::NTAG_I2C_PLUS_2K;
use crate::transceiver::Transceiver;

const ACK: u8 = 0x0A;
const NAK: u8 = 0x00;
const BLOCK_SIZE: usize = 4;
const READ_SIZE: usize = 16;

/// Cloning shares the tag, so a test can keep a handle after moving one into a session.
#[derive(Clone)]
pub struct SimulatedTag {
    state: Arc<Mutex<TagState>>,
}

struct TagState {
    version: Vec<u8>,
    polls_until_ready: u32,
    status_polls: u32,
    sector: u8,
    awaiting_sector: bool,
    sram: SramBuffer,
    sensor_enabled: bool,
    raw_voltage: u16,
    raw_temperature: u16,
    buttons: u8,
    fast_read_len: usize,
    latency: Duration,
    timeout: Duration,
    connected: bool,
    present: bool,
    exchanges: usize,
}

enum Reply {
    Data(Vec<u8>),
    Silent,
}

impl SimulatedTag {
    /// A ready tag reporting 3.49 V, 25 °C and no buttons pressed
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TagState {
                version: NTAG_I2C_PLUS_2K.to_vec(),
                polls_until_ready: 1,
                status_polls: 0,
                sector: 0,
                awaiting_sector: false,
                sram: [0u8; SRAM_SIZE],
                sensor_enabled: false,
                raw_voltage: 600,
                raw_temperature: 25 << 8,
                buttons: 0,
                fast_read_len: SRAM_SIZE,
                latency: Duration::from_millis(2),
                timeout: Duration::from_millis(20),
                connected: false,
                present: true,
                exchanges: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TagState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_version(self, version: impl Into<Vec<u8>>) -> Self {
        self.lock().version = version.into();
        self
    }

    /// The status block reports ready from the `polls`th read on
    pub fn ready_after(self, polls: u32) -> Self {
        self.lock().polls_until_ready = polls;
        self
    }

    /// Raw ADC sample; the board reports `1023 * 2.048 / sample` volts
    pub fn with_voltage_sample(self, raw: u16) -> Self {
        self.lock().raw_voltage = raw;
        self
    }

    /// Raw temperature sample in 1/256 °C
    pub fn with_temperature_sample(self, raw: u16) -> Self {
        self.lock().raw_temperature = raw;
        self
    }

    pub fn with_buttons(self, buttons: u8) -> Self {
        self.press(buttons);
        self
    }

    /// Truncate every fast read reply to `len` bytes
    pub fn with_fast_read_len(self, len: usize) -> Self {
        self.lock().fast_read_len = len;
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    pub fn press(&self, buttons: u8) {
        self.lock().buttons = buttons;
    }

    /// Take the tag out of the field. Every later exchange fails.
    pub fn remove(&self) {
        self.lock().present = false;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Number of exchanges answered so far
    pub fn exchanges(&self) -> usize {
        self.lock().exchanges
    }
}

impl Default for SimulatedTag {
    fn default() -> Self {
        Self::new()
    }
}

impl TagState {
    fn check_link(&self) -> Result<(), LinkError> {
        if !self.present {
            return Err(LinkError::Lost("tag left the field".to_string()));
        }
        if !self.connected {
            return Err(LinkError::Lost("not connected".to_string()));
        }
        Ok(())
    }

    fn respond(&mut self, command: &[u8]) -> Reply {
        self.exchanges += 1;

        if self.awaiting_sector {
            self.awaiting_sector = false;
            if let [sector, _, _, _] = command {
                self.sector = *sector;
                return Reply::Silent;
            }
        }

        match command {
            [0x60] => Reply::Data(self.version.clone()),
            [0xC2, 0xFF] => {
                self.awaiting_sector = true;
                Reply::Data(vec![ACK])
            }
            [0x30, block] => Reply::Data(self.read(*block)),
            [0x3A, sram_message::FIRST_BLOCK, sram_message::LAST_BLOCK] if self.sector == 0 => {
                let mut mirror = self.mirror().to_vec();
                mirror.truncate(self.fast_read_len);
                Reply::Data(mirror)
            }
            [0xA6, sram_message::FIRST_BLOCK, sram_message::LAST_BLOCK, data @ ..]
                if self.sector == 0 && data.len() == SRAM_SIZE =>
            {
                self.sram.copy_from_slice(data);
                self.sensor_enabled = data[SENSOR_ENABLE] == ENABLE_TEMPERATURE_SENSOR;
                Reply::Data(vec![ACK])
            }
            _ => Reply::Data(vec![NAK]),
        }
    }

    fn read(&mut self, block: u8) -> Vec<u8> {
        if self.sector != 0 {
            return vec![0u8; READ_SIZE];
        }
        if block == status_message::BLOCK {
            self.status_polls = self.status_polls.saturating_add(1);
            let mut data = vec![0u8; READ_SIZE];
            // I2C side is up from the start; mirror and pass-through come later
            data[0] = 0x01;
            if self.status_polls >= self.polls_until_ready {
                data[0] |= 0x40;
                data[6] = 0x20;
            }
            return data;
        }
        if block >= sram_message::FIRST_BLOCK {
            let mirror = self.mirror();
            let start = usize::from(block - sram_message::FIRST_BLOCK) * BLOCK_SIZE;
            return mirror[start..].iter().chain(mirror.iter()).take(READ_SIZE).copied().collect();
        }
        vec![0u8; READ_SIZE]
    }

    fn mirror(&self) -> SramBuffer {
        let mut mirror = self.sram;
        if self.sensor_enabled {
            mirror[VOLTAGE_LOW] = self.raw_voltage.to_le_bytes()[0];
            mirror[VOLTAGE_HIGH] = self.raw_voltage.to_le_bytes()[1];
            mirror[TEMPERATURE_HIGH] = self.raw_temperature.to_be_bytes()[0];
            mirror[TEMPERATURE_LOW] = self.raw_temperature.to_be_bytes()[1];
            mirror[BUTTONS] = self.buttons;
        }
        mirror
    }
}

impl Transceiver for SimulatedTag {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
        Box::pin(async move {
            let mut state = self.lock();
            if !state.present {
                return Err(LinkError::Lost("tag left the field".to_string()));
            }
            state.connected = true;
            state.sector = 0;
            state.awaiting_sector = false;
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
        Box::pin(async move {
            self.lock().connected = false;
            Ok(())
        })
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.lock().timeout = timeout;
    }

    fn transceive<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, LinkError>> {
        Box::pin(async move {
            let (latency, timeout) = {
                let state = self.lock();
                state.check_link()?;
                (state.latency, state.timeout)
            };

            if latency >= timeout {
                sleep(timeout).await;
                return Err(LinkError::Timeout);
            }
            sleep(latency).await;

            let reply = {
                let mut state = self.lock();
                state.check_link()?;
                state.respond(command)
            };
            match reply {
                Reply::Data(data) => Ok(data),
                Reply::Silent => {
                    sleep(timeout - latency).await;
                    Err(LinkError::Timeout)
                }
            }
        })
    }
}
