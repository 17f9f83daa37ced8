//! The 64 byte SRAM mirror used as a mailbox between the NFC side and the
//! microcontroller on the I2C side.
//!
//! Offsets count back from the end of the buffer:
//!
//! Offset | Direction | Meaning
//! -9     | command   | Sensor enable (`'E'` enables the temperature sensor)
//! -8     | reply     | ADC voltage sample, low byte
//! -7     | reply     | ADC voltage sample, high byte
//! -6     | reply     | Temperature sample, high byte
//! -5     | reply     | Temperature sample, low byte
//! -4     | command   | LED mode (`'L'` runs the LED demo)
//! -3     | command   | LED state (`'0'` is off)
//! -2     | reply     | Button bitmask, low 3 bits

pub const SRAM_SIZE: usize = 64;

/// First and last block of the SRAM mirror
pub(crate) const FIRST_BLOCK: u8 = 0xF0;
pub(crate) const LAST_BLOCK: u8 = 0xFF;

pub(crate) const SENSOR_ENABLE: usize = SRAM_SIZE - 9;
pub(crate) const VOLTAGE_LOW: usize = SRAM_SIZE - 8;
pub(crate) const VOLTAGE_HIGH: usize = SRAM_SIZE - 7;
pub(crate) const TEMPERATURE_HIGH: usize = SRAM_SIZE - 6;
pub(crate) const TEMPERATURE_LOW: usize = SRAM_SIZE - 5;
pub(crate) const LED_MODE: usize = SRAM_SIZE - 4;
pub(crate) const LED_STATE: usize = SRAM_SIZE - 3;
pub(crate) const BUTTONS: usize = SRAM_SIZE - 2;

pub(crate) const ENABLE_TEMPERATURE_SENSOR: u8 = b'E';
pub(crate) const LED_DEMO_MODE: u8 = b'L';
pub(crate) const LED_OFF: u8 = b'0';

/// A full mirror image as read back from the tag
pub type SramBuffer = [u8; SRAM_SIZE];

/// The command written to the mirror at the start of every cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandBuffer(SramBuffer);

impl CommandBuffer {
    /// Enable temperature sensing, LED demo mode, LED off
    pub fn sensor_poll() -> Self {
        let mut data = [0u8; SRAM_SIZE];
        data[SENSOR_ENABLE] = ENABLE_TEMPERATURE_SENSOR;
        data[LED_MODE] = LED_DEMO_MODE;
        data[LED_STATE] = LED_OFF;
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Take the mirror image from a fast read reply. Anything short of a full
/// mirror is reported back as the number of bytes actually received.
pub(crate) fn mirror_from_reply(reply: &[u8]) -> Result<SramBuffer, usize> {
    reply
        .get(..SRAM_SIZE)
        .and_then(|data| data.try_into().ok())
        .ok_or(reply.len())
}

#[test]
fn test_sensor_poll_command() {
    let command = CommandBuffer::sensor_poll();
    let bytes = command.as_bytes();
    assert_eq!(bytes.len(), SRAM_SIZE);
    assert_eq!(bytes[55], b'E');
    assert_eq!(bytes[60], b'L');
    assert_eq!(bytes[61], b'0');
    assert_eq!(bytes.iter().filter(|&&b| b != 0).count(), 3);
}

#[test]
fn test_mirror_from_reply() {
    assert_eq!(mirror_from_reply(&[0u8; 63]), Err(63));
    assert_eq!(mirror_from_reply(&[]), Err(0));
    assert_eq!(mirror_from_reply(&[7u8; 64]), Ok([7u8; 64]));
    // Extra trailing bytes are ignored
    assert_eq!(mirror_from_reply(&[1u8; 70]), Ok([1u8; 64]));
}
