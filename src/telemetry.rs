use std::fmt;

use crate::message::sram_message::{
    SramBuffer, BUTTONS, TEMPERATURE_HIGH, TEMPERATURE_LOW, VOLTAGE_HIGH, VOLTAGE_LOW,
};

/// Full scale of the 10 bit ADC times its 2.048 V reference
const ADC_SCALE: f64 = 1023.0 * 2.048;
const MAX_VOLTAGE: f64 = 5.0;

/// The state of the sensor board, decoded from one SRAM mirror read
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Supply voltage in V, within 0.0..=5.0
    pub voltage_volts: f64,
    /// Temperature in °C
    pub temperature_celsius: f64,
    pub buttons: Buttons,
    /// The mirror image the record was decoded from
    pub raw: SramBuffer,
}

/// The three push buttons on the sensor board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons(u8);

impl Buttons {
    pub const MASK: u8 = 0x07;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn red(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn blue(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn green(&self) -> bool {
        self.0 & 0x04 != 0
    }
}

/// Decode a mirror image. Total over every input.
pub fn decode(buffer: &SramBuffer) -> TelemetryRecord {
    TelemetryRecord {
        voltage_volts: voltage(buffer),
        temperature_celsius: temperature(buffer),
        buttons: Buttons::from_bits(buffer[BUTTONS]),
        raw: *buffer,
    }
}

fn voltage(buffer: &SramBuffer) -> f64 {
    let raw = u16::from_le_bytes([buffer[VOLTAGE_LOW], buffer[VOLTAGE_HIGH]]);
    if raw == 0 {
        return 0.0;
    }
    (ADC_SCALE / f64::from(raw)).clamp(0.0, MAX_VOLTAGE)
}

fn temperature(buffer: &SramBuffer) -> f64 {
    let raw = f64::from(u16::from_be_bytes([buffer[TEMPERATURE_HIGH], buffer[TEMPERATURE_LOW]])) / 256.0;
    // Negative readings wrap around above 127
    if raw > 127.0 {
        128.0 - raw
    } else {
        raw
    }
}

fn on_off(pressed: bool) -> &'static str {
    if pressed {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:6.2} V  {:6.1} ℃  R:{} B:{} G:{}",
            self.voltage_volts,
            self.temperature_celsius,
            on_off(self.buttons.red()),
            on_off(self.buttons.blue()),
            on_off(self.buttons.green()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(raw_voltage: u16, temperature: [u8; 2], buttons: u8) -> SramBuffer {
        let mut data = [0u8; 64];
        data[56..58].copy_from_slice(&raw_voltage.to_le_bytes());
        data[58..60].copy_from_slice(&temperature);
        data[62] = buttons;
        data
    }

    #[test]
    fn test_zero_voltage_sample() {
        assert_eq!(decode(&buffer(0, [0, 0], 0)).voltage_volts, 0.0);
    }

    #[test]
    fn test_voltage_clamped() {
        assert_eq!(decode(&buffer(1, [0, 0], 0)).voltage_volts, 5.0);
        assert_eq!(decode(&buffer(419, [0, 0], 0)).voltage_volts, 5.0);
    }

    #[test]
    fn test_voltage_never_negative() {
        for raw in [1u16, 2, 600, 0x7fff, 0x8000, 0xffff] {
            let volts = decode(&buffer(raw, [0, 0], 0)).voltage_volts;
            assert!((0.0..=5.0).contains(&volts), "{raw} -> {volts}");
        }
    }

    #[test]
    fn test_voltage_sample() {
        let volts = decode(&buffer(600, [0, 0], 0)).voltage_volts;
        assert!((volts - 3.4918).abs() < 1e-3, "{volts}");
    }

    #[test]
    fn test_temperature() {
        assert_eq!(decode(&buffer(0, [25, 0], 0)).temperature_celsius, 25.0);
        assert_eq!(decode(&buffer(0, [130, 0], 0)).temperature_celsius, -2.0);
        assert_eq!(decode(&buffer(0, [127, 0], 0)).temperature_celsius, 127.0);
        assert_eq!(decode(&buffer(0, [25, 0x80], 0)).temperature_celsius, 25.5);
    }

    #[test]
    fn test_button_mask() {
        let record = decode(&buffer(0, [0, 0], 0b1111_1101));
        assert_eq!(record.buttons.bits(), 0b101);
        assert!(record.buttons.red());
        assert!(!record.buttons.blue());
        assert!(record.buttons.green());
    }

    #[test]
    fn test_decode_is_pure() {
        let data = buffer(600, [25, 0], 0x02);
        let copy = data;
        assert_eq!(decode(&data), decode(&data));
        assert_eq!(data, copy);
        assert_eq!(decode(&data).raw, data);
    }

    #[test]
    fn test_display() {
        let record = decode(&buffer(600, [25, 0], 0x02));
        assert_eq!(record.to_string(), "  3.49 V    25.0 ℃  R:OFF B:ON G:OFF");
    }
}
