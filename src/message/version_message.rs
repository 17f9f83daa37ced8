use std::fmt;

/// GET_VERSION
pub(crate) const REQUEST: [u8; 1] = [0x60];

/// The version reply of an NTAG I2C plus 2k
pub(crate) const NTAG_I2C_PLUS_2K: [u8; 8] = [0x00, 0x04, 0x04, 0x05, 0x02, 0x02, 0x15, 0x03];

/// The reply to GET_VERSION, identifying chip model and revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo(Vec<u8>);

impl VersionInfo {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Only an exact match of the whole reply is accepted
    pub fn is_supported(&self) -> bool {
        self.0 == NTAG_I2C_PLUS_2K
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn vendor_id(&self) -> Option<u8> {
        self.0.get(1).copied()
    }

    pub fn product_type(&self) -> Option<u8> {
        self.0.get(2).copied()
    }

    pub fn product_subtype(&self) -> Option<u8> {
        self.0.get(3).copied()
    }

    pub fn major_version(&self) -> Option<u8> {
        self.0.get(4).copied()
    }

    pub fn minor_version(&self) -> Option<u8> {
        self.0.get(5).copied()
    }

    /// Encoded user memory size; 0x15 means between 2 and 4 kB.
    pub fn storage_size(&self) -> Option<u8> {
        self.0.get(6).copied()
    }

    pub fn protocol_type(&self) -> Option<u8> {
        self.0.get(7).copied()
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

#[test]
fn test_supported_version() {
    let version = VersionInfo::new(hex::decode("0004040502021503").unwrap());
    assert!(version.is_supported());
    assert_eq!(version.vendor_id(), Some(0x04));
    assert_eq!(version.storage_size(), Some(0x15));
}

#[test]
fn test_other_chip_rejected() {
    // NTAG I2C plus 1k
    let version = VersionInfo::new(hex::decode("0004040502021303").unwrap());
    assert!(!version.is_supported());
    // Truncated reply
    let version = VersionInfo::new(hex::decode("00040405").unwrap());
    assert!(!version.is_supported());
    assert_eq!(version.protocol_type(), None);
}
