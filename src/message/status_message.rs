/// Block holding the session registers, in sector 0
pub(crate) const BLOCK: u8 = 0xEC;

const NC_REG_OFFSET: usize = 0;
const NS_REG_OFFSET: usize = 6;

const NC_MIRROR_ENABLED: u8 = 0x40;
const NC_I2C_SIDE_ACTIVE: u8 = 0x01;
const NS_PASSTHROUGH_READY: u8 = 0x20;

/// The status bits the handshake waits on, read from [`BLOCK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    nc_reg: u8,
    ns_reg: u8,
}

impl StatusRegister {
    /// `None` when the reply is too short to hold both registers.
    pub fn new(data: &[u8]) -> Option<Self> {
        Some(Self {
            nc_reg: *data.get(NC_REG_OFFSET)?,
            ns_reg: *data.get(NS_REG_OFFSET)?,
        })
    }

    pub fn mirror_enabled(&self) -> bool {
        self.nc_reg & NC_MIRROR_ENABLED != 0
    }

    pub fn i2c_side_active(&self) -> bool {
        self.nc_reg & NC_I2C_SIDE_ACTIVE != 0
    }

    pub fn passthrough_ready(&self) -> bool {
        self.ns_reg & NS_PASSTHROUGH_READY != 0
    }

    pub fn is_ready(&self) -> bool {
        self.mirror_enabled() && self.i2c_side_active() && self.passthrough_ready()
    }
}

#[test]
fn test_status_ready() {
    let status = StatusRegister::new(&hex::decode("41000000000020000000000000000000").unwrap()).unwrap();
    assert!(status.is_ready());
}

#[test]
fn test_status_each_bit_required() {
    for data in ["40000000000020", "01000000000020", "41000000000000"] {
        let status = StatusRegister::new(&hex::decode(data).unwrap()).unwrap();
        assert!(!status.is_ready(), "{data}");
    }
}

#[test]
fn test_status_short_reply() {
    assert_eq!(StatusRegister::new(&[0x41, 0x00, 0x00]), None);
}
