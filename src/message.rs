pub(crate) mod sram_message;
pub(crate) mod status_message;
pub(crate) mod version_message;
