//! ISO 14443-3 CRC_A framing for readers that exchange raw frames.
//!
//! Most reader stacks append and check CRC_A themselves. For those that don't,
//! wrap the raw transceiver in [`CrcFramed`] and the rest of the crate keeps
//! speaking bare commands.

use std::time::Duration;

use crc16::{State, CRC_A};
use futures_util::future::BoxFuture;

use crate::error::LinkError;
use crate::transceiver::Transceiver;

pub struct CrcFramed<T> {
    inner: T,
}

impl<T: Transceiver> CrcFramed<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Compute the CRC_A check value for the given bytes, in transmission order
    fn crc(data: &[u8]) -> [u8; 2] {
        State::<CRC_A>::calculate(data).to_le_bytes()
    }

    fn frame(command: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(command.len() + 2);
        framed.extend_from_slice(command);
        framed.extend_from_slice(&Self::crc(command));
        framed
    }

    /// Strip and verify the trailing CRC. Replies under 3 bytes are 4-bit ACK/NAK
    /// responses and carry none.
    fn unframe(mut reply: Vec<u8>) -> Result<Vec<u8>, LinkError> {
        if reply.len() < 3 {
            return Ok(reply);
        }
        let split = reply.len() - 2;
        if reply[split..] != Self::crc(&reply[..split]) {
            return Err(LinkError::Corrupted(format!(
                "CRC_A check failed: {}",
                hex::encode(&reply)
            )));
        }
        reply.truncate(split);
        Ok(reply)
    }
}

impl<T: Transceiver> Transceiver for CrcFramed<T> {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
        self.inner.connect()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
        self.inner.close()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.inner.set_timeout(timeout)
    }

    fn transceive<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, LinkError>> {
        Box::pin(async move {
            let framed = Self::frame(command);
            let reply = self.inner.transceive(&framed).await?;
            Self::unframe(reply)
        })
    }
}
