use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::LinkError;

/// A short-range link to exactly one physical tag.
///
/// Implemented by whatever reader stack discovered the tag. Exchanges are never
/// retried here; retry policy belongs to the caller.
pub trait Transceiver: Send {
    /// Open the link. Fails with [`LinkError::Lost`] if the tag is gone.
    fn connect(&mut self) -> BoxFuture<'_, Result<(), LinkError>>;

    /// Release the link. Calling it twice is harmless.
    fn close(&mut self) -> BoxFuture<'_, Result<(), LinkError>>;

    /// Later exchanges fail with [`LinkError::Timeout`] if no reply arrives within `timeout`.
    fn set_timeout(&mut self, timeout: Duration);

    /// Send `command` verbatim and return the tag's reply.
    fn transceive<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, LinkError>>;
}

impl<T: Transceiver + ?Sized> Transceiver for Box<T> {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
        (**self).connect()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
        (**self).close()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }

    fn transceive<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, LinkError>> {
        (**self).transceive(command)
    }
}

/// The 7 byte UID the tag reported when it entered the field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagIdentity(Vec<u8>);

impl TagIdentity {
    /// First UID byte of every NXP tag
    pub const NXP_VENDOR_PREFIX: u8 = 0x04;

    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_nxp(&self) -> bool {
        self.0.first() == Some(&Self::NXP_VENDOR_PREFIX)
    }
}

impl fmt::Display for TagIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

/// A tag entering the field, as delivered by the discovery layer.
pub struct TagPresence<T> {
    pub identity: TagIdentity,
    pub transceiver: T,
}

impl<T: Transceiver> TagPresence<T> {
    pub fn new(identity: TagIdentity, transceiver: T) -> Self {
        Self { identity, transceiver }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures_util::future::BoxFuture;

    use super::Transceiver;
    use crate::error::LinkError;

    type Responder = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>, LinkError> + Send>;

    /// Replies through a closure and records every command and timeout change.
    pub(crate) struct ScriptedTransceiver {
        pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
        pub timeouts: Arc<Mutex<Vec<Duration>>>,
        pub closed: Arc<Mutex<u32>>,
        responder: Responder,
        latency: Duration,
    }

    impl ScriptedTransceiver {
        pub fn new(responder: impl FnMut(&[u8]) -> Result<Vec<u8>, LinkError> + Send + 'static) -> Self {
            Self {
                sent: Arc::default(),
                timeouts: Arc::default(),
                closed: Arc::default(),
                responder: Box::new(responder),
                latency: Duration::from_millis(1),
            }
        }
    }

    impl Transceiver for ScriptedTransceiver {
        fn connect(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
            Box::pin(async { Ok(()) })
        }

        fn close(&mut self) -> BoxFuture<'_, Result<(), LinkError>> {
            *self.closed.lock().unwrap() += 1;
            Box::pin(async { Ok(()) })
        }

        fn set_timeout(&mut self, timeout: Duration) {
            self.timeouts.lock().unwrap().push(timeout);
        }

        fn transceive<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, LinkError>> {
            Box::pin(async move {
                tokio::time::sleep(self.latency).await;
                self.sent.lock().unwrap().push(command.to_vec());
                (self.responder)(command)
            })
        }
    }
}

#[test]
fn test_identity_vendor_prefix() {
    let id = TagIdentity::new(hex::decode("04a1b2c3d4e5f6").unwrap());
    assert!(id.is_nxp());
    assert_eq!(id.to_string(), "04A1B2C3D4E5F6");
    assert!(!TagIdentity::new(vec![0x05, 0x00]).is_nxp());
    assert!(!TagIdentity::new(Vec::new()).is_nxp());
}
