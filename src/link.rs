use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::trace;

use crate::config::SessionConfig;
use crate::error::LinkError;
use crate::transceiver::Transceiver;

/// A transceiver plus the session's close signal and exchange timeouts.
///
/// Every exchange and settle delay races the close signal, so closing the
/// session fails the in-flight operation immediately instead of waiting out
/// its timeout.
pub(crate) struct Link<T> {
    transceiver: T,
    closed: watch::Receiver<bool>,
    exchange_timeout: Duration,
    bulk_timeout: Duration,
    timeout: Duration,
}

impl<T: Transceiver> Link<T> {
    pub fn new(transceiver: T, config: &SessionConfig, closed: watch::Receiver<bool>) -> Self {
        Self {
            transceiver,
            closed,
            exchange_timeout: config.exchange_timeout(),
            bulk_timeout: config.bulk_timeout(),
            timeout: config.exchange_timeout(),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub async fn connect(&mut self) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        let Self { transceiver, closed, .. } = self;
        tokio::select! {
            biased;
            _ = wait_closed(closed) => return Err(LinkError::Closed),
            result = transceiver.connect() => result?,
        }
        self.set_timeout(self.exchange_timeout);
        Ok(())
    }

    /// Release the link. Runs even after the close signal fired.
    pub async fn close(&mut self) -> Result<(), LinkError> {
        self.transceiver.close().await
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.transceiver.set_timeout(timeout);
    }

    #[cfg(test)]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }

        trace!("TAG: TX: {}", hex::encode(command));

        let Self { transceiver, closed, timeout: limit, .. } = self;
        let reply = tokio::select! {
            biased;
            _ = wait_closed(closed) => Err(LinkError::Closed),
            reply = timeout(*limit, transceiver.transceive(command)) => {
                reply.unwrap_or(Err(LinkError::Timeout))
            }
        };

        match &reply {
            Ok(data) => trace!("TAG: RX: {}", hex::encode(data)),
            Err(err) => trace!("TAG: RX failed: {err}"),
        }
        reply
    }

    /// Exchange under the bulk timeout, then drop back to the ordinary one
    /// whatever the outcome.
    pub async fn bulk_exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, LinkError> {
        self.set_timeout(self.bulk_timeout);
        let reply = self.exchange(command).await;
        self.set_timeout(self.exchange_timeout);
        reply
    }

    /// Wait out a settle delay unless the session closes first.
    pub async fn settle(&mut self, delay: Duration) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        tokio::select! {
            biased;
            _ = wait_closed(&mut self.closed) => Err(LinkError::Closed),
            _ = sleep(delay) => Ok(()),
        }
    }
}

/// Resolves once the close signal fires. Never resolves if every handle is gone.
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    if closed.wait_for(|closed| *closed).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transceiver::scripted::ScriptedTransceiver;

    fn link(transceiver: ScriptedTransceiver) -> (Link<ScriptedTransceiver>, watch::Sender<bool>) {
        let (close, closed) = watch::channel(false);
        (Link::new(transceiver, &SessionConfig::default(), closed), close)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_exchange_restores_timeout_on_failure() {
        let transceiver = ScriptedTransceiver::new(|_| Err(LinkError::Lost("gone".to_string())));
        let timeouts = transceiver.timeouts.clone();
        let (mut link, _close) = link(transceiver);

        let result = link.bulk_exchange(&[0x3a, 0xf0, 0xff]).await;

        assert_eq!(result, Err(LinkError::Lost("gone".to_string())));
        assert_eq!(link.timeout(), Duration::from_millis(20));
        assert_eq!(
            *timeouts.lock().unwrap(),
            vec![Duration::from_millis(500), Duration::from_millis(20)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_interrupts_settle() {
        let (mut link, close) = link(ScriptedTransceiver::new(|_| Ok(vec![])));
        let closer = tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            close.send(true).unwrap();
            close
        });

        let started = tokio::time::Instant::now();
        assert_eq!(link.settle(Duration::from_secs(60)).await, Err(LinkError::Closed));
        assert!(started.elapsed() < Duration::from_secs(1));

        // Every later operation fails fast too
        assert_eq!(link.exchange(&[0x30, 0x00]).await, Err(LinkError::Closed));
        drop(closer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_does_not_close() {
        let (mut link, close) = link(ScriptedTransceiver::new(|_| Ok(vec![0x0a])));
        drop(close);
        assert_eq!(link.settle(Duration::from_millis(110)).await, Ok(()));
        assert_eq!(link.exchange(&[0xc2, 0xff]).await, Ok(vec![0x0a]));
    }
}
