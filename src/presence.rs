//! Runs one session per tag presence and reports what happens as [`TagEvent`]s.

use tokio::sync::mpsc;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::Session;
use crate::telemetry::TelemetryRecord;
use crate::transceiver::{TagIdentity, TagPresence, Transceiver};

#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    /// A tag entered the field and a session is being set up
    Scanning(TagIdentity),
    Telemetry(TelemetryRecord),
    /// No tag in session any more. Carries the error that ended the last
    /// session, or `None` when a newer tag replaced it.
    Waiting(Option<SessionError>),
}

enum Outcome<T> {
    Faulted(SessionError),
    Replaced(TagPresence<T>),
    Unobserved,
}

/// Serve tag presences until the discovery side hangs up or nobody listens to
/// `events` any more.
///
/// Only one session runs at a time. A presence that arrives while a session
/// is running closes that session and starts a fresh one for the new tag.
pub async fn serve<T: Transceiver>(
    mut presences: mpsc::Receiver<TagPresence<T>>,
    events: mpsc::Sender<TagEvent>,
    config: SessionConfig,
) {
    let mut discovery_open = true;
    let mut pending = presences.recv().await;

    while let Some(presence) = pending.take() {
        info!("Tag {} entered the field", presence.identity);
        if events.send(TagEvent::Scanning(presence.identity.clone())).await.is_err() {
            return;
        }

        let (mut session, _handle) = Session::new(presence, &config);
        let outcome = {
            let drive = drive(&mut session, &events);
            tokio::pin!(drive);
            loop {
                tokio::select! {
                    outcome = &mut drive => break outcome,
                    next = presences.recv(), if discovery_open => match next {
                        Some(next) => break Outcome::Replaced(next),
                        None => discovery_open = false,
                    },
                }
            }
        };
        session.close().await;

        let waiting = match outcome {
            Outcome::Faulted(err) => Some(err),
            Outcome::Replaced(next) => {
                info!("Tag {} replaced by tag {}", session.identity(), next.identity);
                pending = Some(next);
                None
            }
            Outcome::Unobserved => return,
        };
        if events.send(TagEvent::Waiting(waiting)).await.is_err() {
            return;
        }

        if pending.is_none() && discovery_open {
            pending = presences.recv().await;
        }
    }
}

async fn drive<T: Transceiver>(session: &mut Session<T>, events: &mpsc::Sender<TagEvent>) -> Outcome<T> {
    if let Err(err) = session.establish().await {
        return Outcome::Faulted(err);
    }
    loop {
        match session.next_telemetry().await {
            Ok(record) => {
                if events.send(TagEvent::Telemetry(record)).await.is_err() {
                    return Outcome::Unobserved;
                }
            }
            Err(err) => return Outcome::Faulted(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use crate::sim::SimulatedTag;

    fn presence(identity: &str, tag: &SimulatedTag) -> TagPresence<SimulatedTag> {
        TagPresence::new(TagIdentity::new(hex::decode(identity).unwrap()), tag.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_removed_then_waiting() {
        let tag = SimulatedTag::new();
        let (presence_tx, presence_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let server = tokio::spawn(serve(presence_rx, event_tx, SessionConfig::default()));

        presence_tx.send(presence("04a1b2c3d4e5f6", &tag)).await.unwrap();

        assert!(matches!(event_rx.recv().await, Some(TagEvent::Scanning(_))));
        assert!(matches!(event_rx.recv().await, Some(TagEvent::Telemetry(_))));
        tag.remove();
        loop {
            match event_rx.recv().await {
                Some(TagEvent::Telemetry(_)) => continue,
                Some(TagEvent::Waiting(Some(SessionError::Link(LinkError::Lost(_))))) => break,
                other => panic!("unexpected event {other:?}"),
            }
        }

        drop(presence_tx);
        server.await.unwrap();
        assert!(event_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_tag_replaces_running_session() {
        let first = SimulatedTag::new();
        let second = SimulatedTag::new().with_buttons(0x04);
        let (presence_tx, presence_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        tokio::spawn(serve(presence_rx, event_tx, SessionConfig::default()));

        presence_tx.send(presence("04000000000001", &first)).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(TagEvent::Scanning(_))));
        assert!(matches!(event_rx.recv().await, Some(TagEvent::Telemetry(_))));

        presence_tx.send(presence("04000000000002", &second)).await.unwrap();
        loop {
            match event_rx.recv().await {
                Some(TagEvent::Telemetry(_)) => continue,
                Some(TagEvent::Waiting(None)) => break,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(!first.is_connected());

        match event_rx.recv().await {
            Some(TagEvent::Scanning(identity)) => assert_eq!(identity.to_string(), "04000000000002"),
            other => panic!("unexpected event {other:?}"),
        }
        match event_rx.recv().await {
            Some(TagEvent::Telemetry(record)) => assert!(record.buttons.green()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_tag_reports_waiting() {
        let tag = SimulatedTag::new().with_version(vec![0x00, 0x04, 0x04, 0x05, 0x02, 0x02, 0x13, 0x03]);
        let (presence_tx, presence_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let server = tokio::spawn(serve(presence_rx, event_tx, SessionConfig::default()));

        presence_tx.send(presence("04a1b2c3d4e5f6", &tag)).await.unwrap();
        drop(presence_tx);

        assert!(matches!(event_rx.recv().await, Some(TagEvent::Scanning(_))));
        assert!(matches!(
            event_rx.recv().await,
            Some(TagEvent::Waiting(Some(SessionError::UnsupportedDevice(_))))
        ));
        server.await.unwrap();
    }
}
