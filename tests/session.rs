use std::time::Duration;

use ntagread::sim::SimulatedTag;
use ntagread::{Session, SessionConfig, SessionError, SessionState, TagIdentity, TagPresence};
use tokio::sync::mpsc;

fn presence(tag: &SimulatedTag) -> TagPresence<SimulatedTag> {
    let identity = TagIdentity::new(hex::decode("04a1b2c3d4e5f6").unwrap());
    TagPresence::new(identity, tag.clone())
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_telemetry() {
    let tag = SimulatedTag::new()
        .with_voltage_sample(600)
        .with_temperature_sample(25 << 8)
        .with_buttons(0x02);
    let (session, _handle) = Session::new(presence(&tag), &SessionConfig::default());
    let (tx, mut rx) = mpsc::channel(1);
    let running = tokio::spawn(session.run(tx));

    for _ in 0..3 {
        let record = rx.recv().await.unwrap();
        assert!((record.voltage_volts - 3.49).abs() < 0.01, "{record}");
        assert_eq!(record.temperature_celsius, 25.0);
        assert_eq!(record.buttons.bits(), 2);
    }

    // Hanging up ends the session cleanly
    drop(rx);
    assert_eq!(running.await.unwrap(), Ok(()));
    assert!(!tag.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_button_changes_show_up_next_cycle() {
    let tag = SimulatedTag::new();
    let (mut session, _handle) = Session::new(presence(&tag), &SessionConfig::default());
    session.establish().await.unwrap();

    assert_eq!(session.next_telemetry().await.unwrap().buttons.bits(), 0);
    tag.press(0x07);
    let buttons = session.next_telemetry().await.unwrap().buttons;
    assert!(buttons.red() && buttons.blue() && buttons.green());
}

#[tokio::test(start_paused = true)]
async fn test_slow_handshake_within_deadline() {
    let tag = SimulatedTag::new().ready_after(100);
    let (mut session, _handle) = Session::new(presence(&tag), &SessionConfig::default());

    session.establish().await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_tag_times_out() {
    let tag = SimulatedTag::new().with_latency(Duration::from_millis(50));
    let (mut session, _handle) = Session::new(presence(&tag), &SessionConfig::default());

    assert_eq!(session.establish().await, Err(SessionError::Timeout));
    assert_eq!(session.state(), SessionState::Faulted);
    assert!(!tag.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_session_per_presence() {
    let tag = SimulatedTag::new();

    let (mut first, _handle) = Session::new(presence(&tag), &SessionConfig::default());
    first.establish().await.unwrap();
    first.next_telemetry().await.unwrap();
    first.close().await;
    assert_eq!(first.state(), SessionState::Closed);

    let (mut second, _handle) = Session::new(presence(&tag), &SessionConfig::default());
    second.establish().await.unwrap();
    assert!(second.next_telemetry().await.is_ok());
}
