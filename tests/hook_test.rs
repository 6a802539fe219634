//! CommandListener tests. Unix only: hooks are `/bin/sh` one-liners.
#![cfg(unix)]

use redq::{BrokerEvent, CommandListener, DeliveryEvent, Listener, Message};

fn event(data: &str) -> DeliveryEvent {
    DeliveryEvent::new("jobs", &Message::with_uuid(data, "id-42"))
}

fn shell(script: &str) -> CommandListener {
    CommandListener::new(BrokerEvent::MessageReceived, "sh").args(["-c", script])
}

#[tokio::test]
async fn zero_exit_acknowledges() {
    let mut event = event("payload");
    shell("exit 0").handle(&mut event).await.unwrap();
    assert!(event.is_acknowledged());
}

#[tokio::test]
async fn failing_exit_leaves_message_unacknowledged() {
    let mut event = event("payload");
    shell("exit 3").handle(&mut event).await.unwrap();
    assert!(!event.is_acknowledged());
}

#[tokio::test]
async fn payload_and_environment_reach_the_command() {
    let mut event = event("the payload");
    shell(
        r#"test "$(cat)" = "the payload" \
            && test "$REDQ_CHANNEL" = jobs \
            && test "$REDQ_MESSAGE_ID" = id-42 \
            && test "$REDQ_EVENT" = redis-broker.message.received"#,
    )
    .handle(&mut event)
    .await
    .unwrap();
    assert!(event.is_acknowledged());
}

#[tokio::test]
async fn missing_program_is_an_error() {
    let mut event = event("payload");
    let listener = CommandListener::new(
        BrokerEvent::MessageReceived,
        "/nonexistent/redq-hook-that-does-not-exist",
    );
    assert!(listener.handle(&mut event).await.is_err());
}
