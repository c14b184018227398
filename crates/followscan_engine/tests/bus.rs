use std::time::Duration;

use followscan_core::{PageType, Platform};
use followscan_engine::{Bus, BusSettings, ContextKind, DeliveryError, Message, Reply};
use pretty_assertions::assert_eq;

#[test]
fn messages_use_the_typed_envelope() {
    let message = Message::ScrapeProgress {
        count: 12,
        message: "Found 12 accounts...".to_string(),
    };

    let raw = message.encode().expect("encode");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");

    assert_eq!(value["type"], "SCRAPE_PROGRESS");
    assert_eq!(value["payload"]["count"], 12);
    assert_eq!(Message::decode(&raw).expect("decode"), message);

    let start = Message::ScrapeStart {
        platform: Platform::Twitter,
        page_type: PageType::Following,
        source_url: None,
    };
    let value: serde_json::Value =
        serde_json::from_str(&start.encode().expect("encode")).expect("json");
    assert_eq!(value["payload"]["pageType"], "following");
    assert_eq!(
        Message::decode(r#"{"type":"GET_STATE"}"#).expect("unit"),
        Message::GetState
    );
}

#[test]
fn unknown_message_types_fail_to_decode() {
    assert!(Message::decode(r#"{"type":"SELF_DESTRUCT"}"#).is_err());
    assert!(Message::decode(r#"{"type":"SCRAPE_PROGRESS","payload":{"count":"many"}}"#).is_err());
    assert!(Message::decode("not json").is_err());
}

#[tokio::test]
async fn call_waits_for_the_reply() {
    let bus = Bus::default();
    let mut coordinator = bus.bind(ContextKind::Coordinator);

    let server = tokio::spawn(async move {
        let inbound = coordinator.recv().await.expect("inbound");
        assert!(inbound.expects_reply());
        let (from, message, responder) = inbound.split();
        assert_eq!(from, ContextKind::Ui);
        assert_eq!(message, Message::GetState);
        responder.respond(Reply::Ack);
    });

    let reply = bus
        .call(ContextKind::Ui, ContextKind::Coordinator, &Message::GetState)
        .await
        .expect("reply");
    assert_eq!(reply, Reply::Ack);
    server.await.expect("server task");
}

#[tokio::test]
async fn notify_is_delivered_without_a_reply_slot() {
    let bus = Bus::default();
    let mut ui = bus.bind(ContextKind::Ui);

    bus.notify(ContextKind::Coordinator, ContextKind::Ui, &Message::Reset)
        .expect("delivered");

    let inbound = ui.try_recv().expect("queued");
    assert!(!inbound.expects_reply());
    assert_eq!(inbound.message, Message::Reset);
    assert!(ui.try_recv().is_none());
}

#[tokio::test]
async fn absent_recipient_is_reported_not_queued() {
    let bus = Bus::default();

    let err = bus
        .notify(ContextKind::Page, ContextKind::Coordinator, &Message::GetState)
        .expect_err("nobody listening");
    assert_eq!(err, DeliveryError::RecipientAbsent(ContextKind::Coordinator));

    // A context bound afterwards does not see the earlier message.
    let mut coordinator = bus.bind(ContextKind::Coordinator);
    assert!(coordinator.try_recv().is_none());
    assert!(bus.is_bound(ContextKind::Coordinator));

    drop(coordinator);
    assert!(!bus.is_bound(ContextKind::Coordinator));
    let err = bus
        .call(ContextKind::Ui, ContextKind::Coordinator, &Message::GetState)
        .await
        .expect_err("gone again");
    assert_eq!(err, DeliveryError::RecipientAbsent(ContextKind::Coordinator));
}

#[tokio::test]
async fn malformed_payload_is_rejected_and_skipped() {
    let bus = Bus::default();
    let mut coordinator = bus.bind(ContextKind::Coordinator);

    let server = tokio::spawn(async move {
        let inbound = coordinator.recv().await.expect("well-formed message");
        let (_, message, responder) = inbound.split();
        responder.respond(Reply::Ack);
        message
    });

    let reply = bus
        .call_raw(
            ContextKind::Page,
            ContextKind::Coordinator,
            r#"{"type":"SCRAPE_PROGRESS","payload":{"count":-3}}"#,
        )
        .await
        .expect("reply");
    assert!(matches!(reply, Reply::Rejected { .. }));

    let reply = bus
        .call(ContextKind::Page, ContextKind::Coordinator, &Message::Reset)
        .await
        .expect("reply");
    assert_eq!(reply, Reply::Ack);
    assert_eq!(server.await.expect("server task"), Message::Reset);
}

#[tokio::test]
async fn rebinding_detaches_the_previous_endpoint() {
    let bus = Bus::default();
    let mut old = bus.bind(ContextKind::Page);
    let mut new = bus.bind(ContextKind::Page);

    assert!(old.recv().await.is_none());

    // Dropping the stale endpoint must not unbind its replacement.
    drop(old);
    bus.notify(ContextKind::Coordinator, ContextKind::Page, &Message::StartScrape)
        .expect("delivered to the new endpoint");
    let inbound = new.try_recv().expect("queued");
    assert_eq!(inbound.message, Message::StartScrape);
}

#[tokio::test(start_paused = true)]
async fn call_times_out_when_nobody_answers() {
    let bus = Bus::new(BusSettings {
        call_timeout: Duration::from_millis(200),
    });
    let mut coordinator = bus.bind(ContextKind::Coordinator);

    let caller = bus.clone();
    let call = tokio::spawn(async move {
        caller
            .call(ContextKind::Ui, ContextKind::Coordinator, &Message::GetState)
            .await
    });

    // Hold the request without answering.
    let held = coordinator.recv().await.expect("inbound");
    let result = call.await.expect("call task");
    assert_eq!(
        result,
        Err(DeliveryError::TimedOut(
            ContextKind::Coordinator,
            Duration::from_millis(200)
        ))
    );
    drop(held);
}

#[tokio::test]
async fn dropped_request_reports_no_response() {
    let bus = Bus::default();
    let mut coordinator = bus.bind(ContextKind::Coordinator);

    tokio::spawn(async move {
        let inbound = coordinator.recv().await.expect("inbound");
        drop(inbound);
    });

    let err = bus
        .call(ContextKind::Ui, ContextKind::Coordinator, &Message::GetState)
        .await
        .expect_err("dropped");
    assert_eq!(err, DeliveryError::NoResponse(ContextKind::Coordinator));
}
