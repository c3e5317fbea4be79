//! Event bus tests

use futures::StreamExt;
use launchpad::events::bus::EventBus;
use launchpad::models::event::{Event, EventKind};

fn message(event: &Event) -> String {
    match &event.kind {
        EventKind::Progress { message, .. } => message.clone(),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_subscribers_receive_events_in_order() {
    let bus = EventBus::new();
    let mut first = bus.subscribe("dep-1");
    let mut second = bus.subscribe("dep-1");

    for i in 0..3 {
        bus.publish("dep-1", Event::progress(format!("step {}", i)));
    }

    for sub in [&mut first, &mut second] {
        let received: Vec<String> = (0..3)
            .map(|_| message(&sub.try_recv().unwrap()))
            .collect();
        assert_eq!(received, vec!["step 0", "step 1", "step 2"]);
        assert!(sub.try_recv().is_none());
    }
}

#[tokio::test]
async fn test_late_subscriber_gets_no_replay() {
    let bus = EventBus::new();
    let _early = bus.subscribe("dep-1");
    bus.publish("dep-1", Event::progress("before"));

    let mut late = bus.subscribe("dep-1");
    assert!(late.try_recv().is_none());

    bus.publish("dep-1", Event::progress("after"));
    assert_eq!(message(&late.try_recv().unwrap()), "after");
}

#[tokio::test]
async fn test_events_are_scoped_to_a_deployment() {
    let bus = EventBus::new();
    let mut one = bus.subscribe("dep-1");
    let mut two = bus.subscribe("dep-2");

    bus.publish("dep-2", Event::progress("for two"));
    assert!(one.try_recv().is_none());
    assert_eq!(message(&two.try_recv().unwrap()), "for two");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe("dep-1");
    let token = sub.token().clone();

    bus.unsubscribe(&token);
    bus.unsubscribe(&token);
    bus.publish("dep-1", Event::progress("dropped"));

    assert!(sub.try_recv().is_none());
    assert_eq!(bus.subscriber_count("dep-1"), 0);
}

#[tokio::test]
async fn test_subscription_is_a_stream() {
    let bus = EventBus::new();
    let sub = bus.subscribe("dep-1");

    bus.publish("dep-1", Event::progress("one"));
    bus.publish("dep-1", Event::error("boom"));

    let events: Vec<Event> = sub.take(2).collect().await;
    assert_eq!(message(&events[0]), "one");
    assert!(events[1].is_terminal());
    assert_eq!(bus.subscriber_count("dep-1"), 0);
}
