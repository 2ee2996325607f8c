//! Out-of-band resumption of conversations from agent events

mod helpers;

use std::time::Duration;
use assert_matches::assert_matches;

use AgentBuddy::events::{Event, MessageKind};
use AgentBuddy::models::Activity;
use AgentBuddy::services::{EventRelay, NotifyRequest};
use AgentBuddy::AgentBuddyError;
use helpers::*;

/// Provision, create an invitation and return the waiting connection id
async fn invite(ctx: &TestContext) -> String {
    ctx.provision("Bob").await;
    ctx.send("/invite").await.unwrap();
    ctx.adapter.clear();
    "conn-1".to_string()
}

#[tokio::test]
async fn test_connection_event_resumes_conversation() {
    let ctx = TestContext::new();
    let connection_id = invite(&ctx).await;
    ctx.agent.connect(&connection_id, Some("Alice"));

    let fired = ctx
        .services
        .event_bus
        .publish(Event::new(MessageKind::ConnectionRequest, connection_id.as_str()));

    assert_eq!(fired, 1);
    assert_eq!(ctx.wait_for_texts(1).await, vec!["You are now connected to Alice"]);
    assert_eq!(ctx.services.event_bus.pending_subscriptions(), 0);
}

#[tokio::test]
async fn test_unrelated_events_do_not_resume() {
    let ctx = TestContext::new();
    let connection_id = invite(&ctx).await;

    let bus = &ctx.services.event_bus;
    assert_eq!(bus.publish(Event::new(MessageKind::ConnectionResponse, connection_id.as_str())), 0);
    assert_eq!(bus.publish(Event::new(MessageKind::ConnectionRequest, "conn-other")), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ctx.adapter.texts().is_empty());
    assert_eq!(bus.pending_subscriptions(), 1);
}

#[tokio::test]
async fn test_event_published_before_subscription_is_replayed() {
    let ctx = TestContext::new();
    ctx.provision("Bob").await;

    // The first connection the fake agent creates is conn-1
    let fired = ctx
        .services
        .event_bus
        .publish(Event::new(MessageKind::ConnectionRequest, "conn-1"));
    assert_eq!(fired, 0);

    ctx.send("/invite").await.unwrap();

    let texts = ctx.wait_for_texts(3).await;
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], "Here are the invitation details");
    assert!(texts[2].starts_with("You are now connected to"));
}

#[tokio::test]
async fn test_event_for_removed_agent_is_dropped() {
    let ctx = TestContext::new();
    let connection_id = invite(&ctx).await;
    let agent_id = ctx.conversation_state().await.application_state.provisioning_id.unwrap();
    ctx.agent.remove_agent(&agent_id);

    let fired = ctx
        .services
        .event_bus
        .publish(Event::new(MessageKind::ConnectionRequest, connection_id.as_str()));
    assert_eq!(fired, 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ctx.adapter.texts().is_empty());
}

#[tokio::test]
async fn test_notify_on_unknown_agent_does_not_subscribe() {
    let ctx = TestContext::new();

    let handle = ctx
        .services
        .resumer
        .notify_on(
            NotifyRequest::new(MessageKind::ConnectionRequest, "conn-1"),
            ctx.reference(),
            "ghost".to_string(),
        )
        .await;

    assert!(handle.is_none());
    assert_eq!(ctx.services.event_bus.pending_subscriptions(), 0);
}

#[tokio::test]
async fn test_notify_on_delivers_once() {
    let ctx = TestContext::new();
    ctx.agent.add_agent("agent-1", "https://agents.example.test/agent-1");
    let connection_id = invite(&ctx).await;
    ctx.agent.connect(&connection_id, Some("Dana"));
    let resumed_before = ctx.services.event_bus.pending_subscriptions();

    let handle = ctx
        .services
        .resumer
        .notify_on(
            NotifyRequest::new(MessageKind::ConnectionResponse, connection_id.as_str()),
            ctx.reference(),
            "agent-1".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(ctx.services.event_bus.pending_subscriptions(), resumed_before + 1);

    let bus = &ctx.services.event_bus;
    assert_eq!(bus.publish(Event::new(MessageKind::ConnectionResponse, connection_id.as_str())), 1);
    assert_eq!(bus.publish(Event::new(MessageKind::ConnectionResponse, connection_id.as_str())), 0);

    assert_eq!(ctx.wait_for_texts(1).await, vec!["You are now connected to Dana"]);
    assert!(handle.was_delivered());
}

#[tokio::test]
async fn test_continue_conversation_to_unreachable_conversation_fails() {
    let ctx = TestContext::new();
    ctx.adapter.mark_unreachable(TEST_CONVERSATION);

    let result = ctx
        .services
        .resumer
        .continue_conversation(&ctx.reference(), Activity::message("hello"))
        .await;

    assert_matches!(result, Err(AgentBuddyError::Channel(_)));
}

#[tokio::test]
async fn test_continue_conversation_keeps_dialog_state() {
    let ctx = TestContext::new();
    ctx.send("/provision").await.unwrap();

    ctx.services
        .resumer
        .continue_conversation(&ctx.reference(), Activity::message("Still there?"))
        .await
        .unwrap();

    assert_eq!(ctx.take_texts(), vec!["What name would you like your agent to use?", "Still there?"]);
    assert_eq!(
        ctx.conversation_state().await.dialog_stack.ids(),
        vec!["provision-agent", "text-prompt"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_subscription_expires_after_replay_window() {
    let ctx = TestContext::new();
    let connection_id = invite(&ctx).await;

    tokio::time::advance(Duration::from_secs(61)).await;

    let fired = ctx
        .services
        .event_bus
        .publish(Event::new(MessageKind::ConnectionRequest, connection_id.as_str()));
    assert_eq!(fired, 0);
    assert_eq!(ctx.services.event_bus.pending_subscriptions(), 0);
}

#[tokio::test]
async fn test_relay_publishes_polled_events() {
    let ctx = TestContext::new();
    let connection_id = invite(&ctx).await;
    ctx.agent.connect(&connection_id, Some("Erin"));
    ctx.agent
        .queue_event(Event::new(MessageKind::ConnectionRequest, connection_id.as_str()));

    let mut relay = EventRelay::new(
        ctx.services.agent_service.clone(),
        ctx.services.event_bus.clone(),
        Duration::from_secs(1),
    );

    assert_eq!(relay.poll_once().await, 1);
    assert_eq!(relay.cursor(), 1);
    assert_eq!(relay.poll_once().await, 0);
    assert_eq!(ctx.wait_for_texts(1).await, vec!["You are now connected to Erin"]);
}
