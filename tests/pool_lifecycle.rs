//! Integration tests for the claim flow: Available -> In-Use.

mod common;

use common::gateway::BOT;
use common::{ALICE, BOB, TestHarness, settle};
use helppool::gateway::{GatewayEvent, MessageId, MessageInfo};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_claim_moves_channel_to_in_use() {
    let h = TestHarness::new().await;
    h.seed_dormant(4);
    h.manager.init().await.expect("Init failed");
    assert_eq!(h.count(h.config.categories.available), 2);

    let available = h.gateway.channels_in_category(h.config.categories.available);
    let channel = available[0].id;
    let question = h
        .gateway
        .human_message(channel, ALICE, "how do I borrow a field twice?");
    h.manager
        .handle_message(&question)
        .await
        .expect("Claim failed");

    assert_eq!(
        h.gateway.category_of(channel),
        Some(h.config.categories.in_use)
    );
    assert!(h.gateway.pinned_messages(channel).contains(&question.id));
    assert!(
        h.gateway
            .message_contents(channel)
            .iter()
            .any(|c| c.contains("claimed by"))
    );
    assert!(h.gateway.has_role(ALICE, h.config.roles.cooldown));
    assert!(h.manager.has_pending_cooldown(ALICE));
    assert_eq!(h.gateway.dm_count(ALICE), 1);
    assert!(h.manager.has_pending_idle_check(channel));

    let claim = h
        .db
        .claims()
        .get(channel)
        .await
        .expect("Cache read failed")
        .expect("Claim not cached");
    assert_eq!(claim.claimant_id, ALICE);
    assert!(!claim.answered);
    assert_eq!(claim.question_message_id, Some(question.id));

    // Replenishment is detached; the pool is back at target shortly after.
    settle().await;
    assert_eq!(h.count(h.config.categories.available), 2);
}

#[tokio::test]
async fn test_in_use_messages_refresh_activity_and_answered() {
    let h = TestHarness::new().await;
    h.seed_dormant(4);
    h.manager.init().await.expect("Init failed");

    let channel = h.gateway.channels_in_category(h.config.categories.available)[0].id;
    let question = h.gateway.human_message(channel, ALICE, "lifetime question");
    h.manager
        .handle_message(&question)
        .await
        .expect("Claim failed");

    let reply = h.gateway.human_message(channel, BOB, "try split_at_mut");
    h.manager
        .handle_message(&reply)
        .await
        .expect("Reply handling failed");

    let claim = h
        .db
        .claims()
        .get(channel)
        .await
        .expect("Cache read failed")
        .expect("Claim not cached");
    assert!(claim.answered);
    // The cache stores timestamps at second precision.
    assert_eq!(
        claim.last_other_message_at.map(|t| t.timestamp()),
        Some(reply.created_at.timestamp())
    );

    let followup = h.gateway.human_message(channel, ALICE, "that worked, thanks");
    h.manager
        .handle_message(&followup)
        .await
        .expect("Followup handling failed");

    let claim = h
        .db
        .claims()
        .get(channel)
        .await
        .expect("Cache read failed")
        .expect("Claim not cached");
    assert_eq!(
        claim.last_claimant_message_at.map(|t| t.timestamp()),
        Some(followup.created_at.timestamp())
    );
    // A claimant followup does not reset the answered flag.
    assert!(claim.answered);
}

#[tokio::test]
async fn test_bot_messages_do_not_claim() {
    let h = TestHarness::new().await;
    h.seed_dormant(4);
    h.manager.init().await.expect("Init failed");

    let channel = h.gateway.channels_in_category(h.config.categories.available)[0].id;
    let announcement = MessageInfo {
        id: MessageId(9999),
        channel_id: channel,
        author: BOT,
        author_is_bot: true,
        content: "scheduled maintenance tonight".to_string(),
        created_at: chrono::Utc::now(),
    };
    h.manager
        .handle_message(&announcement)
        .await
        .expect("Bot message handling failed");

    assert_eq!(
        h.gateway.category_of(channel),
        Some(h.config.categories.available)
    );
    assert!(h.db.claims().get(channel).await.expect("Cache read failed").is_none());
}

#[tokio::test]
async fn test_event_loop_dispatches_claims() {
    let h = TestHarness::new().await;
    h.seed_dormant(4);
    h.manager.init().await.expect("Init failed");

    let (tx, rx) = mpsc::unbounded_channel();
    let manager = h.manager.clone();
    let loop_handle = tokio::spawn(manager.run(rx));

    let channel = h.gateway.channels_in_category(h.config.categories.available)[0].id;
    let question = h.gateway.human_message(channel, ALICE, "why does this not compile?");
    tx.send(GatewayEvent::MessageCreated(question))
        .expect("Event send failed");
    settle().await;

    assert_eq!(
        h.gateway.category_of(channel),
        Some(h.config.categories.in_use)
    );

    drop(tx);
    loop_handle.await.expect("Event loop panicked");
}
