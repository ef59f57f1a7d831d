//! Job loop integration tests
//!
//! Runs each job kind's loop directly so the cycle tallies can be inspected.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use autopilot::domain::{ContentItem, InboundMessage, JobKind, ReplyRule, Target, TargetStatus};
use autopilot::jobs::{JobLoop, LoopSummary, behavior_for};
use autopilot::network::ClientError;
use autopilot::storage::{MemoryStore, Store};

use common::{FlakyStore, Recorder, account, context, fast_config, group, inbound, private_chat, tenant};

/// Run the kind's loop for `duration` of (virtual) time, then cancel it
async fn run_for(
    store: Arc<dyn Store>,
    recorder: &Arc<Recorder>,
    kind: JobKind,
    config: autopilot::config::JobConfig,
    duration: Duration,
) -> LoopSummary {
    let cancel = CancellationToken::new();
    let ctx = context(store, recorder, kind, config, cancel.clone());
    let handle = tokio::spawn(JobLoop::new(ctx, behavior_for(kind)).run());
    tokio::time::sleep(duration).await;
    cancel.cancel();
    handle.await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_distribute_one_cycle_attempts_each_account_once() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store.add_account(account(2)).unwrap();
    store.add_content(ContentItem::text(10, tenant(), "offer")).unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100)]);
    recorder.set_destinations(2, vec![group(200)]);

    let summary = run_for(
        Arc::new(store),
        &recorder,
        JobKind::Distribute,
        common::fast_config(JobKind::Distribute),
        Duration::from_secs(60),
    )
    .await;

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.totals.attempted, 2);
    assert_eq!(summary.totals.succeeded, 2);
    assert_eq!(summary.totals.failed, 0);
    assert_eq!(recorder.sends().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_distribute_skips_private_chats_and_sends_all_breadth() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store.add_content(ContentItem::text(10, tenant(), "first")).unwrap();
    store.add_content(ContentItem::text(11, tenant(), "second")).unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100), private_chat(5)]);

    let config = autopilot::config::JobConfig {
        breadth: autopilot::config::Breadth::All,
        ..fast_config(JobKind::Distribute)
    };
    let summary = run_for(Arc::new(store), &recorder, JobKind::Distribute, config, Duration::from_secs(60)).await;

    let sends = recorder.sends();
    assert_eq!(sends.len(), 2);
    assert!(sends.iter().all(|s| s.destination == 100));
    assert_eq!(summary.totals.attempted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_account_waits_sibling_does_not() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store.add_account(account(2)).unwrap();
    store.add_content(ContentItem::text(10, tenant(), "offer")).unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100), group(101)]);
    recorder.set_destinations(2, vec![group(200)]);
    recorder.fail_sends(1, vec![ClientError::rate_limited_secs(5)]);

    let start = tokio::time::Instant::now();
    let summary = run_for(
        Arc::new(store),
        &recorder,
        JobKind::Distribute,
        fast_config(JobKind::Distribute),
        Duration::from_secs(60),
    )
    .await;

    let sends = recorder.sends();
    let account_one: Vec<_> = sends.iter().filter(|s| s.account_id == 1).collect();
    let account_two: Vec<_> = sends.iter().filter(|s| s.account_id == 2).collect();
    assert_eq!(account_one.len(), 2);
    assert!(account_one[1].at - account_one[0].at >= Duration::from_secs(5));
    assert_eq!(account_two.len(), 1);
    assert!(account_two[0].at - start < Duration::from_secs(1));

    assert_eq!(summary.totals.attempted, 3);
    assert_eq!(summary.totals.rate_limited, 1);
    assert_eq!(summary.totals.attempted, summary.totals.succeeded + summary.totals.failed);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_account_skipped_not_disabled() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store.add_account(account(2)).unwrap();
    store.add_content(ContentItem::text(10, tenant(), "offer")).unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100)]);
    recorder.set_destinations(2, vec![group(200)]);
    recorder.deny(2);

    // Two cycles
    let summary = run_for(
        Arc::new(store),
        &recorder,
        JobKind::Distribute,
        fast_config(JobKind::Distribute),
        Duration::from_secs(3600 + 60),
    )
    .await;

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.totals.skipped_accounts, 2);
    assert_eq!(summary.totals.attempted, 2);
    // Account 2 was retried in the second cycle
    assert_eq!(recorder.connects(2), 2);
    assert!(recorder.sends().iter().all(|s| s.account_id == 1));
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_is_retried() {
    let inner = MemoryStore::new();
    inner.add_account(account(1)).unwrap();
    inner.add_content(ContentItem::text(10, tenant(), "offer")).unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100)]);

    let config = fast_config(JobKind::Distribute);
    let idle = config.idle_interval;
    let summary = run_for(
        Arc::new(FlakyStore::new(inner, 2)),
        &recorder,
        JobKind::Distribute,
        config,
        idle * 2 + Duration::from_secs(1),
    )
    .await;

    assert_eq!(summary.failed_cycles, 2);
    assert_eq!(summary.totals.succeeded, 1);
    assert_eq!(recorder.sends().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_group_reply_first_match_wins() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store
        .add_rule(ReplyRule::new(1, tenant(), JobKind::GroupReply, "see pinned price list").with_trigger("price"))
        .unwrap();
    store
        .add_rule(ReplyRule::new(2, tenant(), JobKind::GroupReply, "dm me").with_trigger("LIST"))
        .unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100)]);
    recorder.set_inbound(100, vec![inbound(5, "Where is the price list?"), inbound(6, "good morning")]);

    // Two cycles: the second must not answer the same message again
    let config = autopilot::config::JobConfig {
        cycle_interval: Duration::from_secs(30),
        ..fast_config(JobKind::GroupReply)
    };
    let summary = run_for(Arc::new(store), &recorder, JobKind::GroupReply, config, Duration::from_secs(45)).await;

    let sends = recorder.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].text, "see pinned price list");
    assert_eq!(sends[0].reply_to, Some(5));
    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.totals.attempted, 1);
}

/// GroupReply store and network with one "price" rule and one matching message
fn price_question_setup() -> (Arc<dyn Store>, Arc<Recorder>) {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store
        .add_rule(ReplyRule::new(1, tenant(), JobKind::GroupReply, "see pinned").with_trigger("price"))
        .unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100)]);
    recorder.set_inbound(100, vec![inbound(5, "price?")]);
    (Arc::new(store), recorder)
}

fn every_30s(kind: JobKind) -> autopilot::config::JobConfig {
    autopilot::config::JobConfig {
        cycle_interval: Duration::from_secs(30),
        ..fast_config(kind)
    }
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_transient_failure_is_retried_next_cycle() {
    let (store, recorder) = price_question_setup();
    recorder.fail_sends(1, vec![ClientError::Other("timeout".into())]);

    let summary = run_for(
        store,
        &recorder,
        JobKind::GroupReply,
        every_30s(JobKind::GroupReply),
        Duration::from_secs(100),
    )
    .await;

    assert_eq!(summary.cycles, 4);
    // Failed once, answered on the next cycle, then left alone
    let sends = recorder.sends();
    assert_eq!(sends.len(), 2);
    assert!(sends.iter().all(|s| s.reply_to == Some(5)));
    assert_eq!(summary.totals.failed, 1);
    assert_eq!(summary.totals.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_permanent_failure_is_not_retried() {
    let (store, recorder) = price_question_setup();
    recorder.fail_sends(1, vec![ClientError::TargetUnreachable("group-100".into())]);

    let summary = run_for(
        store,
        &recorder,
        JobKind::GroupReply,
        every_30s(JobKind::GroupReply),
        Duration::from_secs(100),
    )
    .await;

    assert_eq!(recorder.sends().len(), 1);
    assert_eq!(summary.totals.failed, 1);
    assert_eq!(summary.totals.succeeded, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_reply_is_retried_next_cycle() {
    let (store, recorder) = price_question_setup();
    recorder.fail_sends(1, vec![ClientError::rate_limited_secs(5)]);

    let summary = run_for(
        store,
        &recorder,
        JobKind::GroupReply,
        every_30s(JobKind::GroupReply),
        Duration::from_secs(100),
    )
    .await;

    assert_eq!(recorder.sends().len(), 2);
    assert_eq!(summary.totals.rate_limited, 1);
    assert_eq!(summary.totals.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_private_reply_answers_latest_message_only() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store
        .add_rule(ReplyRule::new(1, tenant(), JobKind::PrivateReply, "away, back soon"))
        .unwrap();

    let at = |minute| Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap();
    let message = |id, minute, outgoing| InboundMessage {
        id,
        sender: Some("buyer".into()),
        text: "hi".into(),
        outgoing,
        sent_at: at(minute),
    };

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![private_chat(9), group(100)]);
    recorder.set_inbound(9, vec![message(1, 0, false), message(2, 1, false), message(3, 2, true)]);
    recorder.set_inbound(100, vec![inbound(50, "hello group")]);

    run_for(
        Arc::new(store),
        &recorder,
        JobKind::PrivateReply,
        fast_config(JobKind::PrivateReply),
        Duration::from_secs(60),
    )
    .await;

    let sends = recorder.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].destination, 9);
    assert_eq!(sends[0].reply_to, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_random_reply_with_zero_probability_stays_silent() {
    let store = MemoryStore::new();
    store.add_account(account(1)).unwrap();
    store
        .add_rule(ReplyRule::new(1, tenant(), JobKind::RandomReply, "lol"))
        .unwrap();

    let recorder = Recorder::new();
    recorder.set_destinations(1, vec![group(100)]);
    recorder.set_inbound(100, vec![inbound(5, "anyone here?")]);

    let config = autopilot::config::JobConfig {
        reply_probability: 0.0,
        ..fast_config(JobKind::RandomReply)
    };
    let summary = run_for(Arc::new(store), &recorder, JobKind::RandomReply, config, Duration::from_secs(60)).await;

    assert!(recorder.sends().is_empty());
    assert_eq!(summary.totals.attempted, 0);
}

#[tokio::test(start_paused = true)]
async fn test_join_marks_targets_and_rotates_accounts() {
    let store = Arc::new(MemoryStore::new());
    store.add_account(account(1)).unwrap();
    store.add_account(account(2)).unwrap();
    store.add_target(Target::pending(1, tenant(), "t.me/alpha")).unwrap();
    store.add_target(Target::pending(2, tenant(), "t.me/beta")).unwrap();
    store.add_target(Target::pending(3, tenant(), "t.me/gamma")).unwrap();
    store.add_target(Target::pending(4, tenant(), "t.me/delta")).unwrap();

    let recorder = Recorder::new();
    recorder.fail_join(2, "t.me/beta", ClientError::InvalidTarget("no such channel".into()));
    recorder.fail_join(1, "t.me/gamma", ClientError::Other("flaky".into()));
    recorder.fail_join(2, "t.me/delta", ClientError::AlreadyMember("t.me/delta".into()));

    let summary = run_for(
        store.clone(),
        &recorder,
        JobKind::Join,
        fast_config(JobKind::Join),
        Duration::from_secs(600),
    )
    .await;

    assert_eq!(store.target_status(1).unwrap(), Some(TargetStatus::Joined));
    assert_eq!(store.target_status(2).unwrap(), Some(TargetStatus::Failed));
    assert_eq!(store.target_status(3).unwrap(), Some(TargetStatus::Joined));
    assert_eq!(store.target_status(4).unwrap(), Some(TargetStatus::Joined));

    // gamma failed on account 1, then went to account 2 in the next round
    let gamma: Vec<u64> = recorder
        .joins()
        .iter()
        .filter(|j| j.link == "t.me/gamma")
        .map(|j| j.account_id)
        .collect();
    assert_eq!(gamma, vec![1, 2]);

    assert_eq!(summary.totals.attempted, 5);
    assert_eq!(summary.totals.succeeded, 2);
    assert_eq!(summary.totals.failed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_join_store_error_mid_cycle_keeps_cycle_pacing() {
    let inner = MemoryStore::new();
    inner.add_account(account(1)).unwrap();
    inner.add_account(account(2)).unwrap();
    inner.add_target(Target::pending(1, tenant(), "t.me/alpha")).unwrap();
    inner.add_target(Target::pending(2, tenant(), "t.me/beta")).unwrap();

    let recorder = Recorder::new();
    // beta stays pending after round 0, so round 1 must re-read the store
    recorder.fail_join(2, "t.me/beta", ClientError::Other("flaky".into()));

    let config = fast_config(JobKind::Join);
    assert!(config.idle_interval < Duration::from_secs(600));
    assert!(config.cycle_interval > Duration::from_secs(600));

    // Second pending read (round 1 of cycle 1) fails
    let summary = run_for(
        Arc::new(FlakyStore::failing_pending_read(inner, 2)),
        &recorder,
        JobKind::Join,
        config,
        Duration::from_secs(600),
    )
    .await;

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.failed_cycles, 0);
    assert_eq!(summary.totals.attempted, 2);
    assert_eq!(summary.totals.succeeded, 1);
    // No early retry after the idle interval
    assert_eq!(recorder.joins().len(), 2);
}
