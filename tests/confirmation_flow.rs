//! Integration tests for the delete confirmation sub-flow.

mod common;

use chrono::TimeDelta;
use common::TestDaemon;
use pvchd::LifecycleError;
use pvchd::state::{Cancelled, ChannelState, DeletionOutcome};
use std::time::Duration;
use uuid::Uuid;

/// Pull the ticket id out of a `delete` reply.
fn ticket_from(reply: &str, user: u64) -> Uuid {
    let marker = format!("confirm {user} ");
    let start = reply.find(&marker).expect("reply names a ticket") + marker.len();
    Uuid::parse_str(&reply[start..start + 36]).expect("ticket is a uuid")
}

#[tokio::test]
async fn test_only_requester_may_confirm() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");
    daemon.handle.handle_create(alice.clone(), vec![], None).await.unwrap();

    let ticket = daemon.confirmations.request(alice.clone(), None, None);
    let result = daemon.confirmations.confirm(ticket, bob.id, &daemon.handle).await;
    assert_eq!(result, Err(LifecycleError::Unauthorized));

    // The ticket survives a foreign attempt.
    let outcome = daemon
        .confirmations
        .confirm(ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    assert!(matches!(outcome, DeletionOutcome::Scheduled { .. }));
}

#[tokio::test]
async fn test_ticket_expires() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    daemon.handle.handle_create(alice.clone(), vec![], None).await.unwrap();

    let ticket = daemon.confirmations.request(alice.clone(), None, None);
    daemon.clock.advance(TimeDelta::seconds(61));

    let result = daemon.confirmations.confirm(ticket, alice.id, &daemon.handle).await;
    assert_eq!(result, Err(LifecycleError::ConfirmationExpired));
    assert!(daemon.primary_of(alice.id).await.is_some());
}

#[tokio::test]
async fn test_cancel_before_confirm_discards_ticket() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    daemon.handle.handle_create(alice.clone(), vec![], None).await.unwrap();

    let ticket = daemon.confirmations.request(alice.clone(), None, None);
    let cancelled = daemon
        .confirmations
        .cancel(ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    assert_eq!(cancelled, Cancelled::Request);
    assert!(daemon.confirmations.is_empty());

    let result = daemon.confirmations.confirm(ticket, alice.id, &daemon.handle).await;
    assert_eq!(result, Err(LifecycleError::ConfirmationExpired));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_confirm_stops_deletion() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let channel = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .unwrap()
        .record
        .primary;

    let ticket = daemon.confirmations.request(alice.clone(), None, Some(channel));
    daemon
        .confirmations
        .confirm(ticket, alice.id, &daemon.handle)
        .await
        .unwrap();

    let cancelled = daemon
        .confirmations
        .cancel(ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    assert_eq!(cancelled, Cancelled::Deletion);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let record = daemon.handle.lookup_owner(alice.id).await.unwrap().unwrap();
    assert_eq!(record.state, ChannelState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_grace_is_too_late() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let channel = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .unwrap()
        .record
        .primary;

    let ticket = daemon.confirmations.request(alice.clone(), None, Some(channel));
    daemon
        .confirmations
        .confirm(ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    let cancelled = daemon
        .confirmations
        .cancel(ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    assert_eq!(cancelled, Cancelled::TooLate);
    assert_eq!(daemon.primary_of(alice.id).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_old_ticket_cannot_cancel_newer_deletion() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let first = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .unwrap()
        .record
        .primary;

    let old_ticket = daemon.confirmations.request(alice.clone(), None, Some(first));
    daemon
        .confirmations
        .confirm(old_ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(daemon.primary_of(alice.id).await, None);

    let second = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .unwrap()
        .record
        .primary;
    let new_ticket = daemon.confirmations.request(alice.clone(), None, Some(second));
    daemon
        .confirmations
        .confirm(new_ticket, alice.id, &daemon.handle)
        .await
        .unwrap();

    let cancelled = daemon
        .confirmations
        .cancel(old_ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    assert_eq!(cancelled, Cancelled::TooLate);
    let record = daemon.handle.lookup_owner(alice.id).await.unwrap().unwrap();
    assert_eq!(record.state, ChannelState::PendingDelete);

    let cancelled = daemon
        .confirmations
        .cancel(new_ticket, alice.id, &daemon.handle)
        .await
        .unwrap();
    assert_eq!(cancelled, Cancelled::Deletion);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(daemon.primary_of(alice.id).await, Some(second));
}

#[tokio::test(start_paused = true)]
async fn test_console_delete_round_trip() {
    let daemon = TestDaemon::spawn();
    daemon.member(10, "alice");
    daemon.run("create 10").await;
    let channel = daemon.primary_of(pvchd::UserId(10)).await.unwrap();

    let reply = daemon.run(&format!("delete 10 --in {channel}")).await;
    let ticket = ticket_from(&reply, 10);

    let reply = daemon.run(&format!("confirm 11 {ticket}")).await;
    assert_eq!(reply, LifecycleError::Unauthorized.user_message());

    let reply = daemon.run(&format!("confirm 10 {ticket}")).await;
    assert!(reply.contains("will be deleted in about 5 seconds"), "{reply}");

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(daemon.run("list").await, "No private channels.");
}
