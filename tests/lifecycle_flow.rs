//! Integration tests for create / invite / kick / leave / extend.

mod common;

use chrono::TimeDelta;
use common::TestDaemon;
use common::daemon::{BOT, MODERATOR_ROLE};
use pvchd::LifecycleError;
use pvchd::platform::{ChannelKind, Member, UserId};

#[tokio::test]
async fn test_create_grants_owner_and_invitees() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");

    let outcome = daemon
        .handle
        .handle_create(alice.clone(), vec![bob.clone()], None)
        .await
        .expect("create succeeds");

    let channel = outcome.record.primary;
    assert_eq!(outcome.record.expires_at, common::t0() + TimeDelta::hours(24));
    assert_eq!(outcome.invites.success, vec![bob.clone()]);
    assert!(daemon.granted(channel, alice.id));
    assert!(daemon.granted(channel, bob.id));
    assert!(daemon.granted(channel, BOT));

    let messages = daemon.platform.messages(channel);
    assert_eq!(messages.len(), 2, "welcome then invite result");
    assert!(messages[0].contains("Welcome"));
    assert!(messages[0].contains("Test server guidelines"));
    assert!(messages[1].contains("bob"));
}

#[tokio::test]
async fn test_second_create_is_rejected() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");

    let first = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .unwrap();
    let second = daemon.handle.handle_create(alice, vec![], None).await;

    assert_eq!(
        second,
        Err(LifecycleError::AlreadyExists {
            channel: first.record.primary
        })
    );
    assert_eq!(daemon.platform.channel_count(), 1);
}

#[tokio::test]
async fn test_stale_record_is_purged_on_create() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");

    let first = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .unwrap();
    // A moderator removed the channel behind the daemon's back.
    daemon.platform.vanish(first.record.primary);

    let second = daemon
        .handle
        .handle_create(alice.clone(), vec![], None)
        .await
        .expect("stale record does not block creation");

    assert_ne!(second.record.primary, first.record.primary);
    assert_eq!(daemon.primary_of(alice.id).await, Some(second.record.primary));
    assert_eq!(
        daemon.handle.lookup_channel(first.record.primary).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_create_from_private_channel_is_rejected() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");

    let created = daemon
        .handle
        .handle_create(alice, vec![], None)
        .await
        .unwrap();
    let result = daemon
        .handle
        .handle_create(bob, vec![], Some(created.record.primary))
        .await;

    assert_eq!(result, Err(LifecycleError::WrongChannel));
}

#[tokio::test]
async fn test_voice_pair_is_created_and_removed_together() {
    let daemon = TestDaemon::with_lifecycle("with_voice = true");
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");

    let created = daemon
        .handle
        .handle_create(alice.clone(), vec![bob.clone()], None)
        .await
        .unwrap();
    let voice = created.record.secondary.expect("voice channel provisioned");

    assert_eq!(
        daemon.platform.channel(voice).map(|c| c.spec.kind),
        Some(ChannelKind::Voice)
    );
    assert!(daemon.granted(voice, bob.id));
    assert_eq!(
        daemon.handle.lookup_channel(voice).await.unwrap().map(|r| r.owner),
        Some(alice.id)
    );

    let report = daemon.handle.sweep(daemon.at(TimeDelta::hours(24))).await.unwrap();
    assert_eq!(report.deleted, vec![alice.id]);
    assert_eq!(daemon.platform.channel_count(), 0);
}

#[tokio::test]
async fn test_kick_ignores_owner_bots_and_moderators() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");
    let robot = daemon.add(Member::new(UserId(12), "robot").bot());
    let moderator = daemon.add(Member::new(UserId(13), "mod").with_role(MODERATOR_ROLE));

    let created = daemon
        .handle
        .handle_create(alice.clone(), vec![bob.clone()], None)
        .await
        .unwrap();
    let channel = created.record.primary;

    let outcome = daemon
        .handle
        .handle_kick(
            alice.id,
            vec![alice.clone(), robot.clone(), moderator.clone()],
            Some(channel),
        )
        .await
        .unwrap();

    assert!(outcome.success.is_empty());
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.ignored, vec![alice.clone(), robot, moderator]);
    assert!(daemon.granted(channel, alice.id));

    let outcome = daemon
        .handle
        .handle_kick(alice.id, vec![bob.clone()], Some(channel))
        .await
        .unwrap();
    assert_eq!(outcome.success, vec![bob.clone()]);
    assert!(!daemon.granted(channel, bob.id));
}

#[tokio::test]
async fn test_kick_outside_own_channel_is_rejected() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");
    daemon.handle.handle_create(alice.clone(), vec![], None).await.unwrap();
    let bobs = daemon.handle.handle_create(bob.clone(), vec![], None).await.unwrap();

    let result = daemon
        .handle
        .handle_kick(alice.id, vec![bob], Some(bobs.record.primary))
        .await;
    assert_eq!(result, Err(LifecycleError::WrongChannel));
}

#[tokio::test]
async fn test_kick_without_origin_is_rejected() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");
    let channel = daemon
        .handle
        .handle_create(alice.clone(), vec![bob.clone()], None)
        .await
        .unwrap()
        .record
        .primary;

    let result = daemon.handle.handle_kick(alice.id, vec![bob.clone()], None).await;
    assert_eq!(result, Err(LifecycleError::WrongChannel));
    assert!(daemon.granted(channel, bob.id));

    let reply = daemon.run("kick 10 11").await;
    assert_eq!(reply, LifecycleError::WrongChannel.user_message());
    assert!(daemon.granted(channel, bob.id));
}

#[tokio::test]
async fn test_invite_partitions_failures() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");
    let carol = daemon.member(12, "carol");
    daemon.platform.fail_permissions_for(carol.id);

    let created = daemon.handle.handle_create(alice.clone(), vec![], None).await.unwrap();
    let outcome = daemon
        .handle
        .handle_invite(alice.id, vec![bob.clone(), carol.clone(), bob.clone()], None)
        .await
        .unwrap();

    assert_eq!(outcome.success, vec![bob.clone()]);
    assert_eq!(outcome.failed, vec![carol]);
    assert!(daemon.granted(created.record.primary, bob.id));
}

#[tokio::test]
async fn test_invite_without_channel_is_not_found() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");

    let result = daemon.handle.handle_invite(alice.id, vec![bob], None).await;
    assert_eq!(result, Err(LifecycleError::NotFound));
}

#[tokio::test]
async fn test_member_can_leave_but_owner_cannot() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    let bob = daemon.member(11, "bob");
    let created = daemon
        .handle
        .handle_create(alice.clone(), vec![bob.clone()], None)
        .await
        .unwrap();
    let channel = created.record.primary;

    let owner = daemon.handle.handle_leave(bob.clone(), channel).await.unwrap();
    assert_eq!(owner, alice.id);
    assert!(!daemon.granted(channel, bob.id));
    assert!(
        daemon
            .platform
            .messages(channel)
            .last()
            .is_some_and(|m| m.contains("bob has left"))
    );

    let result = daemon.handle.handle_leave(alice, channel).await;
    assert_eq!(result, Err(LifecycleError::OwnerCannotLeave));
}

#[tokio::test]
async fn test_extend_only_inside_final_window() {
    let daemon = TestDaemon::spawn();
    let alice = daemon.member(10, "alice");
    daemon.handle.handle_create(alice.clone(), vec![], None).await.unwrap();

    let early = daemon.handle.handle_extend(alice.id, daemon.at(TimeDelta::hours(10))).await;
    assert_eq!(
        early,
        Err(LifecycleError::TooEarly {
            eligible_at: common::t0() + TimeDelta::hours(18)
        })
    );

    let outcome = daemon
        .handle
        .handle_extend(alice.id, daemon.at(TimeDelta::hours(19)))
        .await
        .unwrap();
    assert_eq!(outcome.previous, common::t0() + TimeDelta::hours(24));
    assert_eq!(outcome.expires_at, common::t0() + TimeDelta::hours(25));
}

#[tokio::test]
async fn test_console_commands_drive_the_lifecycle() {
    let daemon = TestDaemon::spawn();
    daemon.member(10, "alice");
    daemon.member(11, "bob");

    let reply = daemon.run("create 10 11").await;
    assert!(reply.starts_with("Created private channel"), "{reply}");

    let reply = daemon.run("create 10").await;
    assert!(reply.contains("already exists"), "{reply}");

    let reply = daemon.run("list").await;
    assert!(reply.starts_with("1 private channel(s):"), "{reply}");

    let reply = daemon.run("extend 10").await;
    assert!(reply.contains("cannot be extended yet"), "{reply}");

    let reply = daemon.run("frobnicate").await;
    assert!(reply.starts_with("Supported commands:"));
}
