use chrono::{Duration, Utc};
use selah_model::{
    tally_votes, CommunityKind, MembershipRole, NotificationAction, NotificationKind,
    NotificationStatus, NoteScope, PollConfig, PostBody,
};

use crate::config::ApiConfig;
use crate::error::{is_unique_violation, ApiError};
use crate::store::{NewUser, SignupOutcome, Store};
use crate::AppState;

async fn test_store() -> Store {
    Store::open_in_memory().await.expect("in-memory store")
}

async fn test_state() -> AppState {
    AppState::new(
        ApiConfig::default(),
        test_store().await,
        reqwest::Client::new(),
    )
    .expect("app state")
}

async fn make_user(store: &Store, name: &str) -> i64 {
    let outcome = store
        .create_user(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: format!("$argon2id$fake-{name}"),
            first_name: name.to_string(),
            last_name: "Tester".to_string(),
        })
        .await
        .expect("create user");
    match outcome {
        SignupOutcome::Created(user) => user.id,
        other => panic!("expected created user, got {other:?}"),
    }
}

async fn make_community(store: &Store, owner: i64, header: &str) -> i64 {
    store
        .create_community(
            owner,
            header.to_string(),
            "sub".to_string(),
            "content".to_string(),
            CommunityKind::BibleStudy,
        )
        .await
        .expect("create community")
        .id
}

fn two_option_poll(allow_multiple: bool) -> PostBody {
    PostBody::Poll(PollConfig {
        options: PollConfig::clean_options(vec!["yes".to_string(), "no".to_string()]),
        allow_multiple,
        anonymous: true,
    })
}

#[tokio::test]
async fn data_survives_reopening_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("selah.db");

    let store = Store::open(&db_path).await.expect("open");
    let user_id = make_user(&store, "persisted").await;
    drop(store);

    let store = Store::open(&db_path).await.expect("reopen");
    let user = store
        .get_user(user_id)
        .await
        .expect("lookup")
        .expect("still present");
    assert_eq!(user.username, "persisted");
}

#[tokio::test]
async fn duplicate_signup_conflicts_never_overwrites() {
    let store = test_store().await;
    make_user(&store, "jaylee").await;

    let email_dup = store
        .create_user(NewUser {
            username: "other".to_string(),
            email: "jaylee@example.com".to_string(),
            password_hash: "h".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
        })
        .await
        .expect("call succeeds");
    assert!(matches!(email_dup, SignupOutcome::EmailTaken));

    let username_dup = store
        .create_user(NewUser {
            username: "jaylee".to_string(),
            email: "fresh@example.com".to_string(),
            password_hash: "h".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
        })
        .await
        .expect("call succeeds");
    assert!(matches!(username_dup, SignupOutcome::UsernameTaken));

    let original = store
        .find_user_by_username("jaylee".to_string())
        .await
        .expect("lookup")
        .expect("still present");
    assert_eq!(original.email, "jaylee@example.com");
}

#[tokio::test]
async fn members_count_tracks_membership_rows() {
    let store = test_store().await;
    let owner = make_user(&store, "owner").await;
    let joiner = make_user(&store, "joiner").await;
    let community_id = make_community(&store, owner, "Alpha").await;

    let community = store
        .get_community(community_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(community.members_count, 1);
    assert_eq!(
        store.membership_count(community_id).await.expect("count"),
        1
    );

    let inserted = store
        .add_member(joiner, community_id, MembershipRole::Member)
        .await
        .expect("add");
    assert!(inserted);
    // Duplicate insert is a no-op and must not bump the counter.
    let inserted_again = store
        .add_member(joiner, community_id, MembershipRole::Member)
        .await
        .expect("add again");
    assert!(!inserted_again);

    let community = store
        .get_community(community_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(community.members_count, 2);
    assert_eq!(
        store.membership_count(community_id).await.expect("count"),
        2
    );
}

#[tokio::test]
async fn single_select_poll_keeps_at_most_one_vote() {
    let store = test_store().await;
    let owner = make_user(&store, "pollowner").await;
    let community_id = make_community(&store, owner, "Poll").await;
    let post_id = store
        .create_post(community_id, owner, "Pick one".to_string(), two_option_poll(false))
        .await
        .expect("post");

    // 0 -> counts [1, 0]
    store
        .toggle_vote(post_id, owner, 0, false)
        .await
        .expect("vote 0");
    let state = store.poll_state(post_id, owner).await.expect("state");
    assert_eq!(tally_votes(2, state.all_votes).counts, vec![1, 0]);
    assert_eq!(state.own_picks, vec![0]);

    // 1 -> prior pick cleared, counts [0, 1]
    store
        .toggle_vote(post_id, owner, 1, false)
        .await
        .expect("vote 1");
    let state = store.poll_state(post_id, owner).await.expect("state");
    assert_eq!(tally_votes(2, state.all_votes).counts, vec![0, 1]);
    assert_eq!(state.own_picks, vec![1]);

    // 1 again -> toggle off, counts [0, 0]
    store
        .toggle_vote(post_id, owner, 1, false)
        .await
        .expect("vote 1 again");
    let state = store.poll_state(post_id, owner).await.expect("state");
    assert_eq!(tally_votes(2, state.all_votes).counts, vec![0, 0]);
    assert!(state.own_picks.is_empty());
}

#[tokio::test]
async fn double_toggle_restores_multi_select_baseline() {
    let store = test_store().await;
    let owner = make_user(&store, "multi").await;
    let community_id = make_community(&store, owner, "Multi").await;
    let post_id = store
        .create_post(community_id, owner, "Pick many".to_string(), two_option_poll(true))
        .await
        .expect("post");

    store
        .toggle_vote(post_id, owner, 0, true)
        .await
        .expect("baseline vote");
    let baseline = store.poll_state(post_id, owner).await.expect("state");

    store
        .toggle_vote(post_id, owner, 1, true)
        .await
        .expect("toggle on");
    store
        .toggle_vote(post_id, owner, 1, true)
        .await
        .expect("toggle off");

    let after = store.poll_state(post_id, owner).await.expect("state");
    assert_eq!(
        tally_votes(2, after.all_votes).counts,
        tally_votes(2, baseline.all_votes).counts
    );
    assert_eq!(after.own_picks, baseline.own_picks);
}

#[tokio::test]
async fn join_request_accept_workflow() {
    let state = test_state().await;
    let store = &state.store;
    let owner = make_user(store, "alice").await;
    let requester = make_user(store, "bob").await;
    let community_id = make_community(store, owner, "Genesis Group").await;

    let notification_id = store
        .create_notification(
            owner,
            NotificationKind::CommunityJoinRequest,
            "bob Tester has requested to join Genesis Group.".to_string(),
            Some(community_id),
            Some(requester),
            None,
        )
        .await
        .expect("notification");

    let acted = crate::http::notifications::apply_notification_action(
        &state,
        owner,
        notification_id,
        NotificationAction::Accept,
    )
    .await
    .expect("accept");
    assert_eq!(acted.status, NotificationStatus::Accepted);
    assert!(acted.read_at.is_some());

    // Requester became a Member and the counter moved exactly once.
    let role = store
        .membership_role(requester, community_id)
        .await
        .expect("role lookup");
    assert_eq!(role, Some(MembershipRole::Member));
    let community = store
        .get_community(community_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(community.members_count, 2);

    // Requester got an acceptance notification.
    let inbox = store
        .list_notifications(requester, false)
        .await
        .expect("inbox");
    assert!(inbox
        .iter()
        .any(|n| n.kind == NotificationKind::CommunityInvite
            && n.message.contains("was accepted")));

    // Acting a second time is rejected and stays idempotent.
    let again = crate::http::notifications::apply_notification_action(
        &state,
        owner,
        notification_id,
        NotificationAction::Accept,
    )
    .await;
    assert!(matches!(again, Err(ApiError::Conflict(_))));
    assert_eq!(
        store.membership_count(community_id).await.expect("count"),
        2
    );
}

#[tokio::test]
async fn invite_accept_joins_the_caller() {
    let state = test_state().await;
    let store = &state.store;
    let owner = make_user(store, "carol").await;
    let invitee = make_user(store, "dave").await;
    let community_id = make_community(store, owner, "Psalms Circle").await;

    let notification_id = store
        .create_notification(
            invitee,
            NotificationKind::CommunityInvite,
            "carol Tester has invited you to join Psalms Circle.".to_string(),
            Some(community_id),
            Some(owner),
            None,
        )
        .await
        .expect("notification");

    crate::http::notifications::apply_notification_action(
        &state,
        invitee,
        notification_id,
        NotificationAction::Accept,
    )
    .await
    .expect("accept");

    assert_eq!(
        store
            .membership_role(invitee, community_id)
            .await
            .expect("role"),
        Some(MembershipRole::Member)
    );
}

#[tokio::test]
async fn decline_mutates_no_membership() {
    let state = test_state().await;
    let store = &state.store;
    let owner = make_user(store, "erin").await;
    let requester = make_user(store, "frank").await;
    let community_id = make_community(store, owner, "Acts Readers").await;

    let notification_id = store
        .create_notification(
            owner,
            NotificationKind::CommunityJoinRequest,
            "frank Tester has requested to join Acts Readers.".to_string(),
            Some(community_id),
            Some(requester),
            None,
        )
        .await
        .expect("notification");

    let acted = crate::http::notifications::apply_notification_action(
        &state,
        owner,
        notification_id,
        NotificationAction::Decline,
    )
    .await
    .expect("decline");
    assert_eq!(acted.status, NotificationStatus::Declined);
    assert_eq!(
        store
            .membership_role(requester, community_id)
            .await
            .expect("role"),
        None
    );
    assert_eq!(
        store.membership_count(community_id).await.expect("count"),
        1
    );
}

#[tokio::test]
async fn vanished_community_auto_declines() {
    let state = test_state().await;
    let store = &state.store;
    let owner = make_user(store, "gail").await;
    let requester = make_user(store, "hank").await;

    let notification_id = store
        .create_notification(
            owner,
            NotificationKind::CommunityJoinRequest,
            "hank Tester has requested to join a ghost.".to_string(),
            Some(999_999),
            Some(requester),
            None,
        )
        .await
        .expect("notification");

    let result = crate::http::notifications::apply_notification_action(
        &state,
        owner,
        notification_id,
        NotificationAction::Accept,
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));

    let notification = store
        .get_notification(owner, notification_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(notification.status, NotificationStatus::Declined);
}

#[tokio::test]
async fn note_scope_uniqueness_rejects_duplicates() {
    let store = test_store().await;
    let user = make_user(&store, "annotator").await;
    let scope = NoteScope {
        bible_id: "kor".to_string(),
        chapter_id: "GEN.1".to_string(),
        range_start: None,
        range_end: None,
    };

    store
        .create_note(user, scope.clone(), "first".to_string(), "text".to_string())
        .await
        .expect("first note");
    let dup = store
        .create_note(user, scope.clone(), "second".to_string(), "text".to_string())
        .await;
    match dup {
        Err(err) => assert!(is_unique_violation(&err)),
        Ok(_) => panic!("duplicate scope must conflict"),
    }

    // A ranged note on the same chapter is a different scope.
    let ranged = NoteScope {
        range_start: Some(1),
        range_end: Some(3),
        ..scope.clone()
    };
    store
        .create_note(user, ranged.clone(), "ranged".to_string(), "text".to_string())
        .await
        .expect("ranged note");

    let latest = store
        .latest_note_for_scope(user, ranged)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(latest.title, "ranged");
    let chapter_latest = store
        .latest_note_for_scope(user, scope)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(chapter_latest.title, "first");
}

#[tokio::test]
async fn notes_are_scoped_per_user() {
    let store = test_store().await;
    let alice = make_user(&store, "alice2").await;
    let bob = make_user(&store, "bob2").await;
    let scope = NoteScope {
        bible_id: "kor".to_string(),
        chapter_id: "EXO.3".to_string(),
        range_start: None,
        range_end: None,
    };

    let note = store
        .create_note(alice, scope.clone(), "mine".to_string(), "t".to_string())
        .await
        .expect("note");
    // Same scope for another user is fine.
    store
        .create_note(bob, scope, "theirs".to_string(), "t".to_string())
        .await
        .expect("note");

    assert!(store
        .get_note(bob, note.id)
        .await
        .expect("lookup")
        .is_none());
    assert!(!store.delete_note(bob, note.id).await.expect("delete"));
    assert!(store
        .get_note(alice, note.id)
        .await
        .expect("lookup")
        .is_some());
}

#[tokio::test]
async fn discover_small_bucket_stays_in_bounds() {
    let store = test_store().await;
    let owner = make_user(&store, "disc").await;
    let friend = make_user(&store, "disc2").await;
    let solo = make_community(&store, owner, "Solo").await;
    let duo = make_community(&store, owner, "Duo").await;
    store
        .add_member(friend, duo, MembershipRole::Member)
        .await
        .expect("join");

    let results = store
        .discover_communities(crate::store::DiscoverFilter {
            size: Some(selah_model::SizeBucket::Small),
            ..Default::default()
        })
        .await
        .expect("discover");
    assert!(results
        .iter()
        .all(|c| (2..=10).contains(&c.members_count)));
    assert!(results.iter().any(|c| c.id == duo));
    assert!(!results.iter().any(|c| c.id == solo));
}

#[tokio::test]
async fn discover_excludes_joined_communities() {
    let store = test_store().await;
    let owner = make_user(&store, "owner3").await;
    let viewer = make_user(&store, "viewer3").await;
    let mine = make_community(&store, owner, "Mine").await;
    let joined = make_community(&store, owner, "Joined").await;
    store
        .add_member(viewer, joined, MembershipRole::Member)
        .await
        .expect("join");

    let results = store
        .discover_communities(crate::store::DiscoverFilter {
            exclude_user: Some(viewer),
            ..Default::default()
        })
        .await
        .expect("discover");
    assert!(results.iter().any(|c| c.id == mine));
    assert!(!results.iter().any(|c| c.id == joined));
}

#[tokio::test]
async fn sessions_expire_and_slide() {
    let store = test_store().await;
    let user = make_user(&store, "sess").await;
    let ttl = Duration::hours(2);

    store
        .create_session("dead".to_string(), user, Utc::now() - Duration::minutes(1))
        .await
        .expect("session");
    assert_eq!(
        store
            .resolve_session("dead".to_string(), ttl)
            .await
            .expect("resolve"),
        None
    );
    // The expired row was removed, not just ignored.
    assert_eq!(
        store
            .resolve_session("dead".to_string(), ttl)
            .await
            .expect("resolve"),
        None
    );

    store
        .create_session("live".to_string(), user, Utc::now() + ttl)
        .await
        .expect("session");
    assert_eq!(
        store
            .resolve_session("live".to_string(), ttl)
            .await
            .expect("resolve"),
        Some(user)
    );

    store
        .delete_sessions_for_user(user)
        .await
        .expect("revoke all");
    assert_eq!(
        store
            .resolve_session("live".to_string(), ttl)
            .await
            .expect("resolve"),
        None
    );
}

#[tokio::test]
async fn new_post_fans_out_to_managers_only() {
    let state = test_state().await;
    let store = &state.store;
    let owner = make_user(store, "fanout-owner").await;
    let leader = make_user(store, "fanout-leader").await;
    let member = make_user(store, "fanout-member").await;
    let community_id = make_community(store, owner, "Fanout").await;
    store
        .add_member(leader, community_id, MembershipRole::Leader)
        .await
        .expect("leader");
    store
        .add_member(member, community_id, MembershipRole::Member)
        .await
        .expect("member");

    let community = store
        .get_community(community_id)
        .await
        .expect("get")
        .expect("present");
    let post_id = store
        .create_post(
            community_id,
            owner,
            "News".to_string(),
            PostBody::Text {
                kind: selah_model::PostKind::General,
                body: "hello".to_string(),
            },
        )
        .await
        .expect("post");
    crate::http::community::fan_out_new_post(&state, &community, post_id, owner).await;

    // Author excluded, plain members excluded, leader notified.
    assert!(store
        .list_notifications(owner, false)
        .await
        .expect("inbox")
        .is_empty());
    assert!(store
        .list_notifications(member, false)
        .await
        .expect("inbox")
        .is_empty());
    let leader_inbox = store
        .list_notifications(leader, false)
        .await
        .expect("inbox");
    assert_eq!(leader_inbox.len(), 1);
    assert_eq!(leader_inbox[0].kind, NotificationKind::CommunityNewPost);
    assert_eq!(leader_inbox[0].post_id, Some(post_id));
}

#[tokio::test]
async fn reply_updates_counters_and_threads() {
    let store = test_store().await;
    let owner = make_user(&store, "replier").await;
    let community_id = make_community(&store, owner, "Replies").await;
    let post_id = store
        .create_post(
            community_id,
            owner,
            "Thread".to_string(),
            PostBody::Text {
                kind: selah_model::PostKind::Questions,
                body: "why?".to_string(),
            },
        )
        .await
        .expect("post");

    let root = store
        .create_reply(post_id, None, owner, "because".to_string())
        .await
        .expect("reply");
    store
        .create_reply(post_id, Some(root), owner, "more".to_string())
        .await
        .expect("child reply");

    let post = store
        .get_post(post_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(post.post.reply_count, 2);
    assert!(post.post.last_reply_at.is_some());

    let replies = store.list_replies(post_id).await.expect("list");
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].reply.parent_id, None);
    assert_eq!(replies[1].reply.parent_id, Some(root));
    assert_eq!(
        store.reply_post_id(root).await.expect("lookup"),
        Some(post_id)
    );
}

#[tokio::test]
async fn notification_list_honors_unread_filter_and_deletes_report() {
    let store = test_store().await;
    let user = make_user(&store, "inboxer").await;

    assert_eq!(
        store.delete_all_notifications(user).await.expect("delete"),
        0
    );

    let first = store
        .create_notification(
            user,
            NotificationKind::CommunityNewPost,
            "one".to_string(),
            None,
            None,
            None,
        )
        .await
        .expect("n1");
    store
        .create_notification(
            user,
            NotificationKind::CommunityNewPost,
            "two".to_string(),
            None,
            None,
            None,
        )
        .await
        .expect("n2");

    assert!(store
        .mark_notification_read(user, first)
        .await
        .expect("read"));
    // Already-read rows are not re-stamped.
    assert!(!store
        .mark_notification_read(user, first)
        .await
        .expect("read again"));

    let unread = store.list_notifications(user, true).await.expect("unread");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].message, "two");

    assert_eq!(
        store
            .mark_all_notifications_read(user)
            .await
            .expect("read all"),
        1
    );
    assert_eq!(
        store.delete_all_notifications(user).await.expect("delete"),
        2
    );
}
