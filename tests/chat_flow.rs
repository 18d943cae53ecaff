mod common;

use common::{add_profile, count, pool};
use compasschat::contacts;
use compasschat::db::Role;
use compasschat::requests::{self, Decision};
use compasschat::rooms::{msg, registry};
use compasschat::ChatError;

#[tokio::test]
async fn self_request_is_rejected_even_with_whitespace_aliases() {
    let pool = pool().await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let err = requests::submit_request(&mut conn, " m1 ", "m1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::SelfRequest));
    assert_eq!(count(&pool, "chat_requests").await, 0);
}

#[tokio::test]
async fn submit_requires_known_target() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;

    let mut conn = pool.acquire().await.unwrap();
    let err = requests::submit_request(&mut conn, "s1", "ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_pending_request_is_rejected() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    requests::submit_request(&mut conn, "s1", "m1", Some("hello"))
        .await
        .unwrap();
    let err = requests::submit_request(&mut conn, "s1", "m1", Some("hello again"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::DuplicateRequest));
    assert_eq!(count(&pool, "chat_requests").await, 1);
}

#[tokio::test]
async fn pending_requests_are_annotated_from_profiles() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    requests::submit_request(&mut conn, "s1", "m1", Some("Hi"))
        .await
        .unwrap();

    let pending = requests::list_pending(&mut conn, "m1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requester_id, "s1");
    assert_eq!(pending[0].requester_name, "Sam");
    assert_eq!(pending[0].requester_role, Some(Role::Student));
    assert_eq!(pending[0].requester_ref.as_deref(), Some("REF-s1"));
    assert_eq!(pending[0].contact_email.as_deref(), Some("s1@example.edu"));
    assert_eq!(pending[0].message.as_deref(), Some("Hi"));

    // Nothing pending for the requester themselves.
    let none = requests::list_pending(&mut conn, "s1").await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn pending_listing_survives_missing_requester_profile() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    requests::submit_request(&mut conn, "s1", "m1", Some("Hi"))
        .await
        .unwrap();

    // The profile collaborator may lose the requester after submission;
    // the request still has to show up, under the raw id.
    sqlx::query("DELETE FROM profiles WHERE user_id = 's1'")
        .execute(&pool)
        .await
        .unwrap();

    let pending = requests::list_pending(&mut conn, "m1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requester_name, "s1");
    assert_eq!(pending[0].requester_role, None);
    assert_eq!(pending[0].requester_ref, None);
    assert_eq!(pending[0].contact_email, None);
    assert_eq!(pending[0].message.as_deref(), Some("Hi"));
}

#[tokio::test]
async fn accept_seeds_room_and_counts_seed_as_unread() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let request_id = requests::submit_request(&mut conn, "s1", "m1", Some("Hi"))
        .await
        .unwrap();
    drop(conn);

    let room_id = requests::resolve(&pool, request_id, Decision::Accepted)
        .await
        .unwrap()
        .expect("accept returns the new room");

    // Request is gone, exactly one room with both members exists.
    assert_eq!(count(&pool, "chat_requests").await, 0);
    assert_eq!(count(&pool, "rooms").await, 1);
    assert_eq!(count(&pool, "room_members").await, 2);

    let mut conn = pool.acquire().await.unwrap();
    let history = msg::list_by_room(&mut conn, room_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "Hi");
    assert_eq!(history[0].sender_id, "s1");
    assert_eq!(history[0].read_by, vec!["s1".to_owned()]);

    // Seed policy: the accepting party starts with one unread.
    let counts = registry::unread_counts(&mut conn, room_id).await.unwrap();
    let unread_of = |id: &str| counts.iter().find(|c| c.user_id == id).unwrap().unread;
    assert_eq!(unread_of("m1"), 1);
    assert_eq!(unread_of("s1"), 0);

    // Room creation seeded the contact index both ways.
    assert_eq!(contacts::excluded_set(&mut conn, "s1").await.unwrap(), vec!["m1"]);
    assert_eq!(contacts::excluded_set(&mut conn, "m1").await.unwrap(), vec!["s1"]);

    // And the accepter's room list resolves the counterpart's name.
    let rooms = registry::list_rooms_for(&mut conn, "m1").await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].chat_room_id, room_id.to_string());
    assert_eq!(rooms[0].participant_name, "Sam");
    assert_eq!(rooms[0].unread, 1);
}

#[tokio::test]
async fn accept_uses_default_greeting_when_request_had_no_message() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let request_id = requests::submit_request(&mut conn, "s1", "m1", None)
        .await
        .unwrap();
    drop(conn);

    let room_id = requests::resolve(&pool, request_id, Decision::Accepted)
        .await
        .unwrap()
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let history = msg::list_by_room(&mut conn, room_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].message.is_empty());
}

#[tokio::test]
async fn double_resolve_fails_and_creates_no_second_room() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let request_id = requests::submit_request(&mut conn, "s1", "m1", None)
        .await
        .unwrap();
    drop(conn);

    requests::resolve(&pool, request_id, Decision::Accepted)
        .await
        .unwrap();
    let err = requests::resolve(&pool, request_id, Decision::Accepted)
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::NotFound(_)));
    assert_eq!(count(&pool, "rooms").await, 1);
}

#[tokio::test]
async fn reject_deletes_request_without_creating_a_room() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let request_id = requests::submit_request(&mut conn, "s1", "m1", None)
        .await
        .unwrap();
    drop(conn);

    let room = requests::resolve(&pool, request_id, Decision::Rejected)
        .await
        .unwrap();
    assert!(room.is_none());
    assert_eq!(count(&pool, "chat_requests").await, 0);
    assert_eq!(count(&pool, "rooms").await, 0);

    // After rejection the pair may try again.
    let mut conn = pool.acquire().await.unwrap();
    requests::submit_request(&mut conn, "s1", "m1", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn unread_count_tracks_messages_since_last_read() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let room_id = registry::create_room(&mut conn, "s1", Role::Student, "m1", Role::Mentor)
        .await
        .unwrap();

    for i in 0..3 {
        msg::append(&mut conn, room_id, "s1", &format!("msg {i}")).await.unwrap();
        registry::increment_unread(&mut conn, room_id, "s1").await.unwrap();
    }

    let counts = registry::unread_counts(&mut conn, room_id).await.unwrap();
    let unread_of = |id: &str| counts.iter().find(|c| c.user_id == id).unwrap().unread;
    assert_eq!(unread_of("m1"), 3);
    assert_eq!(unread_of("s1"), 0);

    // History comes back in send order.
    let history = msg::list_by_room(&mut conn, room_id).await.unwrap();
    let bodies: Vec<_> = history.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(bodies, vec!["msg 0", "msg 1", "msg 2"]);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // Read acknowledgement: counter to zero and no foreign message left
    // without the reader in readBy.
    registry::reset_unread(&mut conn, room_id, "m1").await.unwrap();
    msg::mark_read(&mut conn, room_id, "m1").await.unwrap();

    let counts = registry::unread_counts(&mut conn, room_id).await.unwrap();
    assert_eq!(counts.iter().find(|c| c.user_id == "m1").unwrap().unread, 0);

    let history = msg::list_by_room(&mut conn, room_id).await.unwrap();
    assert!(history
        .iter()
        .filter(|m| m.sender_id != "m1")
        .all(|m| m.read_by.contains(&"m1".to_owned())));

    // readBy only grows: a second acknowledgement adds nothing.
    let newly = msg::mark_read(&mut conn, room_id, "m1").await.unwrap();
    assert_eq!(newly, 0);
}

#[tokio::test]
async fn append_requires_room_membership() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    let room_id = registry::create_room(&mut conn, "s1", Role::Student, "m1", Role::Mentor)
        .await
        .unwrap();

    let err = msg::append(&mut conn, room_id, "stranger", "hey")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
    assert_eq!(count(&pool, "messages").await, 0);

    let err = msg::append(&mut conn, uuid::Uuid::now_v7(), "s1", "hey")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[tokio::test]
async fn contact_rebuild_is_idempotent_and_matches_rooms() {
    let pool = pool().await;
    add_profile(&pool, "s1", Role::Student, "Sam").await;
    add_profile(&pool, "s2", Role::Student, "Sol").await;
    add_profile(&pool, "m1", Role::Mentor, "Mina").await;

    let mut conn = pool.acquire().await.unwrap();
    registry::create_room(&mut conn, "s1", Role::Student, "m1", Role::Mentor)
        .await
        .unwrap();
    registry::create_room(&mut conn, "s2", Role::Student, "m1", Role::Mentor)
        .await
        .unwrap();

    // Poison the derived index; room membership stays the ground truth.
    sqlx::query("INSERT INTO contacts (user_id, contact_id) VALUES ('m1', 'nobody')")
        .execute(&pool)
        .await
        .unwrap();

    let first = contacts::rebuild_from_rooms(&mut conn).await.unwrap();
    let after_first = contacts::excluded_set(&mut conn, "m1").await.unwrap();
    assert_eq!(after_first, vec!["s1", "s2"]);

    let second = contacts::rebuild_from_rooms(&mut conn).await.unwrap();
    let after_second = contacts::excluded_set(&mut conn, "m1").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(after_first, after_second);

    assert_eq!(contacts::excluded_set(&mut conn, "s1").await.unwrap(), vec!["m1"]);
    assert_eq!(contacts::excluded_set(&mut conn, "s2").await.unwrap(), vec!["m1"]);
}

#[tokio::test]
async fn record_contact_is_idempotent() {
    let pool = pool().await;
    let mut conn = pool.acquire().await.unwrap();

    contacts::record_contact(&mut conn, "a", "b").await.unwrap();
    contacts::record_contact(&mut conn, "a", "b").await.unwrap();
    contacts::record_contact(&mut conn, "b", "a").await.unwrap();

    assert_eq!(count(&pool, "contacts").await, 2);
}
