//! Integration tests for message exchange, loading timing and history.

mod common;

use std::sync::Arc;
use std::time::Duration;

use civic_api::{ReplyInsight, Sender, VerificationDetails};
use civic_session::{
    ChatSession, FALLBACK_REPLY, Identity, LaunchKind, LoadingState, MemorySessionStore,
    Provenance, ResetLatch, SendRejected, SessionError, SessionKey, SessionStore,
};
use common::{CONVERSATION_ID, Call, FakeBackend, SERVER_GUEST_ID};
use tokio::time::{Instant, sleep};

type Session = ChatSession<FakeBackend, MemorySessionStore>;

fn session_with(backend: FakeBackend) -> (Arc<Session>, Arc<FakeBackend>, Arc<MemorySessionStore>) {
    let backend = Arc::new(backend);
    let store = Arc::new(MemorySessionStore::new());
    let session = ChatSession::new(Arc::clone(&backend), Arc::clone(&store), ResetLatch::new());
    (Arc::new(session), backend, store)
}

fn assert_near(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn send_appends_user_then_assistant() {
    let (session, _, _) = session_with(FakeBackend::new());

    let reply = session.send("When is trash pickup?").await.unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender(), Sender::User);
    assert_eq!(messages[0].text(), "When is trash pickup?");
    assert_eq!(messages[1].sender(), Sender::Assistant);
    assert_eq!(messages[1].text(), "Answer to: When is trash pickup?");
    assert_eq!(reply, messages[1]);
    assert_eq!(session.loading_state(), LoadingState::Done);
}

#[tokio::test(start_paused = true)]
async fn blank_input_is_rejected_without_state_change() {
    let (session, backend, _) = session_with(FakeBackend::new());

    assert_eq!(session.send("   \n").await, Err(SendRejected::EmptyInput));

    assert!(session.messages().is_empty());
    assert!(session.history().is_empty());
    assert_eq!(session.loading_state(), LoadingState::Idle);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_send_during_cycle_is_rejected() {
    let (session, backend, _) = session_with(FakeBackend::with_delay(Duration::from_millis(200)));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send("first").await })
    };
    tokio::task::yield_now().await;
    assert_eq!(session.loading_state(), LoadingState::Processing);

    assert_eq!(session.send("second").await, Err(SendRejected::InFlight));

    first.await.unwrap().unwrap();
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.history(), vec!["first"]);
    assert_eq!(backend.count(|c| matches!(c, Call::Guest { .. })), 1);

    // Once done, the next send is accepted.
    session.send("third").await.unwrap();
    assert_eq!(session.messages().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn fast_reply_is_held_until_floor() {
    let (session, _, _) = session_with(FakeBackend::with_delay(Duration::from_millis(100)));
    let start = Instant::now();

    let send = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send("hello").await })
    };

    sleep(Duration::from_millis(850)).await;
    assert_eq!(session.messages().len(), 1, "reply must not be visible before the floor");
    assert_eq!(session.loading_state(), LoadingState::Generating);

    send.await.unwrap().unwrap();
    assert_near(start.elapsed(), 900);
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.loading_state(), LoadingState::Done);
}

#[tokio::test(start_paused = true)]
async fn slow_reply_is_revealed_on_arrival() {
    let (session, _, _) = session_with(FakeBackend::with_delay(Duration::from_millis(1500)));
    let start = Instant::now();

    session.send("hello").await.unwrap();

    assert_near(start.elapsed(), 1500);
    assert_eq!(session.loading_state(), LoadingState::Done);
}

#[tokio::test(start_paused = true)]
async fn phases_are_published_in_order() {
    let (session, _, _) = session_with(FakeBackend::with_delay(Duration::from_millis(50)));
    let mut rx = session.subscribe_loading();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            seen.push(state);
            if state == LoadingState::Done {
                break;
            }
        }
        seen
    });

    session.send("hello").await.unwrap();

    assert_eq!(
        observer.await.unwrap(),
        vec![
            LoadingState::Processing,
            LoadingState::Thinking,
            LoadingState::Generating,
            LoadingState::Done,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failure_becomes_fallback_reply() {
    let backend = FakeBackend::new();
    backend.fail_chat(true);
    let (session, _, store) = session_with(backend);

    let reply = session.send("hello").await.unwrap();

    assert_eq!(reply.text(), FALLBACK_REPLY);
    assert_eq!(reply.sender(), Sender::Assistant);
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.loading_state(), LoadingState::Done);
    assert_eq!(store.get(SessionKey::GuestId).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn guest_id_is_adopted_and_reused() {
    let (session, backend, store) = session_with(FakeBackend::new());

    session.send("first").await.unwrap();
    assert_eq!(
        store.get(SessionKey::GuestId).unwrap().as_deref(),
        Some(SERVER_GUEST_ID)
    );

    session.send("second").await.unwrap();

    assert_eq!(
        backend.calls(),
        vec![
            Call::Guest {
                message: "first".to_string(),
                guest_id: None
            },
            Call::Guest {
                message: "second".to_string(),
                guest_id: Some(SERVER_GUEST_ID.to_string())
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn authenticated_send_creates_and_reconciles_conversation() {
    let (session, backend, store) = session_with(FakeBackend::new());
    store.set(SessionKey::Credential, "tok").unwrap();
    assert!(session.identity().is_authenticated());

    session.send("Is the pool open?").await.unwrap();
    session.send("And on Sunday?").await.unwrap();

    assert_eq!(session.conversation_id().as_deref(), Some(CONVERSATION_ID));
    assert_eq!(backend.count(|c| *c == Call::Create), 1);
    assert_eq!(
        backend.count(|c| matches!(c, Call::Get { id } if id == CONVERSATION_ID)),
        2
    );

    let messages = session.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages.iter().all(|m| m.provenance() == Provenance::Confirmed));
    assert_eq!(messages[2].text(), "And on Sunday?");
}

#[tokio::test(start_paused = true)]
async fn reply_insight_survives_conversation_refresh() {
    let insight = ReplyInsight {
        insight: Some("Permits take 5 days".to_string()),
        categories: vec!["permits".to_string()],
        sentiment: Some("neutral".to_string()),
        emotion: None,
    };
    let (session, backend, store) = session_with(FakeBackend::new());
    backend.set_insight(insight.clone());
    store.set(SessionKey::Credential, "tok").unwrap();

    let reply = session.send("How long do permits take?").await.unwrap();
    assert_eq!(reply.insight(), Some(&insight));

    let messages = session.messages();
    assert_eq!(messages[1].provenance(), Provenance::Confirmed);
    assert_eq!(messages[1].insight(), Some(&insight));

    session.send("Thanks").await.unwrap();
    let messages = session.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].insight(), Some(&insight));
    assert_eq!(messages[3].insight(), Some(&insight));
}

#[tokio::test(start_paused = true)]
async fn history_round_trip_through_session() {
    let (session, _, _) = session_with(FakeBackend::new());
    for text in ["t1", "t2", "t3"] {
        session.send(text).await.unwrap();
    }

    let ups: Vec<String> = (0..3).filter_map(|_| session.history_up("unsent")).collect();
    assert_eq!(ups, vec!["t3", "t2", "t1"]);

    let downs: Vec<String> = (0..3).filter_map(|_| session.history_down()).collect();
    assert_eq!(downs, vec!["t2", "t3", "unsent"]);
    assert_eq!(session.history_cursor(), None);
}

#[tokio::test]
async fn reload_starts_fresh_guest_conversation() {
    let backend = Arc::new(FakeBackend::new());
    let store = Arc::new(MemorySessionStore::new());
    store.set(SessionKey::GuestId, "guest-old").unwrap();

    let session = ChatSession::launch(
        Arc::clone(&backend),
        Arc::clone(&store),
        ResetLatch::new(),
        LaunchKind::Navigate,
    );
    assert_eq!(
        session.identity(),
        Identity::Guest {
            guest_id: Some("guest-old".to_string())
        }
    );

    let session = ChatSession::launch(backend, store, ResetLatch::new(), LaunchKind::Reload);
    assert_eq!(session.identity(), Identity::Guest { guest_id: None });
}

#[tokio::test(start_paused = true)]
async fn new_guest_conversation_clears_everything() {
    let (session, backend, store) = session_with(FakeBackend::new());
    session.send("hello").await.unwrap();

    session.new_guest_conversation();

    assert!(session.messages().is_empty());
    assert!(session.history().is_empty());
    assert_eq!(session.loading_state(), LoadingState::Idle);
    assert_eq!(store.get(SessionKey::GuestId).unwrap(), None);

    session.send("again").await.unwrap();
    assert_eq!(
        backend.calls().last(),
        Some(&Call::Guest {
            message: "again".to_string(),
            guest_id: None
        })
    );
}

#[tokio::test]
async fn failed_new_conversation_fires_reset_once() {
    let backend = FakeBackend::new();
    backend.fail_create(true);
    let (session, _, store) = session_with(backend);
    store.set(SessionKey::Credential, "tok").unwrap();

    assert_eq!(session.new_conversation().await, None);
    assert!(session.reset_latch().is_triggered());
    assert_eq!(session.conversation_id(), None);

    // A second failure does not fire again.
    assert!(!session.reset_latch().trigger());
}

#[tokio::test]
async fn new_conversation_selects_created_one() {
    let (session, _, store) = session_with(FakeBackend::new());
    store.set(SessionKey::Credential, "tok").unwrap();
    store.set(SessionKey::GuestId, "guest-old").unwrap();

    assert_eq!(session.new_conversation().await.as_deref(), Some(CONVERSATION_ID));
    assert_eq!(session.conversation_id().as_deref(), Some(CONVERSATION_ID));
    assert_eq!(store.get(SessionKey::GuestId).unwrap(), None);
    assert!(!session.reset_latch().is_triggered());
}

#[tokio::test]
async fn login_and_logout_switch_identity() {
    let (session, backend, store) = session_with(FakeBackend::new());

    session.login("ada", "secret").await.unwrap();
    assert_eq!(
        session.identity(),
        Identity::Authenticated {
            token: "tok-new".to_string()
        }
    );
    assert_eq!(
        backend.calls(),
        vec![Call::Login {
            username: "ada".to_string()
        }]
    );

    session.logout();
    assert!(!session.identity().is_authenticated());
    assert_eq!(store.get(SessionKey::Credential).unwrap(), None);
}

#[tokio::test]
async fn open_conversation_requires_credential() {
    let (session, _, store) = session_with(FakeBackend::new());
    assert!(session.open_conversation(Some(CONVERSATION_ID)).await.is_err());

    store.set(SessionKey::Credential, "tok").unwrap();
    session.open_conversation(Some(CONVERSATION_ID)).await.unwrap();
    assert_eq!(session.conversation_id().as_deref(), Some(CONVERSATION_ID));

    session.open_conversation(None).await.unwrap();
    assert_eq!(session.conversation_id(), None);
}

#[tokio::test]
async fn register_signs_into_new_account() {
    let (session, backend, _) = session_with(FakeBackend::new());

    let notice = session.register("ada", "secret").await.unwrap();

    assert!(notice.starts_with("User created"));
    assert_eq!(
        backend.calls(),
        vec![
            Call::Register {
                username: "ada".to_string()
            },
            Call::Login {
                username: "ada".to_string()
            },
        ]
    );
    assert!(session.identity().is_authenticated());
}

#[tokio::test]
async fn verification_requires_credential() {
    let (session, backend, store) = session_with(FakeBackend::new());
    let details = VerificationDetails {
        city: Some("Springfield".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        session.request_verification(&details).await,
        Err(SessionError::NotAuthenticated)
    ));
    assert!(matches!(
        session.verify_otp("123456").await,
        Err(SessionError::NotAuthenticated)
    ));
    assert!(backend.calls().is_empty());

    store.set(SessionKey::Credential, "tok").unwrap();
    session.request_verification(&details).await.unwrap();
    assert!(session.verify_otp("000000").await.is_err());
    let verified = session.verify_otp(" 123456 ").await.unwrap();

    assert_eq!(verified.person_id.as_deref(), Some("42"));
    assert_eq!(
        backend.calls(),
        vec![
            Call::RequestVerification { details },
            Call::VerifyOtp {
                code: "000000".to_string()
            },
            Call::VerifyOtp {
                code: "123456".to_string()
            },
        ]
    );
}
