
use std::sync::Arc;

use tokio::sync::Barrier;
use uuid::Uuid;

use cleaning_sessions::exchange::ExchangeStatus;
use cleaning_sessions::notify::NotificationKind;
use cleaning_sessions::session::SessionStatus;
use cleaning_sessions::EngineError;
use test_harness::TestEngine;

#[tokio::test]
async fn test_exchange_approved_moves_session() {
    let mut t = TestEngine::new();
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;

    let exchange = t
        .engine
        .post_exchange(session.id, from, "family event".to_string())
        .await
        .unwrap();
    assert_eq!(exchange.status, ExchangeStatus::Pending);
    assert!(exchange.to_employee_id.is_none());

    let answered = t.engine.respond_to_exchange(exchange.id, to).await.unwrap();
    assert_eq!(answered.to_employee_id, Some(to));
    assert!(answered.responded_at.is_some());
    assert_eq!(answered.status, ExchangeStatus::Pending);

    let decided = t
        .engine
        .decide_exchange(exchange.id, t.employer, true)
        .await
        .unwrap();
    assert_eq!(decided.status, ExchangeStatus::Approved);
    assert_eq!(decided.decided_by, Some(t.employer));
    assert!(decided.decided_at.is_some());

    let reloaded = t.reload(&session).await;
    assert_eq!(reloaded.status, SessionStatus::Approved);
    assert_eq!(reloaded.assigned_to, Some(to));

    let notifications = t.drain_notifications();
    let mut recipients: Vec<_> = notifications.iter().map(|n| n.recipient).collect();
    recipients.sort();
    let mut expected = vec![from, to];
    expected.sort();
    assert_eq!(recipients, expected);
    assert!(notifications
        .iter()
        .all(|n| n.kind == NotificationKind::ExchangeApproved && n.session_id == session.id));
}

#[tokio::test]
async fn test_exchange_denied_keeps_assignee() {
    let mut t = TestEngine::new();
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;

    let exchange = t
        .engine
        .post_exchange(session.id, from, "sick".to_string())
        .await
        .unwrap();
    t.engine.respond_to_exchange(exchange.id, to).await.unwrap();

    let decided = t
        .engine
        .decide_exchange(exchange.id, t.employer, false)
        .await
        .unwrap();
    assert_eq!(decided.status, ExchangeStatus::Denied);
    assert_eq!(t.reload(&session).await.assigned_to, Some(from));

    let kinds: Vec<_> = t.drain_notifications().into_iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::ExchangeDenied; 2]);

    // A denied exchange no longer blocks a new one.
    t.engine
        .post_exchange(session.id, from, "still sick".to_string())
        .await
        .unwrap();
    assert_eq!(t.engine.exchanges_for_session(session.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_requires_approved_session() {
    let t = TestEngine::new();
    let employee = Uuid::new_v4();

    for status in [
        SessionStatus::Offered,
        SessionStatus::Claimed,
        SessionStatus::InProgress,
        SessionStatus::Cancelled,
    ] {
        let session = t.session_in(status, Some(employee)).await;
        let err = t
            .engine
            .post_exchange(session.id, employee, "r".to_string())
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidTransition { current, .. } if current == status),
            "{status}: {err}"
        );
    }
}

#[tokio::test]
async fn test_post_requires_assignee() {
    let t = TestEngine::new();
    let session = t
        .session_in(SessionStatus::Approved, Some(Uuid::new_v4()))
        .await;

    let err = t
        .engine
        .post_exchange(session.id, Uuid::new_v4(), "not mine".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAssignee { .. }));
    assert!(t.engine.exchanges_for_session(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_pending_exchange_per_session() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;

    t.engine
        .post_exchange(session.id, from, "first".to_string())
        .await
        .unwrap();
    let err = t
        .engine
        .post_exchange(session.id, from, "second".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExchangePending(id) if id == session.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_responses_have_one_winner() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange_id = t
        .engine
        .post_exchange(session.id, from, "vacation".to_string())
        .await
        .unwrap()
        .id;

    let responders = 16;
    let barrier = Arc::new(Barrier::new(responders));
    let mut handles = Vec::new();
    for _ in 0..responders {
        let engine = t.engine.clone();
        let barrier = barrier.clone();
        let employee = Uuid::new_v4();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            (employee, engine.respond_to_exchange(exchange_id, employee).await)
        }));
    }

    let mut winners = Vec::new();
    for result in futures::future::join_all(handles).await {
        let (employee, outcome) = result.unwrap();
        match outcome {
            Ok(_) => winners.push(employee),
            Err(e) => {
                assert!(matches!(e, EngineError::ExchangeTaken { .. }), "{e}");
                assert!(e.is_already_taken());
            }
        }
    }

    assert_eq!(winners.len(), 1);
    let exchange = t.engine.exchange(exchange_id).await.unwrap();
    assert_eq!(exchange.to_employee_id, Some(winners[0]));
}

#[tokio::test]
async fn test_poster_cannot_respond() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange = t
        .engine
        .post_exchange(session.id, from, "r".to_string())
        .await
        .unwrap();

    let err = t
        .engine
        .respond_to_exchange(exchange.id, from)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDecision(_)));
    assert!(t.engine.exchange(exchange.id).await.unwrap().is_open());
}

#[tokio::test]
async fn test_approve_without_responder_is_rejected() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange = t
        .engine
        .post_exchange(session.id, from, "r".to_string())
        .await
        .unwrap();

    let err = t
        .engine
        .decide_exchange(exchange.id, t.employer, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDecision(_)));

    let unchanged = t.engine.exchange(exchange.id).await.unwrap();
    assert_eq!(unchanged, exchange);
    assert_eq!(t.reload(&session).await.assigned_to, Some(from));
}

#[tokio::test]
async fn test_decision_is_final() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange = t
        .engine
        .post_exchange(session.id, from, "r".to_string())
        .await
        .unwrap();
    t.engine
        .respond_to_exchange(exchange.id, Uuid::new_v4())
        .await
        .unwrap();
    t.engine
        .decide_exchange(exchange.id, t.employer, false)
        .await
        .unwrap();

    let err = t
        .engine
        .decide_exchange(exchange.id, t.employer, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDecision(_)));

    // Responding after the decision loses too.
    let err = t
        .engine
        .respond_to_exchange(exchange.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExchangeTaken { .. }));

    assert_eq!(
        t.engine.exchange(exchange.id).await.unwrap().status,
        ExchangeStatus::Denied
    );
}

#[tokio::test]
async fn test_approve_after_session_cancelled() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange = t
        .engine
        .post_exchange(session.id, from, "r".to_string())
        .await
        .unwrap();
    t.engine.respond_to_exchange(exchange.id, to).await.unwrap();
    t.engine.cancel_session(session.id).await.unwrap();

    let err = t
        .engine
        .decide_exchange(exchange.id, t.employer, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDecision(_)));

    let reloaded = t.reload(&session).await;
    assert_eq!(reloaded.status, SessionStatus::Cancelled);
    assert_eq!(reloaded.assigned_to, Some(from));
    assert_eq!(
        t.engine.exchange(exchange.id).await.unwrap().status,
        ExchangeStatus::Pending
    );
}

#[tokio::test]
async fn test_approve_after_deny_keeps_session() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange = t
        .engine
        .post_exchange(session.id, from, "r".to_string())
        .await
        .unwrap();
    t.engine.respond_to_exchange(exchange.id, to).await.unwrap();

    // A second employer view read the exchange while it was pending.
    let stale = t.engine.exchange(exchange.id).await.unwrap();
    assert_eq!(stale.status, ExchangeStatus::Pending);
    t.engine
        .decide_exchange(exchange.id, t.employer, false)
        .await
        .unwrap();

    let err = t
        .engine
        .decide_exchange(stale.id, t.employer, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDecision(_)));
    assert_eq!(t.reload(&session).await.assigned_to, Some(from));
    assert_eq!(
        t.engine.exchange(exchange.id).await.unwrap().status,
        ExchangeStatus::Denied
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decisions_agree() {
    let t = TestEngine::new();
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(from)).await;
    let exchange_id = t
        .engine
        .post_exchange(session.id, from, "r".to_string())
        .await
        .unwrap()
        .id;
    t.engine.respond_to_exchange(exchange_id, to).await.unwrap();

    let deciders = 8;
    let barrier = Arc::new(Barrier::new(deciders));
    let mut handles = Vec::new();
    for i in 0..deciders {
        let engine = t.engine.clone();
        let barrier = barrier.clone();
        let employer = t.employer;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            engine.decide_exchange(exchange_id, employer, i % 2 == 0).await
        }));
    }

    let mut decided = Vec::new();
    for result in futures::future::join_all(handles).await {
        if let Ok(exchange) = result.unwrap() {
            decided.push(exchange.status);
        }
    }
    assert_eq!(decided.len(), 1);

    let exchange = t.engine.exchange(exchange_id).await.unwrap();
    assert_eq!(exchange.status, decided[0]);
    let holder = t.reload(&session).await.assigned_to;
    match exchange.status {
        ExchangeStatus::Approved => assert_eq!(holder, Some(to)),
        _ => assert_eq!(holder, Some(from)),
    }
}

#[tokio::test]
async fn test_post_after_session_cancelled() {
    let t = TestEngine::new();
    let employee = Uuid::new_v4();
    let session = t.session_in(SessionStatus::Approved, Some(employee)).await;
    t.engine.cancel_session(session.id).await.unwrap();

    let err = t
        .engine
        .post_exchange(session.id, employee, "too late".to_string())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            current: SessionStatus::Cancelled,
            ..
        }
    ));
    assert!(t.engine.exchanges_for_session(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_unknown_session() {
    let t = TestEngine::new();
    let missing = Uuid::new_v4();
    let err = t
        .engine
        .post_exchange(missing, Uuid::new_v4(), "r".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_unknown_exchange() {
    let t = TestEngine::new();
    let missing = Uuid::new_v4();
    let err = t
        .engine
        .respond_to_exchange(missing, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExchangeNotFound(id) if id == missing));
}
