//! Continuous sessions driven through the manager.

use hearken::{
    BoxError, CloseReason, Event, EventListenerManager, EventResult, FailureKind, Listener, Priority,
    SessionError, WaitOptions, filters::TextFilter, interceptors::TimeoutInterceptor,
    listeners::FnListener, testing::RecordingListener,
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

mod common;
use common::{chat, collect, key, values};

type Reasons = Arc<Mutex<Vec<CloseReason>>>;

async fn until_waiting(manager: &EventListenerManager, session: &str) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !manager.sessions().is_waiting(session) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
}

async fn until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
}

/// Waits for a `String` on `session`, recording close reasons into `reasons`.
fn asker(session: &'static str, timeout: Option<Duration>, reasons: Reasons) -> FnListener {
    FnListener::builder("ask")
        .target(key("private_message"))
        .handle(move |ctx| {
            let reasons = reasons.clone();
            Box::pin(async move {
                let mut options =
                    WaitOptions::new().on_close(move |reason| reasons.lock().push(reason.clone()));
                if let Some(timeout) = timeout {
                    options = options.timeout(timeout);
                }
                let answer: String = ctx.waiting(session, options).await?;
                Ok::<_, BoxError>(EventResult::simple(answer))
            })
        })
}

#[tokio::test]
async fn test_waiting_resumes_with_pushed_value() {
    let manager = EventListenerManager::new();
    let reasons = Reasons::default();
    manager
        .register_listener(asker("answer", None, reasons.clone()))
        .unwrap();

    let pending = manager.push(chat("private_message", "what is the answer?"));
    until_waiting(&manager, "answer").await;
    manager.sessions().push("answer", "42".to_string()).unwrap();

    let results = collect(pending).await;
    assert_eq!(values::<String>(&results), ["42"]);
    assert!(reasons.lock().is_empty());
    assert!(!manager.sessions().is_waiting("answer"));
}

#[tokio::test]
async fn test_mismatched_push_keeps_waiter() {
    let manager = EventListenerManager::new();
    manager
        .register_listener(asker("answer", None, Reasons::default()))
        .unwrap();

    let pending = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;

    let err = manager.sessions().push("answer", 42u32).unwrap_err();
    assert!(matches!(err, SessionError::TypeMismatch { .. }));
    assert!(manager.sessions().is_waiting("answer"));

    manager.sessions().push("answer", "forty-two".to_string()).unwrap();
    assert_eq!(values::<String>(&collect(pending).await), ["forty-two"]);
}

#[tokio::test]
async fn test_push_without_waiter() {
    let manager = EventListenerManager::new();
    let err = manager.sessions().push("nobody", 1u8).unwrap_err();
    assert_eq!(err, SessionError::NotWaiting("nobody".into()));
}

#[tokio::test]
async fn test_timeout_runs_on_close() {
    let manager = EventListenerManager::new();
    let reasons = Reasons::default();
    manager
        .register_listener(asker(
            "slow",
            Some(Duration::from_millis(20)),
            reasons.clone(),
        ))
        .unwrap();

    let results = collect(manager.push(chat("private_message", "anyone?"))).await;
    let failure = results[0].failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::Listener);
    assert!(failure.cause().to_string().contains("timed out"));
    assert_eq!(
        *reasons.lock(),
        [CloseReason::Timeout(Duration::from_millis(20))]
    );
}

#[tokio::test]
async fn test_default_timeout_from_config() {
    let config = hearken::ManagerConfig::new()
        .with_default_session_timeout(Duration::from_millis(10));
    let manager = EventListenerManager::with_config(config);
    let reasons = Reasons::default();
    manager
        .register_listener(asker("answer", None, reasons.clone()))
        .unwrap();

    let results = collect(manager.push(chat("private_message", "?"))).await;
    assert!(results[0].is_error());
    assert!(matches!(reasons.lock()[..], [CloseReason::Timeout(_)]));
}

#[tokio::test]
async fn test_close_fails_the_wait() {
    let manager = EventListenerManager::new();
    let reasons = Reasons::default();
    manager
        .register_listener(asker("answer", None, reasons.clone()))
        .unwrap();

    let pending = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;
    manager.sessions().close("answer", "user left").unwrap();

    let results = collect(pending).await;
    assert!(results[0].failure().unwrap().cause().to_string().contains("user left"));
    assert_eq!(*reasons.lock(), [CloseReason::Closed("user left".into())]);
    assert!(manager.sessions().close("answer", "again").is_err());
}

#[tokio::test]
async fn test_cancelled_stream_cancels_waiter() {
    let manager = EventListenerManager::new();
    let reasons = Reasons::default();
    manager
        .register_listener(asker("answer", None, reasons.clone()))
        .unwrap();

    let pending = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;
    pending.cancel();

    until(|| !reasons.lock().is_empty()).await;
    assert_eq!(*reasons.lock(), [CloseReason::Cancelled]);
    assert!(!manager.sessions().is_waiting("answer"));
    assert!(collect(pending).await.is_empty());

    let retry = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;
    manager.sessions().push("answer", "again".to_string()).unwrap();
    assert_eq!(values::<String>(&collect(retry).await), ["again"]);
    assert_eq!(reasons.lock().len(), 1);
}

#[tokio::test]
async fn test_interceptor_timeout_releases_waiter() {
    let manager = EventListenerManager::new();
    let reasons = Reasons::default();
    manager
        .register_listener(asker("answer", None, reasons.clone()))
        .unwrap();
    let timeout = manager
        .register_listener_interceptor(
            "timeout",
            TimeoutInterceptor::new(Duration::from_millis(20)),
        )
        .unwrap();

    let results = collect(manager.push(chat("private_message", "?"))).await;
    assert!(results[0].failure().unwrap().cause().to_string().contains("timed out"));
    assert_eq!(*reasons.lock(), [CloseReason::Cancelled]);
    assert!(!manager.sessions().is_waiting("answer"));

    assert!(timeout.dispose());
    let retry = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;
    manager.sessions().push("answer", "42".to_string()).unwrap();
    assert_eq!(values::<String>(&collect(retry).await), ["42"]);
}

#[tokio::test]
async fn test_shutdown_closes_waiters() {
    let manager = EventListenerManager::new();
    let reasons = Reasons::default();
    manager
        .register_listener(asker("answer", None, reasons.clone()))
        .unwrap();

    let pending = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;
    manager.shutdown();

    assert!(collect(pending).await.is_empty());
    until(|| !reasons.lock().is_empty()).await;
    assert_eq!(reasons.lock().len(), 1);
    assert!(manager.sessions().is_empty());
}

/// A quiz that waits for the next message saying "yes".
fn quiz(options: fn() -> WaitOptions) -> impl Listener {
    FnListener::builder("quiz")
        .target(key("message"))
        .handle(move |ctx| {
            Box::pin(async move {
                let answer = ctx
                    .next_event(
                        "quiz",
                        |event: &dyn Event| event.plain_text() == Some("yes"),
                        options(),
                    )
                    .await?;
                Ok::<_, BoxError>(EventResult::simple(format!("answered:{}", answer.id())))
            })
        })
        .with_filter(TextFilter::equals("/quiz"))
}

#[tokio::test]
async fn test_exclusive_waiter_claims_event() {
    let manager = EventListenerManager::new();
    let bystander = RecordingListener::new("bystander")
        .with_priority(Priority::HIGH)
        .with_result(EventResult::simple("seen".to_string()));
    manager.register_listener(bystander.clone()).unwrap();
    manager
        .register_listener(quiz(|| WaitOptions::new().exclusive()))
        .unwrap();

    let question = manager.push(chat("group_message", "/quiz"));
    until_waiting(&manager, "quiz").await;

    let answer = chat("group_message", "yes");
    let claimed = collect(manager.push(Arc::clone(&answer))).await;
    assert!(claimed.is_empty());

    let results = collect(question).await;
    assert_eq!(
        values::<String>(&results),
        ["seen".to_string(), format!("answered:{}", answer.id())]
    );
    assert_eq!(bystander.count(), 1);
}

#[tokio::test]
async fn test_shared_waiter_lets_listeners_run() {
    let manager = EventListenerManager::new();
    let bystander = RecordingListener::new("bystander")
        .with_priority(Priority::HIGH)
        .with_result(EventResult::simple("seen".to_string()));
    manager.register_listener(bystander.clone()).unwrap();
    manager.register_listener(quiz(WaitOptions::new)).unwrap();

    let question = manager.push(chat("group_message", "/quiz"));
    until_waiting(&manager, "quiz").await;

    let answer = chat("group_message", "yes");
    let shared = collect(manager.push(Arc::clone(&answer))).await;
    assert_eq!(values::<String>(&shared), ["seen"]);

    let results = collect(question).await;
    assert_eq!(
        values::<String>(&results),
        ["seen".to_string(), format!("answered:{}", answer.id())]
    );
    assert_eq!(bystander.event_ids().len(), 2);
}

#[tokio::test]
async fn test_duplicate_session_key_fails() {
    let manager = EventListenerManager::new();
    manager
        .register_listener(asker("answer", None, Reasons::default()))
        .unwrap();

    let first = manager.push(chat("private_message", "?"));
    until_waiting(&manager, "answer").await;
    let second = collect(manager.push(chat("private_message", "?"))).await;
    assert!(second[0].failure().unwrap().cause().to_string().contains("already waiting"));

    manager.sessions().push("answer", "ok".to_string()).unwrap();
    assert_eq!(values::<String>(&collect(first).await), ["ok"]);
}
