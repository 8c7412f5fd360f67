//! # Continuous Sessions
//!
//! A running listener can suspend until something happens in a *later*
//! dispatch:
//!
//! - [`EventListenerContext::waiting`] waits for a value pushed with
//!   [`ContinuousSessions::push`] under an application-chosen key.
//! - [`EventListenerContext::next_event`] waits for a later event accepted by a
//!   predicate. The dispatcher offers every pushed event to these waiters before
//!   ordinary listener matching.
//!
//! A waiter ends with a value, or fails when it is closed, times out, or the
//! dispatch that registered it is cancelled. The `on_close` callback of
//! [`WaitOptions`] runs for each failure.
//!
//! [`EventListenerContext::waiting`]: crate::EventListenerContext::waiting
//! [`EventListenerContext::next_event`]: crate::EventListenerContext::next_event

use crate::{
    error::{CloseReason, SessionError},
    event::Event,
};
use parking_lot::Mutex;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

type OnClose = Box<dyn FnOnce(&CloseReason) + Send>;
type Matcher = Arc<dyn Fn(&dyn Event) -> bool + Send + Sync>;
type Delivery = Result<Box<dyn Any + Send>, CloseReason>;

/// Options for one wait.
#[derive(Default)]
pub struct WaitOptions {
    timeout: Option<Duration>,
    on_close: Option<OnClose>,
    exclusive: bool,
}

impl WaitOptions {
    /// Default options: no deadline beyond the registry default, no callback,
    /// not exclusive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with a timeout after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `on_close` if the wait ends without a value.
    pub fn on_close<F>(mut self, on_close: F) -> Self
    where
        F: FnOnce(&CloseReason) + Send + 'static,
    {
        self.on_close = Some(Box::new(on_close));
        self
    }

    /// Claim the resuming event so ordinary listeners do not see it.
    ///
    /// Only meaningful for event waits.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("timeout", &self.timeout)
            .field("on_close", &self.on_close.is_some())
            .field("exclusive", &self.exclusive)
            .finish()
    }
}

enum WaiterKind {
    Value {
        type_id: TypeId,
        type_name: &'static str,
    },
    Event(Matcher),
}

struct Waiter {
    serial: u64,
    kind: WaiterKind,
    exclusive: bool,
    on_close: Option<OnClose>,
    sender: oneshot::Sender<Delivery>,
}

#[derive(Default)]
struct SessionsInner {
    waiters: Mutex<HashMap<String, Waiter>>,
    serial: AtomicU64,
    default_timeout: Option<Duration>,
}

/// What happened when an event was offered to the waiters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offer {
    /// Number of waiters resumed with the event.
    pub resumed: usize,
    /// Whether an exclusive waiter claimed the event.
    pub claimed: bool,
}

/// The registry of suspended waiters, shared by one manager.
#[derive(Clone, Default)]
pub struct ContinuousSessions {
    inner: Arc<SessionsInner>,
}

impl ContinuousSessions {
    /// Create a registry whose waits time out after `default_timeout` unless
    /// the wait sets its own deadline.
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(SessionsInner {
                default_timeout,
                ..Default::default()
            }),
        }
    }

    /// Returns `true` if someone waits on `key`.
    pub fn is_waiting(&self, key: &str) -> bool {
        self.inner.waiters.lock().contains_key(key)
    }

    /// Number of suspended waiters.
    pub fn len(&self) -> usize {
        self.inner.waiters.lock().len()
    }

    /// Returns `true` if nobody waits.
    pub fn is_empty(&self) -> bool {
        self.inner.waiters.lock().is_empty()
    }

    /// Resume the value waiter on `key` with `value`.
    pub fn push<T: Send + 'static>(&self, key: &str, value: T) -> Result<(), SessionError> {
        let waiter = {
            let mut waiters = self.inner.waiters.lock();
            match waiters.get(key).map(|w| &w.kind) {
                Some(WaiterKind::Value { type_id, type_name }) => {
                    if *type_id != TypeId::of::<T>() {
                        return Err(SessionError::TypeMismatch {
                            key: key.to_string(),
                            expected: *type_name,
                        });
                    }
                }
                Some(WaiterKind::Event(_)) | None => {
                    return Err(SessionError::NotWaiting(key.to_string()));
                }
            }
            waiters.remove(key)
        };
        let Some(waiter) = waiter else {
            return Err(SessionError::NotWaiting(key.to_string()));
        };
        tracing::debug!(session = %key, "resuming session with pushed value");
        waiter
            .sender
            .send(Ok(Box::new(value)))
            .map_err(|_| SessionError::NotWaiting(key.to_string()))
    }

    /// Close the waiter on `key`; its `on_close` runs and its wait fails.
    pub fn close(&self, key: &str, reason: impl Into<String>) -> Result<(), SessionError> {
        let waiter = self.inner.waiters.lock().remove(key);
        let Some(mut waiter) = waiter else {
            return Err(SessionError::NotWaiting(key.to_string()));
        };
        let reason = CloseReason::Closed(reason.into());
        tracing::debug!(session = %key, %reason, "closing session");
        if let Some(on_close) = waiter.on_close.take() {
            on_close(&reason);
        }
        let _ = waiter.sender.send(Err(reason));
        Ok(())
    }

    /// Close every waiter, e.g. on shutdown.
    pub fn close_all(&self, reason: &str) {
        let drained: Vec<(String, Waiter)> = self.inner.waiters.lock().drain().collect();
        for (key, mut waiter) in drained {
            let reason = CloseReason::Closed(reason.to_string());
            tracing::debug!(session = %key, %reason, "closing session");
            if let Some(on_close) = waiter.on_close.take() {
                on_close(&reason);
            }
            let _ = waiter.sender.send(Err(reason));
        }
    }

    /// Offer an event to every event waiter whose matcher accepts it.
    ///
    /// Matchers run synchronously under the registry lock and must not call
    /// back into the registry.
    pub fn offer(&self, event: &Arc<dyn Event>) -> Offer {
        let resumed: Vec<(String, Waiter)> = {
            let mut waiters = self.inner.waiters.lock();
            let keys: Vec<String> = waiters
                .iter()
                .filter(|(_, waiter)| match &waiter.kind {
                    WaiterKind::Event(matcher) => matcher(&**event),
                    WaiterKind::Value { .. } => false,
                })
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| waiters.remove(&key).map(|waiter| (key, waiter)))
                .collect()
        };

        let mut offer = Offer::default();
        for (key, waiter) in resumed {
            tracing::debug!(session = %key, event_id = %event.id(), "resuming session with event");
            if waiter.sender.send(Ok(Box::new(Arc::clone(event)))).is_ok() {
                offer.resumed += 1;
                offer.claimed |= waiter.exclusive;
            }
        }
        offer
    }

    pub(crate) async fn wait_value<T: Send + 'static>(
        &self,
        key: String,
        options: WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<T, SessionError> {
        let kind = WaiterKind::Value {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        };
        let value = self.wait(key.clone(), kind, options, cancel).await?;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| SessionError::TypeMismatch {
                key,
                expected: std::any::type_name::<T>(),
            })
    }

    pub(crate) async fn wait_event<F>(
        &self,
        key: String,
        matcher: F,
        options: WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn Event>, SessionError>
    where
        F: Fn(&dyn Event) -> bool + Send + Sync + 'static,
    {
        let kind = WaiterKind::Event(Arc::new(matcher));
        let value = self.wait(key.clone(), kind, options, cancel).await?;
        value
            .downcast::<Arc<dyn Event>>()
            .map(|boxed| *boxed)
            .map_err(|_| SessionError::TypeMismatch {
                key,
                expected: std::any::type_name::<Arc<dyn Event>>(),
            })
    }

    async fn wait(
        &self,
        key: String,
        kind: WaiterKind,
        options: WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Any + Send>, SessionError> {
        let WaitOptions {
            timeout,
            on_close,
            exclusive,
        } = options;
        let (sender, mut receiver) = oneshot::channel();
        let serial = self.inner.serial.fetch_add(1, Ordering::Relaxed);
        {
            let mut waiters = self.inner.waiters.lock();
            if waiters.contains_key(&key) {
                return Err(SessionError::DuplicateKey(key));
            }
            waiters.insert(
                key.clone(),
                Waiter {
                    serial,
                    kind,
                    exclusive,
                    on_close,
                    sender,
                },
            );
        }
        tracing::debug!(session = %key, "session waiting");
        let mut registration = Registration {
            inner: &self.inner,
            key: &key,
            serial,
            armed: true,
        };

        let timeout = timeout.or(self.inner.default_timeout);
        let early = tokio::select! {
            delivered = &mut receiver => {
                registration.disarm();
                return into_outcome(&key, delivered);
            }
            _ = cancel.cancelled() => CloseReason::Cancelled,
            _ = deadline(timeout) => CloseReason::Timeout(timeout.unwrap_or_default()),
        };

        match registration.take() {
            Some(mut waiter) => {
                tracing::debug!(session = %key, reason = %early, "session ended without a value");
                if let Some(on_close) = waiter.on_close.take() {
                    on_close(&early);
                }
                Err(close_error(&key, early))
            }
            // Someone resumed or closed the waiter concurrently; take what they sent.
            None => into_outcome(&key, receiver.await),
        }
    }
}

/// A registered waiter owned by one `wait` call.
///
/// If the wait future is dropped while still registered (its listener was
/// cancelled or cut off by an interceptor), the waiter is removed and its
/// `on_close` runs with [`CloseReason::Cancelled`].
struct Registration<'a> {
    inner: &'a SessionsInner,
    key: &'a str,
    serial: u64,
    armed: bool,
}

impl Registration<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Remove the waiter if it is still this registration's.
    fn take(&mut self) -> Option<Waiter> {
        self.armed = false;
        let mut waiters = self.inner.waiters.lock();
        match waiters.get(self.key) {
            Some(waiter) if waiter.serial == self.serial => waiters.remove(self.key),
            _ => None,
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(mut waiter) = self.take() {
            tracing::debug!(session = %self.key, "session abandoned by its listener");
            if let Some(on_close) = waiter.on_close.take() {
                on_close(&CloseReason::Cancelled);
            }
        }
    }
}

impl fmt::Debug for ContinuousSessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.waiters.lock().keys()).finish()
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => futures::future::pending().await,
    }
}

fn into_outcome(
    key: &str,
    delivered: Result<Delivery, oneshot::error::RecvError>,
) -> Result<Box<dyn Any + Send>, SessionError> {
    match delivered {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(reason)) => Err(close_error(key, reason)),
        Err(_) => Err(SessionError::Cancelled(key.to_string())),
    }
}

fn close_error(key: &str, reason: CloseReason) -> SessionError {
    match reason {
        CloseReason::Closed(reason) => SessionError::Closed {
            key: key.to_string(),
            reason,
        },
        CloseReason::Timeout(after) => SessionError::Timeout {
            key: key.to_string(),
            after,
        },
        CloseReason::Cancelled => SessionError::Cancelled(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_push_resumes_waiter() {
        let sessions = ContinuousSessions::default();
        let cancel = CancellationToken::new();
        let waiter = {
            let sessions = sessions.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sessions
                    .wait_value::<String>("answer".into(), WaitOptions::new(), &cancel)
                    .await
            })
        };

        while !sessions.is_waiting("answer") {
            tokio::task::yield_now().await;
        }
        sessions.push("answer", "42".to_string()).unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), "42");
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_push_type_mismatch_keeps_waiter() {
        let sessions = ContinuousSessions::default();
        let cancel = CancellationToken::new();
        let waiter = {
            let sessions = sessions.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sessions
                    .wait_value::<u32>("n".into(), WaitOptions::new(), &cancel)
                    .await
            })
        };
        while !sessions.is_waiting("n") {
            tokio::task::yield_now().await;
        }

        let err = sessions.push("n", "text").unwrap_err();
        assert!(matches!(err, SessionError::TypeMismatch { .. }));
        sessions.push("n", 7u32).unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_timeout_runs_on_close() {
        let sessions = ContinuousSessions::default();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        let options = WaitOptions::new()
            .timeout(Duration::from_millis(10))
            .on_close(move |reason| {
                assert!(matches!(reason, CloseReason::Timeout(_)));
                flag.store(true, Ordering::SeqCst);
            });

        let result = sessions
            .wait_value::<()>("slow".into(), options, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SessionError::Timeout { .. })));
        assert!(closed.load(Ordering::SeqCst));
        assert!(!sessions.is_waiting("slow"));
    }

    #[tokio::test]
    async fn test_close_fails_waiter() {
        let sessions = ContinuousSessions::default();
        let cancel = CancellationToken::new();
        let waiter = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                sessions
                    .wait_value::<u8>("k".into(), WaitOptions::new(), &cancel)
                    .await
            })
        };
        while !sessions.is_waiting("k") {
            tokio::task::yield_now().await;
        }
        sessions.close("k", "user left").unwrap();
        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            SessionError::Closed {
                key: "k".into(),
                reason: "user left".into()
            }
        );
        assert!(matches!(sessions.close("k", "again"), Err(SessionError::NotWaiting(_))));
    }

    #[tokio::test]
    async fn test_cancel_fails_waiter() {
        let sessions = ContinuousSessions::default();
        let cancel = CancellationToken::new();
        let waiter = {
            let sessions = sessions.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sessions
                    .wait_value::<u8>("k".into(), WaitOptions::new(), &cancel)
                    .await
            })
        };
        while !sessions.is_waiting("k") {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let sessions = ContinuousSessions::default();
        let cancel = CancellationToken::new();
        let _first = {
            let sessions = sessions.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sessions
                    .wait_value::<u8>("k".into(), WaitOptions::new(), &cancel)
                    .await
            })
        };
        while !sessions.is_waiting("k") {
            tokio::task::yield_now().await;
        }
        let second = sessions
            .wait_value::<u8>("k".into(), WaitOptions::new(), &cancel)
            .await;
        assert_eq!(second, Err(SessionError::DuplicateKey("k".into())));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_dropped_wait_releases_key() {
        let sessions = ContinuousSessions::default();
        let cancel = CancellationToken::new();
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&reasons);
        let options = WaitOptions::new().on_close(move |reason| recorded.lock().push(reason.clone()));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            sessions.wait_value::<String>("answer".into(), options, &cancel),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!sessions.is_waiting("answer"));
        assert_eq!(*reasons.lock(), [CloseReason::Cancelled]);

        let again = {
            let sessions = sessions.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sessions
                    .wait_value::<String>("answer".into(), WaitOptions::new(), &cancel)
                    .await
            })
        };
        while !sessions.is_waiting("answer") {
            tokio::task::yield_now().await;
        }
        sessions.push("answer", "later".to_string()).unwrap();
        assert_eq!(again.await.unwrap().unwrap(), "later");
        assert_eq!(reasons.lock().len(), 1);
    }

    #[test]
    fn test_push_without_waiter() {
        let sessions = ContinuousSessions::new(Some(Duration::from_secs(1)));
        assert_eq!(
            sessions.push("nobody", 1),
            Err(SessionError::NotWaiting("nobody".into()))
        );
    }
}
