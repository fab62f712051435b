//! Scoped session lifecycle: initialize, use, release

use std::panic::{resume_unwind, AssertUnwindSafe};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::connect::{init_session, Connected, Connector, RetryPolicy};
use crate::error::{E2eError, E2eResult};

/// A live session that must be released exactly once
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Identifier for logging
    fn id(&self) -> &str;

    /// End the session on the server
    async fn quit(self) -> E2eResult<()>;
}

/// Value produced by a scoped body plus the attempts needed to connect
#[derive(Debug)]
pub struct SessionOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Owns the session while the body runs. If it is dropped still armed (the
/// surrounding future was cancelled) the session is quit on a background task.
struct ReleaseGuard<S: SessionHandle + 'static> {
    connected: Option<Connected<S>>,
}

impl<S: SessionHandle + 'static> ReleaseGuard<S> {
    fn new(connected: Connected<S>) -> Self {
        Self {
            connected: Some(connected),
        }
    }

    fn connected(&self) -> &Connected<S> {
        // Only `disarm` and `drop` take the session, and both consume the guard
        self.connected
            .as_ref()
            .expect("release guard accessed after disarm")
    }

    fn disarm(mut self) -> Connected<S> {
        self.connected
            .take()
            .expect("release guard disarmed twice")
    }
}

impl<S: SessionHandle + 'static> Drop for ReleaseGuard<S> {
    fn drop(&mut self) {
        let Some(connected) = self.connected.take() else {
            return;
        };
        let session = connected.session;
        let session_id = session.id().to_string();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Session {} abandoned, releasing in background", session_id);
                handle.spawn(async move {
                    if let Err(e) = session.quit().await {
                        warn!("Failed to release abandoned session {}: {}", session_id, e);
                    }
                });
            }
            Err(_) => {
                warn!("Session {} abandoned outside a runtime, not released", session_id);
            }
        }
    }
}

/// Open a session, run `body` with it, then release it.
///
/// Release happens whenever a session was obtained: after `body` returns,
/// after it panics (the panic is resumed once the session is closed), and in
/// the background if this future is dropped mid-body. If connecting fails
/// there is nothing to release. A failed release is logged; it is only
/// returned when `body` itself succeeded, so it never hides the body's error.
pub async fn with_session<C, T, F>(
    connector: &C,
    policy: &RetryPolicy,
    body: F,
) -> E2eResult<SessionOutcome<T>>
where
    C: Connector,
    C::Session: SessionHandle + 'static,
    F: for<'s> FnOnce(&'s Connected<C::Session>) -> BoxFuture<'s, E2eResult<T>>,
{
    let guard = ReleaseGuard::new(init_session(connector, policy).await?);
    info!("Session {} started", guard.connected().session.id());

    let result = AssertUnwindSafe(body(guard.connected()))
        .catch_unwind()
        .await;

    let Connected { session, attempts } = guard.disarm();
    let session_id = session.id().to_string();
    let teardown = session.quit().await;

    let result = match result {
        Ok(result) => result,
        Err(panic) => {
            match teardown {
                Ok(()) => info!("Session {} closed after panic", session_id),
                Err(e) => error!("Failed to close session {}: {}", session_id, e),
            }
            resume_unwind(panic);
        }
    };

    match (result, teardown) {
        (Ok(value), Ok(())) => {
            info!("Session {} closed", session_id);
            Ok(SessionOutcome { value, attempts })
        }
        (Ok(_), Err(e)) => {
            error!("Failed to close session {}: {}", session_id, e);
            Err(E2eError::Teardown(Box::new(e)))
        }
        (Err(e), Ok(())) => {
            info!("Session {} closed", session_id);
            Err(e)
        }
        (Err(e), Err(teardown_err)) => {
            error!("Failed to close session {}: {}", session_id, teardown_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct MockSession {
        quits: Arc<AtomicU32>,
        fail_quit: bool,
    }

    #[async_trait]
    impl SessionHandle for MockSession {
        fn id(&self) -> &str {
            "mock-session"
        }

        async fn quit(self) -> E2eResult<()> {
            self.quits.fetch_add(1, Ordering::SeqCst);
            if self.fail_quit {
                Err(E2eError::Protocol("invalid session id".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct MockConnector {
        failures: u32,
        calls: AtomicU32,
        quits: Arc<AtomicU32>,
        fail_quit: bool,
    }

    impl MockConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                quits: Arc::new(AtomicU32::new(0)),
                fail_quit: false,
            }
        }

        fn quits(&self) -> u32 {
            self.quits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Session = MockSession;

        async fn connect(&self) -> E2eResult<MockSession> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(E2eError::Protocol("connection refused".to_string()));
            }
            Ok(MockSession {
                quits: Arc::clone(&self.quits),
                fail_quit: self.fail_quit,
            })
        }

        fn endpoint(&self) -> &str {
            "mock://appium"
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_after_success() {
        let connector = MockConnector::new(2);

        let outcome = with_session(&connector, &policy(), |connected| {
            Box::pin(async move { Ok(connected.session.id().to_string()) })
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, "mock-session");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(connector.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_sees_attempt_count() {
        let connector = MockConnector::new(1);

        let outcome = with_session(&connector, &policy(), |connected| {
            Box::pin(async move { Ok(connected.attempts) })
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_release_without_session() {
        let connector = MockConnector::new(u32::MAX);
        let body_ran = AtomicU32::new(0);

        let err = with_session(&connector, &policy(), |_connected| {
            body_ran.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::Connection { attempts: 3, .. }));
        assert_eq!(body_ran.load(Ordering::SeqCst), 0);
        assert_eq!(connector.quits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_when_body_fails() {
        let connector = MockConnector::new(0);

        let err = with_session(&connector, &policy(), |_connected| {
            Box::pin(async {
                Err::<(), _>(E2eError::ElementNotFound {
                    key: "loginButton".to_string(),
                })
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::ElementNotFound { .. }));
        assert_eq!(connector.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_when_body_panics() {
        let connector = MockConnector::new(0);
        let crash = true;

        let result = AssertUnwindSafe(with_session(&connector, &policy(), |_connected| {
            Box::pin(async move {
                if crash {
                    panic!("widget tree exploded");
                }
                Ok(())
            })
        }))
        .catch_unwind()
        .await;

        assert!(result.is_err());
        assert_eq!(connector.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_when_cancelled() {
        let connector = MockConnector::new(0);

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            with_session(&connector, &policy(), |_connected| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
            }),
        )
        .await;
        assert!(result.is_err());

        // The release runs on a spawned task; let it finish
        for _ in 0..10 {
            if connector.quits() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(connector.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_error_does_not_mask_body_error() {
        let mut connector = MockConnector::new(0);
        connector.fail_quit = true;

        let err = with_session(&connector, &policy(), |_connected| {
            Box::pin(async {
                Err::<(), _>(E2eError::ElementNotFound {
                    key: "loginButton".to_string(),
                })
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::ElementNotFound { .. }));
        assert_eq!(connector.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_error_surfaces_after_success() {
        let mut connector = MockConnector::new(0);
        connector.fail_quit = true;

        let err = with_session(&connector, &policy(), |_connected| {
            Box::pin(async { Ok(()) })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::Teardown(_)));
        assert_eq!(connector.quits(), 1);
    }
}
