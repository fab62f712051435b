//! Session establishment with bounded retry
//!
//! Automation servers are often still booting a simulator or the app when the
//! first request lands, so session creation is retried a fixed number of
//! times with a fixed pause in between. Persistent failures still surface.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Something that can open a session on a remote automation server
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Send;

    /// Make a single session-creation attempt
    async fn connect(&self) -> E2eResult<Self::Session>;

    /// Where the connector points, for logging
    fn endpoint(&self) -> &str;
}

/// Retry settings for session creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts
    pub max_retries: u32,

    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Number of attempts actually made; zero still means one try
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// A session handle together with how many attempts it took
#[derive(Debug)]
pub struct Connected<S> {
    pub session: S,
    pub attempts: u32,
}

/// Open a session, retrying failed attempts according to `policy`.
///
/// Returns on the first success. After the last failed attempt the error
/// from that attempt is returned wrapped in [`E2eError::Connection`]; there
/// is no pause after the final attempt.
pub async fn init_session<C: Connector>(
    connector: &C,
    policy: &RetryPolicy,
) -> E2eResult<Connected<C::Session>> {
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(
            "Creating session at {} (attempt {}/{})",
            connector.endpoint(),
            attempt,
            max_attempts
        );

        match connector.connect().await {
            Ok(session) => {
                info!("Driver initialized successfully");
                return Ok(Connected {
                    session,
                    attempts: attempt,
                });
            }
            Err(e) => {
                warn!("Attempt {} failed: {}", attempt, e);

                if attempt >= max_attempts {
                    return Err(E2eError::Connection {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }

                sleep(policy.delay).await;
            }
        }
    }
}
