//! The smoke scenario: launch the app, wait for it, tap one widget

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SmokeConfig;
use crate::error::{E2eError, E2eResult};
use crate::finder::FlutterFinder;
use crate::session::with_session;
use crate::webdriver::{AppiumConnector, WebDriverClient};

/// Result of one step inside the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Outcome of a smoke run, written for passing and failing runs alike
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeReport {
    pub server_url: String,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl SmokeReport {
    /// Write the report as pretty JSON
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// A failed run: the error that ended it plus everything recorded up to then
#[derive(Error, Debug)]
#[error("Smoke test failed")]
pub struct SmokeFailure {
    pub report: Box<SmokeReport>,
    #[source]
    pub error: E2eError,
}

/// Steps and attempts recorded while the session body runs
#[derive(Debug, Default)]
struct RunLog {
    attempts: u32,
    steps: Vec<StepResult>,
}

type SharedLog = Arc<Mutex<RunLog>>;

/// Runs the scripted smoke test against an Appium server
pub struct SmokeTest {
    config: SmokeConfig,
}

impl SmokeTest {
    pub fn new(config: SmokeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmokeConfig {
        &self.config
    }

    /// Connect, wait for the app, tap the configured widget, disconnect.
    ///
    /// A failure still carries the report with the steps that ran.
    pub async fn run(&self) -> Result<SmokeReport, SmokeFailure> {
        let started_at = Utc::now();
        let start = Instant::now();
        let log = SharedLog::default();

        let result = self.execute(Arc::clone(&log)).await;

        let RunLog { attempts, steps } = std::mem::take(&mut *log.lock());
        let attempts = match &result {
            Err(E2eError::Connection { attempts, .. }) => *attempts,
            _ => attempts,
        };

        let report = SmokeReport {
            server_url: self.config.server_url.clone(),
            started_at,
            success: result.is_ok(),
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error: result.as_ref().err().map(E2eError::full_message),
        };

        match result {
            Ok(()) => {
                info!(
                    "Smoke test passed in {}ms ({} connection attempt(s))",
                    report.duration_ms, report.attempts
                );
                Ok(report)
            }
            Err(error) => Err(SmokeFailure {
                report: Box::new(report),
                error,
            }),
        }
    }

    async fn execute(&self, log: SharedLog) -> E2eResult<()> {
        self.config.validate()?;

        info!(
            "Running smoke test against {} (key: {})",
            self.config.server_url, self.config.element_key
        );

        let client = WebDriverClient::new(&self.config.server_url, self.config.request_timeout())?;
        let connector = AppiumConnector::new(client, self.config.capabilities.clone());

        let implicit_wait = self.config.implicit_wait();
        let warmup = self.config.warmup();
        let element_timeout = self.config.element_timeout();
        let finder = FlutterFinder::by_value_key(self.config.element_key.clone());

        with_session(&connector, &self.config.retry_policy(), move |connected| {
            Box::pin(async move {
                let session = &connected.session;
                log.lock().attempts = connected.attempts;

                run_step(&log, "implicit_wait", session.set_implicit_wait(implicit_wait)).await?;

                run_step(&log, "warmup", async {
                    debug!("Waiting {:?} for the app to initialize", warmup);
                    sleep(warmup).await;
                    Ok(())
                })
                .await?;

                let element = run_step(
                    &log,
                    format!("find:{}", finder),
                    session.find_element(&finder, element_timeout),
                )
                .await?;

                run_step(&log, format!("click:{}", finder), element.click()).await?;

                Ok(())
            })
        })
        .await?;

        Ok(())
    }
}

/// Time a step and record its outcome
async fn run_step<T, F>(log: &Mutex<RunLog>, name: impl Into<String>, step: F) -> E2eResult<T>
where
    F: Future<Output = E2eResult<T>>,
{
    let step_name = name.into();
    let start = Instant::now();
    debug!("Executing step: {}", step_name);

    let result = step.await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let error = match &result {
        Ok(_) => None,
        Err(e) => {
            warn!("Step {} failed: {}", step_name, e);
            Some(e.full_message())
        }
    };

    log.lock().steps.push(StepResult {
        success: error.is_none(),
        step_name,
        duration_ms,
        error,
    });

    result
}
