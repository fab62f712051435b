//! Minimal WebDriver client for an Appium server
//!
//! Only the handful of endpoints the smoke test needs: new session,
//! timeouts, script execution, element click and delete session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::capabilities::Capabilities;
use crate::connect::Connector;
use crate::error::{E2eError, E2eResult};
use crate::finder::FlutterFinder;
use crate::session::SessionHandle;

/// WebDriver error kinds that mean the element never showed up
const NOT_FOUND_KINDS: &[&str] = &["no such element", "timeout", "script timeout"];

/// HTTP client bound to one automation server
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
}

/// Error payload inside `{"value": {...}}`
#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

impl WebDriverClient {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> E2eResult<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a command and return the full response payload
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<(Value, String)> {
        let url = format!("{}{}", self.base_url, path);
        trace!("WebDriver {} {} {:?}", method, url, body);

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        trace!("WebDriver response {}: {}", status, text);

        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) if !status.is_success() => {
                    return Err(error_from_status(status, text));
                }
                Err(e) => return Err(E2eError::Json(e)),
            }
        };

        if !status.is_success() {
            return Err(error_from_payload(status, &payload, &text));
        }

        Ok((payload, text))
    }

    /// Send a command and return the unwrapped `value` of the response
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let (payload, _) = self.send(method, path, body).await?;

        Ok(match payload {
            Value::Object(mut map) => map.remove("value").unwrap_or(Value::Object(map)),
            other => other,
        })
    }

    /// `POST /session`
    pub async fn new_session(&self, capabilities: &Capabilities) -> E2eResult<Session> {
        let body = json!({ "capabilities": capabilities.to_w3c() });
        let (payload, text) = self.send(Method::POST, "/session", Some(body)).await?;

        // W3C nests the id under `value`; older servers put it at the top level
        let session_id = payload["value"]["sessionId"]
            .as_str()
            .or_else(|| payload["sessionId"].as_str())
            .ok_or_else(|| E2eError::Protocol(format!("No sessionId in response: {}", text)))?
            .to_string();

        let returned = payload["value"]
            .get("capabilities")
            .cloned()
            .unwrap_or(Value::Null);

        debug!("Created session {}", session_id);

        Ok(Session {
            client: self.clone(),
            id: session_id,
            capabilities: returned,
        })
    }
}

fn error_from_status(status: StatusCode, body: String) -> E2eError {
    E2eError::WebDriver {
        status: status.as_u16(),
        error: status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_lowercase(),
        message: body,
    }
}

fn error_from_payload(status: StatusCode, payload: &Value, raw: &str) -> E2eError {
    match ErrorValue::deserialize(&payload["value"]) {
        Ok(err) => E2eError::WebDriver {
            status: status.as_u16(),
            error: err.error,
            message: err.message,
        },
        Err(_) => error_from_status(status, raw.to_string()),
    }
}

/// An open WebDriver session
#[derive(Debug)]
pub struct Session {
    client: WebDriverClient,
    id: String,
    capabilities: Value,
}

impl Session {
    /// Capabilities the server reported when the session was created
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let path = format!("/session/{}{}", self.id, path);
        self.client.command(method, &path, body).await
    }

    /// Set the implicit element wait
    pub async fn set_implicit_wait(&self, wait: Duration) -> E2eResult<()> {
        self.command(
            Method::POST,
            "/timeouts",
            Some(json!({ "implicit": wait.as_millis() as u64 })),
        )
        .await?;
        Ok(())
    }

    /// Run a synchronous script (or driver extension command)
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Wait for a Flutter widget to appear and return a reference to it
    pub async fn find_element(
        &self,
        finder: &FlutterFinder,
        timeout: Duration,
    ) -> E2eResult<Element<'_>> {
        let id = finder.encode();
        debug!("Waiting for element {} ({:?})", finder, timeout);

        let result = self
            .execute(
                "flutter:waitFor",
                vec![json!(id), json!(timeout.as_millis() as u64)],
            )
            .await;

        match result {
            Ok(_) => Ok(Element {
                session: self,
                id,
                description: finder.describe(),
            }),
            Err(e) if e.webdriver_kind().is_some_and(|k| NOT_FOUND_KINDS.contains(&k)) => {
                debug!("Element lookup failed: {}", e);
                Err(E2eError::ElementNotFound {
                    key: finder.describe(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SessionHandle for Session {
    fn id(&self) -> &str {
        &self.id
    }

    async fn quit(self) -> E2eResult<()> {
        self.client
            .command(Method::DELETE, &format!("/session/{}", self.id), None)
            .await?;
        Ok(())
    }
}

/// A located element, valid for the lifetime of its session
#[derive(Debug)]
pub struct Element<'s> {
    session: &'s Session,
    id: String,
    description: String,
}

impl Element<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn click(&self) -> E2eResult<()> {
        debug!("Clicking {}", self.description);
        self.session
            .command(
                Method::POST,
                &format!("/element/{}/click", urlencoding::encode(&self.id)),
                Some(json!({})),
            )
            .await?;
        Ok(())
    }
}

/// Opens sessions on an Appium server with a fixed capability set
#[derive(Debug, Clone)]
pub struct AppiumConnector {
    client: WebDriverClient,
    capabilities: Capabilities,
}

impl AppiumConnector {
    pub fn new(client: WebDriverClient, capabilities: Capabilities) -> Self {
        Self {
            client,
            capabilities,
        }
    }
}

#[async_trait]
impl Connector for AppiumConnector {
    type Session = Session;

    async fn connect(&self) -> E2eResult<Session> {
        self.client.new_session(&self.capabilities).await
    }

    fn endpoint(&self) -> &str {
        self.client.base_url()
    }
}
