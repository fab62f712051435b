//! Session capabilities forwarded to the automation server

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Capability names defined by the W3C WebDriver spec. Everything else needs
/// a vendor prefix in a W3C new-session request.
const W3C_CAPABILITIES: &[&str] = &[
    "acceptInsecureCerts",
    "browserName",
    "browserVersion",
    "pageLoadStrategy",
    "platformName",
    "proxy",
    "setWindowRect",
    "strictFileInteractability",
    "timeouts",
    "unhandledPromptBehavior",
    "webSocketUrl",
];

const APPIUM_PREFIX: &str = "appium:";

/// Immutable capability map, passed opaquely to the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeMap<String, Value>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// iOS simulator + Flutter driver defaults used by the smoke test
    pub fn ios_flutter() -> Self {
        Self::new()
            .with("platformName", "iOS")
            .with("platformVersion", "17.2")
            .with("deviceName", "iPhone 15")
            .with("app", "build/ios/Debug-iphonesimulator/Runner.app")
            .with("automationName", "Flutter")
            .with("noReset", true)
            .with("waitForDebugger", true)
            .with("startIWDP", true)
            .with("webviewConnectRetries", 3)
            .with("clearSystemFiles", true)
            .with("derivedDataPath", "ios/DerivedData")
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Overlay another set of capabilities on top of this one
    pub fn merged(mut self, other: &Capabilities) -> Self {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `capabilities` object of a W3C new-session request
    pub fn to_w3c(&self) -> Value {
        let always_match: serde_json::Map<String, Value> = self
            .0
            .iter()
            .map(|(name, value)| (w3c_name(name), value.clone()))
            .collect();

        json!({
            "alwaysMatch": always_match,
            "firstMatch": [{}],
        })
    }
}

fn w3c_name(name: &str) -> String {
    if W3C_CAPABILITIES.contains(&name) || name.contains(':') {
        name.to_string()
    } else {
        format!("{}{}", APPIUM_PREFIX, name)
    }
}
