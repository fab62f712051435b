//! Flutter element locators
//!
//! The Flutter driver addresses widgets by a serialized finder: compact JSON
//! describing the match, base64 encoded. The encoded string doubles as the
//! element reference in WebDriver element commands.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

/// Value of a `ValueKey`, which may be a string or an integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Str(String),
    Int(i64),
}

impl KeyValue {
    fn type_name(&self) -> &'static str {
        match self {
            KeyValue::Str(_) => "String",
            KeyValue::Int(_) => "int",
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Str(s) => f.write_str(s),
            KeyValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// A widget locator understood by the Flutter driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finderType")]
pub enum FlutterFinder {
    #[serde(rename = "ByValueKey")]
    ByValueKey {
        #[serde(rename = "keyValueString")]
        key: KeyValue,
        #[serde(rename = "keyValueType")]
        key_type: &'static str,
    },

    #[serde(rename = "ByText")]
    ByText { text: String },

    #[serde(rename = "ByTooltipMessage")]
    ByTooltip { text: String },

    #[serde(rename = "ByType")]
    ByType {
        #[serde(rename = "type")]
        widget_type: String,
    },

    #[serde(rename = "BySemanticsLabel")]
    BySemanticsLabel {
        label: String,
        #[serde(rename = "isRegExp")]
        is_regexp: bool,
    },
}

impl FlutterFinder {
    /// Match a widget by `Key('...')`
    pub fn by_value_key(key: impl Into<String>) -> Self {
        let key = KeyValue::Str(key.into());
        FlutterFinder::ByValueKey {
            key_type: key.type_name(),
            key,
        }
    }

    /// Match a widget by `ValueKey<int>(...)`
    pub fn by_value_key_int(key: i64) -> Self {
        let key = KeyValue::Int(key);
        FlutterFinder::ByValueKey {
            key_type: key.type_name(),
            key,
        }
    }

    pub fn by_text(text: impl Into<String>) -> Self {
        FlutterFinder::ByText { text: text.into() }
    }

    pub fn by_tooltip(text: impl Into<String>) -> Self {
        FlutterFinder::ByTooltip { text: text.into() }
    }

    pub fn by_type(widget_type: impl Into<String>) -> Self {
        FlutterFinder::ByType {
            widget_type: widget_type.into(),
        }
    }

    pub fn by_semantics_label(label: impl Into<String>) -> Self {
        FlutterFinder::BySemanticsLabel {
            label: label.into(),
            is_regexp: false,
        }
    }

    /// Base64 of the compact JSON form; used as the element reference
    pub fn encode(&self) -> String {
        // Serializing a plain enum of strings and integers cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        STANDARD.encode(json.as_bytes())
    }

    /// Short human-readable form for logs and errors
    pub fn describe(&self) -> String {
        match self {
            FlutterFinder::ByValueKey { key, .. } => key.to_string(),
            FlutterFinder::ByText { text } => format!("text:{}", text),
            FlutterFinder::ByTooltip { text } => format!("tooltip:{}", text),
            FlutterFinder::ByType { widget_type } => format!("type:{}", widget_type),
            FlutterFinder::BySemanticsLabel { label, .. } => format!("semantics:{}", label),
        }
    }
}

impl fmt::Display for FlutterFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
