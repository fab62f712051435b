//! Flutter app smoke testing over Appium
//!
//! This crate drives a Flutter application on a simulator through an Appium
//! server speaking the W3C WebDriver protocol:
//! - Creates a session with bounded retry while the server warms up
//! - Locates widgets with Flutter driver finders (`ValueKey`, text, ...)
//! - Taps the target widget
//! - Always releases the session once it was created
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SmokeTest (Rust)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  with_session(connector, policy, body)                      │
//! │    ├── init_session() -> Connected<Session>   (retry loop)  │
//! │    ├── body(&Connected<Session>)                            │
//! │    │     ├── set_implicit_wait                              │
//! │    │     ├── warm-up pause                                  │
//! │    │     ├── find_element(FlutterFinder::by_value_key)      │
//! │    │     └── Element::click                                 │
//! │    └── Session::quit()          (always, incl. panic/drop)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Appium server  POST /session, /timeouts, /execute/sync,    │
//! │                 /element/{id}/click, DELETE /session/{id}   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod capabilities;
pub mod config;
pub mod connect;
pub mod error;
pub mod finder;
pub mod session;
pub mod smoke;
pub mod webdriver;

pub use capabilities::Capabilities;
pub use config::SmokeConfig;
pub use connect::{init_session, Connected, Connector, RetryPolicy};
pub use error::{E2eError, E2eResult};
pub use finder::FlutterFinder;
pub use session::{with_session, SessionHandle, SessionOutcome};
pub use smoke::{SmokeFailure, SmokeReport, SmokeTest, StepResult};
pub use webdriver::{AppiumConnector, Element, Session, WebDriverClient};
