//! Client core for the ClassQuiz classroom dashboard.
//!
//! [`store::DashboardState`] is the single owned state value. Transport
//! events and command outcomes are applied to it on one thread, and renderers
//! project from it.

pub mod api;
pub mod config;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod logs;
pub mod prefs;
pub mod question;
pub mod store;
pub mod transport;

pub use api::{BackendApi, HttpBackendApi, LoadSource};
pub use dispatcher::{Command, CommandDispatcher, CommandOutcome};
pub use error::{ApiClientError, TransportError};
pub use store::DashboardState;
pub use transport::{EventSink, ReconnectPolicy, TransportEvent, WsTransport};
