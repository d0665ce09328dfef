//! Backend-to-UI events and error modeling for the dashboard controller.

use client_core::{CommandOutcome, TransportEvent};

pub enum UiEvent {
    BackendReady,
    Transport(TransportEvent),
    Outcome(CommandOutcome),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    CommandQueue,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("transport")
            || message_lower.contains("disconnected")
            || message_lower.contains("runtime")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Startup failures leave the dashboard without a backend for the session.
    pub fn is_fatal(&self) -> bool {
        self.context == UiErrorContext::BackendStartup
    }

    pub fn display_message(&self) -> String {
        let label = match self.category {
            UiErrorCategory::Transport => "Connection problem",
            UiErrorCategory::Validation => "Invalid input",
            UiErrorCategory::Unknown => "Error",
        };
        format!("{label}: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_queue_disconnect_as_transport_error() {
        let err = UiError::from_message(
            UiErrorContext::CommandQueue,
            "Backend command processor disconnected",
        );
        assert_eq!(err.category(), UiErrorCategory::Transport);
        assert!(!err.is_fatal());
    }

    #[test]
    fn invalid_server_url_is_a_validation_error() {
        let err = UiError::from_message(
            UiErrorContext::BackendStartup,
            "invalid server url 'localhost': relative URL without a base",
        );
        assert_eq!(err.category(), UiErrorCategory::Validation);
        assert!(err.is_fatal());
        assert!(err.display_message().starts_with("Invalid input: "));
    }
}
