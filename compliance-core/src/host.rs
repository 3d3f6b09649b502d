//! Capabilities the controller borrows from its front end
//!
//! Dialogs, navigation and toasts are owned by whatever renders the console.
//! The controller only sees these traits, so workflows can be driven in tests
//! without a real dialog or router.

use async_trait::async_trait;

/// Result of a confirmation or prompt dialog
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DialogOutcome {
    pub confirmed: bool,
    pub value: Option<String>,
}

impl DialogOutcome {
    pub fn confirmed() -> Self {
        Self {
            confirmed: true,
            value: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            confirmed: true,
            value: Some(value.into()),
        }
    }
}

/// Blocking dialogs; they suspend the workflow, not the event loop
#[async_trait(?Send)]
pub trait Dialogs {
    /// Yes/no confirmation
    async fn confirm(&self, message: &str) -> DialogOutcome;

    /// Free-text prompt
    async fn prompt(&self, message: &str) -> DialogOutcome;
}

/// Navigation state the list is bound to
pub trait Navigator {
    /// Current query string, without the leading `?`
    fn current_query(&self) -> String;

    /// Commit a new query string for the current location
    fn replace_query(&self, query: &str);

    /// Leave for the login surface
    fn redirect_to_login(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier {
    fn notify(&self, toast: Toast);
}

/// Everything the controller needs from its front end
pub trait Host: Dialogs + Navigator + Notifier {}

impl<T: Dialogs + Navigator + Notifier> Host for T {}
