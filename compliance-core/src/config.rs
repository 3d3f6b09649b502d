//! Console configuration and shared context
//!
//! Configuration is a YAML file (default `~/.compliance-console.yaml`, or the
//! path in `COMPLY_CONFIG_PATH`) with environment overrides applied on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::PollerConfig;

/// Console display language
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Some(Locale::En),
            "fr" | "fr-fr" | "fr-ca" => Some(Locale::Fr),
            _ => None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => write!(f, "en"),
            Locale::Fr => write!(f, "fr"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// Settings read from the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the compliance service API
    pub api_base_url: String,
    /// Rows per list page
    pub page_size: u32,
    /// Background revalidation interval in seconds (0 disables it)
    pub revalidate_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub locale: Locale,
    pub theme: Theme,
    /// Completion actor used when no profile is available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Session cookie (`name=value`) sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    pub poll_interval_secs: u64,
    pub poll_error_backoff_secs: u64,
    /// Where users are sent when the session is missing
    pub login_url: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".to_string(),
            page_size: 10,
            revalidate_interval_secs: 30,
            request_timeout_secs: 30,
            locale: Locale::En,
            theme: Theme::System,
            actor: None,
            session_cookie: None,
            poll_interval_secs: 3,
            poll_error_backoff_secs: 15,
            login_url: "http://localhost:3000/login".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Loads the configuration from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the configuration, using defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the configuration to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        // Ensure parent directories exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Applies `COMPLY_*` environment variables on top of the file values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("COMPLY_API_URL").filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(session) = lookup("COMPLY_SESSION").filter(|v| !v.is_empty()) {
            self.session_cookie = Some(session);
        }
        if let Some(actor) = lookup("COMPLY_ACTOR").filter(|v| !v.is_empty()) {
            self.actor = Some(actor);
        }
        if let Some(locale) = lookup("COMPLY_LOCALE").and_then(|v| Locale::from_code(&v)) {
            self.locale = locale;
        }
    }

    pub fn revalidate_interval(&self) -> Option<Duration> {
        (self.revalidate_interval_secs > 0).then(|| Duration::from_secs(self.revalidate_interval_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Page size, never zero
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            error_backoff: Duration::from_secs(self.poll_error_backoff_secs.max(1)),
        }
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    // Check if COMPLY_CONFIG_PATH environment variable is set
    if let Ok(path) = std::env::var("COMPLY_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".compliance-console.yaml"))
}

/// Presentation preferences shared by every view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub locale: Locale,
    pub theme: Theme,
}

/// Context handed to the controller instead of ambient globals.
///
/// Preferences can be read anywhere but are only written through
/// [`ConsoleContext::set_preferences`].
#[derive(Debug, Default)]
pub struct ConsoleContext {
    preferences: Cell<Preferences>,
    actor: RefCell<Option<String>>,
}

impl ConsoleContext {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            preferences: Cell::new(preferences),
            actor: RefCell::new(None),
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Self {
        let context = Self::new(Preferences {
            locale: config.locale,
            theme: config.theme,
        });
        if let Some(actor) = &config.actor {
            context.set_actor(actor.clone());
        }
        context
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.get()
    }

    pub fn locale(&self) -> Locale {
        self.preferences.get().locale
    }

    pub fn theme(&self) -> Theme {
        self.preferences.get().theme
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        self.preferences.set(preferences);
    }

    /// Identity recorded as the completion actor
    pub fn actor(&self) -> Option<String> {
        self.actor.borrow().clone()
    }

    pub fn set_actor(&self, actor: impl Into<String>) {
        *self.actor.borrow_mut() = Some(actor.into());
    }
}
