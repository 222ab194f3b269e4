//! Configuration management for the platform.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) with sensible defaults. The `app_id` replaces the hardcoded
//! application namespace every document path used to embed.

use naks_yetu_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Namespace of every collection (`artifacts/{app_id}/public/data/...`)
    pub app_id: String,
    /// Public site base URL, used in emails and shortlink destinations
    pub site_base_url: String,
    /// Checkout optimistic-concurrency retries
    pub checkout: CheckoutConfig,
    /// External collaborator endpoints
    pub collaborators: CollaboratorConfig,
    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

/// Retry settings for commits that lose a revision race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay in milliseconds
    pub retry_initial_ms: u64,
    /// Backoff cap in milliseconds
    pub retry_max_ms: u64,
}

/// Collaborator endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Shortlink creation endpoint
    pub shortlink_url: String,
    /// Shortlink analytics endpoint
    pub analytics_url: String,
    /// Transactional email endpoint
    pub email_url: String,
    /// Sender address for platform emails
    pub email_from: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Logging and metrics settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_level: String,
    /// Prometheus exporter port
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: "naks-yetu-dev".to_string(),
            site_base_url: "http://localhost:5173".to_string(),
            checkout: CheckoutConfig {
                max_retries: 5,
                retry_initial_ms: 10,
                retry_max_ms: 500,
            },
            collaborators: CollaboratorConfig {
                shortlink_url: "http://localhost:5001/createShortLink".to_string(),
                analytics_url: "http://localhost:5001/getShortLinkAnalytics".to_string(),
                email_url: "http://localhost:5001/sendEmail".to_string(),
                email_from: "Naks Yetu <no-reply@naksyetu.com>".to_string(),
                timeout_secs: 10,
            },
            observability: ObservabilityConfig {
                log_level: "info,naks_yetu=debug".to_string(),
                metrics_port: 9090,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        // Missing .env is the normal case in production
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            app_id: env::var("NAKS_APP_ID").unwrap_or(defaults.app_id),
            site_base_url: env::var("NAKS_SITE_BASE_URL").unwrap_or(defaults.site_base_url),
            checkout: CheckoutConfig {
                max_retries: parsed("NAKS_CHECKOUT_MAX_RETRIES")
                    .unwrap_or(defaults.checkout.max_retries),
                retry_initial_ms: parsed("NAKS_CHECKOUT_RETRY_INITIAL_MS")
                    .unwrap_or(defaults.checkout.retry_initial_ms),
                retry_max_ms: parsed("NAKS_CHECKOUT_RETRY_MAX_MS")
                    .unwrap_or(defaults.checkout.retry_max_ms),
            },
            collaborators: CollaboratorConfig {
                shortlink_url: env::var("NAKS_SHORTLINK_URL")
                    .unwrap_or(defaults.collaborators.shortlink_url),
                analytics_url: env::var("NAKS_ANALYTICS_URL")
                    .unwrap_or(defaults.collaborators.analytics_url),
                email_url: env::var("NAKS_EMAIL_URL").unwrap_or(defaults.collaborators.email_url),
                email_from: env::var("NAKS_EMAIL_FROM")
                    .unwrap_or(defaults.collaborators.email_from),
                timeout_secs: parsed("NAKS_COLLABORATOR_TIMEOUT_SECS")
                    .unwrap_or(defaults.collaborators.timeout_secs),
            },
            observability: ObservabilityConfig {
                log_level: env::var("RUST_LOG").unwrap_or(defaults.observability.log_level),
                metrics_port: parsed("METRICS_PORT").unwrap_or(defaults.observability.metrics_port),
            },
        }
    }

    /// Use a different application namespace
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Collection paths under this configuration's namespace
    #[must_use]
    pub fn collections(&self) -> Collections {
        Collections::new(&self.app_id)
    }

    /// Backoff policy for revision conflicts
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.checkout.max_retries)
            .initial_delay(Duration::from_millis(self.checkout.retry_initial_ms))
            .max_delay(Duration::from_millis(self.checkout.retry_max_ms))
            .build()
    }

    /// Collaborator request timeout
    #[must_use]
    pub const fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborators.timeout_secs)
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Collection paths of every record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    /// Event listings
    pub events: String,
    /// Ticket orders
    pub orders: String,
    /// RSVPs
    pub rsvps: String,
    /// User profiles
    pub users: String,
    /// Admin audit trail
    pub audit_logs: String,
}

impl Collections {
    /// Paths under `artifacts/{app_id}/public/data`
    #[must_use]
    pub fn new(app_id: &str) -> Self {
        let root = format!("artifacts/{app_id}/public/data");
        Self {
            events: format!("{root}/events"),
            orders: format!("{root}/orders"),
            rsvps: format!("{root}/rsvps"),
            users: format!("{root}/users"),
            audit_logs: format!("{root}/audit_logs"),
        }
    }
}
