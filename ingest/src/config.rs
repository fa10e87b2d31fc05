use crate::sinks::SinkKind;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ANALYTICS_ENDPOINT: &str = "https://www.google-analytics.com/mp/collect";
pub const DEFAULT_PRODUCT_ANALYTICS_HOST: &str = "https://app.posthog.com";
pub const DEFAULT_MONITORING_SITE: &str = "datadoghq.com";

/// Environment variables that enable the individual sinks.
pub mod env {
    pub const ERROR_TRACKING_ENDPOINT: &str = "ERROR_TRACKING_ENDPOINT";
    pub const ERROR_TRACKING_KEY: &str = "ERROR_TRACKING_KEY";
    pub const ALERT_WEBHOOK_URL: &str = "ALERT_WEBHOOK_URL";
    pub const GA_MEASUREMENT_ID: &str = "GA_MEASUREMENT_ID";
    pub const GA_API_SECRET: &str = "GA_API_SECRET";
    pub const POSTHOG_API_KEY: &str = "POSTHOG_API_KEY";
    pub const POSTHOG_HOST: &str = "POSTHOG_HOST";
    pub const DATADOG_API_KEY: &str = "DATADOG_API_KEY";
    pub const DATADOG_SITE: &str = "DATADOG_SITE";
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Sink timeout cannot be 0")]
    InvalidSinkTimeout,

    #[error("Body size limit cannot be 0")]
    InvalidBodyLimit,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid URL in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Ingest service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the ingestion endpoints
    #[serde(default = "Listener::default_ingest")]
    pub listener: Listener,
    /// Listener for `/health` and `/ready`
    #[serde(default = "Listener::default_admin")]
    pub admin_listener: Listener,
    /// Upper bound on every outbound sink call
    #[serde(default = "default_sink_timeout_secs")]
    pub sink_timeout_secs: u64,
    /// Request bodies above this size are rejected
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// How long both listeners keep serving after a shutdown signal, with
    /// `/ready` failing
    #[serde(default = "default_shutdown_drain_secs")]
    pub shutdown_drain_secs: u64,
    #[serde(default)]
    pub sinks: SinksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: Listener::default_ingest(),
            admin_listener: Listener::default_admin(),
            sink_timeout_secs: default_sink_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_drain_secs: default_shutdown_drain_secs(),
            sinks: SinksConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.sink_timeout_secs == 0 {
            return Err(ValidationError::InvalidSinkTimeout);
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit);
        }

        Ok(())
    }
}

fn default_sink_timeout_secs() -> u64 {
    5
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_shutdown_drain_secs() -> u64 {
    5
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn default_ingest() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }

    fn default_admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Optional destinations. A sink runs only when its entry is present.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SinksConfig {
    pub error_tracking: Option<ErrorTrackingConfig>,
    pub webhook: Option<WebhookConfig>,
    pub analytics: Option<AnalyticsConfig>,
    pub product_analytics: Option<ProductAnalyticsConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

/// Sentry-style store endpoint
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ErrorTrackingConfig {
    pub endpoint: Url,
    pub key: String,
}

/// Chat webhook accepting `{"text": ...}`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: Url,
}

/// GA4 Measurement Protocol
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    pub measurement_id: String,
    pub api_secret: String,
    #[serde(default = "default_analytics_endpoint")]
    pub endpoint: Url,
}

/// PostHog capture API
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ProductAnalyticsConfig {
    pub api_key: String,
    #[serde(default = "default_product_analytics_endpoint")]
    pub endpoint: Url,
}

/// DataDog series API
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    pub api_key: String,
    #[serde(default = "default_monitoring_endpoint")]
    pub endpoint: Url,
}

fn default_analytics_endpoint() -> Url {
    Url::parse(DEFAULT_ANALYTICS_ENDPOINT).expect("default analytics endpoint is a valid URL")
}

fn default_product_analytics_endpoint() -> Url {
    capture_url(DEFAULT_PRODUCT_ANALYTICS_HOST).expect("default capture endpoint is a valid URL")
}

fn default_monitoring_endpoint() -> Url {
    series_url(DEFAULT_MONITORING_SITE).expect("default series endpoint is a valid URL")
}

fn capture_url(host: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/capture/", host.trim_end_matches('/')))
}

fn series_url(site: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("https://api.{}/api/v1/series", site.trim()))
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl { var, source })
}

impl SinksConfig {
    /// Reads sink destinations from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the sink set from a variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let error_tracking = match (var(env::ERROR_TRACKING_ENDPOINT), var(env::ERROR_TRACKING_KEY)) {
            (Some(endpoint), Some(key)) => Some(ErrorTrackingConfig {
                endpoint: parse_url(env::ERROR_TRACKING_ENDPOINT, &endpoint)?,
                key,
            }),
            _ => None,
        };

        let webhook = var(env::ALERT_WEBHOOK_URL)
            .map(|url| parse_url(env::ALERT_WEBHOOK_URL, &url))
            .transpose()?
            .map(|url| WebhookConfig { url });

        let analytics = match (var(env::GA_MEASUREMENT_ID), var(env::GA_API_SECRET)) {
            (Some(measurement_id), Some(api_secret)) => Some(AnalyticsConfig {
                measurement_id,
                api_secret,
                endpoint: default_analytics_endpoint(),
            }),
            _ => None,
        };

        let product_analytics = match var(env::POSTHOG_API_KEY) {
            Some(api_key) => {
                let endpoint = match var(env::POSTHOG_HOST) {
                    Some(host) => capture_url(&host).map_err(|source| ConfigError::InvalidUrl {
                        var: env::POSTHOG_HOST,
                        source,
                    })?,
                    None => default_product_analytics_endpoint(),
                };
                Some(ProductAnalyticsConfig { api_key, endpoint })
            }
            None => None,
        };

        let monitoring = match var(env::DATADOG_API_KEY) {
            Some(api_key) => {
                let endpoint = match var(env::DATADOG_SITE) {
                    Some(site) => series_url(&site).map_err(|source| ConfigError::InvalidUrl {
                        var: env::DATADOG_SITE,
                        source,
                    })?,
                    None => default_monitoring_endpoint(),
                };
                Some(MonitoringConfig { api_key, endpoint })
            }
            None => None,
        };

        Ok(SinksConfig {
            error_tracking,
            webhook,
            analytics,
            product_analytics,
            monitoring,
        })
    }

    /// Fills every sink left unset with the one from `fallback`.
    pub fn or(self, fallback: SinksConfig) -> Self {
        SinksConfig {
            error_tracking: self.error_tracking.or(fallback.error_tracking),
            webhook: self.webhook.or(fallback.webhook),
            analytics: self.analytics.or(fallback.analytics),
            product_analytics: self.product_analytics.or(fallback.product_analytics),
            monitoring: self.monitoring.or(fallback.monitoring),
        }
    }

    pub fn enabled(&self) -> Vec<SinkKind> {
        let mut kinds = Vec::new();
        if self.error_tracking.is_some() {
            kinds.push(SinkKind::ErrorTracking);
        }
        if self.webhook.is_some() {
            kinds.push(SinkKind::Webhook);
        }
        if self.analytics.is_some() {
            kinds.push(SinkKind::Analytics);
        }
        if self.product_analytics.is_some() {
            kinds.push(SinkKind::ProductAnalytics);
        }
        if self.monitoring.is_some() {
            kinds.push(SinkKind::Monitoring);
        }
        kinds
    }
}
