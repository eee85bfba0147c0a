//! Configuration for the announcer and resolver
//!
//! Values are read once, validated at construction time and never re-read
//! while a registration loop or lookup is running.

use std::time::Duration;

use config::{Config, Environment, Map};
use url::Url;

use crate::error::{ClientError, Result};

pub const ENV_OVERSEER_HOST: &str = "overseer_host";
pub const ENV_OVERSEER_PORT: &str = "overseer_port";
pub const ENV_ROOT_URL: &str = "root_url";
pub const ENV_ALIVE_URL: &str = "alive_url";

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Location of the overseer registry service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverseerEndpoint {
    /// Host name or address, optionally with a scheme (`https://registry.local`)
    pub host: String,
    /// Port, kept as text the way it arrives from the environment
    pub port: String,
}

impl OverseerEndpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Build the endpoint from `OVERSEER_HOST` / `OVERSEER_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_source(None)
    }

    pub(crate) fn from_source(source: Option<Map<String, String>>) -> Result<Self> {
        let env = load_environment(source)?;
        Ok(Self {
            host: env_string(&env, ENV_OVERSEER_HOST),
            port: env_string(&env, ENV_OVERSEER_PORT),
        })
    }

    /// Check that host and port are present and form a usable URL.
    pub fn validate(&self) -> Result<()> {
        self.base_url().map(|_| ())
    }

    /// Root URL of the overseer, always ending in `/`.
    pub fn base_url(&self) -> Result<Url> {
        let host = self.host.trim().trim_end_matches('/');
        let port = self.port.trim();

        if host.is_empty() {
            return Err(ClientError::config("overseer host is not set"));
        }
        if port.is_empty() {
            return Err(ClientError::config("overseer port is not set"));
        }
        if port.parse::<u16>().is_err() {
            return Err(ClientError::config(format!(
                "overseer port is not a valid port number: {}",
                port
            )));
        }

        let raw = if host.contains("://") {
            format!("{}:{}/", host, port)
        } else {
            format!("http://{}:{}/", host, port)
        };

        Url::parse(&raw)
            .map_err(|e| ClientError::config(format!("invalid overseer address {}: {}", raw, e)))
    }
}

/// Retry and renewal cadence for the registration loop
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
    /// Backoff after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for the backoff
    pub max_backoff: Duration,
    /// Growth factor between consecutive failures
    pub multiplier: f64,
    /// Add up to 25% random jitter to every backoff
    pub jitter: bool,
    /// Give up after this many consecutive failures (`None` retries forever)
    pub max_attempts: Option<u32>,
    /// Pause between successful registrations
    pub renewal_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: 2.0,
            jitter: true,
            max_attempts: None,
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Constant backoff without jitter, the cadence of a plain "sleep and retry" loop.
    pub fn fixed(backoff: Duration) -> Self {
        Self {
            initial_backoff: backoff,
            max_backoff: backoff,
            multiplier: 1.0,
            jitter: false,
            ..Default::default()
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    pub fn with_renewal_interval(mut self, interval: Duration) -> Self {
        self.renewal_interval = interval;
        self
    }

    /// Backoff before retrying after `failures` consecutive failures (0-based).
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.min(i32::MAX as u32) as i32;
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));

        if self.jitter {
            let factor = 1.0 + rand::random::<f64>() * 0.25;
            Duration::from_secs_f64(capped.as_secs_f64() * factor)
        } else {
            capped
        }
    }

    /// Whether the loop must stop after `failures` consecutive failures.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }

    fn validate(&self) -> Result<()> {
        if self.attempt_timeout.is_zero() {
            return Err(ClientError::config("attempt timeout must be greater than zero"));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(ClientError::config(
                "max backoff must not be shorter than the initial backoff",
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ClientError::config("max attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Everything the announcer needs to register one service
#[derive(Clone, Debug)]
pub struct AnnounceConfig {
    /// Name the service is registered under
    pub service_name: String,
    /// Externally reachable root address of this service
    pub root_address: String,
    /// Optional liveness check address
    pub alive_address: Option<String>,
    /// Overseer to announce to
    pub endpoint: OverseerEndpoint,
    /// Retry and renewal cadence
    pub retry: RetryPolicy,
}

impl AnnounceConfig {
    pub fn new(
        service_name: impl Into<String>,
        root_address: impl Into<String>,
        endpoint: OverseerEndpoint,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            root_address: root_address.into(),
            alive_address: None,
            endpoint,
            retry: RetryPolicy::default(),
        }
    }

    /// Read `ROOT_URL`, `ALIVE_URL`, `OVERSEER_HOST` and `OVERSEER_PORT`
    /// from the process environment.
    pub fn from_env(service_name: impl Into<String>) -> Result<Self> {
        Self::from_source(service_name, None)
    }

    pub(crate) fn from_source(
        service_name: impl Into<String>,
        source: Option<Map<String, String>>,
    ) -> Result<Self> {
        let env = load_environment(source)?;
        let alive = env_string(&env, ENV_ALIVE_URL);

        Ok(Self {
            service_name: service_name.into(),
            root_address: env_string(&env, ENV_ROOT_URL),
            alive_address: (!alive.is_empty()).then_some(alive),
            endpoint: OverseerEndpoint {
                host: env_string(&env, ENV_OVERSEER_HOST),
                port: env_string(&env, ENV_OVERSEER_PORT),
            },
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_alive_address(mut self, alive: impl Into<String>) -> Self {
        self.alive_address = Some(alive.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(ClientError::config("service name is not set"));
        }
        if self.root_address.trim().is_empty() {
            return Err(ClientError::config("root address (ROOT_URL) is not set"));
        }
        if self
            .alive_address
            .as_deref()
            .is_some_and(|alive| alive.trim().is_empty())
        {
            return Err(ClientError::config("alive address is set but empty"));
        }
        self.endpoint.validate()?;
        self.retry.validate()
    }
}

fn load_environment(source: Option<Map<String, String>>) -> Result<Config> {
    Config::builder()
        .add_source(Environment::default().source(source))
        .build()
        .map_err(|e| ClientError::config(format!("failed to read environment: {}", e)))
}

fn env_string(config: &Config, key: &str) -> String {
    config.get_string(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_base_url_without_scheme() {
        let endpoint = OverseerEndpoint::new("overseer", "8080");
        assert_eq!(endpoint.base_url().unwrap().as_str(), "http://overseer:8080/");
    }

    #[test]
    fn test_base_url_with_scheme() {
        let endpoint = OverseerEndpoint::new("https://registry.local/", "9443");
        assert_eq!(
            endpoint.base_url().unwrap().as_str(),
            "https://registry.local:9443/"
        );
    }

    #[test]
    fn test_base_url_missing_values() {
        let err = OverseerEndpoint::new("", "8080").base_url().unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));

        let err = OverseerEndpoint::new("overseer", " ").base_url().unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));

        let err = OverseerEndpoint::new("overseer", "http").base_url().unwrap_err();
        assert!(err.to_string().contains("not a valid port"));
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempt_timeout, Duration::from_secs(3));
        assert_eq!(policy.initial_backoff, Duration::from_secs(2));
        assert_eq!(policy.renewal_interval, Duration::from_secs(600));
        assert!(policy.max_attempts.is_none());
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default()
            .with_backoff(Duration::from_secs(2), Duration::from_secs(10))
            .with_jitter(false);

        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy::default().with_jitter(true);
        for _ in 0..100 {
            let delay = policy.backoff_for(0);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_fixed_policy() {
        let policy = RetryPolicy::fixed(Duration::from_secs(2));
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(7), Duration::from_secs(2));
    }

    #[test]
    fn test_exhausted() {
        assert!(!RetryPolicy::default().exhausted(u32::MAX));

        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
    }

    #[test]
    fn test_announce_config_validation() {
        let endpoint = OverseerEndpoint::new("overseer", "8080");

        assert!(AnnounceConfig::new("svc", "http://svc:80", endpoint.clone())
            .validate()
            .is_ok());

        let err = AnnounceConfig::new("", "http://svc:80", endpoint.clone())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("service name"));

        let err = AnnounceConfig::new("svc", "", endpoint.clone())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("ROOT_URL"));

        let err = AnnounceConfig::new("svc", "http://svc:80", endpoint.clone())
            .with_alive_address("")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("alive"));

        let err = AnnounceConfig::new("svc", "http://svc:80", endpoint)
            .with_retry(RetryPolicy::default().with_attempt_timeout(Duration::ZERO))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("attempt timeout"));
    }

    #[test]
    fn test_announce_config_from_source() {
        let config = AnnounceConfig::from_source(
            "billing",
            Some(env(&[
                ("ROOT_URL", "http://billing:8000"),
                ("ALIVE_URL", "http://billing:8000/alive"),
                ("OVERSEER_HOST", "overseer"),
                ("OVERSEER_PORT", "9000"),
            ])),
        )
        .unwrap();

        assert_eq!(config.service_name, "billing");
        assert_eq!(config.root_address, "http://billing:8000");
        assert_eq!(
            config.alive_address.as_deref(),
            Some("http://billing:8000/alive")
        );
        assert_eq!(config.endpoint, OverseerEndpoint::new("overseer", "9000"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_announce_config_from_source_missing_values() {
        let config = AnnounceConfig::from_source(
            "billing",
            Some(env(&[("ROOT_URL", "http://billing:8000")])),
        )
        .unwrap();

        assert!(config.alive_address.is_none());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_endpoint_from_source() {
        let endpoint = OverseerEndpoint::from_source(Some(env(&[
            ("OVERSEER_HOST", "10.0.0.5"),
            ("OVERSEER_PORT", "7000"),
        ])))
        .unwrap();

        assert_eq!(endpoint.base_url().unwrap().as_str(), "http://10.0.0.5:7000/");
    }
}
