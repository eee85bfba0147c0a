//! Service resolution
//!
//! One bounded lookup per call. Retrying is left to the caller.

use std::time::Duration;

use tracing::{debug, warn};

use crate::attempt::{AttemptOutcome, PendingAttempt};
use crate::config::{DEFAULT_ATTEMPT_TIMEOUT, OverseerEndpoint};
use crate::error::Result;
use crate::http::OverseerHttpClient;
use crate::model::ResolvedService;

/// Looks up service addresses at the overseer.
#[derive(Clone, Debug)]
pub struct Resolver {
    client: OverseerHttpClient,
    timeout: Duration,
}

impl Resolver {
    /// Create a resolver with the default 3 second deadline.
    pub fn new(endpoint: &OverseerEndpoint) -> Result<Self> {
        Ok(Self {
            client: OverseerHttpClient::new(endpoint, DEFAULT_ATTEMPT_TIMEOUT)?,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        })
    }

    /// Create a resolver for the overseer named by `OVERSEER_HOST` / `OVERSEER_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::new(&OverseerEndpoint::from_env()?)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `service_name` to its registered address.
    ///
    /// Fails with `Timeout` if the overseer does not answer within the
    /// deadline, `HttpStatus` or `Transport` if the request fails, and
    /// `Decode` if a successful answer is not a valid service entry.
    pub async fn resolve(&self, service_name: &str) -> Result<ResolvedService> {
        // Reject bad names before anything is dispatched.
        self.client.service_url(service_name)?;

        let client = self.client.clone();
        let name = service_name.to_string();
        let attempt = PendingAttempt::dispatch(async move { client.get_service(&name).await });

        match attempt.wait(self.timeout).await {
            AttemptOutcome::Success(service) => {
                debug!(
                    service = %service_name,
                    address = %service.address,
                    "Resolved service"
                );
                Ok(service)
            }
            outcome => {
                let result = outcome.into_result();
                if let Err(e) = &result {
                    warn!(service = %service_name, error = %e, "Service lookup failed");
                }
                result
            }
        }
    }
}

/// Resolve `service_name` with a one-off resolver.
pub async fn resolve(service_name: &str, endpoint: &OverseerEndpoint) -> Result<ResolvedService> {
    Resolver::new(endpoint)?.resolve(service_name).await
}
