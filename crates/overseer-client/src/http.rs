//! HTTP transport to the overseer
//!
//! One POST registers a service, one GET resolves it. Status classification
//! lives here so the announcer and resolver agree on what counts as success.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Response, header::CONTENT_TYPE};
use tracing::debug;
use url::Url;

use crate::config::OverseerEndpoint;
use crate::error::{ClientError, Result};
use crate::model::ResolvedService;

/// Thin reqwest wrapper bound to a single overseer
#[derive(Clone, Debug)]
pub struct OverseerHttpClient {
    client: Client,
    base_url: Url,
}

impl OverseerHttpClient {
    /// Create a client for the given overseer.
    ///
    /// `connect_timeout` bounds connection setup only; callers enforce the
    /// per-attempt deadline themselves.
    pub fn new(endpoint: &OverseerEndpoint, connect_timeout: Duration) -> Result<Self> {
        let base_url = endpoint.base_url()?;
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// URL registrations are posted to
    pub fn registration_url(&self) -> &Url {
        &self.base_url
    }

    /// URL a service name is looked up at (`{base}/{name}`, name percent-encoded)
    pub fn service_url(&self, service_name: &str) -> Result<Url> {
        if service_name.is_empty() {
            return Err(ClientError::config("service name must not be empty"));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::config("overseer URL cannot be a base"))?
            .pop_if_empty()
            .push(service_name);
        Ok(url)
    }

    /// POST an already serialized registration body.
    pub async fn post_registration(&self, body: Bytes) -> Result<()> {
        debug!(url = %self.base_url, "Posting service registration");

        let response = self
            .client
            .post(self.base_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        check_status(&response)?;
        Ok(())
    }

    /// GET the registry entry for `service_name` and decode it.
    pub async fn get_service(&self, service_name: &str) -> Result<ResolvedService> {
        let url = self.service_url(service_name)?;
        debug!(url = %url, "Querying overseer");

        let response = self.client.get(url).send().await?;
        check_status(&response)?;

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Anything at or above 300 is a failed request.
fn check_status(response: &Response) -> Result<()> {
    let status = response.status();
    if status.as_u16() > 299 {
        return Err(ClientError::http_status(status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str, port: &str) -> OverseerHttpClient {
        OverseerHttpClient::new(&OverseerEndpoint::new(host, port), Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn test_registration_url() {
        let client = client("overseer", "8080");
        assert_eq!(client.registration_url().as_str(), "http://overseer:8080/");
    }

    #[test]
    fn test_service_url() {
        let client = client("overseer", "8080");
        assert_eq!(
            client.service_url("billing").unwrap().as_str(),
            "http://overseer:8080/billing"
        );
    }

    #[test]
    fn test_service_url_escapes_name() {
        let client = client("overseer", "8080");
        assert_eq!(
            client.service_url("a/b c").unwrap().as_str(),
            "http://overseer:8080/a%2Fb%20c"
        );
    }

    #[test]
    fn test_service_url_rejects_empty_name() {
        let client = client("overseer", "8080");
        assert!(matches!(
            client.service_url(""),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let result = OverseerHttpClient::new(
            &OverseerEndpoint::new("overseer", ""),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
