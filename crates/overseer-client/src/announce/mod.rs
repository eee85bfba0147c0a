//! Service announcement
//!
//! Provides `Announcer`, which registers a service with the overseer on a
//! background task, retries failed attempts with backoff and re-registers on
//! a fixed cadence so the entry survives an overseer restart.

pub mod listener;

use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::attempt::{AttemptOutcome, PendingAttempt};
use crate::config::{AnnounceConfig, OverseerEndpoint, RetryPolicy};
use crate::error::{ClientError, Result};
use crate::http::OverseerHttpClient;
use crate::model::Registration;

use self::listener::{AnnounceEvent, AnnounceListener};

/// Registers one service with the overseer and keeps it registered.
pub struct Announcer {
    service_name: String,
    /// Serialized once, re-sent unchanged on every attempt
    body: Bytes,
    client: OverseerHttpClient,
    retry: RetryPolicy,
    listener: Option<Arc<dyn AnnounceListener>>,
}

impl Announcer {
    /// Validate the configuration and prepare the registration payload.
    pub fn new(config: AnnounceConfig) -> Result<Self> {
        config.validate()?;

        let mut registration = Registration::new(&config.service_name, &config.root_address);
        registration.alive = config.alive_address.clone();
        let body = Bytes::from(serde_json::to_vec(&registration)?);

        let client = OverseerHttpClient::new(&config.endpoint, config.retry.attempt_timeout)?;

        Ok(Self {
            service_name: config.service_name,
            body,
            client,
            retry: config.retry,
            listener: None,
        })
    }

    /// Attach a listener that is told about every step of the loop.
    pub fn with_listener(mut self, listener: Arc<dyn AnnounceListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The exact JSON body posted on every attempt.
    pub fn registration_body(&self) -> &Bytes {
        &self.body
    }

    /// Launch the registration loop on the current tokio runtime and return
    /// immediately. Fails with a configuration error outside a runtime.
    pub fn spawn(self) -> Result<AnnounceHandle> {
        let runtime = Handle::try_current().map_err(|e| {
            ClientError::config(format!("no tokio runtime to run the announce loop on: {}", e))
        })?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let service_name = self.service_name.clone();

        info!(
            service = %self.service_name,
            overseer = %self.client.registration_url(),
            payload = %String::from_utf8_lossy(&self.body),
            "Announcing service to overseer"
        );

        let task = runtime.spawn(self.run(stop_rx));

        Ok(AnnounceHandle {
            service_name,
            stop_tx,
            task,
        })
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) -> Result<AnnounceSummary> {
        let mut summary = AnnounceSummary::default();
        let mut failures: u32 = 0;

        loop {
            let client = self.client.clone();
            let body = self.body.clone();
            let attempt = PendingAttempt::dispatch(async move { client.post_registration(body).await });

            debug!(service = %self.service_name, "Registration attempt dispatched");

            let outcome = tokio::select! {
                outcome = attempt.wait(self.retry.attempt_timeout) => outcome,
                _ = stop_requested(&mut stop_rx) => return Ok(self.stopped(summary)),
            };
            summary.attempts += 1;

            let pause = match outcome {
                AttemptOutcome::Success(()) => {
                    failures = 0;
                    summary.registrations += 1;
                    info!(
                        service = %self.service_name,
                        registrations = summary.registrations,
                        "Service registered with overseer"
                    );
                    self.emit(AnnounceEvent::Registered {
                        service_name: self.service_name.clone(),
                        registrations: summary.registrations,
                        renew_in: self.retry.renewal_interval,
                    });
                    self.retry.renewal_interval
                }
                AttemptOutcome::Failed(err) => {
                    failures += 1;
                    if self.retry.exhausted(failures) {
                        return Err(self.give_up(failures));
                    }
                    let retry_in = self.retry.backoff_for(failures - 1);
                    warn!(
                        service = %self.service_name,
                        error = %err,
                        failures,
                        retry_in = ?retry_in,
                        "Registering service failed"
                    );
                    self.emit(AnnounceEvent::Failed {
                        service_name: self.service_name.clone(),
                        error: err.to_string(),
                        failures,
                        retry_in,
                    });
                    retry_in
                }
                AttemptOutcome::TimedOut(deadline) => {
                    failures += 1;
                    if self.retry.exhausted(failures) {
                        return Err(self.give_up(failures));
                    }
                    let retry_in = self.retry.backoff_for(failures - 1);
                    warn!(
                        service = %self.service_name,
                        deadline = ?deadline,
                        failures,
                        retry_in = ?retry_in,
                        "Registering service failed with timeout"
                    );
                    self.emit(AnnounceEvent::TimedOut {
                        service_name: self.service_name.clone(),
                        failures,
                        retry_in,
                    });
                    retry_in
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = stop_requested(&mut stop_rx) => return Ok(self.stopped(summary)),
            }
        }
    }

    fn give_up(&self, attempts: u32) -> ClientError {
        error!(
            service = %self.service_name,
            attempts,
            "Giving up on service registration"
        );
        self.emit(AnnounceEvent::RetriesExhausted {
            service_name: self.service_name.clone(),
            attempts,
        });
        ClientError::RetriesExhausted { attempts }
    }

    fn stopped(&self, summary: AnnounceSummary) -> AnnounceSummary {
        info!(
            service = %self.service_name,
            attempts = summary.attempts,
            registrations = summary.registrations,
            "Service announcement stopped"
        );
        self.emit(AnnounceEvent::Stopped {
            service_name: self.service_name.clone(),
        });
        summary
    }

    fn emit(&self, event: AnnounceEvent) {
        if let Some(listener) = &self.listener {
            listener.on_event(event);
        }
    }
}

/// Resolves once a stop was requested. A dropped handle never stops the loop.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    let handle_alive = stop_rx.wait_for(|stop| *stop).await.is_ok();
    if !handle_alive {
        std::future::pending::<()>().await;
    }
}

/// Counters reported when a registration loop ends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnnounceSummary {
    /// Attempts whose outcome was acted upon
    pub attempts: u64,
    /// Attempts the overseer accepted
    pub registrations: u64,
}

/// Owner's handle on a running registration loop.
///
/// Dropping the handle detaches the loop; it then runs until the process exits.
pub struct AnnounceHandle {
    service_name: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Result<AnnounceSummary>>,
}

impl AnnounceHandle {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Ask the loop to exit at its next suspension point.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end.
    pub async fn join(self) -> Result<AnnounceSummary> {
        self.task
            .await
            .map_err(|e| ClientError::TaskFailed(e.to_string()))?
    }

    /// Stop the loop and wait for it to end.
    pub async fn shutdown(self) -> Result<AnnounceSummary> {
        self.stop();
        self.join().await
    }
}

/// Announce `service_name` at `root_address` to the overseer.
///
/// Returns as soon as the background loop is running. A configuration
/// problem is logged and returned without starting the loop; everything
/// after that is retried internally.
pub fn announce(
    service_name: &str,
    root_address: &str,
    alive_address: Option<&str>,
    endpoint: OverseerEndpoint,
) -> Result<AnnounceHandle> {
    let mut config = AnnounceConfig::new(service_name, root_address, endpoint);
    config.alive_address = alive_address.map(str::to_string);
    start(config)
}

/// Announce `service_name` using `ROOT_URL`, `ALIVE_URL`, `OVERSEER_HOST`
/// and `OVERSEER_PORT` from the environment.
pub fn announce_from_env(service_name: &str) -> Result<AnnounceHandle> {
    start(AnnounceConfig::from_env(service_name)?)
}

fn start(config: AnnounceConfig) -> Result<AnnounceHandle> {
    let service_name = config.service_name.clone();
    match Announcer::new(config).and_then(Announcer::spawn) {
        Ok(handle) => Ok(handle),
        Err(e) => {
            error!(service = %service_name, error = %e, "Service not announced");
            Err(e)
        }
    }
}
