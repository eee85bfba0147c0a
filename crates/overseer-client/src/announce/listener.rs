//! Announce event listener trait and event types

use std::time::Duration;

/// Progress of a registration loop, delivered to listeners after each step.
#[derive(Clone, Debug, PartialEq)]
pub enum AnnounceEvent {
    /// The overseer accepted the registration; the next renewal is due in `renew_in`.
    Registered {
        service_name: String,
        registrations: u64,
        renew_in: Duration,
    },
    /// The attempt failed with a transport error or an error status.
    Failed {
        service_name: String,
        error: String,
        failures: u32,
        retry_in: Duration,
    },
    /// The overseer did not answer before the attempt deadline.
    TimedOut {
        service_name: String,
        failures: u32,
        retry_in: Duration,
    },
    /// The retry limit was reached and the loop ended.
    RetriesExhausted { service_name: String, attempts: u32 },
    /// The owner stopped the loop.
    Stopped { service_name: String },
}

impl AnnounceEvent {
    pub fn service_name(&self) -> &str {
        match self {
            Self::Registered { service_name, .. }
            | Self::Failed { service_name, .. }
            | Self::TimedOut { service_name, .. }
            | Self::RetriesExhausted { service_name, .. }
            | Self::Stopped { service_name } => service_name,
        }
    }
}

/// Trait for observing a registration loop.
pub trait AnnounceListener: Send + Sync + 'static {
    fn on_event(&self, event: AnnounceEvent);
}

/// A simple listener that invokes a closure.
pub struct FnAnnounceListener<F>
where
    F: Fn(AnnounceEvent) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnAnnounceListener<F>
where
    F: Fn(AnnounceEvent) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> AnnounceListener for FnAnnounceListener<F>
where
    F: Fn(AnnounceEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: AnnounceEvent) {
        (self.f)(event);
    }
}
