//! Wire types exchanged with the overseer
//!
//! Both directions use `address` for the service location so that a
//! registration and the lookup answer for the same service share field names.

use serde::{Deserialize, Serialize};

/// Identity announced to the overseer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive: Option<String>,
}

impl Registration {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            alive: None,
        }
    }

    pub fn with_alive(mut self, alive: impl Into<String>) -> Self {
        self.alive = Some(alive.into());
        self
    }
}

/// Lookup result returned by the overseer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedService {
    pub name: String,
    #[serde(alias = "root")]
    pub address: String,
}
