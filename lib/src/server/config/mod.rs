// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Server configuration. A `ServerConfig` can be saved to and loaded from a YAML file through
//! the `Config` trait.

mod limits;

pub use limits::{Bounds, SubscriptionLimits};

use crate::core::config::Config;

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// An id for this server
    pub application_name: String,
    /// Limits and bounds applied to subscriptions and monitored items
    #[serde(default)]
    pub subscriptions: SubscriptionLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new("OPC UA Subscription Server")
    }
}

impl ServerConfig {
    pub fn new<T>(application_name: T) -> Self
    where
        T: Into<String>,
    {
        ServerConfig {
            application_name: application_name.into(),
            subscriptions: SubscriptionLimits::default(),
        }
    }
}

impl Config for ServerConfig {
    fn is_valid(&self) -> bool {
        if self.application_name.is_empty() {
            warn!("No application was set");
        }
        self.subscriptions.is_valid()
    }
}
