// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! The server side of the OPC UA subscription service set.
//!
//! A [`Session`](session::Session) owns the subscriptions of one client. Each subscription
//! runs a periodic update job on its publishing interval and each monitored item runs a sampling
//! job on its sampling interval, both registered with a [`JobScheduler`](scheduler::JobScheduler).
//! Publish requests wait in a queue until a subscription has something to send or until their
//! timeout elapses, whichever comes first.

pub mod config;
pub mod scheduler;
pub mod session;
pub mod subscriptions;
pub mod value_source;

#[cfg(test)]
mod tests;

pub mod constants {
    //! Provides constants that govern the internal workings of the server implementation.

    /// Minimum publishing interval for subscriptions
    pub const MIN_PUBLISHING_INTERVAL_MS: f64 = 100.0;
    /// Maximum publishing interval for subscriptions, one hour
    pub const MAX_PUBLISHING_INTERVAL_MS: f64 = 3_600_000.0;
    /// Minimum sampling interval on monitored items
    pub const MIN_SAMPLING_INTERVAL_MS: f64 = 100.0;
    /// Maximum sampling interval on monitored items, one day
    pub const MAX_SAMPLING_INTERVAL_MS: f64 = 86_400_000.0;
    /// Maximum data change queue allowed by clients on monitored items
    pub const MAX_DATA_CHANGE_QUEUE_SIZE: u32 = 10;
    /// Default keep alive count
    pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;
    /// Maximum keep alive count
    pub const MAX_KEEP_ALIVE_COUNT: u32 = 30000;
    /// Minimum lifetime count
    pub const MIN_LIFETIME_COUNT: u32 = 3;
    /// Maximum lifetime count (3 times as large as max keep alive)
    pub const MAX_LIFETIME_COUNT: u32 = MAX_KEEP_ALIVE_COUNT * 3;
    /// Default maximum number of monitored items per subscription
    pub const DEFAULT_MAX_MONITORED_ITEMS_PER_SUB: usize = 1000;
    /// Maximum number of notifications per publish message, 0 for no limit
    pub const MAX_NOTIFICATIONS_PER_PUBLISH: u32 = 1000;

    pub const MAX_SUBSCRIPTIONS_PER_SESSION: usize = 10;
    pub const MAX_PENDING_PUBLISH_REQUESTS: usize = 20;

    /// How long a publish request waits for a notification when the client does not supply a
    /// shorter timeout hint
    pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 30000;
    /// How often waiting publish requests are checked for expiry
    pub const PUBLISH_TIMEOUT_CHECK_INTERVAL_MS: u64 = 100;
    /// Maximum number of notification messages a subscription retains until they are
    /// acknowledged. Beyond this the oldest are dropped.
    pub const MAX_QUEUED_NOTIFICATIONS: usize = 20;
}

/// Contains the things that are typically required to host subscriptions.
pub mod prelude {
    pub use super::{
        config::{Bounds, ServerConfig, SubscriptionLimits},
        scheduler::{JobHandle, JobScheduler, ManualScheduler, TokioScheduler},
        session::Session,
        subscriptions::{PendingPublish, PublishResult},
        value_source::{MemoryValueSource, ValueSource},
    };
}
