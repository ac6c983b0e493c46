// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use std::fmt::Debug;

/// A server-side `min` / `max` pair that a value requested by a client is revised against.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T> Bounds<T>
where
    T: PartialOrd + Copy + Debug,
{
    pub const fn new(min: T, max: T) -> Self {
        Bounds { min, max }
    }

    /// Revises the requested value so it lies within the bounds. A value that cannot be compared
    /// (i.e. a NaN interval) revises to the minimum.
    pub fn clamp(&self, requested: T) -> T {
        if requested > self.max {
            self.max
        } else if requested >= self.min {
            requested
        } else {
            self.min
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionLimits {
    /// Publishing interval bounds in milliseconds
    #[serde(default = "defaults::publishing_interval_ms")]
    pub publishing_interval_ms: Bounds<f64>,
    /// Lifetime count bounds, i.e. how many publishing cycles without a publish request a
    /// subscription survives
    #[serde(default = "defaults::lifetime_count")]
    pub lifetime_count: Bounds<u32>,
    /// Keep alive count bounds, i.e. how many empty publishing cycles pass before a keep-alive
    #[serde(default = "defaults::keep_alive_count")]
    pub keep_alive_count: Bounds<u32>,
    /// Sampling interval bounds in milliseconds
    #[serde(default = "defaults::sampling_interval_ms")]
    pub sampling_interval_ms: Bounds<f64>,
    /// Monitored item queue size bounds
    #[serde(default = "defaults::queue_size")]
    pub queue_size: Bounds<u32>,
    /// Maximum number of notifications per publish message, 0 for no limit
    #[serde(default = "defaults::max_notifications_per_publish")]
    pub max_notifications_per_publish: u32,
    #[serde(default = "defaults::max_subscriptions_per_session")]
    pub max_subscriptions_per_session: usize,
    /// Maximum number of monitored items per subscription, 0 for no limit
    #[serde(default = "defaults::max_monitored_items_per_sub")]
    pub max_monitored_items_per_sub: usize,
    #[serde(default = "defaults::max_pending_publish_requests")]
    pub max_pending_publish_requests: usize,
    /// How long a publish request waits when the client supplies no timeout hint
    #[serde(default = "defaults::publish_timeout_default_ms")]
    pub publish_timeout_default_ms: u64,
    /// How often waiting publish requests are checked for expiry, in milliseconds
    #[serde(default = "defaults::publish_timeout_check_interval_ms")]
    pub publish_timeout_check_interval_ms: u64,
    /// Maximum number of notification messages a subscription retains for republish
    #[serde(default = "defaults::max_queued_notifications")]
    pub max_queued_notifications: usize,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        Self {
            publishing_interval_ms: defaults::publishing_interval_ms(),
            lifetime_count: defaults::lifetime_count(),
            keep_alive_count: defaults::keep_alive_count(),
            sampling_interval_ms: defaults::sampling_interval_ms(),
            queue_size: defaults::queue_size(),
            max_notifications_per_publish: defaults::max_notifications_per_publish(),
            max_subscriptions_per_session: defaults::max_subscriptions_per_session(),
            max_monitored_items_per_sub: defaults::max_monitored_items_per_sub(),
            max_pending_publish_requests: defaults::max_pending_publish_requests(),
            publish_timeout_default_ms: defaults::publish_timeout_default_ms(),
            publish_timeout_check_interval_ms: defaults::publish_timeout_check_interval_ms(),
            max_queued_notifications: defaults::max_queued_notifications(),
        }
    }
}

impl SubscriptionLimits {
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if !self.publishing_interval_ms.is_valid() {
            error!(
                "Publishing interval bounds {:?} are invalid",
                self.publishing_interval_ms
            );
            valid = false;
        }
        if !self.lifetime_count.is_valid() {
            error!("Lifetime count bounds {:?} are invalid", self.lifetime_count);
            valid = false;
        }
        if !self.keep_alive_count.is_valid() {
            error!(
                "Keep alive count bounds {:?} are invalid",
                self.keep_alive_count
            );
            valid = false;
        }
        if !self.sampling_interval_ms.is_valid() {
            error!(
                "Sampling interval bounds {:?} are invalid",
                self.sampling_interval_ms
            );
            valid = false;
        }
        if !self.queue_size.is_valid() || self.queue_size.min == 0 {
            error!("Queue size bounds {:?} are invalid", self.queue_size);
            valid = false;
        }
        if self.max_pending_publish_requests == 0 {
            error!("Max pending publish requests must be at least 1");
            valid = false;
        }
        if self.publish_timeout_check_interval_ms == 0 {
            error!("Publish timeout check interval must be at least 1ms");
            valid = false;
        }
        if self.max_queued_notifications == 0 {
            error!("Max queued notifications must be at least 1");
            valid = false;
        }
        valid
    }

    /// Revises the client's notifications per publish against the server maximum. A request
    /// of 0 means the client has no preference so it gets the server maximum.
    pub fn revise_max_notifications_per_publish(&self, requested: u32) -> u32 {
        let limit = self.max_notifications_per_publish;
        if limit == 0 {
            requested
        } else if requested == 0 || requested > limit {
            limit
        } else {
            requested
        }
    }
}

mod defaults {
    use super::Bounds;
    use crate::server::constants;

    pub fn publishing_interval_ms() -> Bounds<f64> {
        Bounds::new(
            constants::MIN_PUBLISHING_INTERVAL_MS,
            constants::MAX_PUBLISHING_INTERVAL_MS,
        )
    }
    pub fn lifetime_count() -> Bounds<u32> {
        Bounds::new(constants::MIN_LIFETIME_COUNT, constants::MAX_LIFETIME_COUNT)
    }
    pub fn keep_alive_count() -> Bounds<u32> {
        Bounds::new(1, constants::MAX_KEEP_ALIVE_COUNT)
    }
    pub fn sampling_interval_ms() -> Bounds<f64> {
        Bounds::new(
            constants::MIN_SAMPLING_INTERVAL_MS,
            constants::MAX_SAMPLING_INTERVAL_MS,
        )
    }
    pub fn queue_size() -> Bounds<u32> {
        Bounds::new(1, constants::MAX_DATA_CHANGE_QUEUE_SIZE)
    }
    pub fn max_notifications_per_publish() -> u32 {
        constants::MAX_NOTIFICATIONS_PER_PUBLISH
    }
    pub fn max_subscriptions_per_session() -> usize {
        constants::MAX_SUBSCRIPTIONS_PER_SESSION
    }
    pub fn max_monitored_items_per_sub() -> usize {
        constants::DEFAULT_MAX_MONITORED_ITEMS_PER_SUB
    }
    pub fn max_pending_publish_requests() -> usize {
        constants::MAX_PENDING_PUBLISH_REQUESTS
    }
    pub fn publish_timeout_default_ms() -> u64 {
        constants::DEFAULT_PUBLISH_TIMEOUT_MS
    }
    pub fn publish_timeout_check_interval_ms() -> u64 {
        constants::PUBLISH_TIMEOUT_CHECK_INTERVAL_MS
    }
    pub fn max_queued_notifications() -> usize {
        constants::MAX_QUEUED_NOTIFICATIONS
    }
}
