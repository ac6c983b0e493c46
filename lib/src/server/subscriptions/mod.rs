// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Subscriptions, their monitored items and the per-session directory that serves the
//! subscription and monitored item services.

mod monitored_item;
mod session_subscriptions;
mod subscription;

use std::time::Instant;

use tokio::sync::oneshot;

pub use monitored_item::MonitoredItem;
pub use session_subscriptions::SessionSubscriptions;
pub use subscription::{
    NotificationKind, Subscription, SubscriptionSettings, SubscriptionState,
    UnpublishedNotification,
};

use crate::types::{PublishRequest, PublishResponse, StatusCode};

/// What a publish request is eventually answered with. `Err` is a service fault such as
/// `BadTooManyPublishRequests`.
pub type PublishResult = Result<PublishResponse, StatusCode>;

/// A publish request waiting for a notification to become available or for its deadline.
pub struct PendingPublish {
    pub response: oneshot::Sender<PublishResult>,
    pub request: Box<PublishRequest>,
    /// Results of the acknowledgements in the request, processed when it arrived
    pub ack_results: Option<Vec<StatusCode>>,
    pub deadline: Instant,
}
