// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! The session is the entry point for the subscription and monitored item services.

use std::{sync::Arc, time::Instant};

use tokio::sync::oneshot;

use crate::{
    server::{
        config::SubscriptionLimits,
        scheduler::JobScheduler,
        subscriptions::{PublishResult, SessionSubscriptions, Subscription},
        value_source::ValueSource,
    },
    sync::Mutex,
    types::*,
};

/// A client session. Service calls are answered synchronously except for Publish, which hands
/// back a receiver that resolves when the request is answered.
pub struct Session {
    subscriptions: Arc<Mutex<SessionSubscriptions>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl Session {
    pub fn new(
        limits: SubscriptionLimits,
        scheduler: Arc<dyn JobScheduler>,
        source: Arc<dyn ValueSource>,
    ) -> Session {
        Session {
            subscriptions: SessionSubscriptions::new_shared(limits, scheduler, source),
        }
    }

    pub fn subscriptions(&self) -> Arc<Mutex<SessionSubscriptions>> {
        self.subscriptions.clone()
    }

    pub fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.create_subscription(request)
    }

    pub fn modify_subscription(
        &self,
        request: &ModifySubscriptionRequest,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.modify_subscription(request)
    }

    pub fn set_publishing_mode(
        &self,
        request: &SetPublishingModeRequest,
    ) -> Result<SetPublishingModeResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.set_publishing_mode(request)
    }

    pub fn delete_subscriptions(
        &self,
        request: &DeleteSubscriptionsRequest,
    ) -> Result<DeleteSubscriptionsResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.delete_subscriptions(request)
    }

    pub fn create_monitored_items(
        &self,
        request: &CreateMonitoredItemsRequest,
    ) -> Result<CreateMonitoredItemsResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.create_monitored_items(request)
    }

    pub fn modify_monitored_items(
        &self,
        request: &ModifyMonitoredItemsRequest,
    ) -> Result<ModifyMonitoredItemsResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.modify_monitored_items(request)
    }

    pub fn set_monitoring_mode(
        &self,
        request: &SetMonitoringModeRequest,
    ) -> Result<SetMonitoringModeResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.set_monitoring_mode(request)
    }

    pub fn delete_monitored_items(
        &self,
        request: &DeleteMonitoredItemsRequest,
    ) -> Result<DeleteMonitoredItemsResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.delete_monitored_items(request)
    }

    /// Queues a publish request. The receiver resolves with the response, or with a service
    /// fault if the request was pushed out of a full queue.
    pub fn publish(&self, request: PublishRequest) -> oneshot::Receiver<PublishResult> {
        let (sender, receiver) = oneshot::channel();
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.enqueue_publish_request(Instant::now(), request, sender);
        receiver
    }

    pub fn republish(&self, request: &RepublishRequest) -> Result<RepublishResponse, StatusCode> {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.republish(request)
    }

    /// Answers publish requests whose deadline has passed. Publishing cycles do this too, so
    /// this only matters when no subscription is cycling faster than the request timeouts.
    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&self, now: Instant) {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.tick(now);
    }

    /// Deletes every subscription and answers every waiting publish request
    pub fn close(&self) {
        let mut subscriptions = trace_lock!(self.subscriptions);
        subscriptions.close();
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        trace_lock!(self.subscriptions).subscription_ids()
    }

    /// Runs `f` against a subscription while the session is locked
    pub fn with_subscription<T, F>(&self, subscription_id: u32, f: F) -> Option<T>
    where
        F: FnOnce(&Subscription) -> T,
    {
        let subscriptions = trace_lock!(self.subscriptions);
        subscriptions.get(subscription_id).map(f)
    }
}
