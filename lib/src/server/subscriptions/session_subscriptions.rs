// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use std::{
    cmp::Reverse,
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use chrono::Utc;
use tokio::sync::oneshot;

use crate::{
    core::handle::Handle,
    server::{
        config::SubscriptionLimits,
        scheduler::{duration_from_ms, Job, JobHandle, JobScheduler},
        value_source::ValueSource,
    },
    sync::Mutex,
    types::{
        AttributeId, CreateMonitoredItemsRequest, CreateMonitoredItemsResponse,
        CreateSubscriptionRequest, CreateSubscriptionResponse, DataValue,
        DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse, DeleteSubscriptionsRequest,
        DeleteSubscriptionsResponse, ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse,
        ModifySubscriptionRequest, ModifySubscriptionResponse, MonitoredItemCreateRequest,
        MonitoredItemCreateResult, MonitoredItemModifyResult, NotificationMessage, PublishRequest,
        PublishResponse, RepublishRequest, RepublishResponse, RequestHeader, ResponseHeader,
        SetMonitoringModeRequest, SetMonitoringModeResponse, SetPublishingModeRequest,
        SetPublishingModeResponse, StatusCode,
    },
};

use super::{
    monitored_item::MonitoredItem,
    subscription::{Subscription, SubscriptionSettings, SubscriptionState, UpdateResult},
    PendingPublish, PublishResult,
};

type SharedSessionSubscriptions = Mutex<SessionSubscriptions>;

/// The subscriptions of a single session, plus the publish requests the session's client has
/// queued. Everything here is guarded by one mutex which the scheduler jobs also take, so a job
/// never observes a half-applied service call.
pub struct SessionSubscriptions {
    /// Handed to scheduler jobs so they can find their way back without keeping the session alive
    this: Weak<SharedSessionSubscriptions>,
    /// Subscriptions associated with the session, in creation order.
    subscriptions: BTreeMap<u32, Subscription>,
    /// Publish request queue (requests by the client on the session)
    publish_request_queue: VecDeque<PendingPublish>,
    /// Configured limits on subscriptions.
    limits: SubscriptionLimits,
    subscription_ids: Handle,
    monitored_item_ids: Handle,
    /// Answers publish requests whose deadline passed, whatever the publishing intervals are
    publish_timeout_job: Option<JobHandle>,
    scheduler: Arc<dyn JobScheduler>,
    source: Arc<dyn ValueSource>,
}

impl Drop for SessionSubscriptions {
    fn drop(&mut self) {
        self.close();
    }
}

/// The job that runs a subscription's publishing cycle
fn update_job(this: &Weak<SharedSessionSubscriptions>, subscription_id: u32) -> Job {
    let this = this.clone();
    Box::new(move || {
        if let Some(session) = this.upgrade() {
            let mut session_lck = trace_lock!(session);
            session_lck.on_update_timer(subscription_id, Instant::now());
        }
    })
}

/// The job that answers expired publish requests
fn publish_timeout_job(this: &Weak<SharedSessionSubscriptions>) -> Job {
    let this = this.clone();
    Box::new(move || {
        if let Some(session) = this.upgrade() {
            let mut session_lck = trace_lock!(session);
            session_lck.on_publish_timeout_timer(Instant::now());
        }
    })
}

/// The job that samples a monitored item
fn sample_job(
    this: &Weak<SharedSessionSubscriptions>,
    subscription_id: u32,
    monitored_item_id: u32,
) -> Job {
    let this = this.clone();
    Box::new(move || {
        if let Some(session) = this.upgrade() {
            let mut session_lck = trace_lock!(session);
            session_lck.on_sample_timer(subscription_id, monitored_item_id);
        }
    })
}

fn failed_create_result(status_code: StatusCode) -> MonitoredItemCreateResult {
    MonitoredItemCreateResult {
        status_code,
        monitored_item_id: 0,
        revised_sampling_interval: 0.0,
        revised_queue_size: 0,
    }
}

fn failed_modify_result(status_code: StatusCode) -> MonitoredItemModifyResult {
    MonitoredItemModifyResult {
        status_code,
        revised_sampling_interval: 0.0,
        revised_queue_size: 0,
    }
}

/// The entries of a batch request, or `BadNothingToDo` if there are none
fn non_empty<T>(items: &Option<Vec<T>>) -> Result<&[T], StatusCode> {
    match items {
        Some(items) if !items.is_empty() => Ok(items.as_slice()),
        _ => Err(StatusCode::BadNothingToDo),
    }
}

impl SessionSubscriptions {
    /// Creates the subscriptions of a new session. They live behind a shared mutex because
    /// scheduler jobs need to reach them.
    pub fn new_shared(
        limits: SubscriptionLimits,
        scheduler: Arc<dyn JobScheduler>,
        source: Arc<dyn ValueSource>,
    ) -> Arc<SharedSessionSubscriptions> {
        Arc::new_cyclic(|this| {
            let timeout_job = scheduler.register(
                Duration::from_millis(limits.publish_timeout_check_interval_ms),
                publish_timeout_job(this),
            );
            Mutex::new(SessionSubscriptions {
                this: this.clone(),
                subscriptions: BTreeMap::new(),
                publish_request_queue: VecDeque::new(),
                limits,
                subscription_ids: Handle::new(1),
                monitored_item_ids: Handle::new(1),
                publish_timeout_job: Some(timeout_job),
                scheduler,
                source,
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions.contains_key(&subscription_id)
    }

    pub fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions.keys().copied().collect()
    }

    pub fn pending_publish_requests(&self) -> usize {
        self.publish_request_queue.len()
    }

    pub fn limits(&self) -> &SubscriptionLimits {
        &self.limits
    }

    /// Looks up a subscription that can still be operated on. Every service treats a closed
    /// subscription as gone. It is only waiting to deliver its final status change.
    fn open_subscription_mut(
        subscriptions: &mut BTreeMap<u32, Subscription>,
        subscription_id: u32,
    ) -> Result<&mut Subscription, StatusCode> {
        subscriptions
            .get_mut(&subscription_id)
            .filter(|s| s.state() != SubscriptionState::Closed)
            .ok_or_else(|| {
                debug!("Subscription {} does not exist", subscription_id);
                StatusCode::BadSubscriptionIdInvalid
            })
    }

    /// Creates a new subscription and returns the revised settings.
    pub fn create_subscription(
        &mut self,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        let open_subscriptions = self
            .subscriptions
            .values()
            .filter(|s| s.state() != SubscriptionState::Closed)
            .count();
        if open_subscriptions >= self.limits.max_subscriptions_per_session {
            warn!(
                "Session already has the maximum of {} subscriptions",
                self.limits.max_subscriptions_per_session
            );
            return Err(StatusCode::BadTooManySubscriptions);
        }

        let settings = SubscriptionSettings::revise(
            &self.limits,
            request.requested_publishing_interval,
            request.requested_lifetime_count,
            request.requested_max_keep_alive_count,
            request.max_notifications_per_publish,
            request.priority,
        );
        let subscription_id = self.subscription_ids.next();
        let mut subscription =
            Subscription::new(subscription_id, settings, request.publishing_enabled)?;

        let job = self.scheduler.register(
            duration_from_ms(settings.publishing_interval),
            update_job(&self.this, subscription_id),
        );
        subscription.set_update_job(Some(job));
        self.subscriptions.insert(subscription_id, subscription);

        info!(
            "Created subscription {}, publishing interval {}ms, lifetime count {}, keep alive count {}",
            subscription_id,
            settings.publishing_interval,
            settings.lifetime_count,
            settings.max_keep_alive_count
        );

        Ok(CreateSubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            subscription_id,
            revised_publishing_interval: settings.publishing_interval,
            revised_lifetime_count: settings.lifetime_count,
            revised_max_keep_alive_count: settings.max_keep_alive_count,
        })
    }

    /// Modifies an existing subscription. The update job is unregistered before the settings
    /// change and registered again with the revised interval.
    pub fn modify_subscription(
        &mut self,
        request: &ModifySubscriptionRequest,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        let settings = SubscriptionSettings::revise(
            &self.limits,
            request.requested_publishing_interval,
            request.requested_lifetime_count,
            request.requested_max_keep_alive_count,
            request.max_notifications_per_publish,
            request.priority,
        );
        let subscription =
            Self::open_subscription_mut(&mut self.subscriptions, request.subscription_id)?;

        if let Some(job) = subscription.set_update_job(None) {
            self.scheduler.unregister(job);
        }
        subscription.apply_settings(settings);
        let job = self.scheduler.register(
            duration_from_ms(settings.publishing_interval),
            update_job(&self.this, request.subscription_id),
        );
        subscription.set_update_job(Some(job));

        info!(
            "Modified subscription {}, publishing interval {}ms, lifetime count {}, keep alive count {}",
            request.subscription_id,
            settings.publishing_interval,
            settings.lifetime_count,
            settings.max_keep_alive_count
        );

        Ok(ModifySubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            revised_publishing_interval: settings.publishing_interval,
            revised_lifetime_count: settings.lifetime_count,
            revised_max_keep_alive_count: settings.max_keep_alive_count,
        })
    }

    /// Enables or disables publishing on a batch of subscriptions.
    pub fn set_publishing_mode(
        &mut self,
        request: &SetPublishingModeRequest,
    ) -> Result<SetPublishingModeResponse, StatusCode> {
        let subscription_ids = non_empty(&request.subscription_ids)?;
        let results = subscription_ids
            .iter()
            .map(|id| {
                match Self::open_subscription_mut(&mut self.subscriptions, *id) {
                    Ok(subscription) => {
                        subscription.set_publishing_enabled(request.publishing_enabled);
                        subscription.reset_lifetime_counter();
                        debug!(
                            "Subscription {} publishing enabled = {}",
                            id, request.publishing_enabled
                        );
                        StatusCode::Good
                    }
                    Err(status) => status,
                }
            })
            .collect();
        Ok(SetPublishingModeResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Deletes a batch of subscriptions. Unknown ids fail individually.
    pub fn delete_subscriptions(
        &mut self,
        request: &DeleteSubscriptionsRequest,
    ) -> Result<DeleteSubscriptionsResponse, StatusCode> {
        let subscription_ids = non_empty(&request.subscription_ids)?;
        let results = subscription_ids
            .iter()
            .map(|id| {
                if self.delete_subscription(*id) {
                    StatusCode::Good
                } else {
                    StatusCode::BadSubscriptionIdInvalid
                }
            })
            .collect();
        if self.subscriptions.is_empty() {
            self.answer_all_no_subscription();
        }
        Ok(DeleteSubscriptionsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Deletes a subscription, cancelling its update job and the sampling jobs of its items.
    /// Returns false if there is no such subscription or it has been closed.
    pub fn delete_subscription(&mut self, subscription_id: u32) -> bool {
        if Self::open_subscription_mut(&mut self.subscriptions, subscription_id).is_ok() {
            self.remove_subscription(subscription_id)
        } else {
            false
        }
    }

    fn remove_subscription(&mut self, subscription_id: u32) -> bool {
        if let Some(mut subscription) = self.subscriptions.remove(&subscription_id) {
            for job in subscription.take_jobs() {
                self.scheduler.unregister(job);
            }
            info!(
                "Deleted subscription {} with {} monitored items and {} queued notifications",
                subscription_id,
                subscription.len(),
                subscription.unpublished_len()
            );
            true
        } else {
            debug!("Cannot delete subscription {}, it does not exist", subscription_id);
            false
        }
    }

    fn create_monitored_item(
        subscription: &Subscription,
        monitored_item_ids: &mut Handle,
        limits: &SubscriptionLimits,
        source: &dyn ValueSource,
        request: &MonitoredItemCreateRequest,
    ) -> Result<MonitoredItem, StatusCode> {
        if limits.max_monitored_items_per_sub > 0
            && subscription.len() >= limits.max_monitored_items_per_sub
        {
            warn!(
                "Subscription {} already has the maximum of {} monitored items",
                subscription.id(),
                limits.max_monitored_items_per_sub
            );
            return Err(StatusCode::BadTooManyMonitoredItems);
        }
        let item_to_monitor = &request.item_to_monitor;
        let attribute_id = AttributeId::from_u32(item_to_monitor.attribute_id)
            .map_err(|_| StatusCode::BadAttributeIdInvalid)?;
        // The node must be readable before anything is allocated for it
        if let Err(status) = source.read(&item_to_monitor.node_id, attribute_id) {
            debug!(
                "Cannot monitor node {} attribute {:?}, read failed with {}",
                item_to_monitor.node_id, attribute_id, status
            );
            return Err(StatusCode::BadNodeIdInvalid);
        }
        MonitoredItem::new(monitored_item_ids.next(), request, limits)
    }

    /// Creates monitored items in a subscription. Each item succeeds or fails on its own.
    pub fn create_monitored_items(
        &mut self,
        request: &CreateMonitoredItemsRequest,
    ) -> Result<CreateMonitoredItemsResponse, StatusCode> {
        let SessionSubscriptions {
            this,
            subscriptions,
            limits,
            monitored_item_ids,
            scheduler,
            source,
            ..
        } = self;
        let subscription_id = request.subscription_id;
        let subscription = Self::open_subscription_mut(subscriptions, subscription_id)?;
        let items_to_create = non_empty(&request.items_to_create)?;

        let mut results = Vec::with_capacity(items_to_create.len());
        for item_request in items_to_create {
            let result = match Self::create_monitored_item(
                subscription,
                monitored_item_ids,
                limits,
                &**source,
                item_request,
            ) {
                Ok(mut item) => {
                    let job = scheduler.register(
                        duration_from_ms(item.sampling_interval()),
                        sample_job(this, subscription_id, item.id()),
                    );
                    item.set_sample_job(Some(job));
                    debug!(
                        "Created monitored item {} on {} in subscription {}, sampling interval {}ms, queue size {}",
                        item.id(),
                        item.node_id(),
                        subscription_id,
                        item.sampling_interval(),
                        item.queue_size()
                    );
                    let result = MonitoredItemCreateResult {
                        status_code: StatusCode::Good,
                        monitored_item_id: item.id(),
                        revised_sampling_interval: item.sampling_interval(),
                        revised_queue_size: item.queue_size() as u32,
                    };
                    subscription.insert(item);
                    result
                }
                Err(status_code) => failed_create_result(status_code),
            };
            results.push(result);
        }

        Ok(CreateMonitoredItemsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Modifies monitored items in a subscription. The sampling job of each item is registered
    /// again with the revised interval.
    pub fn modify_monitored_items(
        &mut self,
        request: &ModifyMonitoredItemsRequest,
    ) -> Result<ModifyMonitoredItemsResponse, StatusCode> {
        let SessionSubscriptions {
            this,
            subscriptions,
            limits,
            scheduler,
            ..
        } = self;
        let subscription_id = request.subscription_id;
        let subscription = Self::open_subscription_mut(subscriptions, subscription_id)?;
        let items_to_modify = non_empty(&request.items_to_modify)?;

        let results = items_to_modify
            .iter()
            .map(|item_request| {
                let item_id = item_request.monitored_item_id;
                let Some(item) = subscription.get_mut(&item_id) else {
                    return failed_modify_result(StatusCode::BadMonitoredItemIdInvalid);
                };
                if let Some(job) = item.set_sample_job(None) {
                    scheduler.unregister(job);
                }
                let revised = item.modify(limits, &item_request.requested_parameters);
                let job = scheduler.register(
                    duration_from_ms(revised.sampling_interval),
                    sample_job(this, subscription_id, item_id),
                );
                item.set_sample_job(Some(job));
                debug!(
                    "Modified monitored item {}, sampling interval {}ms, queue size {}",
                    item_id, revised.sampling_interval, revised.queue_size
                );
                MonitoredItemModifyResult {
                    status_code: StatusCode::Good,
                    revised_sampling_interval: revised.sampling_interval,
                    revised_queue_size: revised.queue_size,
                }
            })
            .collect();

        Ok(ModifyMonitoredItemsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Sets the monitoring mode of monitored items in a subscription.
    pub fn set_monitoring_mode(
        &mut self,
        request: &SetMonitoringModeRequest,
    ) -> Result<SetMonitoringModeResponse, StatusCode> {
        let subscription =
            Self::open_subscription_mut(&mut self.subscriptions, request.subscription_id)?;
        let monitored_item_ids = non_empty(&request.monitored_item_ids)?;
        let results = monitored_item_ids
            .iter()
            .map(|id| match subscription.get_mut(id) {
                Some(item) => {
                    item.set_monitoring_mode(request.monitoring_mode);
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect();
        Ok(SetMonitoringModeResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Deletes monitored items from a subscription, cancelling their sampling jobs.
    pub fn delete_monitored_items(
        &mut self,
        request: &DeleteMonitoredItemsRequest,
    ) -> Result<DeleteMonitoredItemsResponse, StatusCode> {
        let SessionSubscriptions {
            subscriptions,
            scheduler,
            ..
        } = self;
        let subscription = Self::open_subscription_mut(subscriptions, request.subscription_id)?;
        let monitored_item_ids = non_empty(&request.monitored_item_ids)?;
        let results = monitored_item_ids
            .iter()
            .map(|id| match subscription.remove(id) {
                Some(item) => {
                    if let Some(job) = item.sample_job() {
                        scheduler.unregister(job);
                    }
                    debug!(
                        "Deleted monitored item {} from subscription {}",
                        id, request.subscription_id
                    );
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect();
        Ok(DeleteMonitoredItemsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Returns a copy of a retained notification message.
    pub fn republish(&mut self, request: &RepublishRequest) -> Result<RepublishResponse, StatusCode> {
        let subscription =
            Self::open_subscription_mut(&mut self.subscriptions, request.subscription_id)?;
        let notification_message = subscription
            .republish(request.retransmit_sequence_number)
            .map_err(|status| {
                debug!(
                    "Subscription {} cannot republish sequence number {}",
                    request.subscription_id, request.retransmit_sequence_number
                );
                status
            })?;
        subscription.reset_lifetime_counter();
        Ok(RepublishResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            notification_message,
        })
    }

    /// Processes the acknowledgements of a publish request, returning one result per
    /// acknowledgement in request order.
    fn process_subscription_acks(&mut self, request: &PublishRequest) -> Option<Vec<StatusCode>> {
        let subscriptions = &mut self.subscriptions;
        request.subscription_acknowledgements.as_ref().map(|acks| {
            acks.iter()
                .map(|ack| {
                    match Self::open_subscription_mut(subscriptions, ack.subscription_id) {
                        Ok(subscription) => subscription.acknowledge(ack.sequence_number),
                        Err(status) => {
                            warn!(
                                "Acknowledgement for sequence number {} names unknown subscription {}",
                                ack.sequence_number, ack.subscription_id
                            );
                            status
                        }
                    }
                })
                .collect()
        })
    }

    /// Queues a publish request. Its acknowledgements are processed straight away and it is
    /// answered as soon as a subscription has something to send, or when its deadline passes.
    pub fn enqueue_publish_request(
        &mut self,
        now: Instant,
        request: PublishRequest,
        response: oneshot::Sender<PublishResult>,
    ) {
        let ack_results = self.process_subscription_acks(&request);

        if self.subscriptions.is_empty() {
            debug!("Publish request received for a session with no subscriptions");
            Self::send_response(
                response,
                Ok(Self::no_subscription_response(
                    &request.request_header,
                    ack_results,
                )),
            );
            return;
        }

        if self.publish_request_queue.len() >= self.limits.max_pending_publish_requests {
            if let Some(oldest) = self.publish_request_queue.pop_front() {
                warn!(
                    "Too many publish requests {}, oldest request {} is answered with a fault",
                    self.limits.max_pending_publish_requests,
                    oldest.request.request_header.request_handle
                );
                Self::send_response(oldest.response, Err(StatusCode::BadTooManyPublishRequests));
            }
        }

        let default_timeout = self.limits.publish_timeout_default_ms;
        let timeout_ms = match request.request_header.timeout_hint as u64 {
            0 => default_timeout,
            hint => hint.min(default_timeout),
        };
        self.publish_request_queue.push_back(PendingPublish {
            response,
            request: Box::new(request),
            ack_results,
            deadline: now + Duration::from_millis(timeout_ms),
        });

        // The client is alive
        self.subscriptions
            .values_mut()
            .for_each(|s| s.reset_lifetime_counter());

        self.tick(now);
    }

    /// Answers whatever publish requests can be answered at `now`.
    pub fn tick(&mut self, now: Instant) {
        let now_utc = Utc::now();

        // Pair waiting requests with unsent notifications
        while !self.publish_request_queue.is_empty() {
            let Some((subscription_id, message, available)) = self.next_notification() else {
                break;
            };
            let Some(pending) = self.publish_request_queue.pop_front() else {
                break;
            };
            let more_notifications = self.subscriptions.values().any(|s| s.has_unsent());
            let response = Self::publish_response(
                &pending.request.request_header,
                subscription_id,
                message,
                available,
                more_notifications,
                pending.ack_results,
            );
            Self::send_response(pending.response, Ok(response));
        }

        // Requests that ran out of time get a keep-alive
        if self.publish_request_queue.iter().any(|p| p.deadline <= now) {
            let (expired, waiting): (VecDeque<_>, VecDeque<_>) = self
                .publish_request_queue
                .drain(..)
                .partition(|p| p.deadline <= now);
            self.publish_request_queue = waiting;
            for pending in expired {
                let response = match self.first_open_subscription() {
                    Some(subscription) => {
                        let subscription_id = subscription.id();
                        let message = subscription.force_keep_alive(now_utc);
                        Self::publish_response(
                            &pending.request.request_header,
                            subscription_id,
                            message,
                            Vec::new(),
                            false,
                            pending.ack_results,
                        )
                    }
                    None => Self::no_subscription_response(
                        &pending.request.request_header,
                        pending.ack_results,
                    ),
                };
                Self::send_response(pending.response, Ok(response));
            }
        }

        self.subscriptions.retain(|id, s| {
            if s.ready_to_remove() {
                info!("Subscription {} has been closed and is removed", id);
                false
            } else {
                true
            }
        });

        if self.subscriptions.is_empty() {
            self.answer_all_no_subscription();
        }
    }

    /// Takes the next unsent message, from the subscription with the highest priority and then
    /// the lowest id.
    fn next_notification(&mut self) -> Option<(u32, NotificationMessage, Vec<u32>)> {
        let subscription = self
            .subscriptions
            .values_mut()
            .filter(|s| s.has_unsent())
            .min_by_key(|s| (Reverse(s.priority()), s.id()))?;
        let (message, available) = subscription.take_for_publish()?;
        Some((subscription.id(), message, available))
    }

    fn first_open_subscription(&mut self) -> Option<&mut Subscription> {
        self.subscriptions
            .values_mut()
            .filter(|s| s.state() != SubscriptionState::Closed)
            .min_by_key(|s| (Reverse(s.priority()), s.id()))
    }

    fn on_update_timer(&mut self, subscription_id: u32, now: Instant) {
        let publish_request_queued = !self.publish_request_queue.is_empty();
        // The subscription may have been deleted while the job was waiting for the lock
        let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
            return;
        };
        if subscription.update(Utc::now(), publish_request_queued) == UpdateResult::Expired {
            let jobs = subscription.take_jobs();
            subscription.clear_monitored_items();
            for job in jobs {
                self.scheduler.unregister(job);
            }
        }
        self.tick(now);
    }

    fn on_publish_timeout_timer(&mut self, now: Instant) {
        if self.publish_request_queue.iter().any(|p| p.deadline <= now) {
            self.tick(now);
        }
    }

    fn on_sample_timer(&mut self, subscription_id: u32, monitored_item_id: u32) {
        let Some(item) = self
            .subscriptions
            .get_mut(&subscription_id)
            .and_then(|s| s.get_mut(&monitored_item_id))
        else {
            return;
        };
        let value = match self.source.read(item.node_id(), item.attribute_id()) {
            Ok(value) => value,
            Err(status) => DataValue::from_status(status, Utc::now()),
        };
        if item.sample(value) {
            trace!(
                "Monitored item {} in subscription {} queued a value",
                monitored_item_id,
                subscription_id
            );
        }
    }

    /// Deletes every subscription and answers every waiting publish request. Called when the
    /// session ends.
    pub fn close(&mut self) {
        let subscription_ids = self.subscription_ids();
        for subscription_id in subscription_ids {
            self.remove_subscription(subscription_id);
        }
        if let Some(job) = self.publish_timeout_job.take() {
            self.scheduler.unregister(job);
        }
        self.answer_all_no_subscription();
    }

    fn answer_all_no_subscription(&mut self) {
        for pending in self.publish_request_queue.drain(..) {
            let response =
                Self::no_subscription_response(&pending.request.request_header, pending.ack_results);
            Self::send_response(pending.response, Ok(response));
        }
    }

    fn publish_response(
        request_header: &RequestHeader,
        subscription_id: u32,
        notification_message: NotificationMessage,
        available_sequence_numbers: Vec<u32>,
        more_notifications: bool,
        ack_results: Option<Vec<StatusCode>>,
    ) -> PublishResponse {
        trace!(
            "Publishing sequence number {} of subscription {}",
            notification_message.sequence_number,
            subscription_id
        );
        PublishResponse {
            response_header: ResponseHeader::new_good(request_header),
            subscription_id,
            available_sequence_numbers: if available_sequence_numbers.is_empty() {
                None
            } else {
                Some(available_sequence_numbers)
            },
            more_notifications,
            notification_message,
            results: ack_results,
        }
    }

    fn no_subscription_response(
        request_header: &RequestHeader,
        ack_results: Option<Vec<StatusCode>>,
    ) -> PublishResponse {
        PublishResponse {
            response_header: ResponseHeader::new_service_result(
                request_header,
                StatusCode::BadNoSubscription,
            ),
            subscription_id: 0,
            available_sequence_numbers: None,
            more_notifications: false,
            notification_message: NotificationMessage::keep_alive(0, Utc::now()),
            results: ack_results,
        }
    }

    fn send_response(sender: oneshot::Sender<PublishResult>, result: PublishResult) {
        if sender.send(result).is_err() {
            debug!("Publish response could not be delivered, the receiver has gone");
        }
    }
}
