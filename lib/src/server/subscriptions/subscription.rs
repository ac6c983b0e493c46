// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use std::collections::{BTreeMap, VecDeque};

use crate::{
    core::handle::Handle,
    server::{config::SubscriptionLimits, scheduler::JobHandle},
    types::{DateTimeUtc, NotificationMessage, StatusCode},
};

use super::monitored_item::MonitoredItem;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created but the update job is not registered yet
    Creating,
    /// The update job is registered and firing
    Active,
    /// The lifetime expired. The subscription lingers until its final status change has been
    /// sent.
    Closed,
}

/// What a queued notification message carries. Keep-alives are never retransmitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Data,
    KeepAlive,
    StatusChange,
}

/// A notification message waiting to be sent, or sent and waiting to be acknowledged.
#[derive(Debug, Clone)]
pub struct UnpublishedNotification {
    message: NotificationMessage,
    kind: NotificationKind,
    published_once: bool,
}

impl UnpublishedNotification {
    pub fn sequence_number(&self) -> u32 {
        self.message.sequence_number
    }

    pub fn message(&self) -> &NotificationMessage {
        &self.message
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn published_once(&self) -> bool {
        self.published_once
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum UpdateResult {
    /// Nothing was queued this cycle
    None,
    /// This many notification messages were queued
    Enqueued(usize),
    /// The lifetime ran out, a status change was queued and the subscription is closed
    Expired,
}

/// Subscription settings after revision against the server limits.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SubscriptionSettings {
    pub publishing_interval: f64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
    /// How many messages are retained for republish before the oldest are dropped
    pub max_queued_notifications: usize,
}

impl SubscriptionSettings {
    pub fn revise(
        limits: &SubscriptionLimits,
        publishing_interval: f64,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    ) -> SubscriptionSettings {
        SubscriptionSettings {
            publishing_interval: limits.publishing_interval_ms.clamp(publishing_interval),
            lifetime_count: limits.lifetime_count.clamp(lifetime_count),
            max_keep_alive_count: limits.keep_alive_count.clamp(max_keep_alive_count),
            max_notifications_per_publish: limits
                .revise_max_notifications_per_publish(max_notifications_per_publish),
            priority,
            max_queued_notifications: limits.max_queued_notifications,
        }
    }
}

#[derive(Debug)]
pub struct Subscription {
    id: u32,
    settings: SubscriptionSettings,
    publishing_enabled: bool,
    state: SubscriptionState,
    /// Consecutive publishing cycles with nothing to send
    current_keep_alive_count: u32,
    /// Publishing cycles left without a publish request before the subscription expires
    lifetime_counter: u32,
    /// The sequence number of the next notification message
    sequence_number: Handle,
    monitored_items: BTreeMap<u32, MonitoredItem>,
    /// Queued messages in sequence number order
    unpublished: VecDeque<UnpublishedNotification>,
    update_job: Option<JobHandle>,
}

impl Subscription {
    /// Creates a subscription in the `Creating` state. Fails with `BadOutOfMemory` if the
    /// notification queue cannot be allocated.
    pub fn new(
        id: u32,
        settings: SubscriptionSettings,
        publishing_enabled: bool,
    ) -> Result<Subscription, StatusCode> {
        let mut unpublished = VecDeque::new();
        unpublished.try_reserve(4).map_err(|err| {
            error!(
                "Cannot allocate a notification queue for subscription {}, {}",
                id, err
            );
            StatusCode::BadOutOfMemory
        })?;
        Ok(Subscription {
            id,
            settings,
            publishing_enabled,
            state: SubscriptionState::Creating,
            current_keep_alive_count: 0,
            lifetime_counter: settings.lifetime_count,
            sequence_number: Handle::new(1),
            monitored_items: BTreeMap::new(),
            unpublished,
            update_job: None,
        })
    }

    /// Runs one publishing cycle. Reporting items are drained into data change messages, at most
    /// `max_notifications_per_publish` item notifications per message. If there was nothing to
    /// send for more than `max_keep_alive_count` cycles a keep-alive is queued instead.
    pub(crate) fn update(&mut self, now: DateTimeUtc, publish_request_queued: bool) -> UpdateResult {
        if self.state == SubscriptionState::Closed {
            return UpdateResult::None;
        }

        if publish_request_queued {
            self.reset_lifetime_counter();
        } else {
            self.lifetime_counter = self.lifetime_counter.saturating_sub(1);
            if self.lifetime_counter == 0 {
                info!(
                    "Subscription {} lifetime has expired and it will be closed",
                    self.id
                );
                let sequence_number = self.sequence_number.next();
                self.push(
                    NotificationMessage::status_change(sequence_number, now, StatusCode::BadTimeout),
                    NotificationKind::StatusChange,
                );
                self.state = SubscriptionState::Closed;
                return UpdateResult::Expired;
            }
        }

        let notifications = if self.publishing_enabled {
            self.monitored_items
                .values_mut()
                .filter(|item| item.is_reporting() && item.has_notifications())
                .flat_map(|item| item.take_notifications())
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        if !notifications.is_empty() {
            self.current_keep_alive_count = 0;
            let batch_size = match self.settings.max_notifications_per_publish as usize {
                0 => notifications.len(),
                n => n,
            };
            let mut enqueued = 0;
            for batch in notifications.chunks(batch_size) {
                let sequence_number = self.sequence_number.next();
                self.push(
                    NotificationMessage::data_change(sequence_number, now, batch.to_vec()),
                    NotificationKind::Data,
                );
                enqueued += 1;
            }
            trace!(
                "Subscription {} queued {} data change messages",
                self.id,
                enqueued
            );
            UpdateResult::Enqueued(enqueued)
        } else {
            self.current_keep_alive_count += 1;
            if self.current_keep_alive_count > self.settings.max_keep_alive_count {
                self.current_keep_alive_count = 0;
                let sequence_number = self.sequence_number.next();
                debug!(
                    "Subscription {} queued keep-alive {}",
                    self.id, sequence_number
                );
                self.push(
                    NotificationMessage::keep_alive(sequence_number, now),
                    NotificationKind::KeepAlive,
                );
                UpdateResult::Enqueued(1)
            } else {
                UpdateResult::None
            }
        }
    }

    /// Queues a message. When the queue is full the oldest sent message is dropped, or the
    /// oldest message if none have been sent.
    fn push(&mut self, message: NotificationMessage, kind: NotificationKind) {
        if self.unpublished.len() >= self.settings.max_queued_notifications {
            let idx = self
                .unpublished
                .iter()
                .position(|n| n.published_once)
                .unwrap_or(0);
            if let Some(dropped) = self.unpublished.remove(idx) {
                warn!(
                    "Subscription {} exceeded {} queued notifications, dropping sequence number {}",
                    self.id,
                    self.settings.max_queued_notifications,
                    dropped.sequence_number()
                );
            }
        }
        self.unpublished.push_back(UnpublishedNotification {
            message,
            kind,
            published_once: false,
        });
    }

    /// Takes the oldest message that has not been sent yet, marking it as sent. Returns it with
    /// the sequence numbers still available for republish. A keep-alive is dropped from the queue
    /// straight away and reports no available sequence numbers.
    pub(crate) fn take_for_publish(&mut self) -> Option<(NotificationMessage, Vec<u32>)> {
        let idx = self.unpublished.iter().position(|n| !n.published_once)?;
        let entry = &mut self.unpublished[idx];
        entry.published_once = true;
        let message = entry.message.clone();
        if entry.kind == NotificationKind::KeepAlive {
            let _ = self.unpublished.remove(idx);
            Some((message, Vec::new()))
        } else {
            Some((message, self.available_sequence_numbers()))
        }
    }

    /// Generates a keep-alive that is sent immediately and never queued. It still uses up a
    /// sequence number.
    pub(crate) fn force_keep_alive(&mut self, now: DateTimeUtc) -> NotificationMessage {
        self.current_keep_alive_count = 0;
        let sequence_number = self.sequence_number.next();
        debug!(
            "Subscription {} sending forced keep-alive {}",
            self.id, sequence_number
        );
        NotificationMessage::keep_alive(sequence_number, now)
    }

    /// Removes the acknowledged message. Returns `Good` or `BadSequenceNumberInvalid` if no
    /// retained message has that sequence number.
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        if let Some(idx) = self
            .unpublished
            .iter()
            .position(|n| n.sequence_number() == sequence_number)
        {
            let _ = self.unpublished.remove(idx);
            trace!(
                "Subscription {} acknowledged sequence number {}",
                self.id,
                sequence_number
            );
            StatusCode::Good
        } else {
            warn!(
                "Subscription {} cannot acknowledge unknown sequence number {}",
                self.id, sequence_number
            );
            StatusCode::BadSequenceNumberInvalid
        }
    }

    /// Returns a copy of a retained message. The message stays queued until acknowledged.
    pub fn republish(&mut self, sequence_number: u32) -> Result<NotificationMessage, StatusCode> {
        let entry = self
            .unpublished
            .iter_mut()
            .find(|n| n.sequence_number() == sequence_number)
            .ok_or(StatusCode::BadSequenceNumberInvalid)?;
        entry.published_once = true;
        Ok(entry.message.clone())
    }

    /// Sequence numbers of every retained message that can be republished
    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.unpublished
            .iter()
            .filter(|n| n.kind != NotificationKind::KeepAlive)
            .map(|n| n.sequence_number())
            .collect()
    }

    /// Tests if there is a queued message that has not been sent yet
    pub fn has_unsent(&self) -> bool {
        self.unpublished.iter().any(|n| !n.published_once)
    }

    /// A closed subscription can go once its last messages have been sent
    pub fn ready_to_remove(&self) -> bool {
        self.state == SubscriptionState::Closed && !self.has_unsent()
    }

    pub(crate) fn apply_settings(&mut self, settings: SubscriptionSettings) {
        self.settings = settings;
        if self.current_keep_alive_count > settings.max_keep_alive_count {
            self.current_keep_alive_count = settings.max_keep_alive_count;
        }
        self.reset_lifetime_counter();
    }

    pub fn reset_lifetime_counter(&mut self) {
        self.lifetime_counter = self.settings.lifetime_count;
    }

    pub(crate) fn set_update_job(&mut self, job: Option<JobHandle>) -> Option<JobHandle> {
        if job.is_some() && self.state == SubscriptionState::Creating {
            self.state = SubscriptionState::Active;
        }
        std::mem::replace(&mut self.update_job, job)
    }

    /// Takes every job handle owned by the subscription and its items so they can be
    /// unregistered.
    pub(crate) fn take_jobs(&mut self) -> Vec<JobHandle> {
        let mut jobs: Vec<JobHandle> = self.update_job.take().into_iter().collect();
        jobs.extend(
            self.monitored_items
                .values_mut()
                .filter_map(|item| item.set_sample_job(None)),
        );
        jobs
    }

    /// Releases the monitored items, e.g. when the lifetime expired
    pub(crate) fn clear_monitored_items(&mut self) {
        self.monitored_items.clear();
    }

    pub fn len(&self) -> usize {
        self.monitored_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitored_items.is_empty()
    }

    pub fn get(&self, id: &u32) -> Option<&MonitoredItem> {
        self.monitored_items.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &u32) -> Option<&mut MonitoredItem> {
        self.monitored_items.get_mut(id)
    }

    pub fn contains_key(&self, id: &u32) -> bool {
        self.monitored_items.contains_key(id)
    }

    pub(crate) fn insert(&mut self, item: MonitoredItem) {
        self.monitored_items.insert(item.id(), item);
    }

    pub(crate) fn remove(&mut self, id: &u32) -> Option<MonitoredItem> {
        self.monitored_items.remove(id)
    }

    pub fn monitored_items(&self) -> impl Iterator<Item = &MonitoredItem> {
        self.monitored_items.values()
    }

    pub fn unpublished(&self) -> impl Iterator<Item = &UnpublishedNotification> {
        self.unpublished.iter()
    }

    pub fn unpublished_len(&self) -> usize {
        self.unpublished.len()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn settings(&self) -> &SubscriptionSettings {
        &self.settings
    }

    pub fn publishing_interval(&self) -> f64 {
        self.settings.publishing_interval
    }

    pub fn priority(&self) -> u8 {
        self.settings.priority
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub(crate) fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
    }

    pub fn current_keep_alive_count(&self) -> u32 {
        self.current_keep_alive_count
    }

    pub fn lifetime_counter(&self) -> u32 {
        self.lifetime_counter
    }

    /// The sequence number the next message will get
    pub fn next_sequence_number(&self) -> u32 {
        self.sequence_number.peek()
    }

    pub fn update_job(&self) -> Option<JobHandle> {
        self.update_job
    }
}
