// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use std::collections::VecDeque;

use crate::{
    server::{config::SubscriptionLimits, scheduler::JobHandle},
    types::{
        AttributeId, DataValue, MonitoredItemCreateRequest, MonitoredItemNotification,
        MonitoringMode, MonitoringParameters, NodeId, StatusCode,
    },
};

/// Settings of a monitored item after they have been revised against the server limits.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct RevisedParameters {
    pub sampling_interval: f64,
    pub queue_size: u32,
}

fn revise_parameters(
    limits: &SubscriptionLimits,
    parameters: &MonitoringParameters,
) -> RevisedParameters {
    RevisedParameters {
        sampling_interval: limits
            .sampling_interval_ms
            .clamp(parameters.sampling_interval),
        queue_size: limits.queue_size.clamp(parameters.queue_size),
    }
}

/// Samples one attribute of one node into a bounded queue until the owning subscription
/// collects the queued values.
#[derive(Debug)]
pub struct MonitoredItem {
    id: u32,
    // Copied from the request so the item does not depend on the node outliving it
    node_id: NodeId,
    attribute_id: AttributeId,
    monitoring_mode: MonitoringMode,
    client_handle: u32,
    sampling_interval: f64,
    queue_size: usize,
    discard_oldest: bool,
    queue: VecDeque<DataValue>,
    queue_overflow: bool,
    /// The last value that made it into the queue, for change detection
    last_data_value: Option<DataValue>,
    sample_job: Option<JobHandle>,
}

impl MonitoredItem {
    /// Creates the item from a create request, revising the sampling interval and queue size
    /// against the limits. Fails with `BadAttributeIdInvalid` if the attribute is unknown or
    /// `BadOutOfMemory` if the queue cannot be allocated.
    pub fn new(
        id: u32,
        request: &MonitoredItemCreateRequest,
        limits: &SubscriptionLimits,
    ) -> Result<MonitoredItem, StatusCode> {
        let attribute_id = AttributeId::from_u32(request.item_to_monitor.attribute_id)
            .map_err(|_| StatusCode::BadAttributeIdInvalid)?;
        let revised = revise_parameters(limits, &request.requested_parameters);
        let queue_size = revised.queue_size as usize;

        let mut queue = VecDeque::new();
        queue.try_reserve_exact(queue_size).map_err(|err| {
            error!(
                "Cannot allocate a queue of {} values for monitored item {}, {}",
                queue_size, id, err
            );
            StatusCode::BadOutOfMemory
        })?;

        Ok(MonitoredItem {
            id,
            node_id: request.item_to_monitor.node_id.clone(),
            attribute_id,
            monitoring_mode: request.monitoring_mode,
            client_handle: request.requested_parameters.client_handle,
            sampling_interval: revised.sampling_interval,
            queue_size,
            discard_oldest: request.requested_parameters.discard_oldest,
            queue,
            queue_overflow: false,
            last_data_value: None,
            sample_job: None,
        })
    }

    /// Modifies the item with new parameters. The queue is trimmed if it shrank, honouring the
    /// discard policy.
    pub(crate) fn modify(
        &mut self,
        limits: &SubscriptionLimits,
        parameters: &MonitoringParameters,
    ) -> RevisedParameters {
        let revised = revise_parameters(limits, parameters);
        self.sampling_interval = revised.sampling_interval;
        self.queue_size = revised.queue_size as usize;
        self.client_handle = parameters.client_handle;
        self.discard_oldest = parameters.discard_oldest;

        if self.queue.len() > self.queue_size {
            let discard = self.queue.len() - self.queue_size;
            for _ in 0..discard {
                if self.discard_oldest {
                    let _ = self.queue.pop_front();
                } else {
                    let _ = self.queue.pop_back();
                }
            }
            self.mark_overflow();
            self.queue.shrink_to_fit();
        }
        revised
    }

    /// Offers a freshly sampled value to the item. Returns true if it was queued. A value is
    /// queued only when the item is sampling and the value or status changed since the last
    /// queued value.
    pub fn sample(&mut self, value: DataValue) -> bool {
        if !self.is_sampling() {
            return false;
        }
        if let Some(ref last) = self.last_data_value {
            if !value.value_or_status_differs(last) {
                return false;
            }
        }

        if self.queue.len() >= self.queue_size {
            if self.discard_oldest {
                let _ = self.queue.pop_front();
            } else {
                // Keep the old data, lose the new
                trace!(
                    "Monitored item {} queue is full, dropping new value",
                    self.id
                );
                self.mark_overflow();
                return false;
            }
            self.queue.push_back(value.clone());
            self.mark_overflow();
        } else {
            self.queue.push_back(value.clone());
        }
        self.last_data_value = Some(value);
        true
    }

    /// Flags the value that survived an overflow. When discarding oldest it's the oldest
    /// remaining value, otherwise it's the newest.
    fn mark_overflow(&mut self) {
        let survivor = if self.discard_oldest {
            self.queue.front_mut()
        } else {
            self.queue.back_mut()
        };
        if let Some(v) = survivor {
            v.status = Some(v.status().set_overflow());
        }
        if !self.queue_overflow {
            debug!("Monitored item {} queue overflowed", self.id);
        }
        self.queue_overflow = true;
    }

    /// Drains the queue into notifications for the client, oldest first.
    pub fn take_notifications(&mut self) -> Vec<MonitoredItemNotification> {
        self.queue_overflow = false;
        let client_handle = self.client_handle;
        self.queue
            .drain(..)
            .map(|value| MonitoredItemNotification {
                client_handle,
                value,
            })
            .collect()
    }

    pub fn set_monitoring_mode(&mut self, monitoring_mode: MonitoringMode) {
        if monitoring_mode == MonitoringMode::Disabled {
            // A disabled item forgets what it had so re-enabling reports the current value
            self.queue.clear();
            self.last_data_value = None;
            self.queue_overflow = false;
        }
        self.monitoring_mode = monitoring_mode;
    }

    pub(crate) fn set_sample_job(&mut self, job: Option<JobHandle>) -> Option<JobHandle> {
        std::mem::replace(&mut self.sample_job, job)
    }

    pub fn sample_job(&self) -> Option<JobHandle> {
        self.sample_job
    }

    pub fn is_reporting(&self) -> bool {
        matches!(self.monitoring_mode, MonitoringMode::Reporting)
    }

    pub fn is_sampling(&self) -> bool {
        matches!(
            self.monitoring_mode,
            MonitoringMode::Reporting | MonitoringMode::Sampling
        )
    }

    pub fn has_notifications(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn attribute_id(&self) -> AttributeId {
        self.attribute_id
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn discard_oldest(&self) -> bool {
        self.discard_oldest
    }

    pub fn queue_overflow(&self) -> bool {
        self.queue_overflow
    }

    pub fn queued_values(&self) -> impl Iterator<Item = &DataValue> {
        self.queue.iter()
    }
}
