use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use crate::server::{
    config::{Bounds, SubscriptionLimits},
    scheduler::{duration_from_ms, ManualScheduler},
    session::Session,
    subscriptions::PublishResult,
    value_source::MemoryValueSource,
};
use crate::types::*;

mod services;
mod subscriptions;

/// Sampling interval the test items ask for
const SAMPLING_INTERVAL_MS: f64 = 10.0;
/// Publishing interval the test subscriptions ask for
const PUBLISHING_INTERVAL_MS: f64 = 100.0;
/// How often the session checks waiting publish requests for expiry
const PUBLISH_TIMEOUT_CHECK_MS: u64 = 50;
/// Every session registers one job of its own for expiring publish requests
const SESSION_JOBS: usize = 1;

fn test_limits() -> SubscriptionLimits {
    SubscriptionLimits {
        sampling_interval_ms: Bounds::new(SAMPLING_INTERVAL_MS, 1000.0),
        publishing_interval_ms: Bounds::new(PUBLISHING_INTERVAL_MS, 1000.0),
        publish_timeout_check_interval_ms: PUBLISH_TIMEOUT_CHECK_MS,
        ..Default::default()
    }
}

fn var_node_id(i: u32) -> NodeId {
    NodeId::new(2, format!("v{}", i))
}

/// A session driven by a manual scheduler over five variables `v1` to `v5`, all starting at 0.
struct TestSession {
    scheduler: Arc<ManualScheduler>,
    source: Arc<MemoryValueSource>,
    session: Session,
}

impl TestSession {
    fn new() -> TestSession {
        Self::with_limits(test_limits())
    }

    fn with_limits(limits: SubscriptionLimits) -> TestSession {
        let scheduler = Arc::new(ManualScheduler::new());
        let source = Arc::new(MemoryValueSource::new());
        (1..=5).for_each(|i| {
            source.set_value(&var_node_id(i), AttributeId::Value, DataValue::new_now(0i32));
        });
        let session = Session::new(limits, scheduler.clone(), source.clone());
        TestSession {
            scheduler,
            source,
            session,
        }
    }

    fn set_value(&self, i: u32, value: i32) {
        self.source
            .set_value(&var_node_id(i), AttributeId::Value, DataValue::new_now(value));
    }

    /// Fires every sampling job
    fn sample(&self) -> usize {
        self.scheduler
            .fire_every(duration_from_ms(SAMPLING_INTERVAL_MS))
    }

    /// Fires every publishing cycle
    fn publishing_cycle(&self) -> usize {
        self.scheduler
            .fire_every(duration_from_ms(PUBLISHING_INTERVAL_MS))
    }

    /// Fires the job that answers expired publish requests
    fn check_publish_timeouts(&self) -> usize {
        self.scheduler
            .fire_every(Duration::from_millis(PUBLISH_TIMEOUT_CHECK_MS))
    }

    fn sample_and_publish(&self) {
        self.sample();
        self.publishing_cycle();
    }

    fn create_subscription_with(&self, request: CreateSubscriptionRequest) -> u32 {
        self.session
            .create_subscription(&request)
            .unwrap()
            .subscription_id
    }

    fn create_subscription(&self) -> u32 {
        self.create_subscription_with(create_subscription_request(30, 10))
    }

    fn create_items(&self, subscription_id: u32, items: &[u32]) -> Vec<MonitoredItemCreateResult> {
        let request = CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(1),
            subscription_id,
            items_to_create: Some(
                items
                    .iter()
                    .map(|i| item_create_request(var_node_id(*i), *i, 5, true))
                    .collect(),
            ),
        };
        self.session
            .create_monitored_items(&request)
            .unwrap()
            .results
            .unwrap()
    }

    fn publish(&self, acks: &[(u32, u32)]) -> oneshot::Receiver<PublishResult> {
        self.session.publish(publish_request(acks))
    }
}

fn create_subscription_request(lifetime_count: u32, keep_alive_count: u32) -> CreateSubscriptionRequest {
    CreateSubscriptionRequest {
        request_header: RequestHeader::new(1),
        requested_publishing_interval: PUBLISHING_INTERVAL_MS,
        requested_lifetime_count: lifetime_count,
        requested_max_keep_alive_count: keep_alive_count,
        max_notifications_per_publish: 0,
        publishing_enabled: true,
        priority: 0,
    }
}

fn item_create_request(
    node_id: NodeId,
    client_handle: u32,
    queue_size: u32,
    discard_oldest: bool,
) -> MonitoredItemCreateRequest {
    MonitoredItemCreateRequest {
        item_to_monitor: ReadValueId::value_of(node_id),
        monitoring_mode: MonitoringMode::Reporting,
        requested_parameters: MonitoringParameters {
            client_handle,
            sampling_interval: SAMPLING_INTERVAL_MS,
            queue_size,
            discard_oldest,
        },
    }
}

fn publish_request(acks: &[(u32, u32)]) -> PublishRequest {
    PublishRequest {
        request_header: RequestHeader::new(1),
        subscription_acknowledgements: if acks.is_empty() {
            None
        } else {
            Some(
                acks.iter()
                    .map(|(subscription_id, sequence_number)| SubscriptionAcknowledgement {
                        subscription_id: *subscription_id,
                        sequence_number: *sequence_number,
                    })
                    .collect(),
            )
        },
    }
}

/// Takes the response if the request has been answered
fn try_response(receiver: &mut oneshot::Receiver<PublishResult>) -> Option<PublishResult> {
    receiver.try_recv().ok()
}

/// Takes the response, failing the test if the request has not been answered or was faulted
fn response(receiver: &mut oneshot::Receiver<PublishResult>) -> PublishResponse {
    try_response(receiver)
        .expect("publish request has not been answered")
        .expect("publish request was faulted")
}

fn int_values(message: &NotificationMessage) -> Vec<i32> {
    message
        .data_changes()
        .iter()
        .map(|n| match n.value.value {
            Some(Variant::Int32(v)) => v,
            ref v => panic!("unexpected value {:?}", v),
        })
        .collect()
}
