use super::*;

fn create_items_request(
    subscription_id: u32,
    items: Vec<MonitoredItemCreateRequest>,
) -> CreateMonitoredItemsRequest {
    CreateMonitoredItemsRequest {
        request_header: RequestHeader::new(1),
        subscription_id,
        items_to_create: Some(items),
    }
}

#[test]
fn create_monitored_items_revises_parameters() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let mut item = item_create_request(var_node_id(1), 1, 0, true);
    item.requested_parameters.sampling_interval = -1.0;
    let mut big_queue = item_create_request(var_node_id(2), 2, 1000, true);
    big_queue.requested_parameters.sampling_interval = 1_000_000.0;

    let response = ts
        .session
        .create_monitored_items(&create_items_request(subscription_id, vec![item, big_queue]))
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[0].revised_queue_size, 1);
    assert_eq!(results[0].revised_sampling_interval, SAMPLING_INTERVAL_MS);
    assert_eq!(results[1].status_code, StatusCode::Good);
    assert_eq!(results[1].revised_queue_size, 10);
    assert_eq!(results[1].revised_sampling_interval, 1000.0);
    assert_ne!(results[0].monitored_item_id, results[1].monitored_item_id);

    // Update job plus one sampling job per item
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 3);
}

#[test]
fn create_monitored_items_bad_items() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let bad_node = item_create_request(NodeId::new(2, "missing"), 1, 1, true);
    let mut bad_attribute = item_create_request(var_node_id(1), 2, 1, true);
    bad_attribute.item_to_monitor.attribute_id = 999;
    let good = item_create_request(var_node_id(1), 3, 1, true);

    let results = ts
        .session
        .create_monitored_items(&create_items_request(
            subscription_id,
            vec![bad_node, bad_attribute, good],
        ))
        .unwrap()
        .results
        .unwrap();
    let statuses: Vec<StatusCode> = results.iter().map(|r| r.status_code).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::BadNodeIdInvalid,
            StatusCode::BadAttributeIdInvalid,
            StatusCode::Good
        ]
    );
    assert_eq!(results[0].monitored_item_id, 0);
    assert_eq!(results[1].monitored_item_id, 0);
    assert_eq!(
        ts.session.with_subscription(subscription_id, |s| s.len()),
        Some(1)
    );
}

#[test]
fn create_monitored_items_bad_requests() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    assert_eq!(
        ts.session
            .create_monitored_items(&CreateMonitoredItemsRequest {
                request_header: RequestHeader::new(1),
                subscription_id,
                items_to_create: None,
            })
            .unwrap_err(),
        StatusCode::BadNothingToDo
    );
    assert_eq!(
        ts.session
            .create_monitored_items(&create_items_request(
                99,
                vec![item_create_request(var_node_id(1), 1, 1, true)]
            ))
            .unwrap_err(),
        StatusCode::BadSubscriptionIdInvalid
    );
}

#[test]
fn too_many_monitored_items() {
    let ts = TestSession::with_limits(SubscriptionLimits {
        max_monitored_items_per_sub: 2,
        ..test_limits()
    });
    let subscription_id = ts.create_subscription();
    let results = ts.create_items(subscription_id, &[1, 2, 3]);
    let statuses: Vec<StatusCode> = results.iter().map(|r| r.status_code).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::Good,
            StatusCode::Good,
            StatusCode::BadTooManyMonitoredItems
        ]
    );
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 3);
}

#[test]
fn modify_monitored_items() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let item_id = ts.create_items(subscription_id, &[1])[0].monitored_item_id;

    let request = ModifyMonitoredItemsRequest {
        request_header: RequestHeader::new(1),
        subscription_id,
        items_to_modify: Some(vec![
            MonitoredItemModifyRequest {
                monitored_item_id: item_id,
                requested_parameters: MonitoringParameters {
                    client_handle: 50,
                    sampling_interval: 250.0,
                    queue_size: 3,
                    discard_oldest: false,
                },
            },
            MonitoredItemModifyRequest {
                monitored_item_id: 999,
                requested_parameters: MonitoringParameters::default(),
            },
        ]),
    };
    let results = ts
        .session
        .modify_monitored_items(&request)
        .unwrap()
        .results
        .unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[0].revised_sampling_interval, 250.0);
    assert_eq!(results[0].revised_queue_size, 3);
    assert_eq!(results[1].status_code, StatusCode::BadMonitoredItemIdInvalid);

    let (job, client_handle, discard_oldest) = ts
        .session
        .with_subscription(subscription_id, |s| {
            let item = s.get(&item_id).unwrap();
            (item.sample_job(), item.client_handle(), item.discard_oldest())
        })
        .unwrap();
    assert_eq!(ts.scheduler.interval(job.unwrap()), Some(duration_from_ms(250.0)));
    assert_eq!(client_handle, 50);
    assert!(!discard_oldest);
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 2);
}

#[test]
fn set_monitoring_mode() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let item_id = ts.create_items(subscription_id, &[1])[0].monitored_item_id;
    let response = ts
        .session
        .set_monitoring_mode(&SetMonitoringModeRequest {
            request_header: RequestHeader::new(1),
            subscription_id,
            monitoring_mode: MonitoringMode::Sampling,
            monitored_item_ids: Some(vec![item_id, 999]),
        })
        .unwrap();
    assert_eq!(
        response.results,
        Some(vec![StatusCode::Good, StatusCode::BadMonitoredItemIdInvalid])
    );
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| s.get(&item_id).unwrap().monitoring_mode()),
        Some(MonitoringMode::Sampling)
    );
}

#[test]
fn delete_monitored_items() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let results = ts.create_items(subscription_id, &[1, 2]);
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 3);

    let request = DeleteMonitoredItemsRequest {
        request_header: RequestHeader::new(1),
        subscription_id,
        monitored_item_ids: Some(vec![results[0].monitored_item_id, 999]),
    };
    let response = ts.session.delete_monitored_items(&request).unwrap();
    assert_eq!(
        response.results,
        Some(vec![StatusCode::Good, StatusCode::BadMonitoredItemIdInvalid])
    );
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 2);

    assert_eq!(
        ts.session
            .delete_monitored_items(&DeleteMonitoredItemsRequest {
                monitored_item_ids: None,
                ..request
            })
            .unwrap_err(),
        StatusCode::BadNothingToDo
    );
}
