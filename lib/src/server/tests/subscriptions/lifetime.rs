use super::*;

use crate::server::subscriptions::SubscriptionState;

#[test]
fn lifetime_expiry_sends_status_change() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription_with(create_subscription_request(3, 10));
    ts.create_items(subscription_id, &[1, 2]);
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 3);

    // No publish requests for three publishing cycles
    ts.publishing_cycle();
    ts.publishing_cycle();
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| s.lifetime_counter()),
        Some(1)
    );
    ts.publishing_cycle();

    // The subscription is closed and its jobs and items are gone
    assert_eq!(ts.scheduler.len(), SESSION_JOBS);
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| (s.state(), s.len())),
        Some((SubscriptionState::Closed, 0))
    );

    let mut rx = ts.publish(&[]);
    let status_change = response(&mut rx);
    assert_eq!(status_change.subscription_id, subscription_id);
    assert_eq!(
        status_change.notification_message.status_change_status(),
        Some(StatusCode::BadTimeout)
    );
    assert!(ts.session.subscription_ids().is_empty());

    // Nothing left to publish for
    let mut rx = ts.publish(&[]);
    assert_eq!(
        response(&mut rx).response_header.service_result,
        StatusCode::BadNoSubscription
    );
}

#[test]
fn closed_subscription_is_gone_to_services() {
    let ts = TestSession::with_limits(SubscriptionLimits {
        max_subscriptions_per_session: 1,
        ..test_limits()
    });
    let subscription_id = ts.create_subscription_with(create_subscription_request(3, 10));
    (0..3).for_each(|_| {
        ts.publishing_cycle();
    });
    assert_eq!(
        ts.session.with_subscription(subscription_id, |s| s.state()),
        Some(SubscriptionState::Closed)
    );

    let delete_response = ts
        .session
        .delete_subscriptions(&DeleteSubscriptionsRequest {
            request_header: RequestHeader::new(1),
            subscription_ids: Some(vec![subscription_id]),
        })
        .unwrap();
    assert_eq!(
        delete_response.results,
        Some(vec![StatusCode::BadSubscriptionIdInvalid])
    );
    assert_eq!(
        ts.session
            .republish(&RepublishRequest {
                request_header: RequestHeader::new(2),
                subscription_id,
                retransmit_sequence_number: 1,
            })
            .unwrap_err(),
        StatusCode::BadSubscriptionIdInvalid
    );
    assert_eq!(
        ts.session
            .modify_subscription(&ModifySubscriptionRequest {
                request_header: RequestHeader::new(3),
                subscription_id,
                requested_publishing_interval: PUBLISHING_INTERVAL_MS,
                requested_lifetime_count: 30,
                requested_max_keep_alive_count: 10,
                max_notifications_per_publish: 0,
                priority: 0,
            })
            .unwrap_err(),
        StatusCode::BadSubscriptionIdInvalid
    );

    // It does not count toward the limit
    let replacement_id = ts.create_subscription();
    assert_ne!(replacement_id, subscription_id);

    // Its final status change is still delivered, acknowledgements for it are rejected
    let mut rx = ts.publish(&[(subscription_id, 1)]);
    let status_change = response(&mut rx);
    assert_eq!(status_change.subscription_id, subscription_id);
    assert_eq!(
        status_change.notification_message.status_change_status(),
        Some(StatusCode::BadTimeout)
    );
    assert_eq!(
        status_change.results,
        Some(vec![StatusCode::BadSubscriptionIdInvalid])
    );
    assert_eq!(ts.session.subscription_ids(), vec![replacement_id]);
}

#[test]
fn publish_requests_keep_subscription_alive() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription_with(create_subscription_request(3, 100));
    let _rx = ts.publish(&[]);
    (0..10).for_each(|_| {
        ts.publishing_cycle();
    });
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| (s.state(), s.lifetime_counter())),
        Some((SubscriptionState::Active, 3))
    );
}

#[test]
fn publish_request_resets_lifetime() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription_with(create_subscription_request(3, 100));
    ts.publishing_cycle();
    ts.publishing_cycle();
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| s.lifetime_counter()),
        Some(1)
    );

    // Arrival of a publish request counts as client activity
    let _rx = ts.publish(&[]);
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| s.lifetime_counter()),
        Some(3)
    );
}

#[test]
fn session_drop_unregisters_jobs() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    ts.create_items(subscription_id, &[1, 2, 3]);
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 4);

    let TestSession {
        scheduler, session, ..
    } = ts;
    drop(session);
    assert!(scheduler.is_empty());
}
