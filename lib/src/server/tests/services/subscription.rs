use super::*;

use crate::server::subscriptions::SubscriptionState;

#[test]
fn create_subscription_revises_settings() {
    let ts = TestSession::new();
    let request = CreateSubscriptionRequest {
        requested_publishing_interval: 50.0,
        ..create_subscription_request(1, 0)
    };
    let response = ts.session.create_subscription(&request).unwrap();
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    assert_eq!(response.subscription_id, 1);
    assert_eq!(response.revised_publishing_interval, 100.0);
    assert_eq!(response.revised_lifetime_count, 3);
    assert_eq!(response.revised_max_keep_alive_count, 1);

    // The update job runs on the revised interval
    let job = ts
        .session
        .with_subscription(1, |s| {
            assert_eq!(s.state(), SubscriptionState::Active);
            s.update_job()
        })
        .flatten()
        .unwrap();
    assert_eq!(ts.scheduler.interval(job), Some(duration_from_ms(100.0)));

    // Ids are unique
    assert_eq!(ts.create_subscription(), 2);
    assert_eq!(ts.session.subscription_ids(), vec![1, 2]);
}

#[test]
fn too_many_subscriptions() {
    let ts = TestSession::with_limits(SubscriptionLimits {
        max_subscriptions_per_session: 2,
        ..test_limits()
    });
    ts.create_subscription();
    ts.create_subscription();
    assert_eq!(
        ts.session
            .create_subscription(&create_subscription_request(30, 10))
            .unwrap_err(),
        StatusCode::BadTooManySubscriptions
    );
    assert_eq!(ts.session.subscription_ids().len(), 2);
}

#[test]
fn modify_subscription() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let old_job = ts
        .session
        .with_subscription(subscription_id, |s| s.update_job())
        .flatten()
        .unwrap();

    let request = ModifySubscriptionRequest {
        request_header: RequestHeader::new(2),
        subscription_id,
        requested_publishing_interval: 500.0,
        requested_lifetime_count: 60,
        requested_max_keep_alive_count: 20,
        max_notifications_per_publish: 5,
        priority: 3,
    };
    let response = ts.session.modify_subscription(&request).unwrap();
    assert_eq!(response.revised_publishing_interval, 500.0);
    assert_eq!(response.revised_lifetime_count, 60);
    assert_eq!(response.revised_max_keep_alive_count, 20);

    assert!(!ts.scheduler.is_registered(old_job));
    let (job, settings) = ts
        .session
        .with_subscription(subscription_id, |s| (s.update_job(), *s.settings()))
        .unwrap();
    assert_eq!(ts.scheduler.interval(job.unwrap()), Some(duration_from_ms(500.0)));
    assert_eq!(settings.priority, 3);
    assert_eq!(settings.max_notifications_per_publish, 5);
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 1);

    let request = ModifySubscriptionRequest {
        subscription_id: 99,
        ..request
    };
    assert_eq!(
        ts.session.modify_subscription(&request).unwrap_err(),
        StatusCode::BadSubscriptionIdInvalid
    );
}

#[test]
fn set_publishing_mode() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    let request = SetPublishingModeRequest {
        request_header: RequestHeader::new(1),
        publishing_enabled: false,
        subscription_ids: Some(vec![subscription_id, 99]),
    };
    let response = ts.session.set_publishing_mode(&request).unwrap();
    assert_eq!(
        response.results,
        Some(vec![StatusCode::Good, StatusCode::BadSubscriptionIdInvalid])
    );
    assert_eq!(
        ts.session
            .with_subscription(subscription_id, |s| s.publishing_enabled()),
        Some(false)
    );
}

#[test]
fn delete_subscriptions_cancels_jobs() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    ts.create_items(subscription_id, &[1, 2]);
    assert_eq!(ts.scheduler.len(), SESSION_JOBS + 3);

    let mut rx = ts.publish(&[]);
    assert!(try_response(&mut rx).is_none());

    let request = DeleteSubscriptionsRequest {
        request_header: RequestHeader::new(1),
        subscription_ids: Some(vec![subscription_id]),
    };
    let delete_response = ts.session.delete_subscriptions(&request).unwrap();
    assert_eq!(delete_response.results, Some(vec![StatusCode::Good]));
    assert_eq!(ts.scheduler.len(), SESSION_JOBS);
    assert!(ts.session.subscription_ids().is_empty());

    // The waiting publish request learns there is nothing left
    let publish_response = response(&mut rx);
    assert_eq!(
        publish_response.response_header.service_result,
        StatusCode::BadNoSubscription
    );

    let delete_response = ts.session.delete_subscriptions(&request).unwrap();
    assert_eq!(
        delete_response.results,
        Some(vec![StatusCode::BadSubscriptionIdInvalid])
    );
}

#[test]
fn empty_batches() {
    let ts = TestSession::new();
    ts.create_subscription();
    assert_eq!(
        ts.session
            .set_publishing_mode(&SetPublishingModeRequest {
                request_header: RequestHeader::new(1),
                publishing_enabled: true,
                subscription_ids: None,
            })
            .unwrap_err(),
        StatusCode::BadNothingToDo
    );
    assert_eq!(
        ts.session
            .delete_subscriptions(&DeleteSubscriptionsRequest {
                request_header: RequestHeader::new(1),
                subscription_ids: Some(Vec::new()),
            })
            .unwrap_err(),
        StatusCode::BadNothingToDo
    );
}

#[test]
fn republish() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    ts.create_items(subscription_id, &[1]);
    let mut rx = ts.publish(&[]);
    ts.sample_and_publish();
    let message = response(&mut rx).notification_message;
    assert_eq!(message.sequence_number, 1);

    let request = RepublishRequest {
        request_header: RequestHeader::new(1),
        subscription_id,
        retransmit_sequence_number: 1,
    };
    // Republishing doesn't consume anything
    let first = ts.session.republish(&request).unwrap();
    let second = ts.session.republish(&request).unwrap();
    assert_eq!(first.notification_message, message);
    assert_eq!(second.notification_message, message);

    assert_eq!(
        ts.session
            .republish(&RepublishRequest {
                retransmit_sequence_number: 2,
                ..request.clone()
            })
            .unwrap_err(),
        StatusCode::BadSequenceNumberInvalid
    );
    assert_eq!(
        ts.session
            .republish(&RepublishRequest {
                subscription_id: 99,
                ..request.clone()
            })
            .unwrap_err(),
        StatusCode::BadSubscriptionIdInvalid
    );

    // Once acknowledged it's gone
    let _rx = ts.publish(&[(subscription_id, 1)]);
    assert_eq!(
        ts.session.republish(&request).unwrap_err(),
        StatusCode::BadSequenceNumberInvalid
    );
}

#[test]
fn close_answers_waiting_requests() {
    let ts = TestSession::new();
    let subscription_id = ts.create_subscription();
    ts.create_items(subscription_id, &[1]);
    let mut rx = ts.publish(&[]);
    ts.session.close();
    assert!(ts.scheduler.is_empty());
    assert_eq!(
        response(&mut rx).response_header.service_result,
        StatusCode::BadNoSubscription
    );
}
