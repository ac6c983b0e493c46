// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! This sample hosts a session with a subscription over some simulated variables and plays the
//! part of the client too, publishing and acknowledging in a loop and logging every notification
//! it receives.
//!
//! 1. Load the server configuration or use the default one
//! 2. Start a timer that changes the variables
//! 3. Create a subscription with a monitored item per variable
//! 4. Publish until Ctrl+C or until the run time elapses
use std::{path::PathBuf, sync::Arc, time::Duration};

use opcua_subscriptions::prelude::*;

struct Args {
    help: bool,
    config: Option<PathBuf>,
    run_for: Option<u64>,
    publishing_interval: f64,
}

impl Args {
    pub fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
        let mut args = pico_args::Arguments::from_env();
        Ok(Args {
            help: args.contains(["-h", "--help"]),
            config: args.opt_value_from_str("--config")?,
            run_for: args.opt_value_from_str("--run-for")?,
            publishing_interval: args
                .opt_value_from_str("--publishing-interval")?
                .unwrap_or(DEFAULT_PUBLISHING_INTERVAL),
        })
    }

    pub fn usage() {
        println!(
            r#"Subscription Server
Usage:
  -h, --help                  Show help
  --config [file]             Server configuration file, e.g. subscription-server.conf (default: built in)
  --run-for [secs]            Exit after this many seconds (default: run until Ctrl+C)
  --publishing-interval [ms]  Requested publishing interval (default: {})"#,
            DEFAULT_PUBLISHING_INTERVAL
        );
    }
}

const DEFAULT_PUBLISHING_INTERVAL: f64 = 1000.0;

fn variable_node_ids() -> Vec<NodeId> {
    ["v1", "v2", "v3", "v4"]
        .iter()
        .map(|name| NodeId::new(2, *name))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), ()> {
    let args = Args::parse_args().map_err(|_| Args::usage())?;
    if args.help {
        Args::usage();
        return Ok(());
    }

    // Optional - enable logging
    opcua_subscriptions::console_logging::init();

    let config = match args.config {
        Some(ref path) => {
            let config: ServerConfig = ServerConfig::load(path)?;
            config
        }
        None => ServerConfig::default(),
    };
    if !config.is_valid() {
        log::error!("Server configuration is invalid");
        return Err(());
    }
    log::info!("Starting {}", config.application_name);

    let source = Arc::new(MemoryValueSource::new());
    let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
    let session = Arc::new(Session::new(
        config.subscriptions,
        scheduler.clone(),
        source.clone(),
    ));

    let simulation = tokio::spawn(simulate_variables(source.clone()));

    let subscription_id = create_subscription(&session, args.publishing_interval)?;
    let client = publish_loop(session.clone(), subscription_id);

    match args.run_for {
        Some(secs) => {
            let _ = tokio::time::timeout(Duration::from_secs(secs), client).await;
        }
        None => {
            tokio::select! {
                _ = client => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Ctrl+C received, closing the session");
                }
            }
        }
    }

    simulation.abort();
    session.close();
    log::info!(
        "Session closed, {} timers still running",
        scheduler.len()
    );
    Ok(())
}

/// Changes the variables every 250ms. v1 counts up, v2 flips, v3 follows a sine wave and v4
/// holds the time.
async fn simulate_variables(source: Arc<MemoryValueSource>) {
    let node_ids = variable_node_ids();
    let mut counter = 0i32;
    let mut interval = tokio::time::interval(Duration::from_millis(250));
    loop {
        interval.tick().await;
        let now = chrono::Utc::now();
        counter += 1;
        source.set_value(&node_ids[0], AttributeId::Value, DataValue::new_at(counter, now));
        source.set_value(
            &node_ids[1],
            AttributeId::Value,
            DataValue::new_at(counter % 8 < 4, now),
        );
        source.set_value(
            &node_ids[2],
            AttributeId::Value,
            DataValue::new_at((counter as f64 / 10.0).sin(), now),
        );
        source.set_value(
            &node_ids[3],
            AttributeId::Value,
            DataValue::new_at(now.format("%H:%M:%S").to_string(), now),
        );
    }
}

fn create_subscription(session: &Session, publishing_interval: f64) -> Result<u32, ()> {
    let response = session
        .create_subscription(&CreateSubscriptionRequest {
            request_header: RequestHeader::new(1),
            requested_publishing_interval: publishing_interval,
            requested_lifetime_count: 60,
            requested_max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        })
        .map_err(|status| log::error!("Cannot create subscription, {}", status))?;
    log::info!(
        "Created subscription {}, revised publishing interval {}ms",
        response.subscription_id,
        response.revised_publishing_interval
    );

    let items_to_create = variable_node_ids()
        .into_iter()
        .enumerate()
        .map(|(i, node_id)| MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::value_of(node_id),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: i as u32 + 1,
                sampling_interval: 250.0,
                queue_size: 4,
                discard_oldest: true,
            },
        })
        .collect();
    let results = session
        .create_monitored_items(&CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(2),
            subscription_id: response.subscription_id,
            items_to_create: Some(items_to_create),
        })
        .map_err(|status| log::error!("Cannot create monitored items, {}", status))?
        .results
        .unwrap_or_default();
    for result in results {
        log::info!(
            "Monitored item {} {}, sampling interval {}ms, queue size {}",
            result.monitored_item_id,
            result.status_code,
            result.revised_sampling_interval,
            result.revised_queue_size
        );
    }
    Ok(response.subscription_id)
}

/// Acts as the client. Every response is acknowledged with the next request.
async fn publish_loop(session: Arc<Session>, subscription_id: u32) {
    let mut acknowledgements = Vec::new();
    let mut request_handle = 100;
    loop {
        request_handle += 1;
        let receiver = session.publish(PublishRequest {
            request_header: RequestHeader::new(request_handle).with_timeout_hint(5000),
            subscription_acknowledgements: Some(std::mem::take(&mut acknowledgements)),
        });
        let response = match receiver.await {
            Ok(Ok(response)) => response,
            Ok(Err(status)) => {
                log::warn!("Publish request faulted, {}", status);
                continue;
            }
            Err(_) => {
                log::info!("Session has gone away");
                break;
            }
        };
        if response.response_header.service_result.is_bad() {
            log::warn!(
                "Publish failed, {}",
                response.response_header.service_result
            );
            break;
        }

        let message = &response.notification_message;
        if message.is_keep_alive() {
            log::info!("Keep-alive {}", message.sequence_number);
            continue;
        }
        if let Some(status) = message.status_change_status() {
            log::warn!("Subscription status changed to {}", status);
        }
        for notification in message.data_changes() {
            log::info!(
                "Notification {} item {} = {}",
                message.sequence_number,
                notification.client_handle,
                notification
                    .value
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| notification.value.status().to_string())
            );
        }
        acknowledgements.push(SubscriptionAcknowledgement {
            subscription_id,
            sequence_number: message.sequence_number,
        });
    }
}
