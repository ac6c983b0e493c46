// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Helpers for NotificationMessage types

use crate::types::{data_value::DataValue, status_code::StatusCode, DateTimeUtc};

/// One changed value of one monitored item, identified by the client's handle for the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChangeNotification {
    pub monitored_items: Option<Vec<MonitoredItemNotification>>,
}

/// Tells the client the subscription changed state, e.g. `BadTimeout` when its lifetime
/// expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationData {
    DataChange(DataChangeNotification),
    StatusChange(StatusChangeNotification),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTimeUtc,
    pub notification_data: Option<Vec<NotificationData>>,
}

impl NotificationMessage {
    /// Create a notification message which contains data changes
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTimeUtc,
        data_change_notifications: Vec<MonitoredItemNotification>,
    ) -> NotificationMessage {
        let data_change_notification = DataChangeNotification {
            monitored_items: Some(data_change_notifications),
        };
        trace!("data change notification = {:?}", data_change_notification);
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![NotificationData::DataChange(
                data_change_notification,
            )]),
        }
    }

    /// Create a status change notification message
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTimeUtc,
        status: StatusCode,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![NotificationData::StatusChange(
                StatusChangeNotification { status },
            )]),
        }
    }

    /// Create a keep-alive notification message
    pub fn keep_alive(sequence_number: u32, publish_time: DateTimeUtc) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_none()
    }

    /// Extract the monitored item notifications from all the data change notifications in the
    /// message, in order.
    pub fn data_changes(&self) -> Vec<&MonitoredItemNotification> {
        self.notification_data
            .iter()
            .flatten()
            .filter_map(|n| match n {
                NotificationData::DataChange(d) => d.monitored_items.as_ref(),
                NotificationData::StatusChange(_) => None,
            })
            .flatten()
            .collect()
    }

    /// The status of the first status change notification in the message, if there is one
    pub fn status_change_status(&self) -> Option<StatusCode> {
        self.notification_data.iter().flatten().find_map(|n| match n {
            NotificationData::StatusChange(s) => Some(s.status),
            NotificationData::DataChange(_) => None,
        })
    }
}
