// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Contains the implementation of `DataValue`.

use chrono::Utc;

use crate::types::{status_code::StatusCode, variant::Variant, DateTimeUtc};

/// A data value is a value of a variable in the OPC UA server and contains information about its
/// value, status and change timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value. Not present if the read failed.
    pub value: Option<Variant>,
    /// The status associated with the value. Absent means good.
    pub status: Option<StatusCode>,
    /// The source timestamp associated with the value.
    pub source_timestamp: Option<DateTimeUtc>,
    /// The Server timestamp associated with the value.
    pub server_timestamp: Option<DateTimeUtc>,
}

impl DataValue {
    /// Creates a data value with source and server timestamps set to now
    pub fn new_now<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue::new_at(value, Utc::now())
    }

    /// Creates a data value with source and server timestamps set to the supplied time
    pub fn new_at<V>(value: V, time: DateTimeUtc) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(time),
            server_timestamp: Some(time),
        }
    }

    /// Creates a value-less data value carrying only a status, e.g. the outcome of a failed read
    pub fn from_status(status: StatusCode, time: DateTimeUtc) -> DataValue {
        DataValue {
            value: None,
            status: Some(status),
            source_timestamp: None,
            server_timestamp: Some(time),
        }
    }

    /// Returns the status code or Good if there is no code on the value
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Test if the value held by this data value is known to be good
    pub fn is_valid(&self) -> bool {
        self.status().is_good()
    }

    /// Tests whether the value or status differs from another data value. Timestamps are
    /// ignored.
    pub fn value_or_status_differs(&self, other: &DataValue) -> bool {
        self.value != other.value || self.status().status() != other.status().status()
    }
}
