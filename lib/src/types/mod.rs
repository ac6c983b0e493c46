// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! The OPC UA types used by the subscription services. These are in-memory representations
//! only, encoding them for the wire is the job of whatever transport sits on top.

/// Timestamps are always UTC
pub type DateTimeUtc = chrono::DateTime<chrono::Utc>;

pub mod attribute;
pub mod data_value;
pub mod node_id;
pub mod notification_message;
pub mod response_header;
pub mod service_types;
pub mod status_code;
pub mod variant;

pub use crate::types::{
    attribute::AttributeId,
    data_value::DataValue,
    node_id::{Identifier, NodeId},
    notification_message::*,
    response_header::{RequestHeader, ResponseHeader},
    service_types::*,
    status_code::{StatusCode, StatusCodeBits},
    variant::Variant,
};
