// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use chrono::Utc;

use crate::types::{status_code::StatusCode, DateTimeUtc};

/// The `RequestHeader` contains information common to every request from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub request_handle: u32,
    pub timestamp: DateTimeUtc,
    /// How long the client will wait for a response in milliseconds. 0 means no timeout.
    pub timeout_hint: u32,
}

impl RequestHeader {
    pub fn new(request_handle: u32) -> RequestHeader {
        RequestHeader {
            request_handle,
            timestamp: Utc::now(),
            timeout_hint: 0,
        }
    }

    pub fn with_timeout_hint(mut self, timeout_hint: u32) -> Self {
        self.timeout_hint = timeout_hint;
        self
    }
}

impl Default for RequestHeader {
    fn default() -> Self {
        RequestHeader::new(0)
    }
}

/// The `ResponseHeader` contains information common to every response from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub timestamp: DateTimeUtc,
    pub request_handle: u32,
    pub service_result: StatusCode,
}

impl ResponseHeader {
    pub fn new_good(request_header: &RequestHeader) -> ResponseHeader {
        ResponseHeader::new_service_result(request_header, StatusCode::Good)
    }

    pub fn new_service_result(
        request_header: &RequestHeader,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp: Utc::now(),
            request_handle: request_header.request_handle,
            service_result,
        }
    }
}
