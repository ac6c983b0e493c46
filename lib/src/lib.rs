// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Subscription and notification delivery for an OPC UA server.
//!
//! A session owns a set of [`server::subscriptions::Subscription`]s, each holding monitored
//! items that sample node attributes from a [`server::value_source::ValueSource`] on their own
//! interval. Publishing intervals and sampling intervals are driven by a
//! [`server::scheduler::JobScheduler`], and clients collect notifications by queueing Publish
//! requests that are answered when data, a keep-alive or a status change is ready.

#![allow(clippy::float_cmp)]
#![allow(clippy::result_unit_err)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[cfg(test)]
extern crate tempdir;
#[macro_use]
extern crate serde_derive;
#[cfg(test)]
extern crate serde_json;

/// Tracing macro for obtaining a lock on a `Mutex`. Sometimes deadlocks can happen in code,
/// and if they do, this macro is useful for finding out where they happened.
#[macro_export]
macro_rules! trace_lock {
    ( $x:expr ) => {
        {
//            use std::thread;
//            trace!("Thread {:?}, {} locking at {}, line {}", thread::current().id(), stringify!($x), file!(), line!());
            let v = $x.lock();
//            trace!("Thread {:?}, {} lock completed", thread::current().id(), stringify!($x));
            v
        }
    }
}

/// Tracing macro for obtaining a read lock on a `RwLock`.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {
        {
            let v = $x.read();
            v
        }
    }
}

/// Tracing macro for obtaining a write lock on a `RwLock`.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {
        {
            let v = $x.write();
            v
        }
    }
}

#[cfg(feature = "console-logging")]
pub mod console_logging;
pub mod core;
pub mod server;
pub mod sync;
pub mod types;

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::server::prelude::*;
    pub use crate::types::*;
}
