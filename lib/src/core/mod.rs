// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Functionality shared by the subscription engine that isn't specific to it, i.e. id generation,
//! configuration persistence and tracking of running background tasks.

lazy_static! {
    pub static ref RUNTIME: crate::core::runtime::Runtime =
        crate::core::runtime::Runtime::default();
}

/// Returns a vector of all currently running background jobs as a vector of strings.
#[macro_export]
macro_rules! runtime_components {
    () => {{
        use $crate::core::RUNTIME;
        RUNTIME.components()
    }};
}

/// Registers a running component (e.g. a timer task) when it starts. Call the corresponding
/// deregister macro when it finishes so leaked tasks can be spotted.
#[macro_export]
macro_rules! register_runtime_component {
    ( $component_name:expr ) => {
        $crate::core::RUNTIME.register_component($component_name);
    };
}

/// See `register_runtime_component`
#[macro_export]
macro_rules! deregister_runtime_component {
    ( $component_name:expr ) => {
        $crate::core::RUNTIME.deregister_component($component_name);
    };
}

pub mod config;
pub mod handle;
pub mod runtime;

pub mod prelude {
    pub use super::{config::Config, handle::Handle};
}
