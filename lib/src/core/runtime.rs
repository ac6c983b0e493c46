// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use std::{collections::BTreeSet, sync::Arc};

use crate::sync::*;

/// Tracks which background tasks (publishing timers, samplers) are currently alive. It exists
/// for diagnostics, e.g. to confirm that closing a session stopped all of its timers.
pub struct Runtime {
    running_components: Arc<Mutex<BTreeSet<String>>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            running_components: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }
}

impl Runtime {
    pub fn components(&self) -> Vec<String> {
        let running_components = trace_lock!(self.running_components);
        running_components.iter().cloned().collect()
    }

    pub fn is_running(&self, key: &str) -> bool {
        trace_lock!(self.running_components).contains(key)
    }

    pub fn register_component(&self, key: &str) {
        trace!("registering component {}", key);
        let mut running_components = trace_lock!(self.running_components);
        if !running_components.insert(key.to_string()) {
            trace!("Shouldn't be registering component {} more than once", key);
        }
    }

    pub fn deregister_component(&self, key: &str) {
        trace!("deregistering component {}", key);
        let mut running_components = trace_lock!(self.running_components);
        if !running_components.remove(key) {
            trace!(
                "Shouldn't be deregistering component {} which doesn't exist",
                key
            );
        }
    }
}
