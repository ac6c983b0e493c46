// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Where monitored items get their values from.

use hashbrown::HashMap;

use crate::{
    sync::RwLock,
    types::{AttributeId, DataValue, NodeId, StatusCode},
};

/// Reads the current value of a node attribute. A read must be quick since it is called while
/// the session's subscriptions are locked.
pub trait ValueSource: Send + Sync {
    fn read(&self, node_id: &NodeId, attribute_id: AttributeId) -> Result<DataValue, StatusCode>;
}

impl<F> ValueSource for F
where
    F: Fn(&NodeId, AttributeId) -> Result<DataValue, StatusCode> + Send + Sync,
{
    fn read(&self, node_id: &NodeId, attribute_id: AttributeId) -> Result<DataValue, StatusCode> {
        self(node_id, attribute_id)
    }
}

/// A value source backed by a map, written to by whatever simulates or owns the values.
#[derive(Default)]
pub struct MemoryValueSource {
    values: RwLock<HashMap<(NodeId, AttributeId), DataValue>>,
}

impl MemoryValueSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of a node attribute, creating it if necessary
    pub fn set_value(&self, node_id: &NodeId, attribute_id: AttributeId, value: DataValue) {
        let mut values = trace_write_lock!(self.values);
        values.insert((node_id.clone(), attribute_id), value);
    }

    /// Removes a node attribute so subsequent reads fail with `BadNodeIdUnknown`
    pub fn remove_value(&self, node_id: &NodeId, attribute_id: AttributeId) -> Option<DataValue> {
        let mut values = trace_write_lock!(self.values);
        values.remove(&(node_id.clone(), attribute_id))
    }

    pub fn contains(&self, node_id: &NodeId, attribute_id: AttributeId) -> bool {
        let values = trace_read_lock!(self.values);
        values.contains_key(&(node_id.clone(), attribute_id))
    }
}

impl ValueSource for MemoryValueSource {
    fn read(&self, node_id: &NodeId, attribute_id: AttributeId) -> Result<DataValue, StatusCode> {
        let values = trace_read_lock!(self.values);
        values
            .get(&(node_id.clone(), attribute_id))
            .cloned()
            .ok_or(StatusCode::BadNodeIdUnknown)
    }
}
