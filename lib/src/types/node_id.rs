// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Contains the implementation of `NodeId`.

use std::{fmt, str::FromStr};

use regex::Regex;

use crate::types::status_code::StatusCode;

/// The kind of identifier, numeric or string
#[derive(Eq, PartialEq, Clone, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", *v),
            Identifier::String(v) => write!(f, "s={}", v),
        }
    }
}

impl FromStr for Identifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = match (s.get(..2), s.get(2..)) {
            (Some(k), Some(v)) => (k, v),
            _ => return Err(()),
        };
        match k {
            "i=" => v.parse::<u32>().map(Identifier::Numeric).map_err(|_| ()),
            "s=" if !v.is_empty() => Ok(Identifier::String(v.to_string())),
            _ => Err(()),
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl<'a> From<&'a str> for Identifier {
    fn from(v: &'a str) -> Self {
        Identifier::String(v.to_string())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::String(v)
    }
}

/// An identifier for a node in the address space of an OPC UA Server.
#[derive(PartialEq, Eq, Clone, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// The index for a namespace
    pub namespace: u16,
    /// The identifier for the node in the address space
    pub identifier: Identifier,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = StatusCode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Parses a node id in the form
        //
        // ns=<namespaceindex>;<type>=<value>
        //
        // Where type is i (numeric) or s (string). If namespace == 0, the ns=0; may be omitted

        lazy_static! {
            // Contains capture groups "ns" and "t" for namespace and type respectively
            static ref RE: Option<Regex> = Regex::new(r"^(ns=(?P<ns>[0-9]+);)?(?P<t>[is]=.+)$").ok();
        }

        let captures = RE
            .as_ref()
            .and_then(|re| re.captures(s))
            .ok_or(StatusCode::BadNodeIdInvalid)?;

        let namespace = if let Some(ns) = captures.name("ns") {
            ns.as_str()
                .parse::<u16>()
                .map_err(|_| StatusCode::BadNodeIdInvalid)?
        } else {
            0
        };

        let t = captures.name("t").ok_or(StatusCode::BadNodeIdInvalid)?;
        Identifier::from_str(t.as_str())
            .map(|t| NodeId::new(namespace, t))
            .map_err(|_| StatusCode::BadNodeIdInvalid)
    }
}

impl NodeId {
    pub fn new<T>(namespace: u16, value: T) -> NodeId
    where
        T: Into<Identifier>,
    {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    /// The null node id, `i=0`
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }
}
