// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Contains the implementation of `Variant`.

use std::fmt;

use crate::types::status_code::StatusCode;

/// A `Variant` holds the value of an attribute. Only the scalar types that a monitored value
/// source is likely to hand back are supported.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub enum Variant {
    /// Empty type has no value. It is equivalent to a Null value (part 6 5.1.6)
    Empty,
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    Double(f64),
    String(String),
    StatusCode(StatusCode),
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Empty
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "(empty)"),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => write!(f, "{}", v),
            Variant::StatusCode(v) => write!(f, "{}", v),
        }
    }
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }
}

macro_rules! from_primitive {
    ( $t:ty, $v:ident ) => {
        impl From<$t> for Variant {
            fn from(v: $t) -> Self {
                Variant::$v(v)
            }
        }
    };
}

from_primitive!(bool, Boolean);
from_primitive!(i32, Int32);
from_primitive!(u32, UInt32);
from_primitive!(i64, Int64);
from_primitive!(f64, Double);
from_primitive!(String, String);
from_primitive!(StatusCode, StatusCode);

impl<'a> From<&'a str> for Variant {
    fn from(v: &'a str) -> Self {
        Variant::String(v.to_string())
    }
}
