// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! The `StatusCode` type. Only the codes produced by the subscription services are named here.

use std::{error::Error, fmt, fmt::Formatter};

use bitflags::bitflags;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

bitflags! {
    /// Bits for status code
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusCodeBits: u32 {
        // Mask for the status code section
        const STATUS_MASK = 0xffff_0000;
        // Mask for the bits section
        const BIT_MASK = 0x0000_ffff;
        // Severity bits 30:31
        const IS_ERROR = 0x8000_0000;
        const IS_UNCERTAIN = 0x4000_0000;
        // Overflow bit 7
        const OVERFLOW = 0b0000_0000_1000_0000;
        // Info type bits 10:11
        const INFO_TYPE_DATA_VALUE = 0b0000_0100_0000_0000;
    }
}

/// A 32-bit OPC UA status code. The high 16 bits identify the code, the low 16 bits carry info
/// bits such as overflow.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusCode(u32);

macro_rules! status_codes {
    ( $( $name:ident = $value:literal ),* $(,)? ) => {
        #[allow(non_upper_case_globals)]
        impl StatusCode {
            $( pub const $name: StatusCode = StatusCode($value); )*

            /// Returns the name of the code, ignoring info bits.
            pub fn name(&self) -> &'static str {
                match self.status().0 {
                    $( $value => stringify!($name), )*
                    _ => "Unrecognized",
                }
            }
        }
    };
}

status_codes! {
    Good = 0x0000_0000,
    BadUnexpectedError = 0x8001_0000,
    BadOutOfMemory = 0x8003_0000,
    BadTimeout = 0x800A_0000,
    BadNothingToDo = 0x800F_0000,
    BadTooManyOperations = 0x8010_0000,
    BadSubscriptionIdInvalid = 0x8028_0000,
    BadWaitingForInitialData = 0x8032_0000,
    BadNodeIdInvalid = 0x8033_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadAttributeIdInvalid = 0x8035_0000,
    BadMonitoringModeInvalid = 0x8041_0000,
    BadMonitoredItemIdInvalid = 0x8042_0000,
    BadTooManySubscriptions = 0x8077_0000,
    BadTooManyPublishRequests = 0x8078_0000,
    BadNoSubscription = 0x8079_0000,
    BadSequenceNumberUnknown = 0x807A_0000,
    BadMessageNotAvailable = 0x807B_0000,
    BadSequenceNumberInvalid = 0x8088_0000,
    BadTooManyMonitoredItems = 0x80DB_0000,
}

impl StatusCode {
    pub fn from_u32(value: u32) -> StatusCode {
        StatusCode(value)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the bit flags of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> StatusCodeBits {
        StatusCodeBits::from_bits_truncate(self.0 & StatusCodeBits::BIT_MASK.bits())
    }

    /// Returns the status only, i.e. it masks out any bit flags that come with the status code
    pub fn status(&self) -> StatusCode {
        StatusCode(self.0 & StatusCodeBits::STATUS_MASK.bits())
    }

    /// Marks the value as having overflowed a monitored item queue. The info type bits are set
    /// too so the overflow bit is read as data value info.
    pub fn set_overflow(self) -> StatusCode {
        StatusCode(
            self.0
                | StatusCodeBits::INFO_TYPE_DATA_VALUE.bits()
                | StatusCodeBits::OVERFLOW.bits(),
        )
    }

    pub fn is_overflow(&self) -> bool {
        self.bitflags().contains(StatusCodeBits::OVERFLOW)
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.0 & StatusCodeBits::IS_ERROR.bits() != 0
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.0 & StatusCodeBits::IS_UNCERTAIN.bits() != 0
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Good
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        // Displays the StatusCode as it's name, or its name+bitflags
        let bits = self.bitflags();
        if bits.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:?}", self.name(), bits)
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self, self.0)
    }
}

impl Error for StatusCode {}

// Serialize / Deserialize are implemented by hand so the code is written as a plain number

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

struct StatusCodeVisitor;

impl<'de> Visitor<'de> for StatusCodeVisitor {
    type Value = u32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u32::try_from(value).map_err(|_| E::custom(format!("status code {} out of range", value)))
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StatusCode(deserializer.deserialize_u32(StatusCodeVisitor)?))
    }
}

#[test]
fn status_code() {
    assert!(StatusCode::Good.is_good());
    assert!(!StatusCode::Good.is_bad());
    assert!(!StatusCode::Good.is_uncertain());

    assert!(StatusCode::BadTimeout.is_bad());
    assert!(!StatusCode::BadTimeout.is_good());
    assert!(StatusCode::from_u32(0x4000_0000).is_uncertain());

    assert_eq!(StatusCode::BadNoSubscription.name(), "BadNoSubscription");
    assert_eq!(format!("{}", StatusCode::BadNothingToDo), "BadNothingToDo");
}

#[test]
fn status_code_overflow() {
    let s = StatusCode::Good.set_overflow();
    assert!(s.is_overflow());
    assert!(s.is_good());
    assert_eq!(s.status(), StatusCode::Good);
    assert_eq!(s.bits(), 0x0480);
    assert!(!StatusCode::Good.is_overflow());
    assert_eq!(s.name(), "Good");
}

#[test]
fn status_code_serialize() {
    let s = serde_json::to_string(&StatusCode::BadSequenceNumberInvalid).unwrap();
    assert_eq!(s, format!("{}", 0x8088_0000u32));
    let s: StatusCode = serde_json::from_str(&s).unwrap();
    assert_eq!(s, StatusCode::BadSequenceNumberInvalid);
}
