// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Lock types used throughout the crate. Session state is shared between the caller's thread and
//! scheduler callbacks so everything goes through these aliases.

pub type Mutex<T> = parking_lot::Mutex<T>;
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
pub type RwLock<T> = parking_lot::RwLock<T>;
