// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

/// Issues an incrementing sequence of numbers, e.g. subscription ids, monitored item ids and
/// notification sequence numbers. When the sequence reaches `u32::MAX` it wraps back to the
/// first value rather than to zero, so a handle created with `Handle::new(1)` never issues 0.
#[derive(Debug, Clone, Serialize)]
pub struct Handle {
    next: u32,
    first: u32,
}

impl Handle {
    /// Creates a new handle factory, that starts with the supplied number
    pub fn new(first: u32) -> Handle {
        Handle { next: first, first }
    }

    /// Returns the next handle to be issued, internally incrementing each time so the handle
    /// is always different until it wraps back to the start.
    pub fn next(&mut self) -> u32 {
        let next = self.next;
        if self.next == u32::MAX {
            self.next = self.first;
        } else {
            self.next += 1;
        }
        next
    }

    /// The value that the next call to `next()` will return.
    pub fn peek(&self) -> u32 {
        self.next
    }

    pub fn set_next(&mut self, next: u32) {
        debug_assert!(next >= self.first);
        self.next = next;
    }

    /// Resets the handle to its initial state
    pub fn reset(&mut self) {
        self.set_next(self.first);
    }
}

#[test]
fn handle_increment() {
    let mut h = Handle::new(1);
    assert_eq!(h.next(), 1);
    assert_eq!(h.next(), 2);
    assert_eq!(h.peek(), 3);
    assert_eq!(h.next(), 3);
    h.reset();
    assert_eq!(h.next(), 1);
}

#[test]
fn handle_wrap() {
    // Wrapping skips back to first, never zero
    let mut h = Handle::new(1);
    h.set_next(u32::MAX - 1);
    assert_eq!(h.next(), u32::MAX - 1);
    assert_eq!(h.next(), u32::MAX);
    assert_eq!(h.next(), 1);
}
