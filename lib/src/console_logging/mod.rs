// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

//! Colourised console logging for samples and tests, filtered through `RUST_OPCUA_LOG`.

use std::{
    fmt,
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use env_logger::{fmt::Color, Builder, Env};

/// The environment variable holding the log filter, e.g. `opcua_subscriptions=debug`. It's not
/// `RUST_LOG` because cargo and other tools read that too.
pub const LOG_ENV: &str = "RUST_OPCUA_LOG";

static INITIALISED: AtomicBool = AtomicBool::new(false);

struct Pad<T> {
    value: T,
    width: usize,
}

impl<T: fmt::Display> fmt::Display for Pad<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{: <width$}", self.value, width = self.width)
    }
}

fn level_color(level: log::Level) -> Color {
    match level {
        log::Level::Error => Color::Red,
        log::Level::Warn => Color::Yellow,
        log::Level::Info => Color::Cyan,
        log::Level::Debug => Color::Green,
        log::Level::Trace => Color::Ansi256(8),
    }
}

/// Installs the console logger with `info` as the filter when `RUST_OPCUA_LOG` is unset.
pub fn init() {
    init_with_default_filter("info");
}

/// Installs the console logger, falling back to `default_filter` when `RUST_OPCUA_LOG` is unset.
/// Only the first call does anything, and it does nothing if another logger is already
/// installed.
pub fn init_with_default_filter(default_filter: &str) {
    if INITIALISED.swap(true, Ordering::Relaxed) {
        return;
    }
    let mut builder = Builder::from_env(Env::new().filter_or(LOG_ENV, default_filter));
    builder.format(|f, record| {
        let time_fmt = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");

        let mut style = f.style();
        style.set_color(level_color(record.level()));
        if record.level() == log::Level::Error {
            style.set_bold(true);
        }
        let level = style.value(Pad {
            value: record.level(),
            width: 5,
        });

        let mut style = f.style();
        let target = style.set_bold(true).value(Pad {
            value: record.target(),
            width: 48,
        });

        writeln!(f, "{} {} {} {}", time_fmt, level, target, record.args())
    });
    if builder.try_init().is_ok() {
        info!(
            "Logging is enabled, use the {} environment variable to control filtering",
            LOG_ENV
        );
    }
}
