// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2022 Adam Lock

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::result::Result;

/// A trait that handles the loading / saving and validity of configuration information. Files
/// are in YAML.
pub trait Config: serde::Serialize {
    fn save(&self, path: &Path) -> Result<(), ()> {
        if !self.is_valid() {
            error!("Config isn't valid and won't be saved");
            return Err(());
        }
        let s = serde_yaml::to_string(&self).map_err(|err| {
            error!("Cannot serialize configuration, error reason: {}", err);
        })?;
        let mut f = File::create(path).map_err(|err| {
            error!(
                "Cannot create the path {} to save the config, error = {}",
                path.to_string_lossy(),
                err
            );
        })?;
        f.write_all(s.as_bytes()).map_err(|err| {
            error!("Could not save config - error = {:?}", err);
        })
    }

    fn load<A>(path: &Path) -> Result<A, ()>
    where
        for<'de> A: Config + serde::Deserialize<'de>,
    {
        if let Ok(mut f) = File::open(path) {
            let mut s = String::new();
            if f.read_to_string(&mut s).is_ok() {
                serde_yaml::from_str(&s).map_err(|err| {
                    error!(
                        "Cannot deserialize configuration from {}, error reason: {}",
                        path.to_string_lossy(),
                        err
                    );
                })
            } else {
                error!(
                    "Cannot read configuration file {} to string",
                    path.to_string_lossy()
                );
                Err(())
            }
        } else {
            error!("Cannot open configuration file {}", path.to_string_lossy());
            Err(())
        }
    }

    fn is_valid(&self) -> bool;
}
