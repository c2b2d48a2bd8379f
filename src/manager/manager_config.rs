// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for a set of devices.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::DeviceConfig;

/// The devices a [`DeviceManager`](super::DeviceManager) should run.
///
/// # Examples
///
/// ```
/// use victrola_sync::manager::ManagerConfig;
///
/// let config = ManagerConfig::from_json_str(r#"{
///     "devices": [
///         { "host": "192.168.1.50", "name": "Living room" },
///         { "host": "192.168.1.51", "sync": { "max_verification_attempts": 5 } }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(config.devices.len(), 2);
/// assert_eq!(config.devices[1].sync.max_verification_attempts, 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// One entry per turntable.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl ManagerConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the JSON is malformed or any device entry
    /// is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "Loading configuration");
        Self::from_json_str(&raw)
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validates every device entry and checks pinned ids are unique.
    ///
    /// # Errors
    ///
    /// Returns the first entry's `Error::Config`, or `Error::Config` for a
    /// pinned id used twice.
    pub fn validate(&self) -> Result<()> {
        self.devices.iter().try_for_each(DeviceConfig::validate)?;
        let mut pinned = HashSet::new();
        for id in self.devices.iter().filter_map(|device| device.id) {
            if !pinned.insert(id) {
                return Err(Error::Config(format!("device id {id} is used twice")));
            }
        }
        Ok(())
    }
}
