// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turntable ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Identifies one configured turntable for as long as it is managed.
///
/// Ids are random unless the device's configuration pins one, which keeps
/// event consumers stable across restarts. They serialize as the plain
/// hyphenated UUID; parsing also accepts the braced and simple forms.
///
/// # Examples
///
/// ```
/// use victrola_sync::event::DeviceId;
///
/// let id: DeviceId = "{6f1c2a4e-0b7d-4c39-9a55-3e2f8d1b7c60}".parse().unwrap();
/// assert_eq!(id.to_string(), "6f1c2a4e-0b7d-4c39-9a55-3e2f8d1b7c60");
/// assert_eq!(id.short(), "6f1c2a4e");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Creates a random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First block of the UUID. Enough to tell devices apart in logs.
    #[must_use]
    pub fn short(&self) -> String {
        let mut buf = Uuid::encode_buffer();
        self.0.simple().encode_lower(&mut buf)[..8].to_string()
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s.trim())
            .map(Self)
            .map_err(|e| Error::Config(format!("invalid device id '{s}': {e}")))
    }
}

impl From<Uuid> for DeviceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceId").field(&self.short()).finish()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}
