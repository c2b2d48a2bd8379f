// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Audio source types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A streaming source the turntable can send audio to.
///
/// Each source has its own list of speakers and its own default output.
///
/// # Examples
///
/// ```
/// use victrola_sync::types::SourceType;
///
/// let source: SourceType = "upnp".parse().unwrap();
/// assert_eq!(source, SourceType::Upnp);
/// assert_eq!(source.to_string(), "UPnP");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Roon Ready output.
    Roon,
    /// Sonos speakers and groups.
    Sonos,
    /// UPnP/DLNA renderers.
    Upnp,
    /// Paired Bluetooth speakers.
    Bluetooth,
}

impl SourceType {
    /// All sources, in the order the device lists them.
    pub const ALL: [Self; 4] = [Self::Roon, Self::Sonos, Self::Upnp, Self::Bluetooth];

    /// Returns the human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Roon => "Roon",
            Self::Sonos => "Sonos",
            Self::Upnp => "UPnP",
            Self::Bluetooth => "Bluetooth",
        }
    }

    /// Returns the lowercase key used in configuration and attribute names.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Roon => "roon",
            Self::Sonos => "sonos",
            Self::Upnp => "upnp",
            Self::Bluetooth => "bluetooth",
        }
    }

    /// Returns the settings path holding this source's enabled flag.
    #[must_use]
    pub const fn enabled_path(self) -> &'static str {
        match self {
            Self::Roon => "settings:/victrola/roonEnabled",
            Self::Sonos => "settings:/victrola/sonosEnabled",
            Self::Upnp => "settings:/victrola/upnpEnabled",
            Self::Bluetooth => "settings:/victrola/bluetoothEnabled",
        }
    }

    /// Returns the output type sent with a default output selection.
    #[must_use]
    pub const fn output_type(self) -> &'static str {
        match self {
            Self::Roon => "victrolaOutputRoon",
            Self::Sonos => "victrolaOutputSonos",
            Self::Upnp => "victrolaOutputUpnp",
            Self::Bluetooth => "victrolaOutputBluetooth",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roon" => Ok(Self::Roon),
            "sonos" => Ok(Self::Sonos),
            "upnp" | "dlna" => Ok(Self::Upnp),
            "bluetooth" => Ok(Self::Bluetooth),
            _ => Err(ValueError::InvalidLabel(s.to_string())),
        }
    }
}
