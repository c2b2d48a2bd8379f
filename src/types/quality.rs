// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming audio quality levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Streaming quality, ordered from most robust to highest fidelity.
///
/// # Examples
///
/// ```
/// use victrola_sync::types::AudioQuality;
///
/// assert!(AudioQuality::Standard < AudioQuality::Lossless);
/// assert_eq!(AudioQuality::Lossless.api_value(), "losslessQuality");
/// assert_eq!(
///     AudioQuality::from_api_value("soundQuality"),
///     Some(AudioQuality::Standard)
/// );
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    /// Lowest bitrate, favours a stable connection.
    PrioritizeConnection,
    /// Default compressed stream.
    Standard,
    /// CD quality (16 bit / 44.1 kHz).
    Cd,
    /// Lossless FLAC.
    Lossless,
}

impl AudioQuality {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [
        Self::PrioritizeConnection,
        Self::Standard,
        Self::Cd,
        Self::Lossless,
    ];

    /// Returns the value the device uses for this level.
    #[must_use]
    pub const fn api_value(self) -> &'static str {
        match self {
            Self::PrioritizeConnection => "connectionQuality",
            Self::Standard => "soundQuality",
            Self::Cd => "cdQuality",
            Self::Lossless => "losslessQuality",
        }
    }

    /// Parses a device value.
    #[must_use]
    pub fn from_api_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.api_value() == value)
    }

    /// Returns the human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PrioritizeConnection => "Prioritize Connection",
            Self::Standard => "Standard",
            Self::Cd => "CD Quality",
            Self::Lossless => "Prioritize Audio (FLAC)",
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AudioQuality {
    type Err = ValueError;

    /// Accepts either the label or the device value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.label().eq_ignore_ascii_case(s) || q.api_value() == s)
            .ok_or_else(|| ValueError::InvalidLabel(s.to_string()))
    }
}
