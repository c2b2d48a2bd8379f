// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wireless audio latency type.
//!
//! The device delays the wireless stream to keep grouped speakers in sync.
//! Callers pick milliseconds in the range 0-500; the device itself only
//! stores one of four presets (`min`, `med`, `high`, `max` = 0, 100, 250 and
//! 500 ms), so a value is sent as its nearest preset.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Wireless audio delay in milliseconds (0-500).
///
/// # Examples
///
/// ```
/// use victrola_sync::types::AudioLatency;
///
/// let latency = AudioLatency::new(120).unwrap();
/// assert_eq!(latency.millis(), 120);
///
/// assert!(AudioLatency::new(501).is_err());
/// assert!(AudioLatency::new(-1).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct AudioLatency(u16);

impl AudioLatency {
    /// No added delay.
    pub const MIN: Self = Self(0);

    /// Largest delay the device accepts.
    pub const MAX: Self = Self(500);

    /// Creates a latency value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `millis` is outside 0-500.
    pub fn new(millis: i64) -> Result<Self, ValueError> {
        if !(0..=i64::from(Self::MAX.0)).contains(&millis) {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: i64::from(Self::MAX.0),
                actual: millis,
            });
        }
        // Range checked above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = millis as u16;
        Ok(Self(millis))
    }

    /// Preset labels the device stores, with their delay in milliseconds.
    pub const PRESETS: [(&'static str, u16); 4] =
        [("min", 0), ("med", 100), ("high", 250), ("max", 500)];

    /// Maps a preset label (`min`, `med`, `high`, `max`).
    #[must_use]
    pub fn from_preset(label: &str) -> Option<Self> {
        Self::PRESETS
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, millis)| Self(*millis))
    }

    /// Returns the label of the nearest preset. Ties go to the shorter one.
    #[must_use]
    pub fn preset(&self) -> &'static str {
        self.nearest().0
    }

    /// Returns the delay the device actually applies for this value.
    #[must_use]
    pub fn snapped(&self) -> Self {
        Self(self.nearest().1)
    }

    /// Returns `true` if both values land on the same device preset.
    #[must_use]
    pub fn same_preset(&self, other: &Self) -> bool {
        self.preset() == other.preset()
    }

    fn nearest(&self) -> (&'static str, u16) {
        let mut best = Self::PRESETS[0];
        for preset in Self::PRESETS {
            if preset.1.abs_diff(self.0) < best.1.abs_diff(self.0) {
                best = preset;
            }
        }
        best
    }

    /// Returns the delay in milliseconds.
    #[must_use]
    pub const fn millis(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for AudioLatency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

impl TryFrom<i64> for AudioLatency {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AudioLatency> for i64 {
    fn from(value: AudioLatency) -> Self {
        i64::from(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(AudioLatency::new(0).unwrap(), AudioLatency::MIN);
        assert_eq!(AudioLatency::new(500).unwrap(), AudioLatency::MAX);
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert_eq!(
            AudioLatency::new(750),
            Err(ValueError::OutOfRange {
                min: 0,
                max: 500,
                actual: 750
            })
        );
        assert!(AudioLatency::new(-20).is_err());
    }

    #[test]
    fn presets() {
        assert_eq!(AudioLatency::from_preset("med").unwrap().millis(), 100);
        assert_eq!(AudioLatency::from_preset("max"), Some(AudioLatency::MAX));
        assert_eq!(AudioLatency::from_preset("slow"), None);
    }

    #[test]
    fn values_snap_to_nearest_preset() {
        let preset = |ms| AudioLatency::new(ms).unwrap().preset();
        assert_eq!(preset(0), "min");
        assert_eq!(preset(50), "min");
        assert_eq!(preset(51), "med");
        assert_eq!(preset(120), "med");
        assert_eq!(preset(175), "med");
        assert_eq!(preset(300), "high");
        assert_eq!(preset(376), "max");
        assert_eq!(AudioLatency::new(200).unwrap().snapped().millis(), 250);
    }

    #[test]
    fn same_preset_compares_device_granularity() {
        let requested = AudioLatency::new(120).unwrap();
        assert!(requested.same_preset(&AudioLatency::from_preset("med").unwrap()));
        assert!(!requested.same_preset(&AudioLatency::from_preset("high").unwrap()));
    }

    #[test]
    fn display() {
        assert_eq!(AudioLatency::new(120).unwrap().to_string(), "120 ms");
    }

    #[test]
    fn serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<AudioLatency>("501").is_err());
        let parsed: AudioLatency = serde_json::from_str("250").unwrap();
        assert_eq!(parsed.millis(), 250);
    }
}
