// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Knob illumination brightness.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Brightness of the volume knob ring as a percentage (0-100).
///
/// 0 turns the ring off.
///
/// # Examples
///
/// ```
/// use victrola_sync::types::KnobBrightness;
///
/// let level = KnobBrightness::new(40).unwrap();
/// assert_eq!(level.value(), 40);
/// assert!(KnobBrightness::new(101).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct KnobBrightness(u8);

impl KnobBrightness {
    /// Ring off.
    pub const MIN: Self = Self(0);

    /// Full brightness.
    pub const MAX: Self = Self(100);

    /// Creates a brightness value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `value` is outside 0-100.
    pub fn new(value: i64) -> Result<Self, ValueError> {
        if !(0..=100).contains(&value) {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: value,
            });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = value as u8;
        Ok(Self(value))
    }

    /// Returns the brightness percentage.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns `true` if the ring is lit.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for KnobBrightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<i64> for KnobBrightness {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KnobBrightness> for i64 {
    fn from(value: KnobBrightness) -> Self {
        i64::from(value.0)
    }
}
