// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response parsing for the turntable's `getRows` answers.
//!
//! A poll reads the `settings:/victrola` rows into a
//! [`DeviceState`](crate::state::DeviceState). The quick-play rows list the
//! Sonos speakers the device itself can see.

mod quickplay;
mod settings;

pub use quickplay::{QUICKPLAY_PATH, QuickplayRow, QuickplayRowsResponse};
pub use settings::{SETTINGS_LAST_ROW, SETTINGS_PATH, SettingsRowsResponse};
