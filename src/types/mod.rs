// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for turntable control.
//!
//! Each type ensures values are within their valid ranges at construction
//! time, so an out-of-range value can never reach the device.
//!
//! # Types
//!
//! - [`SourceType`] - Roon, Sonos, UPnP or Bluetooth
//! - [`AudioQuality`] - Ordered streaming quality levels
//! - [`AudioLatency`] - Wireless delay in milliseconds (0-500)
//! - [`KnobBrightness`] - Knob ring brightness (0-100%)

mod brightness;
mod latency;
mod quality;
mod source;

pub use brightness::KnobBrightness;
pub use latency::AudioLatency;
pub use quality::AudioQuality;
pub use source::SourceType;
