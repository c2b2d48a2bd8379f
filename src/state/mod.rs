// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types.
//!
//! [`DeviceState`] is the snapshot read from the turntable by one poll.
//! [`Attribute`] names a setting that can be changed, and [`AttributeValue`]
//! carries a validated value for it. [`StatePublisher`] exposes the latest
//! snapshot and verification results to consumers.
//!
//! # Examples
//!
//! ```
//! use victrola_sync::state::{Attribute, AttributeValue, DeviceState};
//! use victrola_sync::types::{AudioLatency, AudioQuality, KnobBrightness};
//!
//! let state = DeviceState::new(
//!     AudioQuality::Cd,
//!     AudioLatency::new(120).unwrap(),
//!     KnobBrightness::new(80).unwrap(),
//! );
//!
//! assert_eq!(
//!     state.value_of(&Attribute::AudioQuality),
//!     Some(AttributeValue::AudioQuality(AudioQuality::Cd))
//! );
//! ```

mod attribute;
mod device_state;
mod publisher;

pub use attribute::{Attribute, AttributeValue};
pub use device_state::{ConnectionStatus, DeviceState};
pub use publisher::{PublishedState, StatePublisher};
