// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for sync progress.
//!
//! Snapshots, connection changes, verification outcomes and speaker list
//! refreshes are broadcast as [`SyncEvent`]s over an [`EventBus`], backed by
//! tokio's broadcast channel.
//!
//! # Examples
//!
//! ```
//! use victrola_sync::event::{DeviceId, EventBus, SyncEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! let device_id = DeviceId::new();
//! bus.publish(SyncEvent::DeviceAdded { device_id });
//! ```

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::SyncEvent;
pub use device_id::DeviceId;
pub use event_bus::EventBus;
