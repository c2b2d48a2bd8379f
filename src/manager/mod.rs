// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration and multi-device management.
//!
//! [`DeviceConfig`] and [`SyncPolicy`] describe one turntable and how it is
//! polled. [`ManagerConfig`] is the JSON file listing every turntable, and
//! [`DeviceManager`] runs them.
//!
//! # Examples
//!
//! ## Loading a configuration file
//!
//! ```no_run
//! use victrola_sync::manager::{DeviceManager, ManagerConfig};
//!
//! # async fn example() -> victrola_sync::Result<()> {
//! let config = ManagerConfig::load("victrola.json")?;
//!
//! let manager = DeviceManager::new();
//! manager.load(config).await?;
//! manager.start_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Watching a device
//!
//! ```no_run
//! use victrola_sync::event::SyncEvent;
//! use victrola_sync::manager::{DeviceConfig, DeviceManager};
//!
//! # async fn example() -> victrola_sync::Result<()> {
//! let manager = DeviceManager::new();
//! let id = manager.add_device(DeviceConfig::new("192.168.1.50")).await?;
//! let device = manager.device(id).await.ok_or(victrola_sync::Error::DeviceNotFound)?;
//!
//! let mut events = device.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let SyncEvent::Verification { result, .. } = event {
//!             println!("{}: {}", result.attribute, result.outcome);
//!         }
//!     }
//! });
//! manager.start(id).await?;
//! # Ok(())
//! # }
//! ```

mod device_config;
#[cfg(feature = "http")]
mod device_manager;
mod manager_config;

pub use device_config::{DeviceConfig, SyncPolicy};
#[cfg(feature = "http")]
pub use device_manager::DeviceManager;
pub use manager_config::ManagerConfig;
