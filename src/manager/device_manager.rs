// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::event::{DeviceId, EventBus, SyncEvent};
use crate::protocol::HttpClient;

use super::{DeviceConfig, ManagerConfig};

/// Runs any number of turntables side by side.
///
/// Each device keeps its own engine, registry, publisher, event bus and sync
/// task; the manager only owns the set and announces additions and
/// removals on its own bus. Per-device events are read from
/// [`Device::subscribe`].
///
/// # Examples
///
/// ```no_run
/// use victrola_sync::manager::{DeviceConfig, DeviceManager};
///
/// # async fn example() -> victrola_sync::Result<()> {
/// let manager = DeviceManager::new();
/// let id = manager.add_device(DeviceConfig::new("192.168.1.50")).await?;
/// manager.start(id).await?;
///
/// let device = manager.device(id).await.ok_or(victrola_sync::Error::DeviceNotFound)?;
/// device.set_autoplay(true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceManager {
    devices: Arc<RwLock<HashMap<DeviceId, Arc<Device<HttpClient>>>>>,
    event_bus: EventBus,
}

impl DeviceManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to device additions and removals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_bus.subscribe()
    }

    // =========================================================================
    // Device Management
    // =========================================================================

    /// Builds a device from its configuration and adds it.
    ///
    /// The device is not started. Call [`start`](Self::start) or
    /// [`start_all`](Self::start_all).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid or pins an id
    /// that is already managed.
    pub async fn add_device(&self, config: DeviceConfig) -> Result<DeviceId> {
        let device = Device::from_config(&config)?;
        let device_id = device.id();

        let mut devices = self.devices.write().await;
        if devices.contains_key(&device_id) {
            return Err(Error::Config(format!("device id {device_id} is already managed")));
        }
        tracing::info!(device = %device.name(), id = %device_id, "Adding device");
        devices.insert(device_id, Arc::new(device));
        drop(devices);
        self.event_bus.publish(SyncEvent::DeviceAdded { device_id });

        Ok(device_id)
    }

    /// Adds every device of a configuration.
    ///
    /// The whole configuration is validated first, so an invalid entry adds
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any entry is invalid.
    pub async fn load(&self, config: ManagerConfig) -> Result<Vec<DeviceId>> {
        config.validate()?;
        let mut ids = Vec::with_capacity(config.devices.len());
        for device in config.devices {
            ids.push(self.add_device(device).await?);
        }
        Ok(ids)
    }

    /// Stops and removes a device.
    ///
    /// Returns `true` if the device was found.
    pub async fn remove_device(&self, device_id: DeviceId) -> bool {
        let removed = self.devices.write().await.remove(&device_id);

        match removed {
            Some(device) => {
                device.shutdown().await;
                tracing::info!(device = %device.name(), id = %device_id, "Removed device");
                self.event_bus.publish(SyncEvent::DeviceRemoved { device_id });
                true
            }
            None => false,
        }
    }

    /// Returns a device by id.
    pub async fn device(&self, device_id: DeviceId) -> Option<Arc<Device<HttpClient>>> {
        self.devices.read().await.get(&device_id).cloned()
    }

    /// Returns all device ids.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().await.keys().copied().collect()
    }

    /// Returns the number of managed devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts syncing one device.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the id is unknown.
    pub async fn start(&self, device_id: DeviceId) -> Result<()> {
        let device = self.device(device_id).await.ok_or(Error::DeviceNotFound)?;
        device.start().await;
        Ok(())
    }

    /// Starts syncing every device concurrently.
    pub async fn start_all(&self) {
        let devices = self.snapshot().await;
        let mut tasks = tokio::task::JoinSet::new();
        for device in devices {
            tasks.spawn(async move { device.start().await });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Device start task failed");
            }
        }
    }

    /// Stops every device's background task. Devices stay registered.
    pub async fn shutdown_all(&self) {
        for device in self.snapshot().await {
            device.shutdown().await;
        }
    }

    // Clone the set so no lock is held across device awaits.
    async fn snapshot(&self) -> Vec<Arc<Device<HttpClient>>> {
        self.devices.read().await.values().cloned().collect()
    }
}
