// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronization event types.

use crate::state::{ConnectionStatus, DeviceState};
use crate::sync::{RebootOutcome, VerificationResult};
use crate::types::SourceType;

use super::DeviceId;

/// Events emitted while a device is kept in sync.
///
/// Verification outcomes arrive here asynchronously, after the request that
/// caused them has already been accepted.
///
/// # Examples
///
/// ```
/// use victrola_sync::event::{DeviceId, SyncEvent};
/// use victrola_sync::state::ConnectionStatus;
///
/// let device_id = DeviceId::new();
/// let event = SyncEvent::ConnectionChanged {
///     device_id,
///     status: ConnectionStatus::Disconnected,
///     error: Some("device unreachable: connection refused".to_string()),
/// };
/// assert!(event.is_connection());
/// ```
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A device was added to the manager.
    DeviceAdded {
        /// The ID of the added device.
        device_id: DeviceId,
    },

    /// A device was removed from the manager.
    DeviceRemoved {
        /// The ID of the removed device.
        device_id: DeviceId,
    },

    /// The device became reachable or unreachable.
    ConnectionChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The new connection status.
        status: ConnectionStatus,
        /// The poll error that caused a disconnection.
        error: Option<String>,
    },

    /// A poll captured a new snapshot.
    StateUpdated {
        /// The ID of the device.
        device_id: DeviceId,
        /// The new snapshot.
        state: DeviceState,
    },

    /// A requested change was verified, drifted, or could not be dispatched.
    Verification {
        /// The ID of the device.
        device_id: DeviceId,
        /// The outcome.
        result: VerificationResult,
    },

    /// A reboot finished or its grace window ran out.
    Reboot {
        /// The ID of the device.
        device_id: DeviceId,
        /// How the reboot ended.
        outcome: RebootOutcome,
    },

    /// A source's speaker list was refreshed.
    SpeakersRefreshed {
        /// The ID of the device.
        device_id: DeviceId,
        /// The refreshed source.
        source: SourceType,
        /// Number of speakers now listed.
        count: usize,
    },
}

impl SyncEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::DeviceAdded { device_id }
            | Self::DeviceRemoved { device_id }
            | Self::ConnectionChanged { device_id, .. }
            | Self::StateUpdated { device_id, .. }
            | Self::Verification { device_id, .. }
            | Self::Reboot { device_id, .. }
            | Self::SpeakersRefreshed { device_id, .. } => *device_id,
        }
    }

    /// Returns `true` if this is a device lifecycle event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Returns `true` if this is a verification event.
    #[must_use]
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification { .. })
    }
}
