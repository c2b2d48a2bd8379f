// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only projection of a device's synchronized state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::error::CommandError;
use crate::event::{DeviceId, EventBus, SyncEvent};
use crate::sync::{RebootOutcome, VerificationResult};
use crate::types::SourceType;

use super::{Attribute, ConnectionStatus, DeviceState};

/// Everything consumers can see about one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishedState {
    /// The last successful poll, flipped to `Disconnected` if a later poll
    /// failed. `None` until the first poll succeeds.
    pub device_state: Option<DeviceState>,
    /// Whether the last poll reached the device.
    pub connection: ConnectionStatus,
    /// The most recent verification result per attribute.
    pub verifications: BTreeMap<Attribute, VerificationResult>,
    /// The error of the last failed poll while disconnected.
    pub last_error: Option<String>,
}

/// Publishes snapshots, connection changes and verification results.
///
/// Clones share the same state. Consumers can only read: the mutating
/// methods are crate-private and driven by the reconciliation engine.
///
/// # Examples
///
/// ```
/// use victrola_sync::event::{DeviceId, EventBus};
/// use victrola_sync::state::{ConnectionStatus, StatePublisher};
///
/// let publisher = StatePublisher::new(DeviceId::new(), EventBus::new());
///
/// assert!(publisher.device_state().is_none());
/// assert_eq!(publisher.connection_status(), ConnectionStatus::Disconnected);
/// ```
#[derive(Debug, Clone)]
pub struct StatePublisher {
    device_id: DeviceId,
    state: Arc<watch::Sender<PublishedState>>,
    events: EventBus,
}

impl StatePublisher {
    /// Creates a publisher for a device with nothing published yet.
    #[must_use]
    pub fn new(device_id: DeviceId, events: EventBus) -> Self {
        let (state, _) = watch::channel(PublishedState::default());
        Self {
            device_id,
            state: Arc::new(state),
            events,
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Returns the device this publisher belongs to.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Returns a copy of everything published.
    #[must_use]
    pub fn snapshot(&self) -> PublishedState {
        self.state.borrow().clone()
    }

    /// Returns the last snapshot.
    #[must_use]
    pub fn device_state(&self) -> Option<DeviceState> {
        self.state.borrow().device_state.clone()
    }

    /// Returns the connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.borrow().connection
    }

    /// Returns the most recent verification result for an attribute.
    #[must_use]
    pub fn verification(&self, attribute: &Attribute) -> Option<VerificationResult> {
        self.state.borrow().verifications.get(attribute).cloned()
    }

    /// Returns the most recent verification result of every attribute.
    #[must_use]
    pub fn verifications(&self) -> BTreeMap<Attribute, VerificationResult> {
        self.state.borrow().verifications.clone()
    }

    /// Returns a receiver that sees every update of the published state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<PublishedState> {
        self.state.subscribe()
    }

    /// Subscribes to this device's events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    pub(crate) fn publish_state(&self, device_state: DeviceState) {
        let mut reconnected = false;
        self.state.send_modify(|published| {
            reconnected = !published.connection.is_connected();
            published.device_state = Some(device_state.clone());
            published.connection = ConnectionStatus::Connected;
            published.last_error = None;
        });

        if reconnected {
            tracing::info!(device = %self.device_id, "Device connected");
            self.events.publish(SyncEvent::ConnectionChanged {
                device_id: self.device_id,
                status: ConnectionStatus::Connected,
                error: None,
            });
        }
        self.events.publish(SyncEvent::StateUpdated {
            device_id: self.device_id,
            state: device_state,
        });
    }

    /// Keeps the last snapshot but marks it disconnected.
    pub(crate) fn mark_disconnected(&self, error: &CommandError) {
        let mut lost = false;
        self.state.send_modify(|published| {
            lost = published.connection.is_connected();
            published.device_state = published
                .device_state
                .as_ref()
                .map(|state| state.with_connection(ConnectionStatus::Disconnected));
            published.connection = ConnectionStatus::Disconnected;
            published.last_error = Some(error.to_string());
        });

        if lost {
            tracing::warn!(device = %self.device_id, error = %error, "Device disconnected");
            self.events.publish(SyncEvent::ConnectionChanged {
                device_id: self.device_id,
                status: ConnectionStatus::Disconnected,
                error: Some(error.to_string()),
            });
        }
    }

    pub(crate) fn publish_verification(&self, result: VerificationResult) {
        self.state.send_modify(|published| {
            published
                .verifications
                .insert(result.attribute, result.clone());
        });
        self.events.publish(SyncEvent::Verification {
            device_id: self.device_id,
            result,
        });
    }

    pub(crate) fn publish_reboot(&self, outcome: RebootOutcome) {
        self.events.publish(SyncEvent::Reboot {
            device_id: self.device_id,
            outcome,
        });
    }

    pub(crate) fn publish_speakers(&self, source: SourceType, count: usize) {
        self.events.publish(SyncEvent::SpeakersRefreshed {
            device_id: self.device_id,
            source,
            count,
        });
    }
}
