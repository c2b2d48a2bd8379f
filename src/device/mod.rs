// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One synchronized turntable.
//!
//! A [`Device`] owns everything needed to keep one turntable in sync: the
//! reconciliation engine, the speaker registry, the state publisher and one
//! background task. Nothing is shared between devices.
//!
//! The background task polls on the engine's cadence, refreshes speaker
//! lists on the ambient interval or when a backend signals a change, and
//! follows the channel's change notifications.
//!
//! ```no_run
//! use victrola_sync::Device;
//! use victrola_sync::types::SourceType;
//!
//! # async fn example() -> victrola_sync::Result<()> {
//! let device = Device::http("192.168.1.50").with_name("Pearl").build()?;
//! device.start().await;
//!
//! for speaker in device.list_speakers(SourceType::Sonos) {
//!     println!("{} ({})", speaker.display_name, speaker.id);
//! }
//!
//! device.set_audio_latency_ms(120).await?;
//! device.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod background;
#[cfg(feature = "http")]
mod http_builder;

#[cfg(feature = "http")]
pub use http_builder::HttpDeviceBuilder;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::event::{DeviceId, EventBus, SyncEvent};
use crate::manager::SyncPolicy;
use crate::protocol::CommandChannel;
use crate::registry::{SpeakerBackend, SpeakerEntry, SpeakerRegistry};
use crate::state::{Attribute, ConnectionStatus, DeviceState, StatePublisher};
use crate::sync::{ChangeRequest, ChangeState, ChangeTicket, ReconciliationEngine, VerificationResult};
use crate::types::{AudioQuality, SourceType};

struct SyncTask {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// A turntable kept in sync over a [`CommandChannel`].
///
/// # Type Parameter
///
/// `C` is the transport. [`HttpClient`](crate::protocol::HttpClient) is the
/// real one; tests can plug in any scripted channel.
///
/// Dropping a device stops its background task.
pub struct Device<C: CommandChannel> {
    id: DeviceId,
    name: String,
    engine: Arc<ReconciliationEngine<C>>,
    task: Mutex<Option<SyncTask>>,
}

impl<C: CommandChannel> Device<C> {
    /// Creates a device around a channel, with an empty speaker registry.
    #[must_use]
    pub fn new(channel: C, name: impl Into<String>, policy: SyncPolicy) -> Self {
        Self::with_id(DeviceId::new(), channel, name, policy)
    }

    /// Creates a device with a known id.
    #[must_use]
    pub fn with_id(id: DeviceId, channel: C, name: impl Into<String>, policy: SyncPolicy) -> Self {
        let registry = Arc::new(SpeakerRegistry::with_backend_timeout(policy.backend_timeout));
        let publisher = StatePublisher::new(id, EventBus::new());
        Self {
            id,
            name: name.into(),
            engine: Arc::new(ReconciliationEngine::new(
                Arc::new(channel),
                registry,
                publisher,
                policy,
            )),
            task: Mutex::new(None),
        }
    }

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the reconciliation engine.
    #[must_use]
    pub fn engine(&self) -> &ReconciliationEngine<C> {
        &self.engine
    }

    /// Returns the speaker registry.
    #[must_use]
    pub fn registry(&self) -> &SpeakerRegistry {
        self.engine.registry()
    }

    /// Returns the state publisher.
    #[must_use]
    pub fn publisher(&self) -> &StatePublisher {
        self.engine.publisher()
    }

    /// Subscribes to this device's events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.publisher().subscribe()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts background sync, then loads the speaker lists and polls once.
    ///
    /// The first poll does not wait for speaker backends; both run
    /// concurrently and this returns once both are done. Calling it again
    /// while the task runs only refreshes.
    pub async fn start(&self) {
        self.spawn_task();
        tokio::join!(self.refresh_all_speakers(), async {
            self.engine.poll_once().await;
        });
    }

    fn spawn_task(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let (shutdown, rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);
        // Subscribed here so changes made right after start are not missed
        let signals = engine.registry().change_signals();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = engine.run(rx) => {}
                () = background::watch_speakers(&engine, signals) => {}
                () = background::follow_changes(&engine) => {}
            }
        });
        *task = Some(SyncTask { handle, shutdown });

        tracing::info!(device = %self.name, id = %self.id, "Device sync started");
    }

    /// Returns `true` while the background task runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops the background task, waits for it to end and releases the
    /// channel's change subscription.
    pub async fn shutdown(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            // The loop may have ended already
            let _ = task.shutdown.send(());
            if let Err(e) = task.handle.await {
                tracing::warn!(device = %self.name, error = %e, "Sync task ended abnormally");
            }
            self.engine.channel().close_changes().await;
            tracing::info!(device = %self.name, "Device sync stopped");
        }
    }

    // ========================================================================
    // Speakers
    // ========================================================================

    /// Registers the speaker backend for a source.
    ///
    /// Takes effect on the next refresh of that source. A running device
    /// follows the backend's change signal only from its next start.
    pub fn register_backend(&self, source: SourceType, backend: Arc<dyn SpeakerBackend>) {
        self.registry().register_backend(source, backend);
    }

    /// Refreshes one source's speakers and announces the new count.
    pub async fn refresh_speakers(&self, source: SourceType) -> Vec<SpeakerEntry> {
        background::refresh_speakers(&self.engine, source).await
    }

    /// Refreshes every source's speakers concurrently.
    pub async fn refresh_all_speakers(&self) {
        tokio::join!(
            self.refresh_speakers(SourceType::Roon),
            self.refresh_speakers(SourceType::Sonos),
            self.refresh_speakers(SourceType::Upnp),
            self.refresh_speakers(SourceType::Bluetooth),
        );
    }

    /// Returns the cached speakers of a source.
    #[must_use]
    pub fn list_speakers(&self, source: SourceType) -> Vec<SpeakerEntry> {
        self.registry().list_speakers(source)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Returns the last snapshot.
    #[must_use]
    pub fn state(&self) -> Option<DeviceState> {
        self.publisher().device_state()
    }

    /// Returns the connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.publisher().connection_status()
    }

    /// Returns the most recent verification result of an attribute.
    #[must_use]
    pub fn verification(&self, attribute: &Attribute) -> Option<VerificationResult> {
        self.publisher().verification(attribute)
    }

    /// Returns the lifecycle state of an attribute.
    #[must_use]
    pub fn change_state(&self, attribute: &Attribute) -> ChangeState {
        self.engine.change_state(attribute)
    }

    // ========================================================================
    // Changes
    // ========================================================================

    /// Requests a change. See [`ReconciliationEngine::request_change`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` for a rejected value and
    /// `Error::CommandDispatch` if the device did not take the command.
    pub async fn request_change(&self, request: ChangeRequest) -> Result<ChangeTicket> {
        self.engine.request_change(request).await
    }

    /// Makes `source` the only enabled source.
    ///
    /// # Errors
    ///
    /// Returns `Error::CommandDispatch` if the device did not take the command.
    pub async fn set_source(&self, source: SourceType) -> Result<ChangeTicket> {
        self.request_change(ChangeRequest::Source(source)).await
    }

    /// Selects the default output speaker of a source.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the registry does not list the speaker.
    pub async fn set_speaker(
        &self,
        source: SourceType,
        id: impl Into<String>,
    ) -> Result<ChangeTicket> {
        self.request_change(ChangeRequest::Speaker {
            source,
            id: id.into(),
        })
        .await
    }

    /// Sets the streaming quality.
    ///
    /// # Errors
    ///
    /// Returns `Error::CommandDispatch` if the device did not take the command.
    pub async fn set_audio_quality(&self, quality: AudioQuality) -> Result<ChangeTicket> {
        self.request_change(ChangeRequest::AudioQuality(quality))
            .await
    }

    /// Sets the wireless latency in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if `millis` is outside 0-500.
    pub async fn set_audio_latency_ms(&self, millis: i64) -> Result<ChangeTicket> {
        self.request_change(ChangeRequest::AudioLatencyMs(millis))
            .await
    }

    /// Sets the knob brightness.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if `level` is outside 0-100.
    pub async fn set_knob_brightness(&self, level: i64) -> Result<ChangeTicket> {
        self.request_change(ChangeRequest::KnobBrightness(level))
            .await
    }

    /// Turns autoplay on or off.
    ///
    /// # Errors
    ///
    /// Returns `Error::CommandDispatch` if the device did not take the command.
    pub async fn set_autoplay(&self, on: bool) -> Result<ChangeTicket> {
        self.request_change(ChangeRequest::Autoplay(on)).await
    }

    /// Reboots the device. See [`ReconciliationEngine::reboot`].
    ///
    /// # Errors
    ///
    /// Returns `Error::CommandDispatch` if the command could not be sent.
    pub async fn reboot(&self) -> Result<()> {
        self.engine.reboot().await
    }

    /// Polls now.
    ///
    /// Returns `Ok(None)` if a poll was already in flight.
    ///
    /// # Errors
    ///
    /// Returns `Error::Poll` if the device could not be read.
    pub async fn refresh_state(&self) -> Result<Option<DeviceState>> {
        self.engine.refresh_state().await
    }
}

impl<C: CommandChannel> fmt::Debug for Device<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connection", &self.connection_status())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<C: CommandChannel> Drop for Device<C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}
