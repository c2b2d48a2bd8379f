// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Speaker backends.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::BackendError;

/// A speaker as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpeaker {
    /// Opaque speaker id.
    pub id: String,
    /// Name to show to users.
    #[serde(alias = "name")]
    pub display_name: String,
}

impl BackendSpeaker {
    /// Creates a speaker.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Something that can list the speakers currently available for one source.
///
/// The registry holds one backend per source and never looks inside it, so
/// Roon, Sonos, UPnP and Bluetooth integrations plug in the same way.
///
/// A running [`Device`](crate::Device) refreshes every source on its ambient
/// poll interval. Backends that know when their list changes can also hand
/// out a [`watch`] receiver from [`changes`](Self::changes); each change
/// triggers a refresh of that source right away.
///
/// # Examples
///
/// ```
/// use victrola_sync::error::BackendError;
/// use victrola_sync::registry::{BackendSpeaker, SpeakerBackend};
///
/// #[derive(Debug)]
/// struct RoonCore;
///
/// #[async_trait::async_trait]
/// impl SpeakerBackend for RoonCore {
///     async fn list_current_speakers(&self) -> Result<Vec<BackendSpeaker>, BackendError> {
///         Ok(vec![BackendSpeaker::new("1601bb4a", "Living Room")])
///     }
/// }
/// ```
#[async_trait]
pub trait SpeakerBackend: Send + Sync + std::fmt::Debug {
    /// Lists the speakers available right now.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the backend cannot be reached or fails.
    async fn list_current_speakers(&self) -> Result<Vec<BackendSpeaker>, BackendError>;

    /// Returns a receiver marked changed whenever the list may have changed.
    ///
    /// The default is `None`: the backend is only refreshed on schedule.
    fn changes(&self) -> Option<watch::Receiver<()>> {
        None
    }
}

/// A backend serving a list held in memory, typically from configuration.
///
/// [`replace`](Self::replace) swaps the list and signals the change.
#[derive(Debug)]
pub struct StaticSpeakerBackend {
    speakers: RwLock<Vec<BackendSpeaker>>,
    changed: watch::Sender<()>,
}

impl StaticSpeakerBackend {
    /// Creates a backend serving the given speakers.
    #[must_use]
    pub fn new(speakers: impl IntoIterator<Item = BackendSpeaker>) -> Self {
        Self {
            speakers: RwLock::new(speakers.into_iter().collect()),
            changed: watch::Sender::new(()),
        }
    }

    /// Replaces the served list and notifies watchers.
    pub fn replace(&self, speakers: impl IntoIterator<Item = BackendSpeaker>) {
        *self.speakers.write() = speakers.into_iter().collect();
        self.changed.send_replace(());
    }
}

impl Default for StaticSpeakerBackend {
    fn default() -> Self {
        Self::new([])
    }
}

#[async_trait]
impl SpeakerBackend for StaticSpeakerBackend {
    async fn list_current_speakers(&self) -> Result<Vec<BackendSpeaker>, BackendError> {
        Ok(self.speakers.read().clone())
    }

    fn changes(&self) -> Option<watch::Receiver<()>> {
        Some(self.changed.subscribe())
    }
}

/// Lists the Sonos speakers the turntable itself offers for quick-play.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct QuickplaySpeakerBackend {
    client: crate::protocol::HttpClient,
}

#[cfg(feature = "http")]
impl QuickplaySpeakerBackend {
    /// Creates a backend reading from the device behind `client`.
    #[must_use]
    pub fn new(client: crate::protocol::HttpClient) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl SpeakerBackend for QuickplaySpeakerBackend {
    async fn list_current_speakers(&self) -> Result<Vec<BackendSpeaker>, BackendError> {
        use crate::error::CommandError;

        let rows = self
            .client
            .fetch_quickplay_speakers()
            .await
            .map_err(|e| match e {
                CommandError::Rejected(_) => BackendError::Failed(e.to_string()),
                CommandError::Unreachable(_) | CommandError::Timeout(_) => {
                    BackendError::Unavailable(e.to_string())
                }
            })?;

        Ok(rows
            .into_iter()
            .map(|row| BackendSpeaker::new(row.id, row.title))
            .collect())
    }
}
