// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-source speaker cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::types::SourceType;

use super::{BackendSpeaker, SpeakerBackend};

/// A selectable speaker. Identity is `(source, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeakerEntry {
    /// Source the speaker belongs to.
    pub source: SourceType,
    /// Opaque speaker id.
    pub id: String,
    /// Name to show to users.
    pub display_name: String,
}

/// State of the backend behind one source after the last refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendStatus {
    /// No backend is registered for the source.
    NotConfigured,
    /// The backend answered with this many distinct speakers.
    Available {
        /// Number of speakers listed.
        count: usize,
    },
    /// The backend failed or timed out; the source lists no speakers.
    Unavailable {
        /// Why the backend failed.
        reason: String,
    },
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("not configured"),
            Self::Available { count } => write!(f, "{count} speakers"),
            Self::Unavailable { reason } => write!(f, "unavailable: {reason}"),
        }
    }
}

#[derive(Debug)]
struct Listing {
    speakers: Vec<SpeakerEntry>,
    status: BackendStatus,
}

/// Merged view of the speakers each source's backend reports.
///
/// A refresh replaces the cached list of one source wholesale. A missing,
/// failing or slow backend leaves that source empty and never touches the
/// other sources.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use victrola_sync::registry::{BackendSpeaker, SpeakerRegistry, StaticSpeakerBackend};
/// use victrola_sync::types::SourceType;
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = SpeakerRegistry::new();
/// registry.register_backend(
///     SourceType::Upnp,
///     Arc::new(StaticSpeakerBackend::new([
///         BackendSpeaker::new("uuid:b", "Office"),
///         BackendSpeaker::new("uuid:a", "Bedroom"),
///     ])),
/// );
///
/// let speakers = registry.refresh(SourceType::Upnp).await;
/// assert_eq!(speakers[0].display_name, "Bedroom");
/// assert!(registry.refresh(SourceType::Roon).await.is_empty());
/// # }
/// ```
#[derive(Debug)]
pub struct SpeakerRegistry {
    backends: RwLock<HashMap<SourceType, Arc<dyn SpeakerBackend>>>,
    listings: RwLock<HashMap<SourceType, Listing>>,
    backend_timeout: Duration,
}

impl SpeakerRegistry {
    /// Default upper bound on a single backend call.
    pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates an empty registry with the default backend timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend_timeout(Self::DEFAULT_BACKEND_TIMEOUT)
    }

    /// Creates an empty registry bounding each backend call by `timeout`.
    #[must_use]
    pub fn with_backend_timeout(timeout: Duration) -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
            backend_timeout: timeout,
        }
    }

    /// Registers the backend for a source, replacing any previous one.
    ///
    /// The cached list is kept until the next [`refresh`](Self::refresh).
    pub fn register_backend(&self, source: SourceType, backend: Arc<dyn SpeakerBackend>) {
        self.backends.write().insert(source, backend);
    }

    /// Removes the backend for a source. Returns `true` if one was registered.
    pub fn remove_backend(&self, source: SourceType) -> bool {
        self.backends.write().remove(&source).is_some()
    }

    /// Returns the change receivers of the backends that provide one.
    #[must_use]
    pub fn change_signals(&self) -> Vec<(SourceType, watch::Receiver<()>)> {
        self.backends
            .read()
            .iter()
            .filter_map(|(source, backend)| Some((*source, backend.changes()?)))
            .collect()
    }

    /// Returns `true` if a backend is registered for the source.
    #[must_use]
    pub fn has_backend(&self, source: SourceType) -> bool {
        self.backends.read().contains_key(&source)
    }

    /// Pulls the current list from the source's backend and caches it.
    ///
    /// Entries are deduplicated by id (the last one reported wins) and
    /// ordered by display name, case-insensitively, then by id. Never fails:
    /// an absent or failing backend yields an empty list.
    pub async fn refresh(&self, source: SourceType) -> Vec<SpeakerEntry> {
        let backend = self.backends.read().get(&source).cloned();

        let (speakers, status) = match backend {
            None => (Vec::new(), BackendStatus::NotConfigured),
            Some(backend) => {
                match tokio::time::timeout(self.backend_timeout, backend.list_current_speakers())
                    .await
                {
                    Ok(Ok(reported)) => {
                        let speakers = merge(source, reported);
                        let count = speakers.len();
                        (speakers, BackendStatus::Available { count })
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(source = %source, error = %e, "Speaker backend failed");
                        (
                            Vec::new(),
                            BackendStatus::Unavailable {
                                reason: e.to_string(),
                            },
                        )
                    }
                    Err(_) => {
                        let reason = format!(
                            "no answer within {} ms",
                            self.backend_timeout.as_millis()
                        );
                        tracing::warn!(source = %source, %reason, "Speaker backend timed out");
                        (Vec::new(), BackendStatus::Unavailable { reason })
                    }
                }
            }
        };

        tracing::debug!(source = %source, status = %status, "Refreshed speakers");

        self.listings.write().insert(
            source,
            Listing {
                speakers: speakers.clone(),
                status,
            },
        );
        speakers
    }

    /// Refreshes every source concurrently.
    pub async fn refresh_all(&self) {
        tokio::join!(
            self.refresh(SourceType::Roon),
            self.refresh(SourceType::Sonos),
            self.refresh(SourceType::Upnp),
            self.refresh(SourceType::Bluetooth),
        );
    }

    /// Returns the cached speakers of a source in display order.
    #[must_use]
    pub fn list_speakers(&self, source: SourceType) -> Vec<SpeakerEntry> {
        self.listings
            .read()
            .get(&source)
            .map(|listing| listing.speakers.clone())
            .unwrap_or_default()
    }

    /// Returns `true` if the source's cached list contains the id.
    #[must_use]
    pub fn contains(&self, source: SourceType, id: &str) -> bool {
        self.listings
            .read()
            .get(&source)
            .is_some_and(|listing| listing.speakers.iter().any(|s| s.id == id))
    }

    /// Finds a cached speaker by id across all sources.
    ///
    /// Sources are searched in device order.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<SpeakerEntry> {
        let listings = self.listings.read();
        SourceType::ALL.into_iter().find_map(|source| {
            listings
                .get(&source)?
                .speakers
                .iter()
                .find(|s| s.id == id)
                .cloned()
        })
    }

    /// Returns the display name of a cached speaker.
    #[must_use]
    pub fn display_name(&self, source: SourceType, id: &str) -> Option<String> {
        self.listings
            .read()
            .get(&source)?
            .speakers
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.display_name.clone())
    }

    /// Returns the backend status recorded by the last refresh.
    ///
    /// A source never refreshed reports `NotConfigured`.
    #[must_use]
    pub fn backend_status(&self, source: SourceType) -> BackendStatus {
        self.listings
            .read()
            .get(&source)
            .map_or(BackendStatus::NotConfigured, |listing| listing.status.clone())
    }
}

impl Default for SpeakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn merge(source: SourceType, reported: Vec<BackendSpeaker>) -> Vec<SpeakerEntry> {
    let mut by_id: HashMap<String, String> = HashMap::with_capacity(reported.len());
    for speaker in reported {
        by_id.insert(speaker.id, speaker.display_name);
    }

    let mut speakers: Vec<SpeakerEntry> = by_id
        .into_iter()
        .map(|(id, display_name)| SpeakerEntry {
            source,
            id,
            display_name,
        })
        .collect();
    speakers.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    speakers
}
