// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};

use super::{Attribute, AttributeValue};

/// Whether the last poll reached the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// The last poll succeeded.
    Connected,
    /// The last poll failed, or no poll has completed yet.
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    /// Returns true if the device is connected.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Snapshot of the device settings captured by one successful poll.
///
/// A snapshot is never edited in place. The next poll result replaces it as
/// a whole; a failed poll keeps it and only flips the connection status.
///
/// # Examples
///
/// ```
/// use victrola_sync::state::DeviceState;
/// use victrola_sync::types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};
///
/// let state = DeviceState::new(
///     AudioQuality::Standard,
///     AudioLatency::new(100).unwrap(),
///     KnobBrightness::MAX,
/// )
/// .with_enabled_sources([SourceType::Sonos])
/// .with_speaker(SourceType::Sonos, "RINCON_000E58A0123401400");
///
/// assert_eq!(state.source(), Some(SourceType::Sonos));
/// assert_eq!(state.speaker(SourceType::Sonos), Some("RINCON_000E58A0123401400"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    enabled_sources: BTreeSet<SourceType>,
    speakers: BTreeMap<SourceType, String>,
    audio_quality: AudioQuality,
    audio_latency: AudioLatency,
    knob_brightness: KnobBrightness,
    autoplay: Option<bool>,
    connection: ConnectionStatus,
    captured_at: DateTime<Utc>,
}

impl DeviceState {
    /// Creates a connected snapshot with no source enabled and no speakers.
    #[must_use]
    pub fn new(
        audio_quality: AudioQuality,
        audio_latency: AudioLatency,
        knob_brightness: KnobBrightness,
    ) -> Self {
        Self {
            enabled_sources: BTreeSet::new(),
            speakers: BTreeMap::new(),
            audio_quality,
            audio_latency,
            knob_brightness,
            autoplay: None,
            connection: ConnectionStatus::Connected,
            captured_at: Utc::now(),
        }
    }

    /// Sets the enabled sources.
    #[must_use]
    pub fn with_enabled_sources(mut self, sources: impl IntoIterator<Item = SourceType>) -> Self {
        self.enabled_sources = sources.into_iter().collect();
        self
    }

    /// Sets the default output speaker for a source.
    #[must_use]
    pub fn with_speaker(mut self, source: SourceType, id: impl Into<String>) -> Self {
        self.speakers.insert(source, id.into());
        self
    }

    /// Sets the autoplay flag.
    #[must_use]
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = Some(autoplay);
        self
    }

    /// Returns a copy of this snapshot with another connection status.
    #[must_use]
    pub(crate) fn with_connection(&self, connection: ConnectionStatus) -> Self {
        Self {
            connection,
            ..self.clone()
        }
    }

    /// Returns the active source.
    ///
    /// This is the first enabled source in device order, or `None` if every
    /// source is disabled.
    #[must_use]
    pub fn source(&self) -> Option<SourceType> {
        self.enabled_sources.iter().next().copied()
    }

    /// Returns the set of enabled sources.
    #[must_use]
    pub fn enabled_sources(&self) -> &BTreeSet<SourceType> {
        &self.enabled_sources
    }

    /// Returns `true` if the source is enabled.
    #[must_use]
    pub fn is_source_enabled(&self, source: SourceType) -> bool {
        self.enabled_sources.contains(&source)
    }

    /// Returns the default output speaker id for a source, if one is set.
    #[must_use]
    pub fn speaker(&self, source: SourceType) -> Option<&str> {
        self.speakers.get(&source).map(String::as_str)
    }

    /// Returns the streaming quality.
    #[must_use]
    pub fn audio_quality(&self) -> AudioQuality {
        self.audio_quality
    }

    /// Returns the wireless latency.
    #[must_use]
    pub fn audio_latency(&self) -> AudioLatency {
        self.audio_latency
    }

    /// Returns the knob brightness.
    #[must_use]
    pub fn knob_brightness(&self) -> KnobBrightness {
        self.knob_brightness
    }

    /// Returns the autoplay flag, if the device reported one.
    #[must_use]
    pub fn autoplay(&self) -> Option<bool> {
        self.autoplay
    }

    /// Returns the connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection
    }

    /// Returns when this snapshot was captured.
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns the reported value of an attribute.
    ///
    /// Returns `None` when the device reports no value, for example a source
    /// without a default speaker.
    #[must_use]
    pub fn value_of(&self, attribute: &Attribute) -> Option<AttributeValue> {
        match attribute {
            Attribute::Source => self.source().map(AttributeValue::Source),
            Attribute::Speaker(source) => {
                self.speaker(*source).map(|id| AttributeValue::Speaker {
                    source: *source,
                    id: id.to_string(),
                })
            }
            Attribute::AudioQuality => Some(AttributeValue::AudioQuality(self.audio_quality)),
            Attribute::AudioLatency => Some(AttributeValue::AudioLatency(self.audio_latency)),
            Attribute::KnobBrightness => {
                Some(AttributeValue::KnobBrightness(self.knob_brightness))
            }
            Attribute::Autoplay => self.autoplay.map(AttributeValue::Autoplay),
        }
    }
}
