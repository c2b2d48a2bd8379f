// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change requests and their lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::registry::SpeakerRegistry;
use crate::state::{Attribute, AttributeValue};
use crate::types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};

/// An unvalidated request to change one attribute.
///
/// Numeric values are carried as given and range-checked when the request
/// is submitted, so out-of-range values never reach the device.
///
/// # Examples
///
/// ```
/// use victrola_sync::state::Attribute;
/// use victrola_sync::sync::ChangeRequest;
///
/// let request = ChangeRequest::parse(Attribute::AudioLatency, "120").unwrap();
/// assert_eq!(request, ChangeRequest::AudioLatencyMs(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum ChangeRequest {
    /// Make this the only enabled source.
    Source(SourceType),
    /// Select the default output speaker of a source.
    Speaker {
        /// Source the speaker belongs to.
        source: SourceType,
        /// Speaker id as listed by the registry.
        id: String,
    },
    /// Set the streaming quality.
    AudioQuality(AudioQuality),
    /// Set the wireless latency in milliseconds.
    AudioLatencyMs(i64),
    /// Set the knob brightness.
    KnobBrightness(i64),
    /// Turn autoplay on or off.
    Autoplay(bool),
}

impl ChangeRequest {
    /// Parses a raw value for an attribute, as entity bindings send it.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidLabel` if the value cannot be read for the
    /// attribute. Ranges are not checked here.
    pub fn parse(attribute: Attribute, raw: &str) -> Result<Self, ValueError> {
        let raw = raw.trim();
        let invalid = || ValueError::InvalidLabel(raw.to_string());
        Ok(match attribute {
            Attribute::Source => Self::Source(raw.parse()?),
            Attribute::Speaker(source) => Self::Speaker {
                source,
                id: raw.to_string(),
            },
            Attribute::AudioQuality => Self::AudioQuality(raw.parse()?),
            Attribute::AudioLatency => Self::AudioLatencyMs(raw.parse().map_err(|_| invalid())?),
            Attribute::KnobBrightness => {
                Self::KnobBrightness(raw.parse().map_err(|_| invalid())?)
            }
            Attribute::Autoplay => Self::Autoplay(match raw.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                _ => return Err(invalid()),
            }),
        })
    }

    /// Returns the attribute this request changes.
    #[must_use]
    pub fn attribute(&self) -> Attribute {
        match self {
            Self::Source(_) => Attribute::Source,
            Self::Speaker { source, .. } => Attribute::Speaker(*source),
            Self::AudioQuality(_) => Attribute::AudioQuality,
            Self::AudioLatencyMs(_) => Attribute::AudioLatency,
            Self::KnobBrightness(_) => Attribute::KnobBrightness,
            Self::Autoplay(_) => Attribute::Autoplay,
        }
    }

    /// Checks ranges and speaker membership.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` for latency or brightness outside
    /// their ranges and `ValueError::UnknownSpeaker` for a speaker id the
    /// registry does not list for that source.
    pub fn validate(self, registry: &SpeakerRegistry) -> Result<AttributeValue, ValueError> {
        Ok(match self {
            Self::Source(source) => AttributeValue::Source(source),
            Self::Speaker { source, id } => {
                if !registry.contains(source, &id) {
                    return Err(ValueError::UnknownSpeaker {
                        source_type: source,
                        id,
                    });
                }
                AttributeValue::Speaker { source, id }
            }
            Self::AudioQuality(quality) => AttributeValue::AudioQuality(quality),
            Self::AudioLatencyMs(ms) => AttributeValue::AudioLatency(AudioLatency::new(ms)?),
            Self::KnobBrightness(level) => {
                AttributeValue::KnobBrightness(KnobBrightness::new(level)?)
            }
            Self::Autoplay(on) => AttributeValue::Autoplay(on),
        })
    }
}

/// Where an attribute is in its change lifecycle.
///
/// `Verified` and `Failed` are resting states: they hold until the next
/// request for the same attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeState {
    /// Never requested.
    #[default]
    Idle,
    /// Command sent, not yet acknowledged.
    Pending,
    /// Acknowledged, waiting for a poll to report the value.
    Verifying,
    /// A poll reported the desired value.
    Verified,
    /// Drifted or could not be dispatched.
    Failed,
}

impl ChangeState {
    /// Returns `true` while the change is in flight.
    #[must_use]
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Verifying)
    }

    /// Returns `true` for `Verified` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Verifying => "verifying",
            Self::Verified => "verified",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The engine's record of the latest change requested for an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredChange {
    pub(crate) id: u64,
    pub(crate) value: AttributeValue,
    pub(crate) submitted_at: DateTime<Utc>,
    pub(crate) attempts: u32,
    pub(crate) state: ChangeState,
    /// Polls numbered up to this one started before the acknowledgement.
    pub(crate) acked_after_fetch: u64,
}

impl DesiredChange {
    pub(crate) fn new(id: u64, value: AttributeValue) -> Self {
        Self {
            id,
            value,
            submitted_at: Utc::now(),
            attempts: 0,
            state: ChangeState::Pending,
            acked_after_fetch: 0,
        }
    }

    /// Returns the generation id. A later request gets a larger id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the attribute being changed.
    #[must_use]
    pub fn attribute(&self) -> Attribute {
        self.value.attribute()
    }

    /// Returns the target value.
    #[must_use]
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Returns when the change was requested.
    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Returns the number of polls compared so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChangeState {
        self.state
    }
}

impl From<&DesiredChange> for ChangeTicket {
    fn from(change: &DesiredChange) -> Self {
        Self {
            id: change.id,
            attribute: change.attribute(),
            desired: change.value.clone(),
            submitted_at: change.submitted_at,
        }
    }
}

/// Receipt for an accepted change.
///
/// Acceptance means the device acknowledged the command. Whether the value
/// took effect is published later as a
/// [`VerificationResult`](super::VerificationResult).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTicket {
    /// Generation id of the change.
    pub id: u64,
    /// Attribute being changed.
    pub attribute: Attribute,
    /// Requested value.
    pub desired: AttributeValue,
    /// When the change was requested.
    pub submitted_at: DateTime<Utc>,
}
