// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controllable attributes and their typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};

/// A device setting that can be changed and verified independently.
///
/// The default output speaker is tracked per source, so selecting a Sonos
/// speaker and a Roon output are two different attributes.
///
/// # Examples
///
/// ```
/// use victrola_sync::state::Attribute;
/// use victrola_sync::types::SourceType;
///
/// let attr: Attribute = "audioLatencyMs".parse().unwrap();
/// assert_eq!(attr, Attribute::AudioLatency);
///
/// let speaker = Attribute::Speaker(SourceType::Sonos);
/// assert_eq!(speaker.to_string(), "speaker.sonos");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// The active audio source.
    Source,
    /// The default output speaker of a source.
    Speaker(SourceType),
    /// Streaming quality.
    AudioQuality,
    /// Wireless latency in milliseconds.
    AudioLatency,
    /// Knob ring brightness.
    KnobBrightness,
    /// Start streaming automatically when the record plays.
    Autoplay,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Speaker(source) => write!(f, "speaker.{}", source.key()),
            Self::AudioQuality => f.write_str("audio_quality"),
            Self::AudioLatency => f.write_str("audio_latency_ms"),
            Self::KnobBrightness => f.write_str("knob_brightness"),
            Self::Autoplay => f.write_str("autoplay"),
        }
    }
}

impl FromStr for Attribute {
    type Err = ValueError;

    /// Accepts the snake case names produced by `Display` as well as the
    /// camel case names used by entity bindings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(source) = s
            .strip_prefix("speaker.")
            .or_else(|| s.strip_prefix("speakerId."))
        {
            return source.parse().map(Self::Speaker);
        }

        match s {
            "source" => Ok(Self::Source),
            "audio_quality" | "audioQuality" => Ok(Self::AudioQuality),
            "audio_latency_ms" | "audioLatencyMs" => Ok(Self::AudioLatency),
            "knob_brightness" | "knobBrightness" => Ok(Self::KnobBrightness),
            "autoplay" => Ok(Self::Autoplay),
            _ => Err(ValueError::InvalidLabel(s.to_string())),
        }
    }
}

/// A validated value for an [`Attribute`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Active source.
    Source(SourceType),
    /// Default output speaker for a source.
    Speaker {
        /// The source the speaker belongs to.
        source: SourceType,
        /// Opaque speaker id as reported by the backend.
        id: String,
    },
    /// Streaming quality.
    AudioQuality(AudioQuality),
    /// Wireless latency.
    AudioLatency(AudioLatency),
    /// Knob ring brightness.
    KnobBrightness(KnobBrightness),
    /// Autoplay flag.
    Autoplay(bool),
}

impl AttributeValue {
    /// Returns the attribute this value belongs to.
    #[must_use]
    pub fn attribute(&self) -> Attribute {
        match self {
            Self::Source(_) => Attribute::Source,
            Self::Speaker { source, .. } => Attribute::Speaker(*source),
            Self::AudioQuality(_) => Attribute::AudioQuality,
            Self::AudioLatency(_) => Attribute::AudioLatency,
            Self::KnobBrightness(_) => Attribute::KnobBrightness,
            Self::Autoplay(_) => Attribute::Autoplay,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(source) => write!(f, "{source}"),
            Self::Speaker { id, .. } => f.write_str(id),
            Self::AudioQuality(quality) => write!(f, "{quality}"),
            Self::AudioLatency(latency) => write!(f, "{latency}"),
            Self::KnobBrightness(level) => write!(f, "{level}"),
            Self::Autoplay(on) => write!(f, "{}", if *on { "on" } else { "off" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let attributes = [
            Attribute::Source,
            Attribute::Speaker(SourceType::Upnp),
            Attribute::AudioQuality,
            Attribute::AudioLatency,
            Attribute::KnobBrightness,
            Attribute::Autoplay,
        ];
        for attr in attributes {
            assert_eq!(attr.to_string().parse::<Attribute>().unwrap(), attr);
        }
    }

    #[test]
    fn parse_camel_case_names() {
        assert_eq!(
            "knobBrightness".parse::<Attribute>().unwrap(),
            Attribute::KnobBrightness
        );
        assert_eq!(
            "speakerId.bluetooth".parse::<Attribute>().unwrap(),
            Attribute::Speaker(SourceType::Bluetooth)
        );
        assert!("volume".parse::<Attribute>().is_err());
    }

    #[test]
    fn value_knows_its_attribute() {
        let value = AttributeValue::Speaker {
            source: SourceType::Roon,
            id: "roon-kitchen".to_string(),
        };
        assert_eq!(value.attribute(), Attribute::Speaker(SourceType::Roon));
        assert_eq!(
            AttributeValue::AudioLatency(AudioLatency::new(120).unwrap()).attribute(),
            Attribute::AudioLatency
        );
    }

    #[test]
    fn value_serializes_tagged() {
        let value = AttributeValue::KnobBrightness(KnobBrightness::new(40).unwrap());
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"attribute": "knob_brightness", "value": 40})
        );
    }
}
