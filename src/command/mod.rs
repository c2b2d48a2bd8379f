// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands sent to the turntable.
//!
//! Every write to the device is a `setData` request carrying a settings path,
//! a role and a typed value. A [`DeviceCommand`] expands into the
//! [`SetDataRequest`]s that carry it.
//!
//! | Command | Path | Value |
//! |---------|------|-------|
//! | source | `settings:/victrola/<source>Enabled` | `bool_` |
//! | speaker | `victrola:ui/setDefaultOutput` | `{type, id}` |
//! | quality | `settings:/victrola/forceLowBitrate` | `forceLowBitrate` |
//! | latency | `settings:/victrola/wirelessAudioDelay` | `adchlsLatency` preset |
//! | brightness | `settings:/victrola/lightBrightness` | `i32_` |
//! | autoplay | `settings:/victrola/autoplay` | `bool_` |
//! | reboot | `powermanager:goReboot` | `bool_` |
//!
//! # Examples
//!
//! ```
//! use victrola_sync::command::DeviceCommand;
//! use victrola_sync::state::AttributeValue;
//! use victrola_sync::types::KnobBrightness;
//!
//! let cmd = DeviceCommand::Apply(AttributeValue::KnobBrightness(KnobBrightness::new(40).unwrap()));
//! let requests = cmd.requests();
//!
//! assert_eq!(requests.len(), 1);
//! assert_eq!(requests[0].path, "settings:/victrola/lightBrightness");
//! assert_eq!(requests[0].value, serde_json::json!({"type": "i32_", "i32_": 40}));
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::state::AttributeValue;
use crate::types::SourceType;

/// Settings path for the streaming quality.
pub const PATH_AUDIO_QUALITY: &str = "settings:/victrola/forceLowBitrate";
/// Settings path for the wireless latency.
pub const PATH_AUDIO_LATENCY: &str = "settings:/victrola/wirelessAudioDelay";
/// Settings path for the knob brightness.
pub const PATH_KNOB_BRIGHTNESS: &str = "settings:/victrola/lightBrightness";
/// Settings path for autoplay.
pub const PATH_AUTOPLAY: &str = "settings:/victrola/autoplay";
/// Action path selecting a default output speaker.
pub const PATH_SET_DEFAULT_OUTPUT: &str = "victrola:ui/setDefaultOutput";
/// Action path rebooting the device.
pub const PATH_REBOOT: &str = "powermanager:goReboot";
/// Rows listing the default outputs and which one is selected.
pub const PATH_SPEAKER_SELECTION: &str = "victrola:ui/speakerSelection";

/// Returns `true` if a device change at `path` can move a reconciled
/// attribute, so a fresh snapshot is worth reading.
///
/// ```
/// use victrola_sync::command::affects_reconciled_state;
///
/// assert!(affects_reconciled_state("settings:/victrola/lightBrightness"));
/// assert!(affects_reconciled_state("victrola:ui/speakerSelection"));
/// assert!(!affects_reconciled_state("player:volume"));
/// ```
#[must_use]
pub fn affects_reconciled_state(path: &str) -> bool {
    path.starts_with("settings:/victrola/") || path == PATH_SPEAKER_SELECTION
}

/// How the device should treat a `setData` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Store the value at the path.
    Value,
    /// Trigger the action at the path.
    Activate,
}

/// One `setData` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetDataRequest {
    /// Settings or action path.
    pub path: &'static str,
    /// How the value is applied.
    pub role: Role,
    /// Typed value.
    pub value: Value,
    /// Client platform tag the device expects.
    pub platform: &'static str,
}

impl SetDataRequest {
    fn new(path: &'static str, role: Role, value: Value) -> Self {
        Self {
            path,
            role,
            value,
            platform: "other",
        }
    }

    fn bool_value(path: &'static str, value: bool) -> Self {
        Self::new(path, Role::Value, json!({"type": "bool_", "bool_": value}))
    }

    fn i32_value(path: &'static str, value: i64) -> Self {
        Self::new(path, Role::Value, json!({"type": "i32_", "i32_": value}))
    }
}

/// An imperative request to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Apply a validated attribute value.
    Apply(AttributeValue),
    /// Reboot the device.
    Reboot,
}

impl DeviceCommand {
    /// Returns the `setData` requests carrying this command, in send order.
    ///
    /// Selecting a source disables every other source before enabling the
    /// target, so the target is the only enabled source afterwards. Every
    /// other command is a single request.
    #[must_use]
    pub fn requests(&self) -> Vec<SetDataRequest> {
        let value = match self {
            Self::Reboot => {
                return vec![SetDataRequest::new(
                    PATH_REBOOT,
                    Role::Activate,
                    json!({"type": "bool_", "bool_": true}),
                )];
            }
            Self::Apply(value) => value,
        };

        match value {
            AttributeValue::Source(target) => SourceType::ALL
                .into_iter()
                .filter(|source| source != target)
                .map(|source| SetDataRequest::bool_value(source.enabled_path(), false))
                .chain(std::iter::once(SetDataRequest::bool_value(
                    target.enabled_path(),
                    true,
                )))
                .collect(),
            AttributeValue::Speaker { source, id } => vec![SetDataRequest::new(
                PATH_SET_DEFAULT_OUTPUT,
                Role::Activate,
                json!({"type": source.output_type(), "id": id}),
            )],
            AttributeValue::AudioQuality(quality) => vec![SetDataRequest::new(
                PATH_AUDIO_QUALITY,
                Role::Value,
                json!({"forceLowBitrate": quality.api_value(), "type": "forceLowBitrate"}),
            )],
            AttributeValue::AudioLatency(latency) => vec![SetDataRequest::new(
                PATH_AUDIO_LATENCY,
                Role::Value,
                json!({"adchlsLatency": latency.preset(), "type": "adchlsLatency"}),
            )],
            AttributeValue::KnobBrightness(level) => vec![SetDataRequest::i32_value(
                PATH_KNOB_BRIGHTNESS,
                i64::from(level.value()),
            )],
            AttributeValue::Autoplay(on) => vec![SetDataRequest::bool_value(PATH_AUTOPLAY, *on)],
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply(value) => write!(f, "set {} = {value}", value.attribute()),
            Self::Reboot => f.write_str("reboot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioLatency, AudioQuality};

    #[test]
    fn source_disables_others_then_enables_target() {
        let cmd = DeviceCommand::Apply(AttributeValue::Source(SourceType::Upnp));
        let requests = cmd.requests();

        let paths: Vec<_> = requests.iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "settings:/victrola/roonEnabled",
                "settings:/victrola/sonosEnabled",
                "settings:/victrola/bluetoothEnabled",
                "settings:/victrola/upnpEnabled",
            ]
        );
        assert_eq!(requests[0].value, json!({"type": "bool_", "bool_": false}));
        assert_eq!(requests[3].value, json!({"type": "bool_", "bool_": true}));
    }

    #[test]
    fn speaker_uses_source_output_type() {
        let cmd = DeviceCommand::Apply(AttributeValue::Speaker {
            source: SourceType::Sonos,
            id: "RINCON_1234".to_string(),
        });
        let requests = cmd.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, PATH_SET_DEFAULT_OUTPUT);
        assert_eq!(requests[0].role, Role::Activate);
        assert_eq!(
            requests[0].value,
            json!({"type": "victrolaOutputSonos", "id": "RINCON_1234"})
        );
    }

    #[test]
    fn quality_and_latency_payloads() {
        let quality = DeviceCommand::Apply(AttributeValue::AudioQuality(AudioQuality::Lossless));
        assert_eq!(
            quality.requests()[0].value,
            json!({"forceLowBitrate": "losslessQuality", "type": "forceLowBitrate"})
        );

        let latency =
            DeviceCommand::Apply(AttributeValue::AudioLatency(AudioLatency::new(120).unwrap()));
        assert_eq!(latency.requests()[0].path, PATH_AUDIO_LATENCY);
        assert_eq!(
            latency.requests()[0].value,
            json!({"adchlsLatency": "med", "type": "adchlsLatency"})
        );
    }

    #[test]
    fn reboot_is_an_activation() {
        let requests = DeviceCommand::Reboot.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, PATH_REBOOT);
        assert_eq!(requests[0].role, Role::Activate);
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(&DeviceCommand::Apply(AttributeValue::Autoplay(false)).requests()[0])
            .unwrap();
        assert_eq!(
            body,
            json!({
                "path": "settings:/victrola/autoplay",
                "role": "value",
                "value": {"type": "bool_", "bool_": false},
                "platform": "other"
            })
        );
    }

    #[test]
    fn display() {
        assert_eq!(DeviceCommand::Reboot.to_string(), "reboot");
        assert_eq!(
            DeviceCommand::Apply(AttributeValue::Autoplay(true)).to_string(),
            "set autoplay = on"
        );
    }
}
