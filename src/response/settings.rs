// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Settings snapshot parsing.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ParseError, ValueError};
use crate::state::DeviceState;
use crate::types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};

/// Path of the settings node read by a poll.
pub const SETTINGS_PATH: &str = "settings:/victrola";

/// Last row index requested by a poll.
pub const SETTINGS_LAST_ROW: usize = 19;

/// Value stored in the Bluetooth default row when no speaker is selected.
const BLUETOOTH_UNSET: &str = "settings:/victrola/bluetoothEnabled";

const ROW_ROON_ENABLED: usize = 1;
const ROW_SONOS_DEFAULT: usize = 2;
const ROW_ROON_DEFAULT: usize = 3;
const ROW_SONOS_ENABLED: usize = 4;
const ROW_UPNP_ENABLED: usize = 5;
const ROW_BLUETOOTH_ENABLED: usize = 6;
const ROW_QUALITY: usize = 7;
const ROW_BRIGHTNESS: usize = 10;
const ROW_AUTOPLAY: usize = 11;
const ROW_BLUETOOTH_DEFAULT: usize = 12;
const ROW_UPNP_DEFAULT: usize = 15;
const ROW_LATENCY: usize = 18;

/// Response to a `getRows` request on `settings:/victrola`.
///
/// Each row is a list whose first element is a typed value such as
/// `{"type": "bool_", "bool_": true}`. Rows the device leaves empty are
/// `null` or `[]`.
///
/// # Examples
///
/// ```
/// use victrola_sync::response::SettingsRowsResponse;
/// use victrola_sync::types::AudioQuality;
///
/// let json = r#"{"rows": [
///     null,
///     [{"type": "bool_", "bool_": false}],
///     null, null,
///     [{"type": "bool_", "bool_": true}],
///     null, null,
///     [{"type": "forceLowBitrate", "forceLowBitrate": "cdQuality"}],
///     null, null,
///     [{"type": "i32_", "i32_": 70}],
///     null, null, null, null, null, null, null,
///     [{"type": "i32_", "i32_": 120}]
/// ]}"#;
///
/// let response: SettingsRowsResponse = serde_json::from_str(json).unwrap();
/// let state = response.to_device_state().unwrap();
/// assert_eq!(state.audio_quality(), AudioQuality::Cd);
/// assert_eq!(state.audio_latency().millis(), 100);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsRowsResponse {
    #[serde(default)]
    rows: Vec<Value>,
}

impl SettingsRowsResponse {
    /// Returns the number of rows in the response.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the response holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds a snapshot from the rows.
    ///
    /// Source flags, default speakers and autoplay are optional. The
    /// quality, brightness and latency rows are required.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MissingField` if a required row is absent and
    /// `ParseError::InvalidValue` if a row holds a value out of range.
    pub fn to_device_state(&self) -> Result<DeviceState, ParseError> {
        let quality = self.quality()?;
        let brightness = self.brightness()?;
        let latency = self.latency()?;

        let enabled = [
            (SourceType::Roon, ROW_ROON_ENABLED),
            (SourceType::Sonos, ROW_SONOS_ENABLED),
            (SourceType::Upnp, ROW_UPNP_ENABLED),
            (SourceType::Bluetooth, ROW_BLUETOOTH_ENABLED),
        ]
        .into_iter()
        .filter(|(_, row)| self.bool_at(*row) == Some(true))
        .map(|(source, _)| source);

        let mut state = DeviceState::new(quality, latency, brightness).with_enabled_sources(enabled);

        for (source, row) in [
            (SourceType::Roon, ROW_ROON_DEFAULT),
            (SourceType::Sonos, ROW_SONOS_DEFAULT),
            (SourceType::Upnp, ROW_UPNP_DEFAULT),
            (SourceType::Bluetooth, ROW_BLUETOOTH_DEFAULT),
        ] {
            let id = self
                .string_at(row)
                .filter(|id| !id.is_empty() && *id != BLUETOOTH_UNSET);
            if let Some(id) = id {
                state = state.with_speaker(source, id);
            }
        }

        if let Some(autoplay) = self.bool_at(ROW_AUTOPLAY) {
            state = state.with_autoplay(autoplay);
        }

        Ok(state)
    }

    fn quality(&self) -> Result<AudioQuality, ParseError> {
        let raw = self
            .typed_at(ROW_QUALITY, "forceLowBitrate")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MissingField("forceLowBitrate".to_string()))?;
        AudioQuality::from_api_value(raw).ok_or_else(|| ParseError::InvalidValue {
            field: "forceLowBitrate".to_string(),
            message: format!("unknown quality '{raw}'"),
        })
    }

    fn brightness(&self) -> Result<KnobBrightness, ParseError> {
        let raw = self
            .typed_at(ROW_BRIGHTNESS, "i32_")
            .and_then(Value::as_i64)
            .ok_or_else(|| ParseError::MissingField("lightBrightness".to_string()))?;
        KnobBrightness::new(raw).map_err(|e| invalid("lightBrightness", &e))
    }

    fn latency(&self) -> Result<AudioLatency, ParseError> {
        let preset = self
            .typed_at(ROW_LATENCY, "adchlsLatency")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MissingField("wirelessAudioDelay".to_string()))?;
        AudioLatency::from_preset(preset).ok_or_else(|| ParseError::InvalidValue {
            field: "wirelessAudioDelay".to_string(),
            message: format!("unknown preset '{preset}'"),
        })
    }

    fn first_value(&self, row: usize) -> Option<&Value> {
        self.rows.get(row)?.as_array()?.first()
    }

    fn typed_at(&self, row: usize, key: &str) -> Option<&Value> {
        self.first_value(row)?.get(key)
    }

    fn bool_at(&self, row: usize) -> Option<bool> {
        let value = self.first_value(row)?;
        if value.get("type")?.as_str()? != "bool_" {
            return None;
        }
        value.get("bool_")?.as_bool()
    }

    fn string_at(&self, row: usize) -> Option<&str> {
        let value = self.first_value(row)?;
        if value.get("type")?.as_str()? != "string_" {
            return None;
        }
        value.get("string_")?.as_str()
    }
}

fn invalid(field: &str, err: &ValueError) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bool_row(b: bool) -> Value {
        json!([{"type": "bool_", "bool_": b}])
    }

    fn string_row(s: &str) -> Value {
        json!([{"type": "string_", "string_": s}])
    }

    fn i32_row(n: i64) -> Value {
        json!([{"type": "i32_", "i32_": n}])
    }

    fn preset_row(label: &str) -> Value {
        json!([{"type": "adchlsLatency", "adchlsLatency": label}])
    }

    fn full_rows() -> Vec<Value> {
        let mut rows = vec![Value::Null; SETTINGS_LAST_ROW + 1];
        rows[ROW_ROON_ENABLED] = bool_row(false);
        rows[ROW_SONOS_DEFAULT] = string_row("RINCON_000E58A0123401400");
        rows[ROW_ROON_DEFAULT] = string_row("");
        rows[ROW_SONOS_ENABLED] = bool_row(true);
        rows[ROW_UPNP_ENABLED] = bool_row(false);
        rows[ROW_BLUETOOTH_ENABLED] = bool_row(true);
        rows[ROW_QUALITY] =
            json!([{"type": "forceLowBitrate", "forceLowBitrate": "losslessQuality"}]);
        rows[ROW_BRIGHTNESS] = i32_row(80);
        rows[ROW_AUTOPLAY] = bool_row(true);
        rows[ROW_BLUETOOTH_DEFAULT] = string_row(BLUETOOTH_UNSET);
        rows[ROW_UPNP_DEFAULT] = string_row("uuid:5f9ec1b3-ed59-79bb-4530-745e1d9f6f8a");
        rows[ROW_LATENCY] = preset_row("high");
        rows
    }

    fn parse(rows: Vec<Value>) -> Result<DeviceState, ParseError> {
        SettingsRowsResponse { rows }.to_device_state()
    }

    #[test]
    fn full_snapshot() {
        let state = parse(full_rows()).unwrap();

        assert_eq!(state.source(), Some(SourceType::Sonos));
        assert!(state.is_source_enabled(SourceType::Bluetooth));
        assert!(!state.is_source_enabled(SourceType::Roon));
        assert_eq!(
            state.speaker(SourceType::Sonos),
            Some("RINCON_000E58A0123401400")
        );
        assert_eq!(
            state.speaker(SourceType::Upnp),
            Some("uuid:5f9ec1b3-ed59-79bb-4530-745e1d9f6f8a")
        );
        assert_eq!(state.speaker(SourceType::Roon), None);
        assert_eq!(state.speaker(SourceType::Bluetooth), None);
        assert_eq!(state.audio_quality(), AudioQuality::Lossless);
        assert_eq!(state.knob_brightness().value(), 80);
        assert_eq!(state.audio_latency().millis(), 250);
        assert_eq!(state.autoplay(), Some(true));
        assert!(state.connection_status().is_connected());
    }

    #[test]
    fn bluetooth_speaker_when_set() {
        let mut rows = full_rows();
        rows[ROW_BLUETOOTH_DEFAULT] = string_row("00:1A:7D:DA:71:13");
        let state = parse(rows).unwrap();
        assert_eq!(
            state.speaker(SourceType::Bluetooth),
            Some("00:1A:7D:DA:71:13")
        );
    }

    #[test]
    fn latency_preset() {
        let mut rows = full_rows();
        rows[ROW_LATENCY] = preset_row("med");
        assert_eq!(parse(rows).unwrap().audio_latency().millis(), 100);
    }

    #[test]
    fn unknown_latency_preset_is_invalid() {
        let mut rows = full_rows();
        rows[ROW_LATENCY] = preset_row("turbo");
        assert!(matches!(
            parse(rows),
            Err(ParseError::InvalidValue { field, .. }) if field == "wirelessAudioDelay"
        ));
    }

    #[test]
    fn raw_millisecond_latency_is_missing() {
        let mut rows = full_rows();
        rows[ROW_LATENCY] = i32_row(120);
        assert!(matches!(parse(rows), Err(ParseError::MissingField(_))));
    }

    #[test]
    fn no_enabled_source() {
        let mut rows = full_rows();
        rows[ROW_SONOS_ENABLED] = bool_row(false);
        rows[ROW_BLUETOOTH_ENABLED] = Value::Null;
        assert_eq!(parse(rows).unwrap().source(), None);
    }

    #[test]
    fn missing_quality_is_an_error() {
        let mut rows = full_rows();
        rows[ROW_QUALITY] = json!([]);
        assert!(matches!(parse(rows), Err(ParseError::MissingField(_))));
    }

    #[test]
    fn truncated_rows_are_an_error() {
        let rows = full_rows().into_iter().take(12).collect();
        assert!(matches!(parse(rows), Err(ParseError::MissingField(_))));
    }

    #[test]
    fn out_of_range_brightness_is_invalid() {
        let mut rows = full_rows();
        rows[ROW_BRIGHTNESS] = i32_row(140);
        assert!(matches!(
            parse(rows),
            Err(ParseError::InvalidValue { field, .. }) if field == "lightBrightness"
        ));
    }

    #[test]
    fn unknown_quality_is_invalid() {
        let mut rows = full_rows();
        rows[ROW_QUALITY] = json!([{"type": "forceLowBitrate", "forceLowBitrate": "hiRes"}]);
        assert!(matches!(parse(rows), Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn deserializes_from_device_json() {
        let body = json!({ "rows": full_rows() }).to_string();
        let response: SettingsRowsResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(response.len(), SETTINGS_LAST_ROW + 1);
        assert!(response.to_device_state().is_ok());
    }
}
