// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Quick-play speaker list parsing.

use serde::Deserialize;
use serde_json::Value;

/// Path of the device-side Sonos quick-play list.
pub const QUICKPLAY_PATH: &str = "victrola:ui/speakerQuickplay";

/// One speaker offered by the device's quick-play list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickplayRow {
    /// Speaker or group id.
    pub id: String,
    /// Name shown on the device.
    pub title: String,
    /// Whether this is the speaker quick-play currently targets.
    pub preferred: bool,
}

/// Response to a structure `getRows` request on the quick-play path.
///
/// # Examples
///
/// ```
/// use victrola_sync::response::QuickplayRowsResponse;
///
/// let json = r#"{"rows": [
///     {"title": "Living Room", "id": "RINCON_A", "preferred": true},
///     {"title": "Office"}
/// ]}"#;
/// let response: QuickplayRowsResponse = serde_json::from_str(json).unwrap();
/// let speakers = response.speakers();
///
/// assert_eq!(speakers.len(), 1);
/// assert_eq!(speakers[0].title, "Living Room");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct QuickplayRowsResponse {
    #[serde(default)]
    rows: Vec<Value>,
}

impl QuickplayRowsResponse {
    /// Returns the usable rows. Rows lacking an id or a title are skipped.
    #[must_use]
    pub fn speakers(&self) -> Vec<QuickplayRow> {
        self.rows
            .iter()
            .filter_map(|row| {
                let id = row.get("id")?.as_str()?;
                let title = row.get("title")?.as_str()?;
                if id.is_empty() || title.is_empty() {
                    return None;
                }
                Some(QuickplayRow {
                    id: id.to_string(),
                    title: title.to_string(),
                    preferred: row
                        .get("preferred")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            })
            .collect()
    }
}
