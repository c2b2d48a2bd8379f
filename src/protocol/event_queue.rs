// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event queue.
//!
//! The turntable pushes changes through a queue the client registers with
//! `POST /api/event/modifyQueue` and then long-polls with
//! `GET /api/event/pollQueue`. Each poll answers with a JSON array of
//! `{"path": ..., ...}` items, or an empty array when the wait ends quietly.
//! A queue the device no longer knows answers 404.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::command::{
    PATH_AUDIO_LATENCY, PATH_AUDIO_QUALITY, PATH_AUTOPLAY, PATH_KNOB_BRIGHTNESS,
    PATH_SPEAKER_SELECTION,
};
use crate::error::ParseError;
use crate::response::QUICKPLAY_PATH;

/// How long the device holds a poll open when nothing happens.
pub(crate) const POLL_WAIT: Duration = Duration::from_millis(1500);

/// Extra time allowed on top of [`POLL_WAIT`] before a poll counts as lost.
pub(crate) const POLL_GRACE: Duration = Duration::from_secs(3);

/// Paths the queue subscribes to, with their subscription type.
const SUBSCRIPTIONS: [(&str, &str); 10] = [
    (PATH_SPEAKER_SELECTION, "rows"),
    (QUICKPLAY_PATH, "rows"),
    (PATH_AUTOPLAY, "itemWithValue"),
    ("settings:/victrola/roonEnabled", "itemWithValue"),
    ("settings:/victrola/sonosEnabled", "itemWithValue"),
    ("settings:/victrola/upnpEnabled", "itemWithValue"),
    ("settings:/victrola/bluetoothEnabled", "itemWithValue"),
    (PATH_AUDIO_QUALITY, "itemWithValue"),
    (PATH_AUDIO_LATENCY, "itemWithValue"),
    (PATH_KNOB_BRIGHTNESS, "itemWithValue"),
];

/// One item of a `pollQueue` answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct QueuedEvent {
    pub path: String,
}

/// The id of the queue registered on the device, if any.
///
/// Held across the long poll, so only one wait runs per client.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pub id: Mutex<Option<String>>,
}

/// Creates a fresh queue id. The device expects a braced UUID.
pub(crate) fn new_queue_id() -> String {
    format!("{{{}}}", Uuid::new_v4())
}

/// Body registering an empty queue.
pub(crate) fn create_body(nocache: i64) -> Value {
    modify_body("", &[], &[], nocache)
}

/// Body subscribing `queue_id` to every watched path.
pub(crate) fn subscribe_body(queue_id: &str, nocache: i64) -> Value {
    modify_body(queue_id, &subscriptions(), &[], nocache)
}

/// Body removing every subscription from `queue_id`.
pub(crate) fn unsubscribe_body(queue_id: &str, nocache: i64) -> Value {
    modify_body(queue_id, &[], &subscriptions(), nocache)
}

fn subscriptions() -> Vec<Value> {
    SUBSCRIPTIONS
        .iter()
        .map(|(path, kind)| json!({"path": path, "type": kind}))
        .collect()
}

fn modify_body(queue_id: &str, subscribe: &[Value], unsubscribe: &[Value], nocache: i64) -> Value {
    json!({
        "queueId": queue_id,
        "subscribe": subscribe,
        "unsubscribe": unsubscribe,
        "_nocache": nocache.to_string(),
    })
}

/// Reads the changed paths out of a `pollQueue` body.
///
/// Anything but an array reads as no events; array items without a string
/// `path` are skipped.
pub(crate) fn parse_events(body: &str) -> Result<Vec<QueuedEvent>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
