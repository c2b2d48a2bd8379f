// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport to the turntable.
//!
//! The [`CommandChannel`] trait is the only way the rest of the crate talks to
//! a device: it sends one command or fetches one state snapshot, and reports
//! failure as a [`CommandError`]. [`HttpClient`] implements it over the
//! device's local JSON API.
//!
//! A channel never retries. Retrying and re-verifying is the job of the
//! [`ReconciliationEngine`](crate::sync::ReconciliationEngine).
//!
//! Channels that can hear the device announce changes implement
//! [`CommandChannel::next_changes`]; a running device polls as soon as a
//! reconciled setting is reported changed.

#[cfg(feature = "http")]
mod event_queue;
#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpClient, HttpConfig};

use std::future::Future;

use crate::command::DeviceCommand;
use crate::error::CommandError;
use crate::state::DeviceState;

/// Acknowledgement of a delivered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Number of `setData` requests the device accepted.
    pub requests_sent: usize,
}

/// A transport that can deliver commands to one device and read its state.
///
/// Implementations make exactly one attempt per call. The returned futures
/// are `Send` so a channel can drive a background poll task.
///
/// # Examples
///
/// A scripted channel for tests:
///
/// ```
/// use victrola_sync::command::DeviceCommand;
/// use victrola_sync::error::CommandError;
/// use victrola_sync::protocol::{Ack, CommandChannel};
/// use victrola_sync::state::DeviceState;
///
/// struct Offline;
///
/// impl CommandChannel for Offline {
///     async fn send_command(&self, _command: &DeviceCommand) -> Result<Ack, CommandError> {
///         Err(CommandError::Unreachable("offline".to_string()))
///     }
///
///     async fn fetch_state(&self) -> Result<DeviceState, CommandError> {
///         Err(CommandError::Unreachable("offline".to_string()))
///     }
/// }
/// ```
pub trait CommandChannel: Send + Sync + 'static {
    /// Sends a command to the device.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the device is unreachable, rejects the
    /// command or does not answer in time.
    fn send_command(
        &self,
        command: &DeviceCommand,
    ) -> impl Future<Output = Result<Ack, CommandError>> + Send;

    /// Reads the full device state.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the device cannot be reached or answers with
    /// a malformed snapshot.
    fn fetch_state(&self) -> impl Future<Output = Result<DeviceState, CommandError>> + Send;

    /// Waits for the device to announce changes and returns the changed
    /// settings paths.
    ///
    /// May return an empty list when a wait ends with nothing to report.
    /// Channels without push notifications never resolve, which is the
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the notification stream broke. Callers back
    /// off before waiting again.
    fn next_changes(&self) -> impl Future<Output = Result<Vec<String>, CommandError>> + Send {
        std::future::pending()
    }

    /// Releases whatever [`next_changes`](Self::next_changes) holds on the
    /// device. The default does nothing.
    fn close_changes(&self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}
