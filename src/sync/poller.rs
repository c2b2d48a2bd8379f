// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exclusive state fetches.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::error::CommandError;
use crate::protocol::CommandChannel;
use crate::state::DeviceState;

/// Result of one poll request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The device answered with a snapshot.
    Fetched(DeviceState),
    /// The fetch failed.
    Failed(CommandError),
    /// Another poll was already in flight; nothing was fetched.
    Coalesced,
}

impl PollOutcome {
    /// Returns the fetched snapshot, if any.
    #[must_use]
    pub fn state(&self) -> Option<&DeviceState> {
        match self {
            Self::Fetched(state) => Some(state),
            Self::Failed(_) | Self::Coalesced => None,
        }
    }

    /// Returns `true` if the poll was skipped.
    #[must_use]
    pub fn is_coalesced(&self) -> bool {
        matches!(self, Self::Coalesced)
    }
}

/// Fetches the device state, one fetch at a time.
///
/// The ambient poll, the accelerated verification poll and manual
/// refreshes all go through [`poll`](Self::poll). A poll requested while one
/// is outstanding returns [`PollOutcome::Coalesced`] instead of queueing a
/// second request against the device.
#[derive(Debug)]
pub struct DevicePoller<C> {
    channel: Arc<C>,
    in_flight: Mutex<()>,
    fetches: AtomicU64,
}

impl<C: CommandChannel> DevicePoller<C> {
    /// Creates a poller reading through `channel`.
    #[must_use]
    pub fn new(channel: Arc<C>) -> Self {
        Self {
            channel,
            in_flight: Mutex::new(()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Fetches the full state unless a fetch is already running.
    pub async fn poll(&self) -> PollOutcome {
        self.poll_numbered().await.1
    }

    /// Like [`poll`](Self::poll), also returning the fetch number taken when
    /// the fetch started. A coalesced poll gets 0.
    ///
    /// Fetch numbers start at 1 and grow by one per fetch, so a fetch whose
    /// number is at most [`fetch_count`](Self::fetch_count) read at some
    /// moment had already started by then.
    pub async fn poll_numbered(&self) -> (u64, PollOutcome) {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Poll already in flight, coalescing");
            return (0, PollOutcome::Coalesced);
        };

        let number = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = match self.channel.fetch_state().await {
            Ok(state) => {
                tracing::debug!(fetch = number, source = ?state.source(), "Poll succeeded");
                PollOutcome::Fetched(state)
            }
            Err(e) => {
                tracing::debug!(fetch = number, error = %e, "Poll failed");
                PollOutcome::Failed(e)
            }
        };
        (number, outcome)
    }

    /// Returns `true` while a fetch is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Returns the number of fetches issued to the device.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}
