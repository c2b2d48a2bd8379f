// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State synchronization.
//!
//! The [`DevicePoller`] fetches snapshots one at a time. The
//! [`ReconciliationEngine`] dispatches requested changes, compares each
//! poll against what was requested, and publishes a [`VerificationResult`]
//! when a change is verified, drifts, or cannot be dispatched.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use victrola_sync::event::{DeviceId, EventBus};
//! use victrola_sync::manager::SyncPolicy;
//! use victrola_sync::protocol::HttpClient;
//! use victrola_sync::registry::SpeakerRegistry;
//! use victrola_sync::state::StatePublisher;
//! use victrola_sync::sync::{ChangeRequest, ReconciliationEngine};
//!
//! # async fn example() -> victrola_sync::Result<()> {
//! let engine = ReconciliationEngine::new(
//!     Arc::new(HttpClient::new("192.168.1.50")?),
//!     Arc::new(SpeakerRegistry::new()),
//!     StatePublisher::new(DeviceId::new(), EventBus::new()),
//!     SyncPolicy::default(),
//! );
//!
//! let ticket = engine.request_change(ChangeRequest::AudioLatencyMs(120)).await?;
//! engine.poll_once().await;
//! println!("{:?}", engine.change_state(&ticket.attribute));
//! # Ok(())
//! # }
//! ```

mod change;
mod engine;
mod poller;
mod verification;

pub use change::{ChangeRequest, ChangeState, ChangeTicket, DesiredChange};
pub use engine::ReconciliationEngine;
pub use poller::{DevicePoller, PollOutcome};
pub use verification::{RebootOutcome, VerificationOutcome, VerificationResult};
