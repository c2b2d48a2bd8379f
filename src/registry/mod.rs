// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Speaker discovery.
//!
//! Each source gets its speakers from one [`SpeakerBackend`]. The
//! [`SpeakerRegistry`] caches what the backends report as ordered
//! [`SpeakerEntry`] lists, which the reconciliation engine uses to validate
//! speaker selections.
//!
//! Built-in backends:
//!
//! - [`StaticSpeakerBackend`]: a fixed list, usually from configuration
//! - [`QuickplaySpeakerBackend`]: the Sonos speakers the turntable offers
//!   for quick-play (requires the `http` feature)

mod backend;
mod speaker_registry;

#[cfg(feature = "http")]
pub use backend::QuickplaySpeakerBackend;
pub use backend::{BackendSpeaker, SpeakerBackend, StaticSpeakerBackend};
pub use speaker_registry::{BackendStatus, SpeakerEntry, SpeakerRegistry};
