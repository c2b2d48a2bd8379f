// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `victrola_sync` - keeps Victrola Stream turntables in sync.
//!
//! The turntable exposes a small HTTP API: settings are written one path at
//! a time and the whole configuration is read back as a block of rows. The
//! device never confirms a write beyond "request accepted", so this library
//! reads the state back after every change and reports whether the device
//! actually took it.
//!
//! # Synchronized attributes
//!
//! - **Source**: which of Roon, Sonos, UPnP or Bluetooth is enabled
//! - **Speaker**: the default output of each source
//! - **Audio quality**: connection, standard, CD or lossless
//! - **Audio latency**: wireless delay, 0-500 ms, kept by the device as one of
//!   four presets
//! - **Knob brightness**: 0-100%
//! - **Autoplay**: on or off
//!
//! # Quick Start
//!
//! ```no_run
//! use victrola_sync::Device;
//! use victrola_sync::event::SyncEvent;
//! use victrola_sync::types::AudioQuality;
//!
//! #[tokio::main]
//! async fn main() -> victrola_sync::Result<()> {
//!     let device = Device::http("192.168.1.50").build()?;
//!     let mut events = device.subscribe();
//!     device.start().await;
//!
//!     device.set_audio_quality(AudioQuality::Lossless).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SyncEvent::Verification { result, .. } = event {
//!             println!("{} -> {}", result.desired, result.outcome);
//!             break;
//!         }
//!     }
//!
//!     device.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Verification
//!
//! A dispatched change is `Verifying` until a poll reports the requested
//! value (`Verified`) or the attempt budget runs out (`Failed`, published
//! with [`VerificationOutcome::Drift`](sync::VerificationOutcome::Drift)).
//! While anything is outstanding the device is polled at the accelerated
//! interval of its [`SyncPolicy`](manager::SyncPolicy). Only polls started
//! after the device acknowledged the change count as attempts.
//!
//! # Features
//!
//! - `http` (default): the reqwest-based [`HttpClient`](protocol::HttpClient),
//!   the HTTP device builder and the [`DeviceManager`](manager::DeviceManager).
//!   Without it the crate still provides the engine for any custom
//!   [`CommandChannel`](protocol::CommandChannel).

pub mod command;
pub mod device;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod response;
pub mod state;
pub mod sync;
pub mod types;

pub use device::Device;
#[cfg(feature = "http")]
pub use device::HttpDeviceBuilder;
pub use error::{BackendError, CommandError, CommandErrorKind, Error, ParseError, Result, ValueError};
pub use event::{DeviceId, SyncEvent};
#[cfg(feature = "http")]
pub use manager::DeviceManager;
pub use manager::{DeviceConfig, ManagerConfig, SyncPolicy};
pub use state::{Attribute, AttributeValue, ConnectionStatus, DeviceState};
pub use sync::{ChangeRequest, ChangeState, ChangeTicket, VerificationResult};
pub use types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};
