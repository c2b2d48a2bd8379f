// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP device builder.

use std::sync::Arc;
use std::time::Duration;

use crate::device::Device;
use crate::error::Result;
use crate::event::DeviceId;
use crate::manager::{DeviceConfig, SyncPolicy};
use crate::protocol::{HttpClient, HttpConfig};
use crate::registry::{QuickplaySpeakerBackend, SpeakerBackend, StaticSpeakerBackend};
use crate::types::SourceType;

/// Builder for turntables reached over the local HTTP API.
///
/// Created with `Device::http("host")`,
/// `Device::http_config(HttpConfig::new("host").with_port(8080))` or
/// [`Device::from_config`].
///
/// The Sonos speaker list comes from the device's quick-play rows unless
/// [`with_sonos_quickplay(false)`](Self::with_sonos_quickplay) is set or a
/// Sonos backend is registered explicitly.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use victrola_sync::Device;
/// use victrola_sync::manager::SyncPolicy;
/// use victrola_sync::registry::{BackendSpeaker, StaticSpeakerBackend};
/// use victrola_sync::types::SourceType;
///
/// # fn example() -> victrola_sync::Result<()> {
/// let device = Device::http("192.168.1.50")
///     .with_name("Pearl")
///     .with_timeout(Duration::from_secs(3))
///     .with_policy(SyncPolicy::default().with_max_verification_attempts(5))
///     .with_backend(
///         SourceType::Bluetooth,
///         Arc::new(StaticSpeakerBackend::new([BackendSpeaker::new(
///             "00:11:22:33:44:55",
///             "Headphones",
///         )])),
///     )
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpDeviceBuilder {
    config: HttpConfig,
    id: Option<DeviceId>,
    name: Option<String>,
    policy: SyncPolicy,
    sonos_quickplay: bool,
    backends: Vec<(SourceType, Arc<dyn SpeakerBackend>)>,
}

impl HttpDeviceBuilder {
    pub(crate) fn new(config: HttpConfig) -> Self {
        Self {
            config,
            id: None,
            name: None,
            policy: SyncPolicy::default(),
            sonos_quickplay: true,
            backends: Vec::new(),
        }
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.config = self.config.with_port(port);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Enables or disables following the device's event queue.
    #[must_use]
    pub fn with_push_events(mut self, enabled: bool) -> Self {
        self.config = self.config.with_push_events(enabled);
        self
    }

    /// Sets the display name. Defaults to the host.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Uses a known device id instead of a fresh one.
    #[must_use]
    pub fn with_id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the polling and verification policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enables or disables the quick-play Sonos backend.
    #[must_use]
    pub fn with_sonos_quickplay(mut self, enabled: bool) -> Self {
        self.sonos_quickplay = enabled;
        self
    }

    /// Registers a speaker backend for a source.
    ///
    /// A later registration for the same source replaces the earlier one.
    #[must_use]
    pub fn with_backend(mut self, source: SourceType, backend: Arc<dyn SpeakerBackend>) -> Self {
        self.backends.push((source, backend));
        self
    }

    /// Builds the device. Nothing is sent until [`Device::start`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the policy is invalid or the HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Device<HttpClient>> {
        self.policy.validate()?;

        let name = self
            .name
            .unwrap_or_else(|| self.config.host().to_string());
        let client = self.config.into_client()?;
        let quickplay = self
            .sonos_quickplay
            .then(|| QuickplaySpeakerBackend::new(client.clone()));

        let device = Device::with_id(
            self.id.unwrap_or_default(),
            client,
            name,
            self.policy,
        );

        if let Some(backend) = quickplay {
            device.register_backend(SourceType::Sonos, Arc::new(backend));
        }
        for (source, backend) in self.backends {
            device.register_backend(source, backend);
        }

        tracing::debug!(device = %device.name(), id = %device.id(), "Built HTTP device");
        Ok(device)
    }
}

impl Device<HttpClient> {
    /// Starts building a device reached at `host`.
    #[must_use]
    pub fn http(host: impl Into<String>) -> HttpDeviceBuilder {
        HttpDeviceBuilder::new(HttpConfig::new(host))
    }

    /// Starts building a device from a full HTTP configuration.
    #[must_use]
    pub fn http_config(config: HttpConfig) -> HttpDeviceBuilder {
        HttpDeviceBuilder::new(config)
    }

    /// Builds a device from its configuration entry.
    ///
    /// Static speaker lists become [`StaticSpeakerBackend`]s.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        Self::builder_from_config(config)?.build()
    }

    pub(crate) fn builder_from_config(config: &DeviceConfig) -> Result<HttpDeviceBuilder> {
        config.validate()?;

        let mut builder = Self::http(config.host.clone())
            .with_port(config.port)
            .with_timeout(config.request_timeout)
            .with_name(config.display_name())
            .with_policy(config.sync.clone())
            .with_sonos_quickplay(config.sonos_quickplay)
            .with_push_events(config.push_events);

        if let Some(id) = config.id {
            builder = builder.with_id(id);
        }
        for (source, speakers) in &config.static_speakers {
            builder = builder.with_backend(
                *source,
                Arc::new(StaticSpeakerBackend::new(speakers.iter().cloned())),
            );
        }
        Ok(builder)
    }
}
