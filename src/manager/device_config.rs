// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration types for the device manager.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::DeviceId;
use crate::registry::BackendSpeaker;
use crate::types::SourceType;

/// Configuration for one turntable.
///
/// Deserializes from JSON with every field but `host` optional. Durations
/// are integer milliseconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use victrola_sync::manager::{DeviceConfig, SyncPolicy};
///
/// let config = DeviceConfig::new("192.168.1.50")
///     .with_name("Pearl")
///     .with_request_timeout(Duration::from_secs(3))
///     .with_sync(SyncPolicy::new().with_max_verification_attempts(5));
///
/// assert_eq!(config.port, 80);
/// assert_eq!(config.display_name(), "Pearl");
///
/// let parsed: DeviceConfig = serde_json::from_str(r#"{"host": "victrola.local"}"#).unwrap();
/// assert!(parsed.sonos_quickplay);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host name or IP address.
    pub host: String,
    /// HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pinned device id. A random one is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DeviceId>,
    /// Upper bound on each request to the device.
    #[serde(
        default = "default_request_timeout",
        rename = "request_timeout_ms",
        with = "duration_ms"
    )]
    pub request_timeout: Duration,
    /// Use the device's quick-play list as the Sonos speaker backend.
    #[serde(default = "default_true")]
    pub sonos_quickplay: bool,
    /// Follow the device's event queue between polls.
    #[serde(default = "default_true")]
    pub push_events: bool,
    /// Fixed speaker lists per source.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_speakers: BTreeMap<SourceType, Vec<BackendSpeaker>>,
    /// Polling and verification policy.
    #[serde(default)]
    pub sync: SyncPolicy,
}

impl DeviceConfig {
    /// Creates a configuration with defaults for the given host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            name: None,
            id: None,
            request_timeout: default_request_timeout(),
            sonos_quickplay: true,
            push_events: true,
            static_speakers: BTreeMap::new(),
            sync: SyncPolicy::default(),
        }
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Pins the device id.
    #[must_use]
    pub fn with_id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables or disables the quick-play Sonos backend.
    #[must_use]
    pub fn with_sonos_quickplay(mut self, enabled: bool) -> Self {
        self.sonos_quickplay = enabled;
        self
    }

    /// Enables or disables following the device's event queue.
    #[must_use]
    pub fn with_push_events(mut self, enabled: bool) -> Self {
        self.push_events = enabled;
        self
    }

    /// Adds a fixed speaker list for a source.
    #[must_use]
    pub fn with_static_speakers(
        mut self,
        source: SourceType,
        speakers: impl IntoIterator<Item = BackendSpeaker>,
    ) -> Self {
        self.static_speakers
            .insert(source, speakers.into_iter().collect());
        self
    }

    /// Sets the sync policy.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }

    /// Returns the configured name, or the host if none is set.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }

    /// Checks the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty host, port 0, or an invalid
    /// sync policy.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config(format!(
                "{}: port must not be 0",
                self.display_name()
            )));
        }
        self.sync
            .validate()
            .map_err(|e| Error::Config(format!("{}: {e}", self.display_name())))
    }
}

/// How a device is polled and how changes are verified.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use victrola_sync::manager::SyncPolicy;
///
/// let policy = SyncPolicy::new()
///     .with_ambient_interval(Duration::from_secs(60))
///     .with_accelerated_interval(Duration::from_secs(1));
///
/// assert_eq!(policy.max_verification_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Poll interval with nothing to verify.
    #[serde(rename = "ambient_interval_ms", with = "duration_ms")]
    pub ambient_interval: Duration,
    /// Poll interval while a change is being verified or a reboot is watched.
    #[serde(rename = "accelerated_interval_ms", with = "duration_ms")]
    pub accelerated_interval: Duration,
    /// Polls compared against a change before it is declared drifted.
    pub max_verification_attempts: u32,
    /// Time a rebooting device has to come back.
    #[serde(rename = "reboot_grace_ms", with = "duration_ms")]
    pub reboot_grace: Duration,
    /// Upper bound on one speaker backend call.
    #[serde(rename = "backend_timeout_ms", with = "duration_ms")]
    pub backend_timeout: Duration,
}

impl SyncPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ambient poll interval.
    #[must_use]
    pub fn with_ambient_interval(mut self, interval: Duration) -> Self {
        self.ambient_interval = interval;
        self
    }

    /// Sets the accelerated poll interval.
    #[must_use]
    pub fn with_accelerated_interval(mut self, interval: Duration) -> Self {
        self.accelerated_interval = interval;
        self
    }

    /// Sets the verification attempt budget.
    #[must_use]
    pub fn with_max_verification_attempts(mut self, attempts: u32) -> Self {
        self.max_verification_attempts = attempts;
        self
    }

    /// Sets the reboot grace window.
    #[must_use]
    pub fn with_reboot_grace(mut self, grace: Duration) -> Self {
        self.reboot_grace = grace;
        self
    }

    /// Sets the speaker backend timeout.
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Checks that the policy can terminate and accelerates polling.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the attempt budget is zero or the
    /// accelerated interval is not shorter than the ambient one.
    pub fn validate(&self) -> Result<()> {
        if self.max_verification_attempts == 0 {
            return Err(Error::Config(
                "max_verification_attempts must be at least 1".to_string(),
            ));
        }
        if self.accelerated_interval.is_zero() {
            return Err(Error::Config(
                "accelerated_interval must not be zero".to_string(),
            ));
        }
        if self.accelerated_interval >= self.ambient_interval {
            return Err(Error::Config(
                "accelerated_interval must be shorter than ambient_interval".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            ambient_interval: Duration::from_secs(30),
            accelerated_interval: Duration::from_secs(2),
            max_verification_attempts: 3,
            reboot_grace: Duration::from_secs(120),
            backend_timeout: Duration::from_secs(10),
        }
    }
}

fn default_port() -> u16 {
    80
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
