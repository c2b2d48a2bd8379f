// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for the turntable's local JSON API.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::command::{DeviceCommand, SetDataRequest};
use crate::error::{CommandError, Error};
use crate::protocol::event_queue::{self, EventQueue};
use crate::protocol::{Ack, CommandChannel};
use crate::response::{
    QUICKPLAY_PATH, QuickplayRow, QuickplayRowsResponse, SETTINGS_LAST_ROW, SETTINGS_PATH,
    SettingsRowsResponse,
};
use crate::state::DeviceState;

// ============================================================================
// HttpConfig
// ============================================================================

/// Connection parameters for one turntable.
///
/// HTTP is stateless: every command and every poll is an independent
/// request bounded by the configured timeout.
///
/// # Examples
///
/// ```
/// use victrola_sync::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("192.168.1.50")
///     .with_port(8080)
///     .with_timeout(Duration::from_secs(3));
///
/// assert_eq!(config.base_url(), "http://192.168.1.50:8080");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    host: String,
    port: u16,
    timeout: Duration,
    push_events: bool,
}

impl HttpConfig {
    /// Default HTTP port.
    pub const DEFAULT_PORT: u16 = 80;
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the given host or IP address.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            timeout: Self::DEFAULT_TIMEOUT,
            push_events: true,
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables listening to the device's event queue.
    ///
    /// Enabled by default. Without it a device only learns about changes
    /// made elsewhere on its next scheduled poll.
    #[must_use]
    pub fn with_push_events(mut self, enabled: bool) -> Self {
        self.push_events = enabled;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` if the device's event queue is used.
    #[must_use]
    pub fn push_events(&self) -> bool {
        self.push_events
    }

    /// Builds the base URL from this configuration.
    ///
    /// A host that already carries a scheme is used as is.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            return host.to_string();
        }
        if self.port == Self::DEFAULT_PORT {
            format!("http://{host}")
        } else {
            format!("http://{host}:{}", self.port)
        }
    }

    /// Creates an [`HttpClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be created.
    pub fn into_client(self) -> crate::Result<HttpClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(HttpClient {
            base_url: self.base_url(),
            client,
            timeout: self.timeout,
            events: self.push_events.then(|| Arc::new(EventQueue::default())),
        })
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// HTTP command channel.
///
/// Writes go to `POST /api/setData`, polls read `POST /api/getRows` on
/// `settings:/victrola`. Change notifications come from the device's event
/// queue (`/api/event/modifyQueue` and `/api/event/pollQueue`) unless
/// disabled with [`HttpConfig::with_push_events`].
///
/// # Examples
///
/// ```no_run
/// use victrola_sync::command::DeviceCommand;
/// use victrola_sync::protocol::{CommandChannel, HttpConfig};
///
/// # async fn example() -> victrola_sync::Result<()> {
/// let client = HttpConfig::new("192.168.1.50").into_client()?;
/// let state = client.fetch_state().await.map_err(victrola_sync::Error::Poll)?;
/// println!("source: {:?}", state.source());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    timeout: Duration,
    events: Option<Arc<EventQueue>>,
}

impl HttpClient {
    /// Creates a client for the given host with default settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be created.
    pub fn new(host: impl Into<String>) -> crate::Result<Self> {
        HttpConfig::new(host).into_client()
    }

    /// Returns the base URL of the device.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the Sonos speakers offered by the device's quick-play menu.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the request fails or the body is not JSON.
    pub async fn fetch_quickplay_speakers(&self) -> Result<Vec<QuickplayRow>, CommandError> {
        let url = format!(
            "{}/api/getRows?path={}&roles=%40all&from=0&to=65535&type=structure",
            self.base_url,
            urlencoding::encode(QUICKPLAY_PATH)
        );

        tracing::debug!(url = %url, "Fetching quick-play speakers");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let rows: QuickplayRowsResponse = self.read_json(response).await?;
        Ok(rows.speakers())
    }

    async fn set_data(&self, request: &SetDataRequest) -> Result<(), CommandError> {
        tracing::debug!(path = request.path, value = %request.value, "Sending setData");

        let response = self
            .client
            .post(format!("{}/api/setData", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status(&response)?;
        Ok(())
    }

    async fn modify_event_queue(&self, body: &Value) -> Result<(), CommandError> {
        let response = self
            .client
            .post(format!("{}/api/event/modifyQueue", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status(&response)
    }

    /// Registers a queue and subscribes it to the watched paths.
    async fn open_event_queue(&self) -> Result<String, CommandError> {
        let queue_id = event_queue::new_queue_id();
        let nocache = Utc::now().timestamp_millis();
        self.modify_event_queue(&event_queue::create_body(nocache))
            .await?;
        self.modify_event_queue(&event_queue::subscribe_body(&queue_id, nocache + 1))
            .await?;
        tracing::debug!(queue = %queue_id, "Event queue registered");
        Ok(queue_id)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, CommandError> {
        Self::check_status(&response)?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed = serde_json::from_str(&body).map_err(crate::error::ParseError::from)?;
        Ok(parsed)
    }

    fn check_status(response: &Response) -> Result<(), CommandError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(CommandError::Rejected(format!(
            "HTTP {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )))
    }

    fn transport_error(&self, err: reqwest::Error) -> CommandError {
        if err.is_timeout() {
            CommandError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            CommandError::Unreachable(err.to_string())
        }
    }
}

impl CommandChannel for HttpClient {
    async fn send_command(&self, command: &DeviceCommand) -> Result<Ack, CommandError> {
        let requests = command.requests();
        for request in &requests {
            self.set_data(request).await?;
        }
        Ok(Ack {
            requests_sent: requests.len(),
        })
    }

    async fn fetch_state(&self) -> Result<DeviceState, CommandError> {
        let body = json!({
            "path": SETTINGS_PATH,
            "roles": ["value"],
            "from": 0,
            "to": SETTINGS_LAST_ROW,
        });

        let response = self
            .client
            .post(format!("{}/api/getRows", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let rows: SettingsRowsResponse = self.read_json(response).await?;

        tracing::debug!(rows = rows.len(), "Received settings rows");

        Ok(rows.to_device_state()?)
    }

    async fn next_changes(&self) -> Result<Vec<String>, CommandError> {
        let Some(queue) = &self.events else {
            return std::future::pending().await;
        };

        let mut current = queue.id.lock().await;
        let queue_id = match current.as_ref() {
            Some(queue_id) => queue_id.clone(),
            None => {
                let queue_id = self.open_event_queue().await?;
                *current = Some(queue_id.clone());
                queue_id
            }
        };

        let url = format!(
            "{}/api/event/pollQueue?queueId={}&timeout={}&_nocache={}",
            self.base_url,
            urlencoding::encode(&queue_id),
            event_queue::POLL_WAIT.as_millis(),
            Utc::now().timestamp_millis()
        );
        let response = match self
            .client
            .get(&url)
            .timeout(event_queue::POLL_WAIT + event_queue::POLL_GRACE)
            .send()
            .await
        {
            Ok(response) => response,
            // A quiet queue may hold the poll past its own deadline
            Err(e) if e.is_timeout() => return Ok(Vec::new()),
            Err(e) => return Err(self.transport_error(e)),
        };

        if response.status() == StatusCode::NOT_FOUND {
            *current = None;
            return Err(CommandError::Rejected("event queue expired".to_string()));
        }
        Self::check_status(&response)?;

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let paths: Vec<String> = event_queue::parse_events(&body)?
            .into_iter()
            .map(|event| event.path)
            .collect();
        if !paths.is_empty() {
            tracing::debug!(paths = ?paths, "Device reported changes");
        }
        Ok(paths)
    }

    async fn close_changes(&self) {
        let Some(queue) = &self.events else {
            return;
        };
        let Some(queue_id) = queue.id.lock().await.take() else {
            return;
        };

        let body = event_queue::unsubscribe_body(&queue_id, Utc::now().timestamp_millis());
        match self.modify_event_queue(&body).await {
            Ok(()) => tracing::debug!(queue = %queue_id, "Event queue released"),
            Err(e) => tracing::debug!(queue = %queue_id, error = %e, "Event queue release failed"),
        }
    }
}
