// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation tests against a scripted in-memory turntable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use victrola_sync::command::DeviceCommand;
use victrola_sync::error::{CommandError, ValueError};
use victrola_sync::event::SyncEvent;
use victrola_sync::protocol::{Ack, CommandChannel};
use victrola_sync::registry::{
    BackendSpeaker, BackendStatus, SpeakerBackend, StaticSpeakerBackend,
};
use victrola_sync::sync::{RebootOutcome, VerificationOutcome};
use victrola_sync::{
    Attribute, AttributeValue, AudioLatency, AudioQuality, ChangeRequest, ChangeState,
    ConnectionStatus, Device, DeviceState, Error, KnobBrightness, SourceType, SyncPolicy,
};

/// What the simulated turntable currently reports.
#[derive(Debug, Clone)]
struct Fields {
    source: SourceType,
    sonos_speaker: Option<String>,
    quality: AudioQuality,
    latency_ms: i64,
    brightness: i64,
    autoplay: bool,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            source: SourceType::Sonos,
            sonos_speaker: None,
            quality: AudioQuality::Standard,
            latency_ms: 0,
            brightness: 50,
            autoplay: false,
        }
    }
}

impl Fields {
    fn to_state(&self) -> DeviceState {
        let state = DeviceState::new(
            self.quality,
            AudioLatency::new(self.latency_ms).unwrap(),
            KnobBrightness::new(self.brightness).unwrap(),
        )
        .with_enabled_sources([self.source])
        .with_autoplay(self.autoplay);
        match &self.sonos_speaker {
            Some(id) => state.with_speaker(SourceType::Sonos, id.clone()),
            None => state,
        }
    }

    fn apply(&mut self, value: &AttributeValue) {
        match value {
            AttributeValue::Source(source) => self.source = *source,
            AttributeValue::Speaker { id, .. } => self.sonos_speaker = Some(id.clone()),
            AttributeValue::AudioQuality(quality) => self.quality = *quality,
            AttributeValue::AudioLatency(latency) => {
                self.latency_ms = i64::from(latency.snapped().millis());
            }
            AttributeValue::KnobBrightness(level) => self.brightness = i64::from(level.value()),
            AttributeValue::Autoplay(on) => self.autoplay = *on,
        }
    }
}

/// A turntable double that counts calls.
///
/// Writes take effect only while `applies_writes` is set; `offline` makes
/// every call fail as unreachable.
#[derive(Default)]
struct ScriptedChannel {
    fields: Mutex<Fields>,
    applies_writes: AtomicBool,
    offline: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    sends: AtomicUsize,
    fetches: AtomicUsize,
}

impl ScriptedChannel {
    fn obedient() -> Self {
        let channel = Self::default();
        channel.applies_writes.store(true, Ordering::SeqCst);
        channel
    }

    fn stubborn() -> Self {
        Self::default()
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CommandChannel for ScriptedChannel {
    async fn send_command(&self, command: &DeviceCommand) -> Result<Ack, CommandError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CommandError::Unreachable("connection refused".to_string()));
        }
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let DeviceCommand::Apply(value) = command
            && self.applies_writes.load(Ordering::SeqCst)
        {
            self.fields.lock().apply(value);
        }
        Ok(Ack {
            requests_sent: command.requests().len(),
        })
    }

    /// Answers with the fields as they were when the request arrived.
    async fn fetch_state(&self) -> Result<DeviceState, CommandError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.fields.lock().to_state();
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(CommandError::Unreachable("connection refused".to_string()));
        }
        Ok(snapshot)
    }
}

fn device(channel: ScriptedChannel) -> Device<ScriptedChannel> {
    Device::new(channel, "test turntable", SyncPolicy::default())
}

fn verifications(events: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    std::iter::from_fn(|| events.try_recv().ok())
        .filter(SyncEvent::is_verification)
        .collect()
}

// ============================================================================
// Verification
// ============================================================================

#[tokio::test]
async fn change_verified_on_first_poll() {
    let device = device(ScriptedChannel::obedient());

    device.set_audio_latency_ms(120).await.unwrap();
    assert_eq!(device.change_state(&Attribute::AudioLatency), ChangeState::Verifying);

    device.engine().poll_once().await;

    let result = device.verification(&Attribute::AudioLatency).unwrap();
    assert_eq!(result.outcome, VerificationOutcome::Verified);
    assert_eq!(result.attempts, 1);
    // The device stores the nearest preset.
    assert_eq!(
        result.observed,
        Some(AttributeValue::AudioLatency(AudioLatency::new(100).unwrap()))
    );
    assert_eq!(device.change_state(&Attribute::AudioLatency), ChangeState::Verified);
    assert_eq!(device.engine().channel().sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_read_before_acknowledgement_is_not_an_attempt() {
    let channel = ScriptedChannel::obedient();
    *channel.fetch_delay.lock() = Some(Duration::from_secs(1));
    let device = Device::new(
        channel,
        "test turntable",
        SyncPolicy::default().with_max_verification_attempts(1),
    );

    let (_, ticket) = tokio::join!(device.engine().poll_once(), async {
        tokio::task::yield_now().await;
        device.set_knob_brightness(80).await
    });
    ticket.unwrap();

    // The poll started while brightness was still 50.
    assert_eq!(device.state().unwrap().knob_brightness().value(), 50);
    assert_eq!(device.change_state(&Attribute::KnobBrightness), ChangeState::Verifying);
    assert_eq!(
        device
            .engine()
            .desired_change(&Attribute::KnobBrightness)
            .unwrap()
            .attempts(),
        0
    );

    device.engine().poll_once().await;
    let result = device.verification(&Attribute::KnobBrightness).unwrap();
    assert_eq!(result.outcome, VerificationOutcome::Verified);
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn drift_after_attempt_budget() {
    let device = device(ScriptedChannel::stubborn());
    let mut events = device.subscribe();

    device.set_knob_brightness(80).await.unwrap();

    for _ in 0..2 {
        device.engine().poll_once().await;
        assert_eq!(device.change_state(&Attribute::KnobBrightness), ChangeState::Verifying);
    }
    device.engine().poll_once().await;

    assert_eq!(device.change_state(&Attribute::KnobBrightness), ChangeState::Failed);
    let result = device.verification(&Attribute::KnobBrightness).unwrap();
    assert_eq!(result.outcome, VerificationOutcome::Drift);
    assert!(!result.verified);
    assert_eq!(result.attempts, 3);
    assert_eq!(
        result.observed,
        Some(AttributeValue::KnobBrightness(KnobBrightness::new(50).unwrap()))
    );
    assert_eq!(verifications(&mut events).len(), 1);

    // Nothing outstanding any more, so later polls publish nothing.
    device.engine().poll_once().await;
    assert!(verifications(&mut events).is_empty());
}

#[tokio::test]
async fn superseded_change_is_never_reported() {
    let device = device(ScriptedChannel::obedient());
    let mut events = device.subscribe();

    let first = device.set_audio_latency_ms(100).await.unwrap();
    let second = device.set_audio_latency_ms(200).await.unwrap();
    assert!(second.id > first.id);

    device.engine().poll_once().await;

    let reported = verifications(&mut events);
    assert_eq!(reported.len(), 1);
    let SyncEvent::Verification { result, .. } = &reported[0] else {
        panic!("expected a verification event");
    };
    assert_eq!(
        result.desired,
        AttributeValue::AudioLatency(AudioLatency::new(200).unwrap())
    );
    assert!(result.verified);
}

#[tokio::test]
async fn independent_attributes_verify_together() {
    let device = device(ScriptedChannel::obedient());

    device.set_audio_quality(AudioQuality::Lossless).await.unwrap();
    device.set_autoplay(true).await.unwrap();
    device.set_source(SourceType::Roon).await.unwrap();

    device.engine().poll_once().await;

    for attribute in [Attribute::AudioQuality, Attribute::Autoplay, Attribute::Source] {
        assert_eq!(device.change_state(&attribute), ChangeState::Verified);
    }
    assert_eq!(device.state().unwrap().source(), Some(SourceType::Roon));
}

#[tokio::test]
async fn failed_poll_does_not_consume_attempts() {
    let device = device(ScriptedChannel::stubborn());
    device.set_audio_latency_ms(300).await.unwrap();

    device.engine().channel().set_offline(true);
    for _ in 0..5 {
        assert!(device.refresh_state().await.is_err());
    }
    assert_eq!(device.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(device.change_state(&Attribute::AudioLatency), ChangeState::Verifying);
    assert_eq!(
        device
            .engine()
            .desired_change(&Attribute::AudioLatency)
            .unwrap()
            .attempts(),
        0
    );

    device.engine().channel().fields.lock().latency_ms = 250;
    device.engine().channel().set_offline(false);
    device.refresh_state().await.unwrap();

    let result = device.verification(&Attribute::AudioLatency).unwrap();
    assert!(result.verified);
    assert_eq!(result.attempts, 1);
    assert_eq!(device.connection_status(), ConnectionStatus::Connected);
}

// ============================================================================
// Rejected requests
// ============================================================================

#[tokio::test]
async fn out_of_range_value_sends_nothing() {
    let device = device(ScriptedChannel::obedient());

    let err = device.set_audio_latency_ms(501).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Value(ValueError::OutOfRange { actual: 501, .. })
    ));
    assert!(device.set_knob_brightness(-1).await.is_err());

    assert_eq!(device.engine().channel().sends(), 0);
    assert_eq!(device.change_state(&Attribute::AudioLatency), ChangeState::Idle);
}

#[tokio::test]
async fn unknown_speaker_sends_nothing() {
    let device = device(ScriptedChannel::obedient());
    device.register_backend(
        SourceType::Sonos,
        Arc::new(StaticSpeakerBackend::new([BackendSpeaker::new(
            "sonos-1", "Kitchen",
        )])),
    );
    device.refresh_speakers(SourceType::Sonos).await;

    let err = device
        .set_speaker(SourceType::Sonos, "sonos-42")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Value(ValueError::UnknownSpeaker { source_type: SourceType::Sonos, ref id }) if id == "sonos-42"
    ));
    assert_eq!(device.engine().channel().sends(), 0);

    device.set_speaker(SourceType::Sonos, "sonos-1").await.unwrap();
    device.engine().poll_once().await;
    assert_eq!(device.change_state(&Attribute::Speaker(SourceType::Sonos)), ChangeState::Verified);
}

#[tokio::test]
async fn speaker_gone_from_registry_is_not_verified() {
    #[derive(Debug)]
    struct Emptying(AtomicBool);

    #[async_trait::async_trait]
    impl SpeakerBackend for Emptying {
        async fn list_current_speakers(
            &self,
        ) -> Result<Vec<BackendSpeaker>, victrola_sync::BackendError> {
            if self.0.swap(true, Ordering::SeqCst) {
                Ok(Vec::new())
            } else {
                Ok(vec![BackendSpeaker::new("sonos-1", "Kitchen")])
            }
        }
    }

    let device = device(ScriptedChannel::obedient());
    device.register_backend(SourceType::Sonos, Arc::new(Emptying(AtomicBool::new(false))));
    device.refresh_speakers(SourceType::Sonos).await;

    device.set_speaker(SourceType::Sonos, "sonos-1").await.unwrap();
    device.refresh_speakers(SourceType::Sonos).await;

    device.engine().poll_once().await;
    assert_eq!(
        device.change_state(&Attribute::Speaker(SourceType::Sonos)),
        ChangeState::Verifying
    );
}

#[tokio::test]
async fn unreachable_device_fails_without_attempts() {
    let device = device(ScriptedChannel::obedient());
    device.engine().channel().set_offline(true);
    let mut events = device.subscribe();

    let err = device
        .request_change(ChangeRequest::Autoplay(true))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandDispatch(CommandError::Unreachable(_))));

    assert_eq!(device.change_state(&Attribute::Autoplay), ChangeState::Failed);
    let result = device.verification(&Attribute::Autoplay).unwrap();
    assert_eq!(result.attempts, 0);
    assert!(result.is_dispatch_failure());
    assert_eq!(verifications(&mut events).len(), 1);
}

// ============================================================================
// Speaker registry
// ============================================================================

#[tokio::test]
async fn missing_backend_leaves_other_sources_alone() {
    let device = device(ScriptedChannel::obedient());
    device.register_backend(
        SourceType::Upnp,
        Arc::new(StaticSpeakerBackend::new([
            BackendSpeaker::new("uuid:2", "office"),
            BackendSpeaker::new("uuid:1", "Den"),
        ])),
    );

    device.refresh_all_speakers().await;

    assert!(device.list_speakers(SourceType::Roon).is_empty());
    assert_eq!(
        device.registry().backend_status(SourceType::Roon),
        BackendStatus::NotConfigured
    );
    let upnp: Vec<_> = device
        .list_speakers(SourceType::Upnp)
        .into_iter()
        .map(|s| s.display_name)
        .collect();
    assert_eq!(upnp, ["Den", "office"]);
    assert_eq!(
        device.registry().backend_status(SourceType::Upnp),
        BackendStatus::Available { count: 2 }
    );
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn overlapping_refreshes_are_coalesced() {
    let channel = ScriptedChannel::obedient();
    *channel.fetch_delay.lock() = Some(Duration::from_secs(1));
    let device = device(channel);

    let (first, second) = tokio::join!(device.refresh_state(), async {
        tokio::task::yield_now().await;
        device.refresh_state().await
    });

    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_none());
    assert_eq!(device.engine().channel().fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn background_loop_verifies_at_accelerated_rate() {
    let device = device(ScriptedChannel::obedient());
    device.start().await;
    assert_eq!(device.engine().channel().fetches(), 1);

    device.set_autoplay(true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert_eq!(device.engine().channel().fetches(), 2);
    assert_eq!(device.change_state(&Attribute::Autoplay), ChangeState::Verified);

    // Back to the ambient interval.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(device.engine().channel().fetches(), 2);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reboot_reported_once_device_returns() {
    let device = Device::new(
        ScriptedChannel::obedient(),
        "test turntable",
        SyncPolicy::default().with_reboot_grace(Duration::from_secs(60)),
    );
    let mut events = device.subscribe();
    device.start().await;

    device.reboot().await.unwrap();
    assert!(device.engine().is_rebooting());
    device.engine().channel().set_offline(true);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(device.connection_status(), ConnectionStatus::Disconnected);

    device.engine().channel().set_offline(false);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(!device.engine().is_rebooting());
    let outcome = std::iter::from_fn(|| events.try_recv().ok()).find_map(|event| match event {
        SyncEvent::Reboot { outcome, .. } => Some(outcome),
        _ => None,
    });
    assert_eq!(outcome, Some(RebootOutcome::Reconnected));

    device.shutdown().await;
}
