// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Work a started device does besides polling.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::command::affects_reconciled_state;
use crate::protocol::CommandChannel;
use crate::registry::SpeakerEntry;
use crate::response::QUICKPLAY_PATH;
use crate::sync::ReconciliationEngine;
use crate::types::SourceType;

/// Base delay after a broken change stream. Grows with each failure in a row.
const CHANGE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Failures in a row after which the retry delay stops growing.
const CHANGE_RETRY_STEPS: u32 = 3;

/// Refreshes one source and announces its speaker count.
pub(super) async fn refresh_speakers<C: CommandChannel>(
    engine: &ReconciliationEngine<C>,
    source: SourceType,
) -> Vec<SpeakerEntry> {
    let speakers = engine.registry().refresh(source).await;
    engine.publisher().publish_speakers(source, speakers.len());
    speakers
}

/// Refreshes one source, announcing only a list that differs.
async fn refresh_if_changed<C: CommandChannel>(engine: &ReconciliationEngine<C>, source: SourceType) {
    let before = engine.registry().list_speakers(source);
    let after = engine.registry().refresh(source).await;
    if after != before {
        tracing::debug!(source = %source, count = after.len(), "Speaker list changed");
        engine.publisher().publish_speakers(source, after.len());
    }
}

/// Keeps the speaker lists current until dropped.
///
/// Every source is refreshed on the ambient poll interval. The sources in
/// `signals` are also refreshed each time their backend signals a change.
pub(super) async fn watch_speakers<C: CommandChannel>(
    engine: &ReconciliationEngine<C>,
    signals: Vec<(SourceType, watch::Receiver<()>)>,
) {
    let (tx, mut rx) = mpsc::channel(SourceType::ALL.len());
    let mut forwarders = JoinSet::new();
    for (source, mut changes) in signals {
        let tx = tx.clone();
        forwarders.spawn(async move {
            while changes.changed().await.is_ok() {
                if tx.send(source).await.is_err() {
                    break;
                }
            }
        });
    }

    let period = engine.policy().ambient_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::join!(
                    refresh_if_changed(engine, SourceType::Roon),
                    refresh_if_changed(engine, SourceType::Sonos),
                    refresh_if_changed(engine, SourceType::Upnp),
                    refresh_if_changed(engine, SourceType::Bluetooth),
                );
            }
            // `tx` stays alive here, so the channel never closes
            Some(source) = rx.recv() => {
                tracing::debug!(source = %source, "Speaker backend signalled a change");
                refresh_if_changed(engine, source).await;
            }
        }
    }
}

/// Follows the channel's change notifications until dropped.
///
/// A change to a reconciled setting triggers a poll; a change to the
/// quick-play rows refreshes the Sonos speakers.
pub(super) async fn follow_changes<C: CommandChannel>(engine: &ReconciliationEngine<C>) {
    let mut failures = 0u32;
    loop {
        match engine.channel().next_changes().await {
            Ok(paths) => {
                failures = 0;
                if paths.iter().any(|path| path == QUICKPLAY_PATH) {
                    refresh_if_changed(engine, SourceType::Sonos).await;
                }
                if paths.iter().any(|path| affects_reconciled_state(path)) {
                    engine.poll_once().await;
                }
            }
            Err(e) => {
                failures += 1;
                let delay = CHANGE_RETRY_DELAY * failures.min(CHANGE_RETRY_STEPS);
                tracing::warn!(
                    error = %e,
                    failures,
                    retry_in = ?delay,
                    "Change notifications interrupted"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::command::DeviceCommand;
    use crate::error::CommandError;
    use crate::event::{DeviceId, EventBus};
    use crate::manager::SyncPolicy;
    use crate::protocol::Ack;
    use crate::registry::SpeakerRegistry;
    use crate::state::{DeviceState, StatePublisher};
    use crate::types::{AudioLatency, AudioQuality, KnobBrightness};

    /// Replays scripted notifications, then goes quiet.
    #[derive(Default)]
    struct NotifyingChannel {
        script: Mutex<VecDeque<Result<Vec<String>, CommandError>>>,
        fetches: AtomicUsize,
    }

    impl CommandChannel for NotifyingChannel {
        async fn send_command(&self, command: &DeviceCommand) -> Result<Ack, CommandError> {
            Ok(Ack {
                requests_sent: command.requests().len(),
            })
        }

        async fn fetch_state(&self) -> Result<DeviceState, CommandError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(DeviceState::new(
                AudioQuality::Standard,
                AudioLatency::MIN,
                KnobBrightness::MAX,
            ))
        }

        async fn next_changes(&self) -> Result<Vec<String>, CommandError> {
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn engine(script: Vec<Result<Vec<String>, CommandError>>) -> ReconciliationEngine<NotifyingChannel> {
        ReconciliationEngine::new(
            Arc::new(NotifyingChannel {
                script: Mutex::new(script.into()),
                fetches: AtomicUsize::new(0),
            }),
            Arc::new(SpeakerRegistry::new()),
            StatePublisher::new(DeviceId::new(), EventBus::new()),
            SyncPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reconciled_paths_trigger_a_poll() {
        let engine = engine(vec![
            Ok(vec!["player:volume".to_string()]),
            Ok(Vec::new()),
            Ok(vec!["settings:/victrola/lightBrightness".to_string()]),
        ]);

        let _ = tokio::time::timeout(Duration::from_secs(1), follow_changes(&engine)).await;

        assert_eq!(engine.channel().fetches.load(Ordering::SeqCst), 1);
        assert!(engine.publisher().device_state().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn broken_stream_backs_off() {
        let engine = engine(vec![
            Err(CommandError::Rejected("event queue expired".to_string())),
            Err(CommandError::Unreachable("refused".to_string())),
            Ok(vec!["settings:/victrola/autoplay".to_string()]),
        ]);

        // 5 s after the first failure, 10 s after the second.
        let _ = tokio::time::timeout(Duration::from_secs(14), follow_changes(&engine)).await;
        assert_eq!(engine.channel().fetches.load(Ordering::SeqCst), 0);

        let _ = tokio::time::timeout(Duration::from_secs(2), follow_changes(&engine)).await;
        assert_eq!(engine.channel().fetches.load(Ordering::SeqCst), 1);
    }
}
