// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reconciliation engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;

use crate::command::DeviceCommand;
use crate::error::{Error, Result};
use crate::manager::SyncPolicy;
use crate::protocol::CommandChannel;
use crate::registry::SpeakerRegistry;
use crate::state::{Attribute, AttributeValue, DeviceState, StatePublisher};

use super::{
    ChangeRequest, ChangeState, ChangeTicket, DesiredChange, DevicePoller, PollOutcome,
    RebootOutcome, VerificationOutcome, VerificationResult,
};

#[derive(Debug, Clone, Copy)]
struct RebootWatch {
    deadline: Instant,
    saw_disconnect: bool,
}

/// Drives requested changes to a verified or failed end state.
///
/// Every attribute has its own lifecycle:
///
/// ```text
/// Idle -> Pending -> Verifying -> Verified
///            |           |
///            +-----------+------> Failed
/// ```
///
/// A request is validated, dispatched and acknowledged before
/// [`request_change`](Self::request_change) returns. Each later successful
/// poll counts as one verification attempt; the change is verified on the
/// first poll reporting the desired value and drifts once the attempt
/// budget is spent. Failed polls leave the attempts untouched.
///
/// A new request for an attribute supersedes the previous one, which then
/// never publishes a result. Changes to different attributes never wait on
/// each other.
pub struct ReconciliationEngine<C> {
    channel: Arc<C>,
    poller: DevicePoller<C>,
    registry: Arc<SpeakerRegistry>,
    publisher: StatePublisher,
    policy: SyncPolicy,
    changes: Mutex<HashMap<Attribute, DesiredChange>>,
    reboot: Mutex<Option<RebootWatch>>,
    next_id: AtomicU64,
    wake: Notify,
}

impl<C: CommandChannel> ReconciliationEngine<C> {
    /// Creates an engine for one device.
    #[must_use]
    pub fn new(
        channel: Arc<C>,
        registry: Arc<SpeakerRegistry>,
        publisher: StatePublisher,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            poller: DevicePoller::new(Arc::clone(&channel)),
            channel,
            registry,
            publisher,
            policy,
            changes: Mutex::new(HashMap::new()),
            reboot: Mutex::new(None),
            next_id: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    /// Returns the command channel.
    #[must_use]
    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Returns the speaker registry used to validate speaker selections.
    #[must_use]
    pub fn registry(&self) -> &Arc<SpeakerRegistry> {
        &self.registry
    }

    /// Returns the publisher receiving snapshots and results.
    #[must_use]
    pub fn publisher(&self) -> &StatePublisher {
        &self.publisher
    }

    /// Returns the sync policy.
    #[must_use]
    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Returns the lifecycle state of an attribute.
    #[must_use]
    pub fn change_state(&self, attribute: &Attribute) -> ChangeState {
        self.changes
            .lock()
            .get(attribute)
            .map_or(ChangeState::Idle, DesiredChange::state)
    }

    /// Returns the latest change requested for an attribute.
    #[must_use]
    pub fn desired_change(&self, attribute: &Attribute) -> Option<DesiredChange> {
        self.changes.lock().get(attribute).cloned()
    }

    /// Returns `true` while a reboot's grace window is open.
    #[must_use]
    pub fn is_rebooting(&self) -> bool {
        self.reboot.lock().is_some()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Validates and dispatches a change.
    ///
    /// On success the attribute is `Verifying` and the next polls are
    /// accelerated. The verification result is published later. Polls that
    /// were already running when the device acknowledged the command never
    /// count as verification attempts.
    ///
    /// Dropping the returned future before the device answers ends the
    /// change as `Failed` with [`VerificationOutcome::Abandoned`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the value is out of range or names a speaker
    /// the registry does not list; nothing is sent in that case. Returns
    /// `Error::CommandDispatch` if the device could not be reached or
    /// rejected the command; the attribute is then `Failed` with no attempt
    /// consumed.
    pub async fn request_change(&self, request: ChangeRequest) -> Result<ChangeTicket> {
        let value = request.validate(&self.registry)?;
        let attribute = value.attribute();
        let change = DesiredChange::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1, value);
        let ticket = ChangeTicket::from(&change);

        let superseded = self.changes.lock().insert(attribute, change);
        if let Some(previous) = superseded.filter(|c| c.state().is_outstanding()) {
            tracing::debug!(
                attribute = %attribute,
                previous = %previous.value(),
                "Superseding outstanding change"
            );
        }

        tracing::debug!(attribute = %attribute, value = %ticket.desired, "Dispatching change");

        let guard = PendingDispatch {
            engine: self,
            ticket: Some(&ticket),
        };
        let sent = self
            .channel
            .send_command(&DeviceCommand::Apply(ticket.desired.clone()))
            .await;
        guard.settle();

        match sent {
            Ok(ack) => {
                tracing::debug!(
                    attribute = %attribute,
                    requests = ack.requests_sent,
                    "Change acknowledged"
                );
                let fetch = self.poller.fetch_count();
                if let Some(change) = self.changes.lock().get_mut(&attribute)
                    && change.id == ticket.id
                {
                    change.state = ChangeState::Verifying;
                    change.acked_after_fetch = fetch;
                }
                self.wake.notify_one();
                Ok(ticket)
            }
            Err(e) => {
                tracing::warn!(attribute = %attribute, error = %e, "Change dispatch failed");
                self.fail_unverified(&ticket, VerificationOutcome::DispatchFailed(e.kind()));
                Err(Error::CommandDispatch(e))
            }
        }
    }

    /// Sends the reboot command and watches for the device to come back.
    ///
    /// The outcome is published as a [`RebootOutcome`] once a poll sees the
    /// device return or the grace window closes. Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns `Error::CommandDispatch` if the command could not be sent.
    pub async fn reboot(&self) -> Result<()> {
        tracing::info!("Rebooting device");
        self.channel
            .send_command(&DeviceCommand::Reboot)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Reboot dispatch failed");
                Error::CommandDispatch(e)
            })?;

        *self.reboot.lock() = Some(RebootWatch {
            deadline: Instant::now() + self.policy.reboot_grace,
            saw_disconnect: false,
        });
        self.wake.notify_one();
        Ok(())
    }

    /// Polls now and returns the fresh snapshot.
    ///
    /// Returns `Ok(None)` if another poll was already in flight.
    ///
    /// # Errors
    ///
    /// Returns `Error::Poll` if the device could not be read.
    pub async fn refresh_state(&self) -> Result<Option<DeviceState>> {
        match self.poll_once().await {
            PollOutcome::Fetched(state) => Ok(Some(state)),
            PollOutcome::Failed(e) => Err(Error::Poll(e)),
            PollOutcome::Coalesced => Ok(None),
        }
    }

    /// Runs one poll and applies its result.
    pub async fn poll_once(&self) -> PollOutcome {
        let (fetch, outcome) = self.poller.poll_numbered().await;
        self.apply(fetch, &outcome);
        outcome
    }

    // ========================================================================
    // Poll loop
    // ========================================================================

    /// Returns the delay before the next scheduled poll.
    ///
    /// Polling is accelerated while any change is outstanding or a reboot
    /// is being watched.
    #[must_use]
    pub fn next_poll_delay(&self) -> Duration {
        let outstanding = self
            .changes
            .lock()
            .values()
            .any(|c| c.state().is_outstanding());
        if outstanding || self.is_rebooting() {
            self.policy.accelerated_interval
        } else {
            self.policy.ambient_interval
        }
    }

    /// Polls on schedule until `shutdown` fires or its sender is dropped.
    ///
    /// A dispatched change or reboot wakes the loop so the accelerated
    /// interval applies at once.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        tracing::debug!(device = %self.publisher.device_id(), "Poll loop started");
        loop {
            let delay = self.next_poll_delay();
            tokio::select! {
                _ = &mut shutdown => break,
                () = self.wake.notified() => {}
                () = tokio::time::sleep(delay) => {
                    self.poll_once().await;
                }
            }
        }
        tracing::debug!(device = %self.publisher.device_id(), "Poll loop stopped");
    }

    // ========================================================================
    // Applying poll results
    // ========================================================================

    fn apply(&self, fetch: u64, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Fetched(state) => {
                self.publisher.publish_state(state.clone());
                self.observe_reboot(true);
                for result in self.reconcile(fetch, state) {
                    if result.verified {
                        tracing::info!(
                            attribute = %result.attribute,
                            attempts = result.attempts,
                            "Change verified"
                        );
                    } else {
                        tracing::warn!(
                            attribute = %result.attribute,
                            desired = %result.desired,
                            observed = ?result.observed,
                            attempts = result.attempts,
                            "Change drifted"
                        );
                    }
                    self.publisher.publish_verification(result);
                }
            }
            PollOutcome::Failed(e) => {
                self.publisher.mark_disconnected(e);
                self.observe_reboot(false);
            }
            PollOutcome::Coalesced => {}
        }
    }

    /// Compares a snapshot read by fetch number `fetch` against every
    /// change in `Verifying`.
    fn reconcile(&self, fetch: u64, state: &DeviceState) -> Vec<VerificationResult> {
        let max_attempts = self.policy.max_verification_attempts;
        let mut finished = Vec::new();

        let mut changes = self.changes.lock();
        for (attribute, change) in changes.iter_mut() {
            if change.state != ChangeState::Verifying {
                continue;
            }
            if fetch <= change.acked_after_fetch {
                tracing::debug!(
                    attribute = %attribute,
                    fetch,
                    "Snapshot predates the acknowledgement"
                );
                continue;
            }
            change.attempts += 1;

            let observed = state.value_of(attribute);
            let outcome = if self.is_satisfied(&change.value, state) {
                change.state = ChangeState::Verified;
                VerificationOutcome::Verified
            } else if change.attempts >= max_attempts {
                change.state = ChangeState::Failed;
                VerificationOutcome::Drift
            } else {
                tracing::debug!(
                    attribute = %attribute,
                    attempts = change.attempts,
                    "Change not yet reported"
                );
                continue;
            };

            finished.push(VerificationResult::new(
                change.value.clone(),
                observed,
                change.attempts,
                outcome,
            ));
        }
        finished
    }

    /// Latency matches at preset granularity. A source matches only when it
    /// is the one enabled source, and a speaker that left its source's list
    /// never matches.
    fn is_satisfied(&self, desired: &AttributeValue, state: &DeviceState) -> bool {
        match desired {
            AttributeValue::Source(source) => {
                state.enabled_sources().len() == 1 && state.is_source_enabled(*source)
            }
            AttributeValue::Speaker { source, id } => {
                state.speaker(*source) == Some(id.as_str()) && self.registry.contains(*source, id)
            }
            AttributeValue::AudioLatency(latency) => {
                latency.same_preset(&state.audio_latency())
            }
            _ => state.value_of(&desired.attribute()).as_ref() == Some(desired),
        }
    }

    fn observe_reboot(&self, connected: bool) {
        let now = Instant::now();
        let outcome = {
            let mut reboot = self.reboot.lock();
            let Some(watch) = reboot.as_mut() else {
                return;
            };

            let outcome = if connected {
                if watch.saw_disconnect {
                    Some(RebootOutcome::Reconnected)
                } else {
                    (now >= watch.deadline).then_some(RebootOutcome::NoRestartObserved)
                }
            } else {
                watch.saw_disconnect = true;
                (now >= watch.deadline).then_some(RebootOutcome::DidNotReconnect)
            };
            if outcome.is_some() {
                *reboot = None;
            }
            outcome
        };

        if let Some(outcome) = outcome {
            if outcome == RebootOutcome::Reconnected {
                tracing::info!(outcome = %outcome, "Reboot finished");
            } else {
                tracing::warn!(outcome = %outcome, "Reboot finished");
            }
            self.publisher.publish_reboot(outcome);
        }
    }

    /// Ends a change that never reached `Verifying`, unless it was
    /// superseded meanwhile.
    fn fail_unverified(&self, ticket: &ChangeTicket, outcome: VerificationOutcome) {
        let current = match self.changes.lock().get_mut(&ticket.attribute) {
            Some(change) if change.id == ticket.id => {
                change.state = ChangeState::Failed;
                true
            }
            _ => false,
        };
        if current {
            let observed = self
                .publisher
                .device_state()
                .and_then(|state| state.value_of(&ticket.attribute));
            self.publisher.publish_verification(VerificationResult::new(
                ticket.desired.clone(),
                observed,
                0,
                outcome,
            ));
        }
    }
}

/// Fails a dispatch whose future was dropped before the device answered.
struct PendingDispatch<'a, C: CommandChannel> {
    engine: &'a ReconciliationEngine<C>,
    ticket: Option<&'a ChangeTicket>,
}

impl<C: CommandChannel> PendingDispatch<'_, C> {
    fn settle(mut self) {
        self.ticket = None;
    }
}

impl<C: CommandChannel> Drop for PendingDispatch<'_, C> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            tracing::warn!(attribute = %ticket.attribute, "Change dispatch abandoned");
            self.engine
                .fail_unverified(ticket, VerificationOutcome::Abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::error::CommandError;
    use crate::event::{DeviceId, EventBus, SyncEvent};
    use crate::protocol::Ack;
    use crate::types::{AudioLatency, AudioQuality, KnobBrightness, SourceType};

    #[derive(Default)]
    struct FlakyChannel {
        offline: AtomicBool,
        stalled: AtomicBool,
        enabled: Mutex<Vec<SourceType>>,
    }

    impl CommandChannel for FlakyChannel {
        async fn send_command(&self, command: &DeviceCommand) -> std::result::Result<Ack, CommandError> {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(Ack {
                requests_sent: command.requests().len(),
            })
        }

        async fn fetch_state(&self) -> std::result::Result<DeviceState, CommandError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(CommandError::Unreachable("connection refused".to_string()));
            }
            Ok(DeviceState::new(
                AudioQuality::Standard,
                AudioLatency::MIN,
                KnobBrightness::MAX,
            )
            .with_enabled_sources(self.enabled.lock().clone()))
        }
    }

    fn engine() -> ReconciliationEngine<FlakyChannel> {
        ReconciliationEngine::new(
            Arc::new(FlakyChannel::default()),
            Arc::new(SpeakerRegistry::new()),
            StatePublisher::new(DeviceId::new(), EventBus::new()),
            SyncPolicy::default().with_reboot_grace(Duration::from_secs(30)),
        )
    }

    fn reboot_outcome(
        events: &mut tokio::sync::broadcast::Receiver<SyncEvent>,
    ) -> Option<RebootOutcome> {
        std::iter::from_fn(|| events.try_recv().ok()).find_map(|event| match event {
            SyncEvent::Reboot { outcome, .. } => Some(outcome),
            _ => None,
        })
    }

    #[tokio::test]
    async fn polling_accelerates_while_verifying() {
        let engine = engine();
        assert_eq!(engine.next_poll_delay(), Duration::from_secs(30));

        engine
            .request_change(ChangeRequest::KnobBrightness(40))
            .await
            .unwrap();
        assert_eq!(
            engine.change_state(&Attribute::KnobBrightness),
            ChangeState::Verifying
        );
        assert_eq!(engine.next_poll_delay(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_dispatch_is_abandoned() {
        let engine = engine();
        engine.channel().stalled.store(true, Ordering::SeqCst);
        let mut events = engine.publisher().subscribe();

        let request = engine.request_change(ChangeRequest::KnobBrightness(10));
        assert!(
            tokio::time::timeout(Duration::from_secs(5), request)
                .await
                .is_err()
        );

        assert_eq!(
            engine.change_state(&Attribute::KnobBrightness),
            ChangeState::Failed
        );
        assert_eq!(engine.next_poll_delay(), Duration::from_secs(30));
        let result = engine.publisher().verification(&Attribute::KnobBrightness).unwrap();
        assert_eq!(result.outcome, VerificationOutcome::Abandoned);
        assert_eq!(result.attempts, 0);
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn abandoned_dispatch_leaves_newer_change_alone() {
        let engine = engine();
        engine.channel().stalled.store(true, Ordering::SeqCst);

        {
            let request = std::pin::pin!(engine.request_change(ChangeRequest::Autoplay(true)));
            // Runs up to the stalled send, then drops the request.
            assert!(first_poll(request).await.is_none());
        }
        assert_eq!(engine.change_state(&Attribute::Autoplay), ChangeState::Failed);

        engine.channel().stalled.store(false, Ordering::SeqCst);
        let ticket = engine
            .request_change(ChangeRequest::Autoplay(false))
            .await
            .unwrap();
        assert_eq!(engine.desired_change(&Attribute::Autoplay).unwrap().id(), ticket.id);
        assert_eq!(engine.change_state(&Attribute::Autoplay), ChangeState::Verifying);
    }

    async fn first_poll<F: Future + Unpin>(mut future: F) -> Option<F::Output> {
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut future).poll(cx) {
                std::task::Poll::Ready(output) => Some(output),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }

    #[tokio::test]
    async fn source_verifies_only_when_exclusive() {
        let engine = engine();
        *engine.channel().enabled.lock() = vec![SourceType::Roon, SourceType::Sonos];

        engine
            .request_change(ChangeRequest::Source(SourceType::Roon))
            .await
            .unwrap();
        engine.poll_once().await;
        assert_eq!(engine.change_state(&Attribute::Source), ChangeState::Verifying);

        *engine.channel().enabled.lock() = vec![SourceType::Roon];
        engine.poll_once().await;
        assert_eq!(engine.change_state(&Attribute::Source), ChangeState::Verified);
    }

    #[tokio::test]
    async fn latency_verifies_at_preset_granularity() {
        let engine = engine();

        // The device reports the `min` preset.
        engine
            .request_change(ChangeRequest::AudioLatencyMs(30))
            .await
            .unwrap();
        engine.poll_once().await;
        assert_eq!(
            engine.change_state(&Attribute::AudioLatency),
            ChangeState::Verified
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_reconnects_after_outage() {
        let engine = engine();
        let mut events = engine.publisher().subscribe();

        engine.reboot().await.unwrap();
        assert!(engine.is_rebooting());
        assert_eq!(engine.next_poll_delay(), Duration::from_secs(2));

        engine.channel().offline.store(true, Ordering::SeqCst);
        engine.poll_once().await;
        assert!(engine.is_rebooting());

        engine.channel().offline.store(false, Ordering::SeqCst);
        engine.poll_once().await;
        assert!(!engine.is_rebooting());
        assert_eq!(
            reboot_outcome(&mut events),
            Some(RebootOutcome::Reconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_that_never_returns() {
        let engine = engine();
        let mut events = engine.publisher().subscribe();

        engine.reboot().await.unwrap();
        engine.channel().offline.store(true, Ordering::SeqCst);
        engine.poll_once().await;

        tokio::time::advance(Duration::from_secs(31)).await;
        engine.poll_once().await;

        assert!(!engine.is_rebooting());
        assert_eq!(
            reboot_outcome(&mut events),
            Some(RebootOutcome::DidNotReconnect)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_without_visible_restart() {
        let engine = engine();
        let mut events = engine.publisher().subscribe();

        engine.reboot().await.unwrap();
        engine.poll_once().await;
        assert!(engine.is_rebooting());

        tokio::time::advance(Duration::from_secs(31)).await;
        engine.poll_once().await;
        assert_eq!(
            reboot_outcome(&mut events),
            Some(RebootOutcome::NoRestartObserved)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let engine = Arc::new(engine());
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.run(rx).await }
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(engine.publisher().device_state().is_some());

        tx.send(()).unwrap();
        task.await.unwrap();
    }
}
