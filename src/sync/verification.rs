// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Verification and reboot outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommandErrorKind;
use crate::state::{Attribute, AttributeValue};

/// How a requested change ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// A poll reported the desired value.
    Verified,
    /// Every poll within the attempt budget reported another value.
    Drift,
    /// The command never reached the device.
    DispatchFailed(CommandErrorKind),
    /// The request was dropped before the device answered, so whether the
    /// command arrived is unknown.
    Abandoned,
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => f.write_str("verified"),
            Self::Drift => f.write_str("drift"),
            Self::DispatchFailed(kind) => write!(f, "dispatch failed ({kind:?})"),
            Self::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// The final result of one requested change.
///
/// # Examples
///
/// ```
/// use victrola_sync::sync::{VerificationOutcome, VerificationResult};
/// use victrola_sync::state::AttributeValue;
///
/// let result = VerificationResult::new(
///     AttributeValue::Autoplay(true),
///     Some(AttributeValue::Autoplay(true)),
///     1,
///     VerificationOutcome::Verified,
/// );
/// assert!(result.verified);
/// assert!(!result.is_drift());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// The attribute that was changed.
    pub attribute: Attribute,
    /// The requested value.
    pub desired: AttributeValue,
    /// The value last reported by the device, if any.
    pub observed: Option<AttributeValue>,
    /// Whether the device reported the desired value.
    pub verified: bool,
    /// Polls compared against the desired value.
    pub attempts: u32,
    /// How the change ended.
    pub outcome: VerificationOutcome,
    /// When the change ended.
    pub completed_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Creates a result completed now.
    #[must_use]
    pub fn new(
        desired: AttributeValue,
        observed: Option<AttributeValue>,
        attempts: u32,
        outcome: VerificationOutcome,
    ) -> Self {
        Self {
            attribute: desired.attribute(),
            desired,
            observed,
            verified: outcome == VerificationOutcome::Verified,
            attempts,
            outcome,
            completed_at: Utc::now(),
        }
    }

    /// Returns `true` if the device kept reporting another value.
    #[must_use]
    pub fn is_drift(&self) -> bool {
        self.outcome == VerificationOutcome::Drift
    }

    /// Returns `true` if the command could not be delivered.
    #[must_use]
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self.outcome, VerificationOutcome::DispatchFailed(_))
    }
}

/// How a reboot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebootOutcome {
    /// The device went away and answered again within the grace window.
    Reconnected,
    /// The device went away and was still unreachable when the window closed.
    DidNotReconnect,
    /// The device answered every poll; no restart was seen.
    NoRestartObserved,
}

impl fmt::Display for RebootOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnected => f.write_str("reconnected"),
            Self::DidNotReconnect => f.write_str("did not reconnect"),
            Self::NoRestartObserved => f.write_str("no restart observed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnobBrightness;

    #[test]
    fn drift_result() {
        let result = VerificationResult::new(
            AttributeValue::KnobBrightness(KnobBrightness::new(40).unwrap()),
            Some(AttributeValue::KnobBrightness(KnobBrightness::new(80).unwrap())),
            3,
            VerificationOutcome::Drift,
        );
        assert!(!result.verified);
        assert!(result.is_drift());
        assert_eq!(result.attribute, Attribute::KnobBrightness);
    }

    #[test]
    fn dispatch_failure_result() {
        let result = VerificationResult::new(
            AttributeValue::Autoplay(false),
            None,
            0,
            VerificationOutcome::DispatchFailed(CommandErrorKind::Unreachable),
        );
        assert!(result.is_dispatch_failure());
        assert!(!result.verified);
        assert_eq!(
            result.outcome.to_string(),
            "dispatch failed (Unreachable)"
        );
    }
}
