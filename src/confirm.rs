//! Confirmation-Gated Action
//!
//! A destructive action only runs after the operator retypes the target's
//! identifying text exactly. The expected text is captured when the gate
//! opens, so a concurrent rename does not change what must be typed.
//!
//! ```text
//! Idle -> Open -> Open       (mismatch, error message set)
//!              -> Idle       (cancel)
//!              -> Executing -> Idle  (action settled)
//! ```

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use serde_json::Value;

use crate::error::{ApiError, ConfirmError};
use crate::mutation::{MutationOp, ResourceMutation};
use crate::resource::{Record, ResourceDescriptor, record_id};

/// An open request to confirm a destructive action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationChallenge {
    pub target_id: String,
    pub expected_text: String,
    pub typed_text: String,
    pub error_message: Option<String>,
}

impl ConfirmationChallenge {
    fn new(target_id: String, expected_text: String) -> Self {
        Self {
            target_id,
            expected_text,
            typed_text: String::new(),
            error_message: None,
        }
    }

    /// Exact byte comparison; case and whitespace count
    pub fn matches(&self) -> bool {
        self.typed_text == self.expected_text
    }

    fn mismatch_message(&self) -> String {
        format!("type '{}'", self.expected_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmState {
    Idle,
    Open(ConfirmationChallenge),
    Executing { target_id: String },
}

/// What happens to the dialog when the confirmed action fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Tear down after any settlement; the operator must reopen and retype
    #[default]
    CloseOnFailure,
    /// Return to Open with the failure as the error message and typed text cleared
    KeepOpenOnFailure,
}

/// Result of [`ConfirmationGate::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<R> {
    /// Typed text did not match; nothing ran and the challenge stays open
    Mismatch { message: String },
    /// The action ran with the target id and settled
    Executed(Result<R, ApiError>),
}

impl<R> SubmitOutcome<R> {
    pub fn is_executed(&self) -> bool {
        matches!(self, SubmitOutcome::Executed(_))
    }
}

/// Typed-confirmation state machine for one resource kind
#[derive(Debug)]
pub struct ConfirmationGate {
    descriptor: ResourceDescriptor,
    policy: FailurePolicy,
    state: Mutex<ConfirmState>,
}

/// Leaves Executing if the submitting future is dropped before settlement
struct ExecutingGuard<'a> {
    gate: &'a ConfirmationGate,
    armed: bool,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.gate.lock() = ConfirmState::Idle;
        }
    }
}

impl ConfirmationGate {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            policy: FailurePolicy::default(),
            state: Mutex::new(ConfirmState::Idle),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, ConfirmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConfirmState {
        self.lock().clone()
    }

    /// The open challenge, if any
    pub fn challenge(&self) -> Option<ConfirmationChallenge> {
        match &*self.lock() {
            ConfirmState::Open(challenge) => Some(challenge.clone()),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(*self.lock(), ConfirmState::Idle)
    }

    /// Open a challenge for `target_id`, requiring `expected_text` to be typed
    pub fn open(&self, target_id: impl Into<String>, expected_text: impl Into<String>) -> Result<(), ConfirmError> {
        let mut state = self.lock();
        match &*state {
            ConfirmState::Idle => {}
            ConfirmState::Open(challenge) => {
                return Err(ConfirmError::AlreadyOpen(challenge.target_id.clone()));
            }
            ConfirmState::Executing { target_id } => {
                return Err(ConfirmError::Busy(target_id.clone()));
            }
        }

        let challenge = ConfirmationChallenge::new(target_id.into(), expected_text.into());
        debug!(
            "Confirmation opened for {} {}",
            self.descriptor.type_name(),
            challenge.target_id
        );
        *state = ConfirmState::Open(challenge);
        Ok(())
    }

    /// Open a challenge for `record`, expecting its identifying field
    pub fn open_for(&self, record: &Record) -> Result<(), ConfirmError> {
        let id = record_id(record).ok_or(ConfirmError::MissingId)?;
        let expected = self.descriptor.identity_text(record).unwrap_or_else(|| id.clone());
        self.open(id, expected)
    }

    /// Record what the operator has typed so far
    pub fn type_text(&self, text: impl Into<String>) -> Result<(), ConfirmError> {
        match &mut *self.lock() {
            ConfirmState::Open(challenge) => {
                challenge.typed_text = text.into();
                Ok(())
            }
            ConfirmState::Executing { target_id } => Err(ConfirmError::Busy(target_id.clone())),
            ConfirmState::Idle => Err(ConfirmError::NotOpen),
        }
    }

    /// Close the challenge without side effects
    pub fn cancel(&self) -> Result<(), ConfirmError> {
        let mut state = self.lock();
        match &*state {
            ConfirmState::Executing { target_id } => Err(ConfirmError::Busy(target_id.clone())),
            _ => {
                *state = ConfirmState::Idle;
                Ok(())
            }
        }
    }

    /// Run `action` with the target id if the typed text matches.
    ///
    /// On a mismatch the challenge stays open with its error message set and
    /// `action` is not called.
    pub async fn submit<F, Fut, R>(&self, action: F) -> Result<SubmitOutcome<R>, ConfirmError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<R, ApiError>>,
    {
        let challenge = {
            let mut state = self.lock();
            let challenge = match &mut *state {
                ConfirmState::Open(challenge) => challenge,
                ConfirmState::Executing { target_id } => return Err(ConfirmError::Busy(target_id.clone())),
                ConfirmState::Idle => return Err(ConfirmError::NotOpen),
            };

            if !challenge.matches() {
                let message = challenge.mismatch_message();
                challenge.error_message = Some(message.clone());
                debug!("Confirmation text mismatch for {}", challenge.target_id);
                return Ok(SubmitOutcome::Mismatch { message });
            }

            let challenge = challenge.clone();
            *state = ConfirmState::Executing {
                target_id: challenge.target_id.clone(),
            };
            challenge
        };

        let mut guard = ExecutingGuard {
            gate: self,
            armed: true,
        };

        debug!(
            "Confirmed action executing for {} {}",
            self.descriptor.type_name(),
            challenge.target_id
        );
        let result = action(challenge.target_id.clone()).await;

        guard.armed = false;
        let next = match (&result, self.policy) {
            (Err(e), FailurePolicy::KeepOpenOnFailure) => {
                let mut reopened = ConfirmationChallenge::new(challenge.target_id, challenge.expected_text);
                reopened.error_message = Some(e.to_string());
                ConfirmState::Open(reopened)
            }
            _ => ConfirmState::Idle,
        };
        *self.lock() = next;

        Ok(SubmitOutcome::Executed(result))
    }

    /// Submit with the coordinator's delete as the action
    pub async fn confirm_delete<T>(
        &self,
        mutation: &ResourceMutation<T>,
    ) -> Result<SubmitOutcome<Value>, ConfirmError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.submit(|id| mutation.mutate(MutationOp::Delete(id))).await
    }
}
