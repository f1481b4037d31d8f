//! Device-authorization polling flow.
//!
//! One [`DeviceAuthFlow`] instance owns one timer and at most one live
//! code/link session. Polls are strictly sequential: the next read is issued
//! only after the prior one resolved and the poll interval elapsed. Every
//! `start()` call ends in exactly one of `Completed`, `Expired`, `Failed` or
//! `Cancelled`, delivered as a state plus [`FlowEvents`] callbacks; the flow
//! never panics or returns an error across that boundary, because its host
//! must be able to render something for every terminal condition.

use crate::client::{AccountApi, DeviceCodeStatus};
use crate::config::EngineConfig;
use crate::error::EngineError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stremsync_model::AuthKey;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// States of the device-authorization flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No session; `start()` has not run yet.
    Idle,
    /// Requesting a code/link pair from the remote.
    Creating,
    /// Link shown to the user; polling for authorization.
    AwaitingUser,
    /// Credential received; handing it to the completion callback.
    Completing,
    /// Terminal: the credential was delivered.
    Completed,
    /// Terminal: the code passed its wall-clock deadline or was spent.
    Expired,
    /// Terminal: creation, polling or the completion callback failed.
    Failed,
    /// Terminal: the host tore the flow down.
    Cancelled,
}

impl FlowState {
    /// Returns true for states no further transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Completed | FlowState::Expired | FlowState::Failed | FlowState::Cancelled
        )
    }

    /// Returns true while a `start()` call is driving the flow.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            FlowState::Creating | FlowState::AwaitingUser | FlowState::Completing
        )
    }
}

/// A live device-code session.
///
/// Validity is a hard wall-clock deadline fixed at creation, not an idle
/// timeout.
#[derive(Debug, Clone)]
pub struct DeviceAuthSession {
    /// The short-lived device code.
    pub code: String,
    /// URL the user opens to authorize the code.
    pub link: String,
    /// When the session was created.
    pub created_at: Instant,
    /// Hard deadline: `created_at` + configured TTL.
    pub expires_at: Instant,
}

/// Callbacks through which the flow surfaces its transitions.
///
/// `on_credential` is the completion callback; it may reject the credential
/// (for instance when its linked identity does not match the expected
/// account), which fails the whole flow without re-polling, because codes are
/// single-use once consumed.
pub trait FlowEvents: Send + Sync {
    /// A code/link pair is ready to show to the user.
    fn on_link_ready(&self, code: &str, link: &str) {
        let _ = (code, link);
    }

    /// The user authorized; the credential is delivered exactly once.
    fn on_credential(&self, credential: AuthKey) -> Result<(), String>;

    /// The session passed its deadline without authorization.
    fn on_expired(&self) {}

    /// The flow failed; `reason` is renderable as-is.
    fn on_error(&self, reason: &str) {
        let _ = reason;
    }
}

/// The polling state machine.
pub struct DeviceAuthFlow<A: AccountApi> {
    api: Arc<A>,
    config: EngineConfig,
    state: RwLock<FlowState>,
    session: RwLock<Option<DeviceAuthSession>>,
    cancel: watch::Sender<bool>,
    credential_delivered: AtomicBool,
}

impl<A: AccountApi> DeviceAuthFlow<A> {
    /// Creates an idle flow.
    pub fn new(api: Arc<A>, config: EngineConfig) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            api,
            config,
            state: RwLock::new(FlowState::Idle),
            session: RwLock::new(None),
            cancel,
            credential_delivered: AtomicBool::new(false),
        }
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        *self.state.read()
    }

    /// The live session, while one exists.
    pub fn session(&self) -> Option<DeviceAuthSession> {
        self.session.read().clone()
    }

    /// Cancels the flow.
    ///
    /// Safe from any state, including before `start()` was ever called.
    /// Aborts an in-flight HTTP call, stops the timer and clears the session
    /// without invoking the completion callback.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Runs the flow to a terminal state.
    ///
    /// Re-entrant from `Failed` (and any other terminal state): a new call
    /// creates a fresh code. A call while the flow is already active is a
    /// no-op returning the current state.
    pub async fn start<E: FlowEvents>(&self, events: &E) -> FlowState {
        // Guard and transition under one lock so racing start() calls
        // cannot both begin a session.
        {
            let mut state = self.state.write();
            if state.is_active() {
                return *state;
            }
            *state = FlowState::Creating;
        }

        *self.session.write() = None;
        self.credential_delivered.store(false, Ordering::SeqCst);
        self.cancel.send_replace(false);
        let mut cancelled = self.cancel.subscribe();

        let created = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancelled) => return self.finish_cancelled(),
            result = self.api.create_device_code() => result,
        };
        let device_code = match created {
            Ok(code) => code,
            Err(error) => return self.finish_failed(events, &error.to_string()),
        };

        let created_at = Instant::now();
        let session = DeviceAuthSession {
            code: device_code.code,
            link: device_code.link,
            created_at,
            expires_at: created_at + self.config.device_code_ttl,
        };
        *self.session.write() = Some(session.clone());
        info!(code = %session.code, "device link ready, awaiting authorization");
        events.on_link_ready(&session.code, &session.link);
        self.set_state(FlowState::AwaitingUser);

        loop {
            tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancelled) => return self.finish_cancelled(),
                _ = sleep_until(session.expires_at) => return self.finish_expired(events),
                _ = sleep(self.config.poll_interval) => {}
            }

            let status = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancelled) => return self.finish_cancelled(),
                result = self.api.read_device_code(&session.code) => result,
            };

            match status {
                Ok(DeviceCodeStatus::Pending) => {
                    debug!(code = %session.code, "authorization still pending");
                }
                Ok(DeviceCodeStatus::Ready(credential)) => {
                    self.set_state(FlowState::Completing);
                    if self.credential_delivered.swap(true, Ordering::SeqCst) {
                        return self.finish_completed();
                    }
                    return match events.on_credential(credential) {
                        Ok(()) => self.finish_completed(),
                        // The code is spent even though the callback rejected
                        // the credential; a fresh start() is required.
                        Err(reason) => self.finish_failed(events, &reason),
                    };
                }
                Err(error) if error.is_retryable() => {
                    warn!(%error, "device code poll failed, polling again");
                }
                Err(EngineError::AuthExpired(_)) => return self.finish_expired(events),
                Err(error) => return self.finish_failed(events, &error.to_string()),
            }
        }
    }

    fn set_state(&self, state: FlowState) {
        *self.state.write() = state;
    }

    fn clear_session(&self) {
        *self.session.write() = None;
    }

    fn finish_cancelled(&self) -> FlowState {
        self.clear_session();
        self.set_state(FlowState::Cancelled);
        debug!("device flow cancelled");
        FlowState::Cancelled
    }

    fn finish_completed(&self) -> FlowState {
        self.clear_session();
        self.set_state(FlowState::Completed);
        info!("device flow completed");
        FlowState::Completed
    }

    fn finish_expired<E: FlowEvents>(&self, events: &E) -> FlowState {
        self.clear_session();
        self.set_state(FlowState::Expired);
        events.on_expired();
        FlowState::Expired
    }

    fn finish_failed<E: FlowEvents>(&self, events: &E, reason: &str) -> FlowState {
        self.clear_session();
        self.set_state(FlowState::Failed);
        warn!(reason, "device flow failed");
        events.on_error(reason);
        FlowState::Failed
    }
}

/// Resolves once cancellation is requested; pends forever otherwise.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
