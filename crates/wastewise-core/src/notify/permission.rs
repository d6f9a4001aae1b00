//! Delivery authorization mirrored from the host platform.
//!
//! The platform owns the permission state. Once it reports `denied` the
//! gate never prompts again; while a prompt is pending, later requests
//! wait for its outcome instead of opening a second prompt.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::PlatformError;

/// Platform notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not asked yet.
    #[default]
    Default,
    Granted,
    Denied,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PermissionState::Default => "default",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
        };
        f.write_str(s)
    }
}

/// Host platform permission API.
#[async_trait]
pub trait PermissionApi: Send + Sync {
    fn current_state(&self) -> PermissionState;

    /// Show the platform prompt and report the user's answer.
    async fn request(&self) -> Result<PermissionState, PlatformError>;
}

type Outcome = watch::Receiver<Option<bool>>;

enum Role {
    Settled(bool),
    Owner(watch::Sender<Option<bool>>),
    Waiter(Outcome),
}

/// Clears the in-flight slot when the owning request finishes or is dropped.
struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<Outcome>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub struct PermissionGate {
    api: Arc<dyn PermissionApi>,
    in_flight: Mutex<Option<Outcome>>,
}

impl PermissionGate {
    pub fn new(api: Arc<dyn PermissionApi>) -> Self {
        Self {
            api,
            in_flight: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PermissionState {
        self.api.current_state()
    }

    pub fn has_permission(&self) -> bool {
        self.state() == PermissionState::Granted
    }

    /// Ask for permission if it has not been decided yet.
    ///
    /// Returns true iff permission is granted afterwards. Never prompts when
    /// the platform already reports `granted` or `denied`.
    pub async fn request(&self) -> bool {
        match self.api.current_state() {
            PermissionState::Granted => return true,
            PermissionState::Denied => return false,
            PermissionState::Default => {}
        }

        let role = {
            let mut slot = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(outcome) => Role::Waiter(outcome.clone()),
                // A prompt may have finished since the first read.
                None => match self.api.current_state() {
                    PermissionState::Granted => Role::Settled(true),
                    PermissionState::Denied => Role::Settled(false),
                    PermissionState::Default => {
                        let (tx, rx) = watch::channel(None);
                        *slot = Some(rx);
                        Role::Owner(tx)
                    }
                },
            }
        };

        match role {
            Role::Settled(granted) => granted,
            Role::Waiter(mut outcome) => {
                tracing::debug!("permission prompt already pending, awaiting its outcome");
                match outcome.wait_for(|value| value.is_some()).await {
                    Ok(value) => {
                        let granted = *value;
                        granted.unwrap_or(false)
                    }
                    // Owner was dropped before the platform answered.
                    Err(_) => self.has_permission(),
                }
            }
            Role::Owner(tx) => {
                let _guard = InFlightGuard {
                    slot: &self.in_flight,
                };
                tracing::info!("requesting notification permission");
                let granted = match self.api.request().await {
                    Ok(state) => {
                        tracing::info!(%state, "notification permission answered");
                        state == PermissionState::Granted
                    }
                    Err(e) => {
                        tracing::warn!("notification permission prompt failed: {e}");
                        false
                    }
                };
                tx.send_replace(Some(granted));
                granted
            }
        }
    }
}
