//! Fakes for the platform seams, shared by the notify tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::dispatch::{DeliveryChannel, Notice};
use super::metrics::{EngagementMetrics, MetricsProvider};
use super::permission::{PermissionApi, PermissionState};
use crate::error::{CoreError, PlatformError, Result};

/// Permission API whose prompt answers with a fixed state.
pub struct FakePermission {
    state: Mutex<PermissionState>,
    answer: PermissionState,
    prompts: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl FakePermission {
    pub fn new(state: PermissionState, answer: PermissionState) -> Self {
        Self {
            state: Mutex::new(state),
            answer,
            prompts: AtomicUsize::new(0),
            delay: None,
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionApi for FakePermission {
    fn current_state(&self) -> PermissionState {
        *self.state.lock().unwrap()
    }

    async fn request(&self) -> Result<PermissionState, PlatformError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PlatformError::Failed("prompt crashed".into()));
        }
        *self.state.lock().unwrap() = self.answer;
        Ok(self.answer)
    }
}

/// Channel that records what it was asked to show.
pub struct RecordingChannel {
    name: String,
    available: bool,
    fail: bool,
    attempts: AtomicUsize,
    shown: Mutex<Vec<Notice>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            fail: false,
            attempts: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<Notice> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn show(&self, notice: &Notice) -> Result<(), PlatformError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PlatformError::Failed("display refused".into()));
        }
        self.shown.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Metrics that can be swapped mid-test or made to fail.
#[derive(Default)]
pub struct FakeMetrics {
    metrics: Mutex<EngagementMetrics>,
    broken: AtomicBool,
}

impl FakeMetrics {
    pub fn new(metrics: EngagementMetrics) -> Self {
        Self {
            metrics: Mutex::new(metrics),
            broken: AtomicBool::new(false),
        }
    }

    pub fn set(&self, metrics: EngagementMetrics) {
        *self.metrics.lock().unwrap() = metrics;
    }

    pub fn break_provider(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl MetricsProvider for FakeMetrics {
    fn snapshot(&self) -> Result<EngagementMetrics> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(CoreError::Custom("diary unavailable".into()));
        }
        Ok(self.metrics.lock().unwrap().clone())
    }
}
