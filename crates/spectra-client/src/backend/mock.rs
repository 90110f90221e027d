//! In-memory backend for tests and development. Mints deterministic
//! effect ids, records every call so tests can assert exact traffic, and
//! supports one-shot failure injection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;

use spectra_protocol::effect::EffectId;
use spectra_protocol::{AppInfo, DeviceInfo, DeviceUid, EffectPayload};

use super::Backend;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    Initialize,
    Uninitialize,
    CreateEffect(EffectPayload),
    ApplyEffect(EffectId),
    DeleteEffect(EffectId),
    QueryDevice(DeviceUid),
    RegisterNotifications(isize),
    UnregisterNotifications,
}

pub struct MockBackend {
    next: AtomicU64,
    initialized: AtomicBool,
    live: DashMap<EffectId, EffectPayload>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_next: Mutex<Option<Error>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(MockBackend {
            next: AtomicU64::new(1),
            initialized: AtomicBool::new(false),
            live: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        })
    }

    /// Snapshot of every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn created_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RecordedCall::CreateEffect(_)))
            .count()
    }

    pub fn live_effects(&self) -> usize {
        self.live.len()
    }

    /// The next call (of any kind) fails with `error` instead of running.
    pub fn fail_next(&self, error: Error) {
        *self.fail_next.lock().expect("fail_next lock") = Some(error);
    }

    fn record(&self, call: RecordedCall) -> Result<()> {
        self.calls.lock().expect("calls lock").push(call);
        match self.fail_next.lock().expect("fail_next lock").take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn require_initialized(&self, operation: &'static str) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state: "backend not initialized" })
        }
    }

    fn mint(&self) -> EffectId {
        EffectId::from_u128(self.next.fetch_add(1, Ordering::SeqCst) as u128)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initialize(&self, _app: &AppInfo) -> Result<()> {
        self.record(RecordedCall::Initialize)?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn uninitialize(&self) -> Result<()> {
        self.record(RecordedCall::Uninitialize)?;
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn create_effect(&self, payload: &EffectPayload) -> Result<EffectId> {
        self.record(RecordedCall::CreateEffect(*payload))?;
        self.require_initialized("create_effect")?;
        let id = self.mint();
        self.live.insert(id, *payload);
        Ok(id)
    }

    async fn apply_effect(&self, id: EffectId) -> Result<()> {
        self.record(RecordedCall::ApplyEffect(id))?;
        self.require_initialized("apply_effect")
    }

    async fn delete_effect(&self, id: EffectId) -> Result<()> {
        self.record(RecordedCall::DeleteEffect(id))?;
        self.require_initialized("delete_effect")?;
        self.live.remove(&id);
        Ok(())
    }

    async fn query_device(&self, device: DeviceUid) -> Result<DeviceInfo> {
        self.record(RecordedCall::QueryDevice(device))?;
        self.require_initialized("query_device")?;
        Ok(DeviceInfo { device_type: 0, connected: true })
    }

    async fn register_notifications(&self, window: isize) -> Result<()> {
        self.record(RecordedCall::RegisterNotifications(window))?;
        self.require_initialized("register_notifications")
    }

    async fn unregister_notifications(&self) -> Result<()> {
        self.record(RecordedCall::UnregisterNotifications)?;
        self.require_initialized("unregister_notifications")
    }
}
