//! The capability set every backend implements. Two real variants exist:
//! the control-plane backend ([`rest::RestBackend`]), which talks to a
//! discovered local HTTP address, and the native SDK backend
//! (`sdk::SdkBackend`, Windows only), which calls straight into the
//! vendor module. [`mock::MockBackend`] is the in-memory stand-in used by
//! tests and downstream consumers.
//!
//! Capability gaps are permanent, not transient: the control-plane
//! backend fails `query_device` and the notification pair with
//! [`Error::Unsupported`](crate::Error::Unsupported) without ever
//! touching the network.

pub mod mock;
pub mod rest;
#[cfg(windows)]
pub mod sdk;

use async_trait::async_trait;
use spectra_protocol::effect::EffectId;
use spectra_protocol::{AppInfo, DeviceInfo, DeviceUid, EffectPayload};

use crate::error::Result;

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Short backend name used in logs and capability errors.
    fn name(&self) -> &'static str;

    /// Brings the backend up. Must succeed exactly once before any other
    /// call; failing leaves the backend uninitialized.
    async fn initialize(&self, app: &AppInfo) -> Result<()>;

    /// Graceful teardown. Safe to call again after success (no-op).
    async fn uninitialize(&self) -> Result<()>;

    /// Instantiates an effect and returns its backend-minted id.
    async fn create_effect(&self, payload: &EffectPayload) -> Result<EffectId>;

    /// Activates a previously created effect.
    async fn apply_effect(&self, id: EffectId) -> Result<()>;

    /// Releases a previously created effect.
    async fn delete_effect(&self, id: EffectId) -> Result<()>;

    async fn query_device(&self, device: DeviceUid) -> Result<DeviceInfo>;

    async fn register_notifications(&self, window: isize) -> Result<()>;

    async fn unregister_notifications(&self) -> Result<()>;
}
