//! Category-agnostic device core. A device owns exactly one piece of
//! state — the id of the effect currently active on it — and funnels
//! every facade call through the backend contract.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use spectra_protocol::effect::EffectId;
use spectra_protocol::{DeviceCategory, EffectPayload};

use crate::backend::Backend;
use crate::error::Result;

pub struct Device {
    backend: Arc<dyn Backend>,
    /// The category's "nothing active" payload; also pins the category
    /// (and, for generic devices, the target uid) for this instance.
    none: EffectPayload,
    current: Mutex<EffectId>,
}

impl Device {
    pub(crate) fn new(backend: Arc<dyn Backend>, none: EffectPayload) -> Self {
        debug_assert!(none.is_none_kind());
        Device { backend, none, current: Mutex::new(EffectId::NONE) }
    }

    pub fn category(&self) -> DeviceCategory {
        self.none.category()
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Id of the effect this device last applied successfully, or
    /// [`EffectId::NONE`] before the first one.
    pub fn current_effect(&self) -> EffectId {
        *self.current.lock().expect("current effect lock")
    }

    /// Creates `payload`, activates it, and records the new id as the
    /// current effect.
    ///
    /// The previous id is not deleted: the backend replaces the active
    /// effect and owns any orphaned instances. Two concurrent calls race
    /// as last-writer-wins in response-arrival order; callers that need
    /// strict ordering must serialize their own calls.
    pub async fn set_effect(&self, payload: &EffectPayload) -> Result<EffectId> {
        let id = self.backend.create_effect(payload).await?;
        self.backend.apply_effect(id).await?;
        *self.current.lock().expect("current effect lock") = id;
        debug!(category = %self.category(), id = %id, "effect applied");
        Ok(id)
    }

    /// Equivalent to setting the category's `None` effect kind.
    pub async fn clear(&self) -> Result<EffectId> {
        let none = self.none;
        self.set_effect(&none).await
    }

    /// Best-effort clear before the device goes away. Failures are
    /// logged and discarded.
    pub async fn dispose(&self) {
        if let Err(e) = self.clear().await {
            warn!(category = %self.category(), error = %e, "clear on dispose failed");
        }
    }
}
