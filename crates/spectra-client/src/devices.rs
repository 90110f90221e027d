//! Per-category facades. Each one maps friendly methods onto the generic
//! create-effect operation of the backend contract; the device core in
//! [`crate::device`] tracks the current effect.

use std::sync::{Arc, Mutex};

use spectra_protocol::effect::{
    EffectId, GenericEffect, HeadsetEffect, KeyboardEffect, KeyboardGrid, KeypadEffect,
    KeypadGrid, LinkEffect, MouseEffect, MouseGrid, MousepadEffect, HEADSET_LEDS, LINK_LEDS,
    MOUSEPAD_LEDS,
};
use spectra_protocol::{Color, DeviceUid, EffectPayload};

use crate::backend::Backend;
use crate::device::Device;
use crate::error::{Error, Operation, Result};

pub struct Keyboard {
    device: Device,
}

impl Keyboard {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Keyboard { device: Device::new(backend, EffectPayload::Keyboard(KeyboardEffect::None)) }
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Keyboard(KeyboardEffect::Static { color })).await
    }

    /// Applies a full per-key color map.
    pub async fn set_custom(&self, grid: KeyboardGrid) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Keyboard(KeyboardEffect::Custom(grid))).await
    }

    pub async fn set_all(&self, color: Color) -> Result<EffectId> {
        self.set_static(color).await
    }

    pub async fn clear(&self) -> Result<EffectId> {
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

pub struct Mouse {
    device: Device,
}

impl Mouse {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Mouse { device: Device::new(backend, EffectPayload::Mouse(MouseEffect::None)) }
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Mouse(MouseEffect::Static { color })).await
    }

    pub async fn set_custom(&self, grid: MouseGrid) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Mouse(MouseEffect::Custom(grid))).await
    }

    pub async fn set_all(&self, color: Color) -> Result<EffectId> {
        self.set_static(color).await
    }

    pub async fn clear(&self) -> Result<EffectId> {
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

pub struct Mousepad {
    device: Device,
}

impl Mousepad {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Mousepad { device: Device::new(backend, EffectPayload::Mousepad(MousepadEffect::None)) }
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Mousepad(MousepadEffect::Static { color })).await
    }

    pub async fn set_custom(&self, leds: [Color; MOUSEPAD_LEDS]) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Mousepad(MousepadEffect::Custom(leds))).await
    }

    pub async fn set_all(&self, color: Color) -> Result<EffectId> {
        self.set_static(color).await
    }

    pub async fn clear(&self) -> Result<EffectId> {
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

pub struct Headset {
    device: Device,
}

impl Headset {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Headset { device: Device::new(backend, EffectPayload::Headset(HeadsetEffect::None)) }
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Headset(HeadsetEffect::Static { color })).await
    }

    pub async fn set_custom(&self, leds: [Color; HEADSET_LEDS]) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Headset(HeadsetEffect::Custom(leds))).await
    }

    pub async fn set_all(&self, color: Color) -> Result<EffectId> {
        self.set_static(color).await
    }

    pub async fn clear(&self) -> Result<EffectId> {
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

pub struct Keypad {
    device: Device,
}

impl Keypad {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Keypad { device: Device::new(backend, EffectPayload::Keypad(KeypadEffect::None)) }
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Keypad(KeypadEffect::Static { color })).await
    }

    pub async fn set_custom(&self, grid: KeypadGrid) -> Result<EffectId> {
        self.device.set_effect(&EffectPayload::Keypad(KeypadEffect::Custom(grid))).await
    }

    pub async fn set_all(&self, color: Color) -> Result<EffectId> {
        self.set_static(color).await
    }

    pub async fn clear(&self) -> Result<EffectId> {
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// Addressable LED strip. Holds a local frame buffer; the backend has no
/// partial update, so every positional write resubmits the whole buffer
/// as one Custom effect.
pub struct LinkStrip {
    device: Device,
    leds: Mutex<[Color; LINK_LEDS]>,
}

impl LinkStrip {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        LinkStrip {
            device: Device::new(backend, EffectPayload::Link(LinkEffect::None)),
            leds: Mutex::new([Color::BLACK; LINK_LEDS]),
        }
    }

    pub const fn len(&self) -> usize {
        LINK_LEDS
    }

    pub fn led(&self, index: usize) -> Result<Color> {
        self.leds
            .lock()
            .expect("led buffer lock")
            .get(index)
            .copied()
            .ok_or(Error::OutOfRange { index, len: LINK_LEDS })
    }

    /// Writes one position and submits the updated frame. The local
    /// mutation is O(1); the backend round trip carries the full buffer.
    pub async fn set_led(&self, index: usize, color: Color) -> Result<EffectId> {
        let frame = {
            let mut leds = self.leds.lock().expect("led buffer lock");
            if index >= LINK_LEDS {
                return Err(Error::OutOfRange { index, len: LINK_LEDS });
            }
            leds[index] = color;
            *leds
        };
        self.device.set_effect(&EffectPayload::Link(LinkEffect::Custom(frame))).await
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        *self.leds.lock().expect("led buffer lock") = [color; LINK_LEDS];
        self.device.set_effect(&EffectPayload::Link(LinkEffect::Static { color })).await
    }

    pub async fn set_all(&self, color: Color) -> Result<EffectId> {
        self.set_static(color).await
    }

    pub async fn clear(&self) -> Result<EffectId> {
        *self.leds.lock().expect("led buffer lock") = [Color::BLACK; LINK_LEDS];
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// A device with no known layout, addressed by its uid. Constructed only
/// through the registry, which validates the uid against the recognized
/// allow-list first.
pub struct GenericDevice {
    device: Device,
    uid: DeviceUid,
}

impl std::fmt::Debug for GenericDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericDevice").field("uid", &self.uid).finish()
    }
}

impl GenericDevice {
    pub(crate) fn new(backend: Arc<dyn Backend>, uid: DeviceUid) -> Self {
        GenericDevice {
            device: Device::new(
                backend,
                EffectPayload::Generic { device: uid, effect: GenericEffect::None },
            ),
            uid,
        }
    }

    pub fn uid(&self) -> DeviceUid {
        self.uid
    }

    pub async fn set_static(&self, color: Color) -> Result<EffectId> {
        self.device
            .set_effect(&EffectPayload::Generic {
                device: self.uid,
                effect: GenericEffect::Static { color },
            })
            .await
    }

    /// "All" has no defined meaning without a known layout.
    pub async fn set_all(&self, _color: Color) -> Result<EffectId> {
        Err(Error::Unsupported {
            operation: Operation::SetAll,
            backend: self.device.backend_name(),
        })
    }

    pub async fn clear(&self) -> Result<EffectId> {
        self.device.clear().await
    }

    pub fn current_effect(&self) -> EffectId {
        self.device.current_effect()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
