//! Device directory: hands out one shared facade per opened category and
//! validates generic-device identifiers against a recognized allow-list
//! before construction.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use spectra_protocol::DeviceUid;

use crate::backend::Backend;
use crate::devices::{GenericDevice, Headset, Keyboard, Keypad, LinkStrip, Mouse, Mousepad};
use crate::error::{Error, Result};

/// Allow-list of generic devices this installation recognizes. Injected
/// rather than hardcoded so the directory stays testable without the
/// real device catalog.
#[derive(Clone, Debug, Default)]
pub struct GenericCatalog {
    known: HashMap<DeviceUid, String>,
}

/// Devices shipped with the default catalog.
pub mod known_devices {
    use spectra_protocol::DeviceUid;

    pub const ARGB_CONTROLLER: DeviceUid =
        DeviceUid::from_u128(0x35f9_6628_a0ce_4836_bd5d_ac26_a62b_5cf3);
    pub const LED_STRIP_HUB: DeviceUid =
        DeviceUid::from_u128(0x0201_203b_62f3_4c50_83dd_598b_abd2_08e0);
    pub const LIGHT_BAR: DeviceUid =
        DeviceUid::from_u128(0xbb23_2e8a_9cae_4a41_ae33_4c8c_6b1a_21e9);
    pub const FAN_RING: DeviceUid =
        DeviceUid::from_u128(0x8d15_e50c_9b05_4e7e_bd22_7f22_6e3f_1b04);
}

impl GenericCatalog {
    /// The catalog of devices known to this build.
    pub fn builtin() -> Self {
        GenericCatalog::from_entries([
            (known_devices::ARGB_CONTROLLER, "argb-controller"),
            (known_devices::LED_STRIP_HUB, "led-strip-hub"),
            (known_devices::LIGHT_BAR, "light-bar"),
            (known_devices::FAN_RING, "fan-ring"),
        ])
    }

    pub fn from_entries<N: Into<String>>(
        entries: impl IntoIterator<Item = (DeviceUid, N)>,
    ) -> Self {
        GenericCatalog {
            known: entries.into_iter().map(|(uid, name)| (uid, name.into())).collect(),
        }
    }

    pub fn contains(&self, uid: DeviceUid) -> bool {
        self.known.contains_key(&uid)
    }

    pub fn name_of(&self, uid: DeviceUid) -> Option<&str> {
        self.known.get(&uid).map(String::as_str)
    }
}

/// Maps opened device categories (and generic uids) to live device
/// instances. Opening a category twice returns the same shared facade.
pub struct DeviceRegistry {
    backend: Arc<dyn Backend>,
    catalog: GenericCatalog,
    keyboard: OnceLock<Arc<Keyboard>>,
    mouse: OnceLock<Arc<Mouse>>,
    mousepad: OnceLock<Arc<Mousepad>>,
    headset: OnceLock<Arc<Headset>>,
    keypad: OnceLock<Arc<Keypad>>,
    link_strip: OnceLock<Arc<LinkStrip>>,
    generics: DashMap<DeviceUid, Arc<GenericDevice>>,
}

impl DeviceRegistry {
    pub fn new(backend: Arc<dyn Backend>, catalog: GenericCatalog) -> Self {
        DeviceRegistry {
            backend,
            catalog,
            keyboard: OnceLock::new(),
            mouse: OnceLock::new(),
            mousepad: OnceLock::new(),
            headset: OnceLock::new(),
            keypad: OnceLock::new(),
            link_strip: OnceLock::new(),
            generics: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn catalog(&self) -> &GenericCatalog {
        &self.catalog
    }

    pub fn keyboard(&self) -> Arc<Keyboard> {
        self.keyboard.get_or_init(|| Arc::new(Keyboard::new(self.backend.clone()))).clone()
    }

    pub fn mouse(&self) -> Arc<Mouse> {
        self.mouse.get_or_init(|| Arc::new(Mouse::new(self.backend.clone()))).clone()
    }

    pub fn mousepad(&self) -> Arc<Mousepad> {
        self.mousepad.get_or_init(|| Arc::new(Mousepad::new(self.backend.clone()))).clone()
    }

    pub fn headset(&self) -> Arc<Headset> {
        self.headset.get_or_init(|| Arc::new(Headset::new(self.backend.clone()))).clone()
    }

    pub fn keypad(&self) -> Arc<Keypad> {
        self.keypad.get_or_init(|| Arc::new(Keypad::new(self.backend.clone()))).clone()
    }

    pub fn link_strip(&self) -> Arc<LinkStrip> {
        self.link_strip.get_or_init(|| Arc::new(LinkStrip::new(self.backend.clone()))).clone()
    }

    /// Opens a generic device. The uid must be on the recognized
    /// allow-list; unknown identifiers fail before anything is built.
    pub fn generic(&self, uid: DeviceUid) -> Result<Arc<GenericDevice>> {
        if !self.catalog.contains(uid) {
            return Err(Error::UnsupportedDevice { device: uid });
        }
        Ok(self
            .generics
            .entry(uid)
            .or_insert_with(|| Arc::new(GenericDevice::new(self.backend.clone(), uid)))
            .value()
            .clone())
    }
}
