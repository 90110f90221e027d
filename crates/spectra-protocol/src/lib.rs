#![deny(warnings)]
//! Shared vocabulary for the Spectra lighting stack: device categories,
//! effect identifiers, colors, per-category effect payloads, and the
//! REST bodies exchanged with the local control plane.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod color;
pub mod effect;
pub mod wire;

pub use color::Color;
pub use effect::{EffectId, EffectPayload};

/// The fixed class of peripheral a device represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Keyboard,
    Mouse,
    Mousepad,
    Headset,
    Keypad,
    Link,
    Generic,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 7] = [
        DeviceCategory::Keyboard,
        DeviceCategory::Mouse,
        DeviceCategory::Mousepad,
        DeviceCategory::Headset,
        DeviceCategory::Keypad,
        DeviceCategory::Link,
        DeviceCategory::Generic,
    ];

    /// Route segment the control plane exposes for create-effect calls
    /// on this category.
    pub fn rest_path(&self) -> &'static str {
        match self {
            DeviceCategory::Keyboard => "keyboard",
            DeviceCategory::Mouse => "mouse",
            DeviceCategory::Mousepad => "mousepad",
            DeviceCategory::Headset => "headset",
            DeviceCategory::Keypad => "keypad",
            DeviceCategory::Link => "link",
            DeviceCategory::Generic => "device",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rest_path())
    }
}

/// Identifier naming one concrete generic device (as opposed to a
/// category-wide device like "the keyboard").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceUid(Uuid);

impl DeviceUid {
    pub const fn from_u128(v: u128) -> Self {
        DeviceUid(Uuid::from_u128(v))
    }

    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a backend reports about a queried device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Vendor class code for the device model.
    pub device_type: u32,
    pub connected: bool,
}

/// Application descriptor submitted during the control-plane handshake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppInfo {
    pub title: String,
    pub description: String,
    pub author: Author,
    pub device_supported: Vec<DeviceCategory>,
    pub category: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub contact: String,
}

impl AppInfo {
    /// Descriptor with every category advertised and the default
    /// `application` class.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        AppInfo {
            title: title.into(),
            description: description.into(),
            author: Author { name: String::new(), contact: String::new() },
            device_supported: DeviceCategory::ALL.to_vec(),
            category: "application".into(),
        }
    }

    pub fn with_author(
        mut self,
        name: impl Into<String>,
        contact: impl Into<String>,
    ) -> Self {
        self.author = Author { name: name.into(), contact: contact.into() };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_paths_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for c in DeviceCategory::ALL {
            assert!(seen.insert(c.rest_path()), "duplicate path for {c}");
        }
    }

    #[test]
    fn app_info_serializes_categories_lowercase() {
        let info = AppInfo::new("demo", "demo app").with_author("a", "a@example.com");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["device_supported"][0], "keyboard");
        assert_eq!(json["category"], "application");
    }
}
