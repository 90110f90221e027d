//! Device and registry behavior, exercised against the in-memory
//! backend so every backend call can be asserted exactly.

use std::sync::Arc;

use spectra_client::backend::mock::{MockBackend, RecordedCall};
use spectra_client::{Backend, DeviceRegistry, Error, GenericCatalog, Operation};
use spectra_protocol::effect::{EffectId, LinkEffect, LINK_LEDS};
use spectra_protocol::{AppInfo, Color, DeviceCategory, DeviceUid, EffectPayload};

async fn open_registry() -> (Arc<MockBackend>, DeviceRegistry) {
    let backend = MockBackend::new();
    backend.initialize(&AppInfo::new("test", "test")).await.unwrap();
    let registry = DeviceRegistry::new(backend.clone(), GenericCatalog::builtin());
    (backend, registry)
}

fn last_create(backend: &MockBackend) -> EffectPayload {
    backend
        .calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            RecordedCall::CreateEffect(p) => Some(*p),
            _ => None,
        })
        .expect("no create-effect call recorded")
}

#[tokio::test]
async fn set_effect_yields_backend_id_and_tracks_it() {
    let (backend, registry) = open_registry().await;
    let keyboard = registry.keyboard();

    assert!(keyboard.current_effect().is_none());
    let id = keyboard.set_static(Color::RED).await.unwrap();
    assert_eq!(id, EffectId::from_u128(1));
    assert_eq!(keyboard.current_effect(), id);

    // One create, and the new id was activated.
    assert_eq!(backend.created_count(), 1);
    assert!(backend.calls().contains(&RecordedCall::ApplyEffect(id)));
}

#[tokio::test]
async fn clear_equals_setting_the_none_kind() {
    let (backend, registry) = open_registry().await;

    registry.keyboard().clear().await.unwrap();
    let p = last_create(&backend);
    assert!(p.is_none_kind());
    assert_eq!(p.category(), DeviceCategory::Keyboard);

    registry.mouse().clear().await.unwrap();
    assert!(last_create(&backend).is_none_kind());

    registry.mousepad().clear().await.unwrap();
    assert!(last_create(&backend).is_none_kind());

    registry.headset().clear().await.unwrap();
    let p = last_create(&backend);
    assert!(p.is_none_kind());
    assert_eq!(p.category(), DeviceCategory::Headset);

    registry.keypad().clear().await.unwrap();
    assert!(last_create(&backend).is_none_kind());

    registry.link_strip().clear().await.unwrap();
    let p = last_create(&backend);
    assert!(p.is_none_kind());
    assert_eq!(p.category(), DeviceCategory::Link);

    let generic = registry.generic(spectra_client::registry::known_devices::LIGHT_BAR).unwrap();
    generic.clear().await.unwrap();
    let p = last_create(&backend);
    assert!(p.is_none_kind());
    assert_eq!(p.category(), DeviceCategory::Generic);
}

#[tokio::test]
async fn link_positional_write_submits_the_full_frame_once() {
    let (backend, registry) = open_registry().await;
    let strip = registry.link_strip();

    let before = backend.created_count();
    strip.set_led(3, Color::GREEN).await.unwrap();
    assert_eq!(backend.created_count(), before + 1);

    match last_create(&backend) {
        EffectPayload::Link(LinkEffect::Custom(frame)) => {
            for (i, led) in frame.iter().enumerate() {
                let expected = if i == 3 { Color::GREEN } else { Color::BLACK };
                assert_eq!(*led, expected, "led {i}");
            }
        }
        other => panic!("expected a full custom frame, got {other:?}"),
    }

    assert_eq!(strip.led(3).unwrap(), Color::GREEN);
    assert_eq!(strip.led(0).unwrap(), Color::BLACK);

    // Out-of-range access is a typed error and never reaches the backend.
    let count = backend.created_count();
    assert!(matches!(strip.led(LINK_LEDS), Err(Error::OutOfRange { .. })));
    assert!(matches!(
        strip.set_led(LINK_LEDS, Color::RED).await,
        Err(Error::OutOfRange { .. })
    ));
    assert_eq!(backend.created_count(), count);
}

#[tokio::test]
async fn generic_devices_gate_on_the_allow_list() {
    let backend = MockBackend::new();
    backend.initialize(&AppInfo::new("test", "test")).await.unwrap();
    let known = DeviceUid::from_u128(42);
    let registry =
        DeviceRegistry::new(backend.clone(), GenericCatalog::from_entries([(known, "strip")]));

    let device = registry.generic(known).unwrap();
    assert_eq!(device.uid(), known);

    let unknown = DeviceUid::from_u128(43);
    match registry.generic(unknown) {
        Err(Error::UnsupportedDevice { device }) => assert_eq!(device, unknown),
        other => panic!("expected UnsupportedDevice, got {other:?}"),
    }

    // "All" has no meaning without a known layout.
    let count = backend.created_count();
    match device.set_all(Color::WHITE).await {
        Err(Error::Unsupported { operation, .. }) => assert_eq!(operation, Operation::SetAll),
        other => panic!("expected Unsupported, got {other:?}"),
    }
    assert_eq!(backend.created_count(), count);
}

#[tokio::test]
async fn registry_shares_one_instance_per_category() {
    let (_backend, registry) = open_registry().await;
    assert!(Arc::ptr_eq(&registry.keyboard(), &registry.keyboard()));
    assert!(Arc::ptr_eq(&registry.link_strip(), &registry.link_strip()));

    let uid = spectra_client::registry::known_devices::ARGB_CONTROLLER;
    let a = registry.generic(uid).unwrap();
    let b = registry.generic(uid).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn failed_set_effect_leaves_current_untouched() {
    let (backend, registry) = open_registry().await;
    let keyboard = registry.keyboard();
    let id = keyboard.set_static(Color::RED).await.unwrap();

    backend.fail_next(Error::Logical { endpoint: "keyboard".into(), detail: "rejected".into() });
    let err = keyboard.set_static(Color::BLUE).await.unwrap_err();
    assert!(matches!(err, Error::Logical { .. }));
    assert_eq!(keyboard.current_effect(), id);
}

#[tokio::test]
async fn device_calls_require_an_initialized_backend() {
    let backend = MockBackend::new();
    let registry = DeviceRegistry::new(backend, GenericCatalog::builtin());
    let err = registry.keyboard().set_static(Color::RED).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
}
