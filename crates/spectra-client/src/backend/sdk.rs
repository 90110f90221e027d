//! Native SDK backend, Windows only. Loads the vendor module in-process,
//! resolves its exported entry points once, and drives lighting through
//! synchronous native calls. Unlike the control plane, this backend
//! supports device queries and hardware event notifications.

use std::ffi::c_void;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, instrument};
use windows::core::{GUID, PCSTR, PCWSTR};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use spectra_protocol::effect::{
    EffectId, GenericEffect, HeadsetEffect, KeyboardEffect, KeypadEffect, LinkEffect, MouseEffect,
    MousepadEffect,
};
use spectra_protocol::{AppInfo, DeviceInfo, DeviceUid, EffectPayload};

use super::Backend;
use crate::error::{Error, Result};

/// Module name the vendor installs into the library search path.
pub const DEFAULT_LIBRARY: &str = "RzChromaSDK64.dll";

#[derive(Clone, Debug)]
pub struct SdkConfig {
    pub library: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        SdkConfig { library: DEFAULT_LIBRARY.to_owned() }
    }
}

const EFFECT_NONE: i32 = 0;
const EFFECT_STATIC: i32 = 1;
const EFFECT_CUSTOM: i32 = 2;

type NativeInit = unsafe extern "system" fn() -> i32;
type NativeUnInit = unsafe extern "system" fn() -> i32;
type NativeCreateCategoryEffect = unsafe extern "system" fn(i32, *const c_void, *mut GUID) -> i32;
type NativeCreateDeviceEffect =
    unsafe extern "system" fn(GUID, i32, *const c_void, *mut GUID) -> i32;
type NativeEffectById = unsafe extern "system" fn(GUID) -> i32;
type NativeQueryDevice = unsafe extern "system" fn(GUID, *mut NativeDeviceInfo) -> i32;
type NativeRegister = unsafe extern "system" fn(isize) -> i32;
type NativeUnregister = unsafe extern "system" fn() -> i32;

#[repr(C)]
struct NativeDeviceInfo {
    device_type: i32,
    connected: u32,
}

struct EntryPoints {
    init: NativeInit,
    uninit: NativeUnInit,
    create_keyboard: NativeCreateCategoryEffect,
    create_mouse: NativeCreateCategoryEffect,
    create_mousepad: NativeCreateCategoryEffect,
    create_headset: NativeCreateCategoryEffect,
    create_keypad: NativeCreateCategoryEffect,
    create_link: NativeCreateCategoryEffect,
    create_device: NativeCreateDeviceEffect,
    set_effect: NativeEffectById,
    delete_effect: NativeEffectById,
    query_device: NativeQueryDevice,
    register: NativeRegister,
    unregister: NativeUnregister,
}

/// Owns the loaded module handle for the lifetime of the backend. The
/// handle is process-global and carries no thread affinity.
struct Module(HMODULE);

unsafe impl Send for Module {}
unsafe impl Sync for Module {}

impl Drop for Module {
    fn drop(&mut self) {
        unsafe {
            let _ = FreeLibrary(self.0);
        }
    }
}

fn resolve<T: Copy>(module: HMODULE, name: &'static [u8]) -> Result<T> {
    debug_assert!(name.ends_with(&[0]));
    match unsafe { GetProcAddress(module, PCSTR(name.as_ptr())) } {
        Some(f) => Ok(unsafe { std::mem::transmute_copy(&f) }),
        None => Err(Error::Init {
            reason: format!(
                "vendor module is missing export {}",
                String::from_utf8_lossy(&name[..name.len() - 1])
            ),
            source: None,
        }),
    }
}

fn check(endpoint: &'static str, code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::Call {
            endpoint: endpoint.to_owned(),
            status: None,
            detail: format!("native result code {code}"),
            source: None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SdkState {
    Uninitialized,
    Active,
    Disposed,
}

pub struct SdkBackend {
    _module: Module,
    fns: EntryPoints,
    state: Mutex<SdkState>,
}

impl SdkBackend {
    /// Loads the vendor module and resolves every entry point. Whether
    /// the SDK is installed at all is the caller's platform probe; this
    /// fails with [`Error::Init`] when the module or an export is absent.
    pub fn load(config: SdkConfig) -> Result<Self> {
        let wide: Vec<u16> =
            config.library.encode_utf16().chain(std::iter::once(0)).collect();
        let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }.map_err(|e| Error::Init {
            reason: format!("unable to load {}: {e}", config.library),
            source: None,
        })?;
        let fns = EntryPoints {
            init: resolve(module, b"Init\0")?,
            uninit: resolve(module, b"UnInit\0")?,
            create_keyboard: resolve(module, b"CreateKeyboardEffect\0")?,
            create_mouse: resolve(module, b"CreateMouseEffect\0")?,
            create_mousepad: resolve(module, b"CreateMousepadEffect\0")?,
            create_headset: resolve(module, b"CreateHeadsetEffect\0")?,
            create_keypad: resolve(module, b"CreateKeypadEffect\0")?,
            create_link: resolve(module, b"CreateChromaLinkEffect\0")?,
            create_device: resolve(module, b"CreateEffect\0")?,
            set_effect: resolve(module, b"SetEffect\0")?,
            delete_effect: resolve(module, b"DeleteEffect\0")?,
            query_device: resolve(module, b"QueryDevice\0")?,
            register: resolve(module, b"RegisterEventNotification\0")?,
            unregister: resolve(module, b"UnRegisterEventNotification\0")?,
        };
        debug!(library = %config.library, "vendor module loaded");
        Ok(SdkBackend { _module: Module(module), fns, state: Mutex::new(SdkState::Uninitialized) })
    }

    fn require_active(&self, operation: &'static str) -> Result<()> {
        match *self.state.lock().expect("sdk state lock") {
            SdkState::Active => Ok(()),
            SdkState::Uninitialized => {
                Err(Error::InvalidState { operation, state: "backend not initialized" })
            }
            SdkState::Disposed => {
                Err(Error::InvalidState { operation, state: "backend disposed" })
            }
        }
    }

    fn create_category(
        &self,
        f: NativeCreateCategoryEffect,
        kind: i32,
        param: *const c_void,
    ) -> Result<EffectId> {
        let mut out = GUID::default();
        // Calls are synchronous into the native layer; param buffers
        // outlive the call by construction.
        let code = unsafe { f(kind, param, &mut out) };
        check("CreateEffect", code)?;
        Ok(EffectId::from_u128(out.to_u128()))
    }
}

fn flat_words(colors: &[spectra_protocol::Color]) -> Vec<u32> {
    colors.iter().map(|c| c.to_bgr()).collect()
}

#[async_trait]
impl Backend for SdkBackend {
    fn name(&self) -> &'static str {
        "native-sdk"
    }

    #[instrument(skip(self, _app))]
    async fn initialize(&self, _app: &AppInfo) -> Result<()> {
        let mut state = self.state.lock().expect("sdk state lock");
        match *state {
            SdkState::Uninitialized => {}
            SdkState::Active => {
                return Err(Error::InvalidState {
                    operation: "initialize",
                    state: "already initialized",
                })
            }
            SdkState::Disposed => {
                return Err(Error::InvalidState {
                    operation: "initialize",
                    state: "backend disposed",
                })
            }
        }
        let code = unsafe { (self.fns.init)() };
        if code != 0 {
            return Err(Error::Init {
                reason: format!("native Init returned result code {code}"),
                source: None,
            });
        }
        *state = SdkState::Active;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn uninitialize(&self) -> Result<()> {
        let mut state = self.state.lock().expect("sdk state lock");
        match *state {
            SdkState::Active => {}
            SdkState::Disposed => return Ok(()),
            SdkState::Uninitialized => {
                return Err(Error::InvalidState {
                    operation: "uninitialize",
                    state: "not initialized",
                })
            }
        }
        let code = unsafe { (self.fns.uninit)() };
        *state = SdkState::Disposed;
        check("UnInit", code)
    }

    async fn create_effect(&self, payload: &EffectPayload) -> Result<EffectId> {
        self.require_active("create_effect")?;
        match payload {
            EffectPayload::Keyboard(e) => match e {
                KeyboardEffect::None => {
                    self.create_category(self.fns.create_keyboard, EFFECT_NONE, std::ptr::null())
                }
                KeyboardEffect::Static { color } => {
                    let word = color.to_bgr();
                    self.create_category(
                        self.fns.create_keyboard,
                        EFFECT_STATIC,
                        (&word as *const u32).cast(),
                    )
                }
                KeyboardEffect::Custom(grid) => {
                    let words = grid.bgr_words();
                    self.create_category(
                        self.fns.create_keyboard,
                        EFFECT_CUSTOM,
                        words.as_ptr().cast(),
                    )
                }
            },
            EffectPayload::Mouse(e) => match e {
                MouseEffect::None => {
                    self.create_category(self.fns.create_mouse, EFFECT_NONE, std::ptr::null())
                }
                MouseEffect::Static { color } => {
                    let word = color.to_bgr();
                    self.create_category(
                        self.fns.create_mouse,
                        EFFECT_STATIC,
                        (&word as *const u32).cast(),
                    )
                }
                MouseEffect::Custom(grid) => {
                    let words = grid.bgr_words();
                    self.create_category(
                        self.fns.create_mouse,
                        EFFECT_CUSTOM,
                        words.as_ptr().cast(),
                    )
                }
            },
            EffectPayload::Mousepad(e) => match e {
                MousepadEffect::None => {
                    self.create_category(self.fns.create_mousepad, EFFECT_NONE, std::ptr::null())
                }
                MousepadEffect::Static { color } => {
                    let word = color.to_bgr();
                    self.create_category(
                        self.fns.create_mousepad,
                        EFFECT_STATIC,
                        (&word as *const u32).cast(),
                    )
                }
                MousepadEffect::Custom(colors) => {
                    let words = flat_words(colors);
                    self.create_category(
                        self.fns.create_mousepad,
                        EFFECT_CUSTOM,
                        words.as_ptr().cast(),
                    )
                }
            },
            EffectPayload::Headset(e) => match e {
                HeadsetEffect::None => {
                    self.create_category(self.fns.create_headset, EFFECT_NONE, std::ptr::null())
                }
                HeadsetEffect::Static { color } => {
                    let word = color.to_bgr();
                    self.create_category(
                        self.fns.create_headset,
                        EFFECT_STATIC,
                        (&word as *const u32).cast(),
                    )
                }
                HeadsetEffect::Custom(colors) => {
                    let words = flat_words(colors);
                    self.create_category(
                        self.fns.create_headset,
                        EFFECT_CUSTOM,
                        words.as_ptr().cast(),
                    )
                }
            },
            EffectPayload::Keypad(e) => match e {
                KeypadEffect::None => {
                    self.create_category(self.fns.create_keypad, EFFECT_NONE, std::ptr::null())
                }
                KeypadEffect::Static { color } => {
                    let word = color.to_bgr();
                    self.create_category(
                        self.fns.create_keypad,
                        EFFECT_STATIC,
                        (&word as *const u32).cast(),
                    )
                }
                KeypadEffect::Custom(grid) => {
                    let words = grid.bgr_words();
                    self.create_category(
                        self.fns.create_keypad,
                        EFFECT_CUSTOM,
                        words.as_ptr().cast(),
                    )
                }
            },
            EffectPayload::Link(e) => match e {
                LinkEffect::None => {
                    self.create_category(self.fns.create_link, EFFECT_NONE, std::ptr::null())
                }
                LinkEffect::Static { color } => {
                    let word = color.to_bgr();
                    self.create_category(
                        self.fns.create_link,
                        EFFECT_STATIC,
                        (&word as *const u32).cast(),
                    )
                }
                LinkEffect::Custom(colors) => {
                    let words = flat_words(colors);
                    self.create_category(
                        self.fns.create_link,
                        EFFECT_CUSTOM,
                        words.as_ptr().cast(),
                    )
                }
            },
            EffectPayload::Generic { device, effect } => {
                let dev = GUID::from_u128(device.as_u128());
                let mut out = GUID::default();
                let code = match effect {
                    GenericEffect::None => unsafe {
                        (self.fns.create_device)(dev, EFFECT_NONE, std::ptr::null(), &mut out)
                    },
                    GenericEffect::Static { color } => {
                        let word = color.to_bgr();
                        unsafe {
                            (self.fns.create_device)(
                                dev,
                                EFFECT_STATIC,
                                (&word as *const u32).cast(),
                                &mut out,
                            )
                        }
                    }
                };
                check("CreateEffect", code)?;
                Ok(EffectId::from_u128(out.to_u128()))
            }
        }
    }

    async fn apply_effect(&self, id: EffectId) -> Result<()> {
        self.require_active("apply_effect")?;
        let code = unsafe { (self.fns.set_effect)(GUID::from_u128(id.as_u128())) };
        check("SetEffect", code)
    }

    async fn delete_effect(&self, id: EffectId) -> Result<()> {
        self.require_active("delete_effect")?;
        let code = unsafe { (self.fns.delete_effect)(GUID::from_u128(id.as_u128())) };
        check("DeleteEffect", code)
    }

    async fn query_device(&self, device: DeviceUid) -> Result<DeviceInfo> {
        self.require_active("query_device")?;
        let mut info = NativeDeviceInfo { device_type: 0, connected: 0 };
        let code =
            unsafe { (self.fns.query_device)(GUID::from_u128(device.as_u128()), &mut info) };
        check("QueryDevice", code)?;
        Ok(DeviceInfo { device_type: info.device_type as u32, connected: info.connected != 0 })
    }

    async fn register_notifications(&self, window: isize) -> Result<()> {
        self.require_active("register_notifications")?;
        let code = unsafe { (self.fns.register)(window) };
        check("RegisterEventNotification", code)
    }

    async fn unregister_notifications(&self) -> Result<()> {
        self.require_active("unregister_notifications")?;
        let code = unsafe { (self.fns.unregister)() };
        check("UnRegisterEventNotification", code)
    }
}
