#![deny(warnings)]
//! Client for driving RGB lighting on peripheral devices through one of
//! two interchangeable backends: a native vendor SDK loaded in-process
//! (Windows) or a local HTTP control plane reached after a discovery
//! handshake.
//!
//! ```no_run
//! use std::sync::Arc;
//! use spectra_client::{Backend, DeviceRegistry, GenericCatalog, RestBackend, RestConfig};
//! use spectra_protocol::{AppInfo, Color};
//!
//! # async fn demo() -> spectra_client::Result<()> {
//! let backend = Arc::new(RestBackend::new(RestConfig::default()));
//! backend.initialize(&AppInfo::new("demo", "spectra demo")).await?;
//!
//! let devices = DeviceRegistry::new(backend.clone(), GenericCatalog::builtin());
//! devices.keyboard().set_static(Color::RED).await?;
//! devices.keyboard().clear().await?;
//!
//! backend.uninitialize().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod device;
pub mod devices;
pub mod error;
pub mod registry;

pub use backend::mock::MockBackend;
pub use backend::rest::{RestBackend, RestConfig, Session, SessionHealth};
#[cfg(windows)]
pub use backend::sdk::{SdkBackend, SdkConfig};
pub use backend::Backend;
pub use error::{Error, Operation, Result};
pub use registry::{DeviceRegistry, GenericCatalog};
