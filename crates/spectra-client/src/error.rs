//! Failure taxonomy for backend and device operations. Transport-level
//! failures (`Call`) are the only kind worth retrying; everything else is
//! either permanent (`Unsupported`, `UnsupportedDevice`), a caller bug
//! (`InvalidState`, `OutOfRange`), or a deliberate rejection by the
//! backend (`Init`, `Logical`).

use std::fmt;

use spectra_protocol::DeviceUid;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Operations that are not available on every backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    QueryDevice,
    RegisterNotifications,
    UnregisterNotifications,
    SetAll,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::QueryDevice => "query-device",
            Operation::RegisterNotifications => "register-notifications",
            Operation::UnregisterNotifications => "unregister-notifications",
            Operation::SetAll => "set-all",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Handshake or native initialization did not produce a usable
    /// session.
    #[error("backend initialization failed: {reason}")]
    Init {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A call failed at the transport layer or with a non-success
    /// status. Carries the endpoint and status so callers can decide
    /// whether to retry.
    #[error("call to {endpoint} failed: {detail}")]
    Call {
        endpoint: String,
        status: Option<u16>,
        detail: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The backend accepted the request but the body flags failure, is
    /// unreadable, or lacks a required field.
    #[error("{endpoint} rejected by backend: {detail}")]
    Logical { endpoint: String, detail: String },

    /// Permanently unavailable on the active backend. Never retried,
    /// never reaches the transport.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: Operation,
        backend: &'static str,
    },

    /// The identifier is not on the recognized generic-device list.
    #[error("device {device} is not a recognized generic device")]
    UnsupportedDevice { device: DeviceUid },

    /// The operation was attempted outside its legal lifecycle window.
    #[error("{operation} is illegal: {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// A positional access landed outside the device's LED range.
    #[error("led index {index} out of range ({len} leds)")]
    OutOfRange { index: usize, len: usize },
}

impl Error {
    /// Whether a retry could plausibly succeed. Only transport-level
    /// failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Call { .. })
    }
}
