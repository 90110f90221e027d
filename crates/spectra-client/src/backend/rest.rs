//! Control-plane backend. A handshake POST against the discovery
//! endpoint returns a session id and a freshly allocated base address;
//! every later call targets that address, and a periodic heartbeat keeps
//! the session from expiring server-side.
//!
//! Lifecycle is a strict one-way machine: Uninitialized → Initializing →
//! Active → Disposed. The heartbeat timer is armed only inside the
//! Initializing → Active transition and exactly one timer exists per
//! backend instance.

use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use spectra_protocol::effect::EffectId;
use spectra_protocol::wire::{
    CreateEffectResponse, EffectIdBody, GenericEffectBody, HandshakeResponse, HeartbeatResponse,
    ResultBody, DEFAULT_ENDPOINT, EFFECT_PATH, HANDSHAKE_PATH, HEARTBEAT_PATH,
};
use spectra_protocol::{AppInfo, DeviceInfo, DeviceUid, EffectPayload};

use super::Backend;
use crate::error::{Error, Operation, Result};

#[derive(Clone, Debug)]
pub struct RestConfig {
    /// Discovery endpoint probed by the handshake.
    pub endpoint: String,
    /// Keep-alive period. The control plane expects one beat per second.
    pub heartbeat_interval: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        RestConfig {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            heartbeat_interval: Duration::from_millis(1000),
        }
    }
}

impl RestConfig {
    /// Config pointed at a test server, with a heartbeat fast enough for
    /// tests to observe.
    pub fn for_testing(endpoint: impl Into<String>) -> Self {
        RestConfig {
            endpoint: endpoint.into(),
            heartbeat_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initializing,
    Active,
    Disposed,
}

/// Immutable session record, published once per successful handshake.
/// Readers clone the `Arc`; nobody ever observes a half-written address.
#[derive(Debug)]
pub struct Session {
    pub id: i64,
    pub base: String,
}

/// Last known condition of the session, observable through
/// [`RestBackend::health`]. A failed heartbeat is fatal for the session
/// and is reported here rather than silently dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionHealth {
    /// No session established, or torn down.
    Idle,
    /// The most recent heartbeat succeeded.
    Alive { tick: u64 },
    /// A heartbeat failed; the session is no longer maintained.
    Unhealthy { reason: String },
}

pub struct RestBackend {
    http: Client,
    config: RestConfig,
    // Serializes lifecycle transitions. Arming and stopping the
    // heartbeat both happen with this lock held, so uninitialize can
    // never stop a timer that a concurrent initialize is arming.
    lifecycle: Mutex<Lifecycle>,
    session: RwLock<Option<Arc<Session>>>,
    heartbeat: StdMutex<Option<JoinHandle<()>>>,
    health: Arc<watch::Sender<SessionHealth>>,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Self {
        let (health, _) = watch::channel(SessionHealth::Idle);
        RestBackend {
            http: Client::new(),
            config,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            session: RwLock::new(None),
            heartbeat: StdMutex::new(None),
            health: Arc::new(health),
        }
    }

    /// Subscribe to session-health updates. This is the channel a failed
    /// background heartbeat is surfaced on.
    pub fn health(&self) -> watch::Receiver<SessionHealth> {
        self.health.subscribe()
    }

    /// The current session record, if one is active.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.read().expect("session lock").clone()
    }

    /// Unconditional dispose: stops the heartbeat and discards the
    /// session without a network round trip. The control plane is left
    /// to expire the orphaned session once beats stop arriving.
    /// Idempotent; callable from any state.
    pub async fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if *lifecycle == Lifecycle::Disposed {
            return;
        }
        self.stop_heartbeat();
        *self.session.write().expect("session lock") = None;
        *lifecycle = Lifecycle::Disposed;
        let _ = self.health.send(SessionHealth::Idle);
        info!("control-plane backend disposed");
    }

    fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().expect("heartbeat handle lock").take() {
            handle.abort();
        }
    }

    fn arm_heartbeat(&self, session: Arc<Session>) {
        let http = self.http.clone();
        let health = self.health.clone();
        let period = self.config.heartbeat_interval;
        let handle = tokio::spawn(async move {
            // First beat lands one full period after activation.
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let url = format!("{}/{}", session.base, HEARTBEAT_PATH);
            loop {
                timer.tick().await;
                match beat(&http, &url).await {
                    Ok(tick) => {
                        debug!(tick, "heartbeat");
                        let _ = health.send(SessionHealth::Alive { tick });
                    }
                    Err(e) => {
                        error!(error = %e, "heartbeat failed; session is no longer maintained");
                        let _ = health.send(SessionHealth::Unhealthy { reason: e.to_string() });
                        break;
                    }
                }
            }
        });
        *self.heartbeat.lock().expect("heartbeat handle lock") = Some(handle);
    }

    async fn handshake(&self, app: &AppInfo) -> Result<Session> {
        let url = format!("{}/{}", self.config.endpoint, HANDSHAKE_PATH);
        let resp = self.http.post(&url).json(app).send().await.map_err(|e| Error::Init {
            reason: format!("handshake request failed: {e}"),
            source: Some(e),
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Init {
                reason: format!("handshake returned HTTP status {status}"),
                source: None,
            });
        }
        let body: HandshakeResponse = resp.json().await.map_err(|e| Error::Init {
            reason: format!("handshake returned no usable session data: {e}"),
            source: Some(e),
        })?;
        if body.uri.is_empty() {
            return Err(Error::Init {
                reason: "handshake returned an empty base address".into(),
                source: None,
            });
        }
        Ok(Session { id: body.session, base: body.uri })
    }

    fn active_session(&self, operation: &'static str) -> Result<Arc<Session>> {
        match self.session.read().expect("session lock").as_ref() {
            Some(s) => Ok(s.clone()),
            None => Err(Error::InvalidState { operation, state: "no active session" }),
        }
    }

    /// Sends a request whose response is a logical-result envelope.
    /// Checks the HTTP status first, the in-body flag second; the two
    /// failure kinds stay distinct.
    async fn send_logical(&self, req: RequestBuilder, endpoint: &str) -> Result<()> {
        let body: ResultBody = send_checked(req, endpoint).await?;
        if !body.result {
            return Err(Error::Logical {
                endpoint: endpoint.to_owned(),
                detail: "backend reported a false result".into(),
            });
        }
        Ok(())
    }
}

impl Default for RestBackend {
    fn default() -> Self {
        RestBackend::new(RestConfig::default())
    }
}

impl Drop for RestBackend {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

/// Transport and status checking shared by every foreground call.
async fn send_checked<T: DeserializeOwned>(req: RequestBuilder, endpoint: &str) -> Result<T> {
    let resp = req.send().await.map_err(|e| Error::Call {
        endpoint: endpoint.to_owned(),
        status: None,
        detail: format!("transport failure: {e}"),
        source: Some(e),
    })?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Call {
            endpoint: endpoint.to_owned(),
            status: Some(status.as_u16()),
            detail: format!("HTTP status {status}"),
            source: None,
        });
    }
    resp.json().await.map_err(|e| Error::Logical {
        endpoint: endpoint.to_owned(),
        detail: format!("unreadable response body: {e}"),
    })
}

async fn beat(http: &Client, url: &str) -> Result<u64> {
    let body: HeartbeatResponse = send_checked(http.put(url), url).await?;
    Ok(body.tick)
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &'static str {
        "control-plane"
    }

    #[instrument(skip(self, app), fields(endpoint = %self.config.endpoint))]
    async fn initialize(&self, app: &AppInfo) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Initializing | Lifecycle::Active => {
                return Err(Error::InvalidState {
                    operation: "initialize",
                    state: "already initialized",
                })
            }
            Lifecycle::Disposed => {
                return Err(Error::InvalidState {
                    operation: "initialize",
                    state: "backend disposed",
                })
            }
        }
        *lifecycle = Lifecycle::Initializing;
        // The lifecycle lock stays held across the handshake so a
        // concurrent uninitialize cannot interleave with timer arming.
        match self.handshake(app).await {
            Ok(session) => {
                let session = Arc::new(session);
                info!(session = session.id, base = %session.base, "session established");
                *self.session.write().expect("session lock") = Some(session.clone());
                self.arm_heartbeat(session);
                *lifecycle = Lifecycle::Active;
                Ok(())
            }
            Err(e) => {
                *lifecycle = Lifecycle::Uninitialized;
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn uninitialize(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Active => {}
            // Idempotent teardown: no second network call, no error.
            Lifecycle::Disposed => return Ok(()),
            Lifecycle::Uninitialized | Lifecycle::Initializing => {
                return Err(Error::InvalidState {
                    operation: "uninitialize",
                    state: "not initialized",
                })
            }
        }
        let session = self.active_session("uninitialize")?;
        let outcome = self.send_logical(self.http.delete(&session.base), &session.base).await;
        // Local teardown happens even when the control plane rejects the
        // request; the session must not keep half-living on this side.
        self.stop_heartbeat();
        *self.session.write().expect("session lock") = None;
        *lifecycle = Lifecycle::Disposed;
        let _ = self.health.send(SessionHealth::Idle);
        info!("session torn down");
        outcome
    }

    #[instrument(skip(self, payload), fields(category = %payload.category()))]
    async fn create_effect(&self, payload: &EffectPayload) -> Result<EffectId> {
        let session = self.active_session("create_effect")?;
        let url = format!("{}/{}", session.base, payload.category().rest_path());
        let req = match payload {
            EffectPayload::Keyboard(e) => self.http.post(&url).json(e),
            EffectPayload::Mouse(e) => self.http.post(&url).json(e),
            EffectPayload::Mousepad(e) => self.http.post(&url).json(e),
            EffectPayload::Headset(e) => self.http.post(&url).json(e),
            EffectPayload::Keypad(e) => self.http.post(&url).json(e),
            EffectPayload::Link(e) => self.http.post(&url).json(e),
            EffectPayload::Generic { device, effect } => self
                .http
                .post(&url)
                .json(&GenericEffectBody { device: *device, effect: *effect }),
        };
        let body: CreateEffectResponse = send_checked(req, &url).await?;
        if !body.result {
            return Err(Error::Logical {
                endpoint: url,
                detail: "backend reported a false result".into(),
            });
        }
        match body.effect_id {
            Some(id) => {
                debug!(%id, "effect created");
                Ok(id)
            }
            None => Err(Error::Logical {
                endpoint: url,
                detail: "response carried no effect id".into(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn apply_effect(&self, id: EffectId) -> Result<()> {
        let session = self.active_session("apply_effect")?;
        let url = format!("{}/{}", session.base, EFFECT_PATH);
        self.send_logical(self.http.put(&url).json(&EffectIdBody { id }), &url).await
    }

    #[instrument(skip(self))]
    async fn delete_effect(&self, id: EffectId) -> Result<()> {
        let session = self.active_session("delete_effect")?;
        let url = format!("{}/{}", session.base, EFFECT_PATH);
        self.send_logical(self.http.delete(&url).json(&EffectIdBody { id }), &url).await
    }

    // Permanent capability gap: device queries and event registration
    // only exist on the native SDK. No network call is attempted.
    async fn query_device(&self, _device: DeviceUid) -> Result<DeviceInfo> {
        Err(Error::Unsupported { operation: Operation::QueryDevice, backend: self.name() })
    }

    async fn register_notifications(&self, _window: isize) -> Result<()> {
        Err(Error::Unsupported {
            operation: Operation::RegisterNotifications,
            backend: self.name(),
        })
    }

    async fn unregister_notifications(&self) -> Result<()> {
        Err(Error::Unsupported {
            operation: Operation::UnregisterNotifications,
            backend: self.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_heartbeat_period_is_one_second() {
        assert_eq!(RestConfig::default().heartbeat_interval, Duration::from_millis(1000));
        assert_eq!(RestConfig::default().endpoint, DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn calls_before_initialize_fail_fast() {
        let backend = RestBackend::new(RestConfig::for_testing("http://localhost:1"));
        let err = backend.apply_effect(EffectId::from_u128(1)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        let err = backend.uninitialize().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_terminal() {
        let backend = RestBackend::new(RestConfig::for_testing("http://localhost:1"));
        backend.shutdown().await;
        backend.shutdown().await;
        let err = backend
            .initialize(&AppInfo::new("t", "t"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        // Disposed uninitialize stays a no-op.
        assert!(backend.uninitialize().await.is_ok());
    }
}
