//! Lifecycle management for active media-stream connections.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use convoy_core::collab::MediaBridge;
use convoy_core::config::Settings;
use convoy_core::errors::GatewayError;
use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;
use convoy_openai::RealtimeVoiceBridge;

const ACCEPTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Observable lifecycle state of a [`CallSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Running,
    Stopped,
}

/// One streaming connection's lifecycle wrapper around the opaque media
/// bridge. `run` is called once and blocks until the connection ends;
/// `stop` may be called any number of times from any exit path (normal
/// completion, transport disconnect, failure) and only the first call
/// releases anything.
pub struct CallSession {
    call_sid: CallSid,
    phone: PhoneNumber,
    instructions: String,
    bridge: Arc<dyn MediaBridge>,
    state: AtomicU8,
}

impl CallSession {
    /// The transport handshake has already completed by the time this is
    /// constructed, so a fresh session starts out accepted.
    pub fn accept(
        call_sid: CallSid,
        phone: PhoneNumber,
        instructions: String,
        bridge: Arc<dyn MediaBridge>,
    ) -> Self {
        Self {
            call_sid,
            phone,
            instructions,
            bridge,
            state: AtomicU8::new(ACCEPTED),
        }
    }

    pub fn call_sid(&self) -> &CallSid {
        &self.call_sid
    }

    pub fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    /// The system instructions this session was started with.
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::SeqCst) {
            ACCEPTED => SessionState::Accepted,
            RUNNING => SessionState::Running,
            _ => SessionState::Stopped,
        }
    }

    /// Hand control to the bridge until the connection ends or fails.
    /// A second start, or a start after stop, is rejected.
    pub async fn run(&self) -> Result<(), GatewayError> {
        self.state
            .compare_exchange(ACCEPTED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| GatewayError::InvalidRequest("session already started".into()))?;
        info!(call_sid = %self.call_sid, phone = %self.phone, "media session running");
        self.bridge.start().await
    }

    /// Idempotent teardown. The first call transitions to stopped and
    /// yields the bridge transcript; later calls return `None`.
    pub async fn stop(&self) -> Option<String> {
        let prev = self.state.swap(STOPPED, Ordering::SeqCst);
        if prev == STOPPED {
            return None;
        }
        info!(call_sid = %self.call_sid, "media session stopped");
        self.bridge.stop().await
    }
}

/// Active sessions keyed by call SID. Each connection only ever touches
/// its own entry, so a disconnect cannot disturb other calls.
pub struct SessionRegistry {
    sessions: DashMap<CallSid, Arc<CallSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn insert(&self, session: Arc<CallSession>) {
        self.sessions
            .insert(session.call_sid().clone(), session);
    }

    pub fn get(&self, call_sid: &CallSid) -> Option<Arc<CallSession>> {
        self.sessions.get(call_sid).map(|s| Arc::clone(&s))
    }

    pub fn remove(&self, call_sid: &CallSid) -> Option<Arc<CallSession>> {
        self.sessions.remove(call_sid).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the media bridge for one connection. A trait so tests can
/// substitute scripted bridges for the realtime implementation.
pub trait BridgeFactory: Send + Sync {
    fn create(
        &self,
        call_sid: CallSid,
        instructions: String,
        carrier_in: mpsc::Receiver<String>,
        carrier_out: mpsc::Sender<String>,
    ) -> Arc<dyn MediaBridge>;
}

/// Production factory: every connection gets its own realtime bridge.
pub struct RealtimeBridgeFactory {
    settings: Arc<Settings>,
}

impl RealtimeBridgeFactory {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

impl BridgeFactory for RealtimeBridgeFactory {
    fn create(
        &self,
        call_sid: CallSid,
        instructions: String,
        carrier_in: mpsc::Receiver<String>,
        carrier_out: mpsc::Sender<String>,
    ) -> Arc<dyn MediaBridge> {
        Arc::new(RealtimeVoiceBridge::new(
            &self.settings,
            call_sid,
            instructions,
            carrier_in,
            carrier_out,
        ))
    }
}
