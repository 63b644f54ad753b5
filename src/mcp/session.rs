//! Protocol session lifecycle
//!
//! The bridge serves a single session slot. A handshake replaces whatever
//! occupies it; every other request reuses it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{errors::AppError, mcp::engine::ProtocolEngine};

#[derive(Debug)]
pub struct McpSession {
    id: String,
    created_at: DateTime<Utc>,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl McpSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `false` when the session was already closed.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

impl Default for McpSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the one live session. Presence of a session in the slot is what
/// "connected" means.
pub struct SessionController {
    engine: Arc<dyn ProtocolEngine>,
    slot: Mutex<Option<Arc<McpSession>>>,
}

impl SessionController {
    pub fn new(engine: Arc<dyn ProtocolEngine>) -> Self {
        Self {
            engine,
            slot: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ProtocolEngine> {
        &self.engine
    }

    pub async fn current(&self) -> Option<Arc<McpSession>> {
        self.slot.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Returns the live session, creating and attaching one if the slot is empty.
    pub async fn ensure_connected(&self) -> Result<Arc<McpSession>, AppError> {
        let mut slot = self.slot.lock().await;
        self.connect_locked(&mut slot).await
    }

    /// Retires the live session, if any, and installs a fresh one.
    ///
    /// A failure to close the old session is logged and ignored. If attaching
    /// the replacement fails the slot is left empty.
    ///
    /// The returned session is forwarded outside the slot lock, so a
    /// handshake superseded by a concurrent one before its request reaches
    /// the engine is answered with HTTP 404 and JSON-RPC `-32000 Session
    /// closed`.
    pub async fn reset_connection(&self) -> Result<Arc<McpSession>, AppError> {
        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.take() {
            match self.engine.close(&previous).await {
                Ok(()) => info!(session_id = %previous.id(), "session closed"),
                Err(err) => warn!(
                    session_id = %previous.id(),
                    error = %err,
                    "failed to close session, replacing it anyway"
                ),
            }
        }

        self.connect_locked(&mut slot).await
    }

    async fn connect_locked(
        &self,
        slot: &mut Option<Arc<McpSession>>,
    ) -> Result<Arc<McpSession>, AppError> {
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(McpSession::new());
        self.engine.connect(&session).await?;
        info!(
            session_id = %session.id(),
            created_at = %session.created_at(),
            "session connected"
        );

        *slot = Some(Arc::clone(&session));
        Ok(session)
    }
}
