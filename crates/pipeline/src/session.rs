//! In-memory session store.
//!
//! One session owns one uploaded image. Sessions live in a map guarded by a
//! `tokio::sync::RwLock` that is held only to insert, look up or remove an
//! entry; each record sits behind its own `RwLock`. Expiry is computed from
//! `last_used_at` against an injected [`Clock`], so TTL behaviour is
//! deterministic under test.
//!
//! Background view detection publishes through a per-session
//! `tokio::sync::watch` channel. The store keeps the receiver and hands the
//! single sender to whoever runs the detection.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, RwLock};

use drawlens_core::clock::Clock;
use drawlens_core::decoder::ImageDecoder;
use drawlens_core::error::CoreError;
use drawlens_core::grounding::DetectedElement;
use drawlens_core::types::{ImageFrame, SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle status of a session.
///
/// Decoding happens before a record exists, so a stored session starts out
/// `Ready`. `Expired` is set on a record the moment it is evicted; turns
/// still holding it see the flag and drop their writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Ready,
    Expired,
}

/// Progress of the background view-detection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionState {
    Pending,
    Running,
    Completed,
    Failed,
    /// Background detection is switched off for this deployment.
    Disabled,
}

impl DetectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DetectionState::Completed | DetectionState::Failed | DetectionState::Disabled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundDetection {
    pub state: DetectionState,
    pub elements: Vec<DetectedElement>,
}

impl BackgroundDetection {
    fn with_state(state: DetectionState) -> Self {
        Self {
            state,
            elements: Vec::new(),
        }
    }
}

/// Point-in-time copy of a session, safe to use without holding any lock.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Shared with the store; released once the record and all copies drop.
    pub image: Arc<[u8]>,
    pub frame: ImageFrame,
    pub created_at: Timestamp,
    pub last_used_at: Timestamp,
    pub status: SessionStatus,
    pub background_detection: BackgroundDetection,
    /// Elements currently shown for this drawing (last write wins between
    /// foreground turns and background detection).
    pub display_elements: Vec<DetectedElement>,
    pub turn_count: u32,
}

struct SessionRecord {
    id: SessionId,
    image: Arc<[u8]>,
    frame: ImageFrame,
    created_at: Timestamp,
    last_used_at: Timestamp,
    status: SessionStatus,
    detection: watch::Receiver<BackgroundDetection>,
    display_elements: Vec<DetectedElement>,
    turn_count: u32,
}

impl SessionRecord {
    fn snapshot(&self) -> Session {
        Session {
            id: self.id,
            image: Arc::clone(&self.image),
            frame: self.frame,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            status: self.status,
            background_detection: self.detection.borrow().clone(),
            display_elements: self.display_elements.clone(),
            turn_count: self.turn_count,
        }
    }

    fn is_live(&self) -> bool {
        self.status == SessionStatus::Ready
    }
}

/// Write half of a session's detection channel.
///
/// There is exactly one per session; publishing never fails, even after the
/// session is gone.
#[derive(Debug)]
pub struct DetectionPublisher {
    session_id: SessionId,
    sender: watch::Sender<BackgroundDetection>,
}

impl DetectionPublisher {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn running(&self) {
        self.publish(BackgroundDetection::with_state(DetectionState::Running));
    }

    pub fn completed(&self, elements: Vec<DetectedElement>) {
        self.publish(BackgroundDetection {
            state: DetectionState::Completed,
            elements,
        });
    }

    pub fn failed(&self) {
        self.publish(BackgroundDetection::with_state(DetectionState::Failed));
    }

    pub fn disabled(&self) {
        self.publish(BackgroundDetection::with_state(DetectionState::Disabled));
    }

    /// A terminal state is final; later updates are ignored.
    fn publish(&self, next: BackgroundDetection) {
        self.sender.send_if_modified(|current| {
            if current.state.is_terminal() {
                return false;
            }
            *current = next;
            true
        });
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Owns every live session.
///
/// Designed to be wrapped in `Arc` and shared between the HTTP handlers and
/// the background tasks.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<RwLock<SessionRecord>>>>,
    decoder: Arc<dyn ImageDecoder>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            decoder,
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    fn is_expired(&self, last_used_at: Timestamp, now: Timestamp) -> bool {
        now - last_used_at > self.ttl
    }

    /// Decode `image` and register a new session for it.
    ///
    /// Nothing is stored when decoding fails. The returned publisher is the
    /// only writer of the session's background-detection state.
    pub async fn create(&self, image: Vec<u8>) -> Result<(Session, DetectionPublisher), CoreError> {
        let frame = self.decoder.decode(&image)?;
        let id = SessionId::new();
        let now = self.clock.now();
        let (sender, receiver) =
            watch::channel(BackgroundDetection::with_state(DetectionState::Pending));

        let record = SessionRecord {
            id,
            image: Arc::from(image),
            frame,
            created_at: now,
            last_used_at: now,
            status: SessionStatus::Ready,
            detection: receiver,
            display_elements: Vec::new(),
            turn_count: 0,
        };
        let session = record.snapshot();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(record)));

        tracing::info!(
            session_id = %id,
            width = frame.width,
            height = frame.height,
            "Session created"
        );
        Ok((session, DetectionPublisher { session_id: id, sender }))
    }

    async fn lookup(&self, id: &SessionId) -> Option<Arc<RwLock<SessionRecord>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove `id` from the map and flag the record as expired.
    async fn evict(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(record) => {
                record.write().await.status = SessionStatus::Expired;
                true
            }
            None => false,
        }
    }

    /// Look up a session without refreshing it.
    ///
    /// A session past its TTL is evicted on the spot and reported as
    /// `NotFound`.
    pub async fn get(&self, id: &SessionId) -> Result<Session, CoreError> {
        let record = self
            .lookup(id)
            .await
            .ok_or_else(|| CoreError::session_not_found(id))?;

        let now = self.clock.now();
        {
            let record = record.read().await;
            if record.is_live() && !self.is_expired(record.last_used_at, now) {
                return Ok(record.snapshot());
            }
        }
        self.evict(id).await;
        tracing::debug!(session_id = %id, "Expired session evicted on lookup");
        Err(CoreError::session_not_found(id))
    }

    /// Look up a session for a turn and refresh `last_used_at`.
    pub async fn acquire(&self, id: &SessionId) -> Result<Session, CoreError> {
        let record = self
            .lookup(id)
            .await
            .ok_or_else(|| CoreError::session_not_found(id))?;

        let now = self.clock.now();
        {
            let mut record = record.write().await;
            if record.is_live() && !self.is_expired(record.last_used_at, now) {
                record.last_used_at = now;
                return Ok(record.snapshot());
            }
        }
        self.evict(id).await;
        tracing::debug!(session_id = %id, "Expired session evicted on acquire");
        Err(CoreError::session_not_found(id))
    }

    /// Record a finished turn: refresh the session, bump the turn counter and,
    /// when the turn produced grounding, replace the display elements.
    ///
    /// Returns `false` when the session disappeared while the turn ran; the
    /// write is then dropped.
    pub async fn record_turn(
        &self,
        id: &SessionId,
        elements: Option<Vec<DetectedElement>>,
    ) -> bool {
        let Some(record) = self.lookup(id).await else {
            return false;
        };
        let mut record = record.write().await;
        if !record.is_live() {
            return false;
        }
        record.last_used_at = self.clock.now();
        record.turn_count += 1;
        if let Some(elements) = elements {
            record.display_elements = elements;
        }
        true
    }

    /// Store background-detection results for display without refreshing
    /// the session.
    pub async fn record_display_elements(
        &self,
        id: &SessionId,
        elements: Vec<DetectedElement>,
    ) -> bool {
        let Some(record) = self.lookup(id).await else {
            return false;
        };
        let mut record = record.write().await;
        if !record.is_live() {
            return false;
        }
        record.display_elements = elements;
        true
    }

    /// Receiver for background-detection updates of `id`.
    pub async fn detection_updates(
        &self,
        id: &SessionId,
    ) -> Result<watch::Receiver<BackgroundDetection>, CoreError> {
        let session = self.get(id).await?;
        let record = self
            .lookup(&session.id)
            .await
            .ok_or_else(|| CoreError::session_not_found(id))?;
        let receiver = record.read().await.detection.clone();
        Ok(receiver)
    }

    /// Remove every session whose TTL has passed. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let records: Vec<(SessionId, Arc<RwLock<SessionRecord>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, record)| (*id, Arc::clone(record)))
            .collect();

        let mut expired = Vec::new();
        for (id, record) in records {
            if self.is_expired(record.read().await.last_used_at, now) {
                expired.push(id);
            }
        }

        let mut removed = 0;
        for id in expired {
            // A turn may have refreshed the session since the scan.
            let still_expired = match self.lookup(&id).await {
                Some(record) => {
                    let last_used_at = record.read().await.last_used_at;
                    self.is_expired(last_used_at, now)
                }
                None => false,
            };
            if still_expired && self.evict(&id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Explicitly remove a session. Idempotent.
    pub async fn delete(&self, id: &SessionId) -> bool {
        let removed = self.evict(id).await;
        if removed {
            tracing::info!(session_id = %id, "Session deleted");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
