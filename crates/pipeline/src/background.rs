//! Background tasks: per-upload view detection and the session sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use drawlens_core::prompt::AnalysisMode;

use crate::orchestrator::TurnOrchestrator;
use crate::session::{DetectionPublisher, Session, SessionStore};

/// Run a grounded view-detection turn for a freshly uploaded session.
///
/// Fire-and-forget: the outcome is published through `publisher` and the
/// detected elements become the session's display elements. Never refreshes
/// the session and never blocks foreground turns.
pub fn spawn_detection(
    orchestrator: Arc<TurnOrchestrator>,
    store: Arc<SessionStore>,
    session: Session,
    publisher: DetectionPublisher,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let session_id = session.id;
        publisher.running();
        tracing::debug!(%session_id, "Background detection started");

        match orchestrator
            .run(&session, &AnalysisMode::ViewDetection, true)
            .await
        {
            Ok(outcome) => {
                let elements = outcome.detected_elements;
                if !store
                    .record_display_elements(&session_id, elements.clone())
                    .await
                {
                    tracing::debug!(%session_id, "Session gone before detection finished");
                }
                tracing::info!(
                    %session_id,
                    elements = elements.len(),
                    elapsed_ms = (outcome.processing_time * 1000.0) as u64,
                    "Background detection completed"
                );
                publisher.completed(elements);
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Background detection failed");
                publisher.failed();
            }
        }
    })
}

/// Run the expired-session sweeper loop until `cancel` is triggered.
pub async fn run_sweeper(store: Arc<SessionStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        ttl_hours = store.ttl().num_hours(),
        "Session sweeper started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = store.sweep().await;
                if removed > 0 {
                    let remaining = store.len().await;
                    tracing::info!(removed, remaining, "Session sweeper: evicted expired sessions");
                } else {
                    tracing::debug!("Session sweeper: nothing to evict");
                }
            }
        }
    }
}
