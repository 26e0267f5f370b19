mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::Duration;
use tokio_util::sync::CancellationToken;

use drawlens_core::error::CoreError;
use drawlens_core::extract::{DimensionType, DrawingMetadata};
use drawlens_core::labels::ElementType;
use drawlens_core::types::SessionId;
use drawlens_pipeline::{background, ChatTurnRequest, DetectionState, Extractors, SessionStatus};

use common::{drawing, harness, harness_with, Gate, ScriptedModel, IMAGE_HEIGHT, IMAGE_WIDTH};

fn ask(question: &str) -> ChatTurnRequest {
    ChatTurnRequest {
        question: question.to_string(),
        use_grounding: None,
        mode: None,
    }
}

const GROUNDED_ANSWER: &str = "<think>the bore is on the left</think>\
The bore is Ø25 mm ±0.1 wide.\n\n\
```json\n[{\"bbox_2d\": [10, 20, 110, 90], \"label\": \"Ø25\"}]\n```";

// ---------------------------------------------------------------------------
// Test: upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_reports_dimensions_and_ready_status() {
    let h = harness(ScriptedModel::replying("ok"), false);

    let upload = h.service.upload(drawing()).await.unwrap();
    assert_eq!(upload.status, SessionStatus::Ready);
    assert_eq!(upload.detection_status, DetectionState::Disabled);
    assert_eq!((upload.image_width, upload.image_height), (IMAGE_WIDTH, IMAGE_HEIGHT));
    assert_eq!(h.service.session_count().await, 1);
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn unreadable_upload_creates_nothing_and_never_calls_model() {
    let h = harness(ScriptedModel::replying("ok"), true);

    let err = h.service.upload(b"%PDF-1.7 not an image".to_vec()).await.unwrap_err();
    assert_matches!(err, CoreError::Decode(_));
    assert_eq!(h.service.session_count().await, 0);

    tokio::task::yield_now().await;
    assert_eq!(h.model.calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: chat turns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spatial_question_is_grounded_and_parsed() {
    let h = harness(ScriptedModel::replying(GROUNDED_ANSWER), false);
    let upload = h.service.upload(drawing()).await.unwrap();

    let response = h
        .service
        .chat(&upload.session_id.to_string(), ask("Where is the Ø25 bore?"))
        .await
        .unwrap();

    assert!(h.model.prompts()[0].contains("bbox_2d"));
    assert!(!response.answer_markdown.contains("<think>"));
    assert!(!response.answer_text.contains("bbox_2d"));
    assert!(response.answer_text.contains("The bore is Ø25 mm ±0.1 wide."));

    assert_eq!(response.detected_elements.len(), 1);
    let element = &response.detected_elements[0];
    assert_eq!(element.element_type, ElementType::Dimension);
    assert_eq!(
        (element.bbox.x1, element.bbox.y1, element.bbox.x2, element.bbox.y2),
        (10, 20, 110, 90)
    );

    assert_eq!(response.dimensions.len(), 1);
    assert_eq!(response.dimensions[0].dimension_type, DimensionType::Diameter);
    assert_eq!(response.dimensions[0].unit.as_deref(), Some("mm"));
    assert_eq!(response.image_width, IMAGE_WIDTH);

    let session = h.service.store().get(&upload.session_id).await.unwrap();
    assert_eq!(session.turn_count, 1);
    assert_eq!(session.display_elements.len(), 1);
}

#[tokio::test]
async fn explicit_flag_overrides_keyword_heuristic() {
    let h = harness(ScriptedModel::replying(GROUNDED_ANSWER), false);
    let upload = h.service.upload(drawing()).await.unwrap();

    let mut request = ask("Where is the Ø25 bore?");
    request.use_grounding = Some(false);
    let response = h
        .service
        .chat(&upload.session_id.to_string(), request)
        .await
        .unwrap();

    assert!(!h.model.prompts()[0].contains("bbox_2d"));
    assert!(response.detected_elements.is_empty());
    // Extractors still run without grounding.
    assert_eq!(response.dimensions.len(), 1);
}

#[tokio::test]
async fn explicit_mode_uses_its_own_prompt() {
    let h = harness(
        ScriptedModel::replying("| Pos | Part Number | Qty |\n|---|---|---|\n| 1 | P/N 4711 | 2 |"),
        false,
    );
    let upload = h.service.upload(drawing()).await.unwrap();

    let request = ChatTurnRequest {
        question: String::new(),
        use_grounding: None,
        mode: Some("bom_extraction".into()),
    };
    let response = h
        .service
        .chat(&upload.session_id.to_string(), request)
        .await
        .unwrap();

    assert!(h.model.prompts()[0].contains("Bills of Materials"));
    assert_eq!(response.tables.len(), 1);
    assert_eq!(response.tables[0].rows.len(), 1);
}

#[tokio::test]
async fn unknown_session_fails_before_model_call() {
    let h = harness(ScriptedModel::replying("ok"), false);

    let err = h
        .service
        .chat(&SessionId::new().to_string(), ask("What is the scale?"))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });

    let err = h.service.chat("not-a-session", ask("What is the scale?")).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });

    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn deleted_session_fails_before_model_call() {
    let h = harness(ScriptedModel::replying("ok"), false);
    let upload = h.service.upload(drawing()).await.unwrap();
    let id = upload.session_id.to_string();

    assert!(h.service.delete(&id).await);
    assert!(!h.service.delete(&id).await);

    let err = h.service.chat(&id, ask("What is the scale?")).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn expired_session_fails_before_model_call() {
    let h = harness(ScriptedModel::replying("ok"), false);
    let upload = h.service.upload(drawing()).await.unwrap();

    h.clock.advance(Duration::hours(24) + Duration::seconds(1));

    let err = h
        .service
        .chat(&upload.session_id.to_string(), ask("What is the scale?"))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
    assert_eq!(h.model.calls(), 0);
    assert_eq!(h.service.session_count().await, 0);
}

#[tokio::test]
async fn turns_keep_a_session_alive() {
    let h = harness(ScriptedModel::replying("ok"), false);
    let upload = h.service.upload(drawing()).await.unwrap();
    let id = upload.session_id.to_string();

    h.clock.advance(Duration::hours(20));
    h.service.chat(&id, ask("What is the scale?")).await.unwrap();
    h.clock.advance(Duration::hours(20));

    assert!(h.service.chat(&id, ask("And the title?")).await.is_ok());
}

#[tokio::test]
async fn empty_question_is_rejected_before_lookup() {
    let h = harness(ScriptedModel::replying("ok"), false);

    let err = h.service.chat("not-a-session", ask("   ")).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn model_failure_surfaces_as_retryable_error() {
    let h = harness(ScriptedModel::failing(), false);
    let upload = h.service.upload(drawing()).await.unwrap();

    let err = h
        .service
        .chat(&upload.session_id.to_string(), ask("What is the scale?"))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::ModelUnavailable(_));
    assert!(err.is_retryable());

    let session = h.service.store().get(&upload.session_id).await.unwrap();
    assert_eq!(session.turn_count, 0);
}

#[tokio::test]
async fn session_deleted_mid_turn_still_returns_answer() {
    let gate = Arc::new(Gate::default());
    let h = harness(ScriptedModel::replying("The scale is 1:2.").gated(gate.clone()), false);
    let upload = h.service.upload(drawing()).await.unwrap();
    let id = upload.session_id.to_string();

    let service = h.service.clone();
    let turn_id = id.clone();
    let turn = tokio::spawn(async move { service.chat(&turn_id, ask("What is the scale?")).await });

    gate.entered.notified().await;
    assert!(h.service.delete(&id).await);
    gate.release.notify_one();

    let response = turn.await.unwrap().unwrap();
    assert_eq!(response.answer_text, "The scale is 1:2.");
    assert_eq!(h.service.session_count().await, 0);
    assert_matches!(
        h.service.store().get(&upload.session_id).await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn panicking_extractor_degrades_instead_of_failing() {
    let extractors = Extractors {
        dimensions: |_| panic!("dimension grammar exploded"),
        metadata: |_| panic!("metadata grammar exploded"),
        ..Extractors::default()
    };
    let h = harness_with(
        ScriptedModel::replying("Part No 4711 bracket, Ø25 mm"),
        false,
        |orchestrator| orchestrator.with_extractors(extractors),
    );
    let upload = h.service.upload(drawing()).await.unwrap();

    let response = h
        .service
        .chat(&upload.session_id.to_string(), ask("List the parts"))
        .await
        .unwrap();

    assert!(response.dimensions.is_empty());
    assert_eq!(response.metadata, DrawingMetadata::default());
    assert_eq!(response.part_numbers.len(), 1);
    assert_eq!(response.part_numbers[0].number, "4711");
}

// ---------------------------------------------------------------------------
// Test: background detection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn background_detection_completes_and_fills_display() {
    let model = ScriptedModel::new(|prompt| {
        if prompt.contains(common::VIEW_DETECTION_MARKER) {
            Ok("<ref>front view</ref><box>(0,0),(499,999)</box>\
                <ref>title block</ref><box>(600,800),(999,999)</box>"
                .to_string())
        } else {
            Ok("ok".to_string())
        }
    });
    let h = harness(model, true);
    let upload = h.service.upload(drawing()).await.unwrap();
    assert_eq!(upload.detection_status, DetectionState::Pending);

    let mut updates = h
        .service
        .store()
        .detection_updates(&upload.session_id)
        .await
        .unwrap();
    let state = updates.wait_for(|d| d.state.is_terminal()).await.unwrap().state;
    assert_eq!(state, DetectionState::Completed);

    let status = h
        .service
        .detection_status(&upload.session_id.to_string())
        .await
        .unwrap();
    assert_eq!(status.detection_status, DetectionState::Completed);
    assert_eq!(status.elements_count, 2);
    assert_eq!(status.elements[0].element_type, ElementType::View);
    assert_eq!(status.elements[1].element_type, ElementType::Title);

    let session = h.service.store().get(&upload.session_id).await.unwrap();
    assert_eq!(session.display_elements.len(), 2);
    assert_eq!(session.last_used_at, session.created_at);
    assert_eq!(session.turn_count, 0);
}

#[tokio::test]
async fn background_detection_failure_is_reported() {
    let h = harness(ScriptedModel::failing(), true);
    let upload = h.service.upload(drawing()).await.unwrap();

    let mut updates = h
        .service
        .store()
        .detection_updates(&upload.session_id)
        .await
        .unwrap();
    let state = updates.wait_for(|d| d.state.is_terminal()).await.unwrap().state;
    assert_eq!(state, DetectionState::Failed);

    // The session itself stays usable.
    assert!(h.service.store().get(&upload.session_id).await.is_ok());
}

#[tokio::test]
async fn detection_status_of_unknown_session_is_not_found() {
    let h = harness(ScriptedModel::replying("ok"), false);
    assert_matches!(
        h.service.detection_status("nope").await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn german_diameter_with_tolerance_is_extracted() {
    let h = harness(
        ScriptedModel::replying("Außendurchmesser: Ø25mm ±0.1"),
        false,
    );
    let upload = h.service.upload(drawing()).await.unwrap();

    let response = h
        .service
        .chat(&upload.session_id.to_string(), ask("Welche Maße hat die Welle?"))
        .await
        .unwrap();

    assert_eq!(response.dimensions.len(), 1);
    let dimension = &response.dimensions[0];
    assert_eq!(dimension.value, "25");
    assert_eq!(dimension.dimension_type, DimensionType::Diameter);
    assert_eq!(dimension.unit.as_deref(), Some("mm"));
    assert_eq!(dimension.tolerance.as_deref(), Some("±0.1"));
}

// ---------------------------------------------------------------------------
// Test: sweeper
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweeper_task_evicts_expired_sessions_until_cancelled() {
    let h = harness(ScriptedModel::replying("ok"), false);
    let stale = h.service.upload(drawing()).await.unwrap().session_id;

    h.clock.advance(Duration::hours(23));
    let fresh = h.service.upload(drawing()).await.unwrap().session_id;
    h.clock.advance(Duration::hours(1) + Duration::seconds(1));

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(background::run_sweeper(
        Arc::clone(h.service.store()),
        StdDuration::from_millis(10),
        cancel.clone(),
    ));

    tokio::time::timeout(StdDuration::from_secs(5), async {
        while h.service.session_count().await != 1 {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    })
    .await
    .expect("sweeper never evicted the stale session");

    assert_matches!(
        h.service.store().get(&stale).await,
        Err(CoreError::NotFound { .. })
    );
    assert!(h.service.store().get(&fresh).await.is_ok());

    cancel.cancel();
    tokio::time::timeout(StdDuration::from_secs(5), sweeper)
        .await
        .expect("sweeper did not stop after cancellation")
        .unwrap();
}
