//! Streaming and buffered delivery of a pipeline run.
//!
//! Both modes drive the same [`PipelineRun`](crate::pipeline::PipelineRun)
//! inside a spawned task bounded by the request budget, so a panicking
//! capability or an overrun is reported instead of tearing down the caller.
//!
//! - [`stream_pipeline`] yields [`StreamEvent`]s as stages start and finish.
//! - [`generate_buffered`] waits for the whole run and returns a
//!   [`GenerateResponse`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, warn};

use crate::error::PipelineError;
use crate::pipeline::{
    Idea, Orchestrator, PipelineRun, PipelineState, StageName, StageOutcome, StagePayload,
    background_preview,
};

/// Events buffered between the pipeline task and a slow consumer.
const STREAM_BUFFER: usize = 32;

/// Default overall budget for one request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 480;

/// An inbound generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub background: String,
    #[serde(default)]
    pub stream: bool,
}

/// Data carried by a `step_complete` event. Only the fields the stage
/// produced are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepComplete {
    pub step: StageName,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brainstorms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_works: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_works_count: Option<usize>,
}

impl StepComplete {
    fn new(step: StageName, message: String) -> Self {
        Self {
            step,
            message,
            entities: None,
            expanded_background: None,
            brainstorms: None,
            related_works: None,
            related_works_count: None,
        }
    }
}

/// One frame of the incremental protocol, serialized as
/// `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    QueryReceived {
        background: String,
    },
    StepStart {
        step: StageName,
        message: String,
    },
    StepComplete(StepComplete),
    /// Terminal. `step` is absent for failures outside any stage.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<StageName>,
        message: String,
    },
    /// Terminal; the last frame of a successful run.
    FinalResult {
        initial_ideas_count: usize,
        final_ideas_count: usize,
        ideas: Vec<Idea>,
        message: String,
    },
}

impl StreamEvent {
    pub fn query_received(background: &str) -> Self {
        Self::QueryReceived {
            background: background_preview(background),
        }
    }

    pub fn step_start(stage: StageName) -> Self {
        Self::StepStart {
            step: stage,
            message: stage.start_message().to_string(),
        }
    }

    /// The event reporting `outcome`. Success of the final stage becomes
    /// `final_result`.
    pub fn from_outcome(stage: StageName, outcome: StageOutcome) -> Self {
        let payload = match outcome {
            StageOutcome::Success(payload) => payload,
            StageOutcome::Failure(failure) => {
                return Self::Error {
                    step: Some(failure.stage),
                    message: failure.message,
                };
            }
        };

        let message = payload.message(stage);
        let mut complete = StepComplete::new(stage, message);
        match payload {
            StagePayload::Ideas {
                initial_count,
                final_count,
                ideas,
            } => {
                return Self::FinalResult {
                    initial_ideas_count: initial_count,
                    final_ideas_count: final_count,
                    ideas,
                    message: complete.message,
                };
            }
            StagePayload::Entities(entities) => complete.entities = Some(entities),
            StagePayload::ExpandedBackground(text) => complete.expanded_background = Some(text),
            StagePayload::Brainstorm(items) => complete.brainstorms = Some(items),
            StagePayload::Literature {
                related_works,
                count,
            } => {
                complete.related_works = Some(related_works);
                complete.related_works_count = Some(count);
            }
        }
        Self::StepComplete(complete)
    }

    pub fn from_error(err: &PipelineError) -> Self {
        match err {
            PipelineError::Stage(failure) => Self::Error {
                step: Some(failure.stage),
                message: failure.message.clone(),
            },
            other => Self::Error {
                step: None,
                message: other.to_string(),
            },
        }
    }

    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::FinalResult { .. })
    }

    /// The wire frame: `data: <json>\n\n`.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Start a run and stream its events.
///
/// The receiver yields `query_received`, then `step_start` and a result
/// event per stage, and closes after the first terminal event. Dropping the
/// receiver stops the run before its next stage.
///
/// # Errors
///
/// [`PipelineError::EmptyBackground`] before anything is spawned.
pub fn stream_pipeline(
    orchestrator: &Orchestrator,
    background: &str,
    budget: Duration,
) -> Result<mpsc::Receiver<StreamEvent>, PipelineError> {
    let run = orchestrator.start(background)?;
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(supervise_stream(run, tx, budget));
    Ok(rx)
}

async fn supervise_stream(run: PipelineRun, tx: mpsc::Sender<StreamEvent>, budget: Duration) {
    let run_id = run.run_id();
    let mut worker = AbortOnDropHandle::new(tokio::spawn(produce_events(run, tx.clone())));

    // The terminal event is sent from here only.
    let terminal = match tokio::time::timeout(budget, &mut worker).await {
        Ok(Ok(Some(event))) => event,
        Ok(Ok(None)) => return,
        Ok(Err(join_err)) => {
            let err = PipelineError::Unexpected(join_failure(join_err));
            error!(run_id = %run_id, error = %err, "pipeline task aborted");
            StreamEvent::from_error(&err)
        }
        Err(_) => {
            worker.abort();
            warn!(run_id = %run_id, budget_secs = budget.as_secs(), "request budget exceeded");
            StreamEvent::from_error(&PipelineError::Timeout {
                secs: budget.as_secs(),
            })
        }
    };
    let _ = tx.send(terminal).await;
}

/// Send every non-terminal event and hand the terminal one back.
///
/// Returns `None` once the receiver is gone.
async fn produce_events(mut run: PipelineRun, tx: mpsc::Sender<StreamEvent>) -> Option<StreamEvent> {
    let run_id = run.run_id();
    let ack = StreamEvent::query_received(&run.state().background);
    tx.send(ack).await.ok()?;

    while let Some(stage) = run.next_stage() {
        if tx.send(StreamEvent::step_start(stage)).await.is_err() {
            debug!(run_id = %run_id, stage = %stage, "stream receiver dropped, stopping run");
            return None;
        }
        let (stage, outcome) = run.step().await?;
        let event = StreamEvent::from_outcome(stage, outcome);
        if event.is_terminal() {
            return Some(event);
        }
        if tx.send(event).await.is_err() {
            debug!(run_id = %run_id, stage = %stage, "stream receiver dropped, stopping run");
            return None;
        }
    }
    None
}

/// The buffered result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub status: String,
    pub entities_bg: Vec<String>,
    pub expanded_background: String,
    pub brainstorms: Vec<String>,
    pub entities_all: Vec<String>,
    pub related_works: Vec<String>,
    pub related_works_count: usize,
    pub initial_ideas_count: usize,
    pub final_ideas_count: usize,
    pub ideas: Vec<Idea>,
}

impl From<PipelineState> for GenerateResponse {
    fn from(state: PipelineState) -> Self {
        let ideas = state.ideas();
        Self {
            status: "success".into(),
            entities_bg: state.entities_background,
            expanded_background: state.expanded_background.unwrap_or_default(),
            brainstorms: state.brainstorm_items,
            entities_all: state.entities_literature,
            related_works: state.related_works,
            related_works_count: state.related_papers.len(),
            initial_ideas_count: state.initial_ideas.len(),
            final_ideas_count: state.final_ideas.len(),
            ideas,
        }
    }
}

/// Run the whole pipeline and return every artifact at once.
///
/// # Errors
///
/// The first failing stage, an empty background, an exceeded budget, or a
/// panicking capability, as a single [`PipelineError`].
pub async fn generate_buffered(
    orchestrator: &Orchestrator,
    background: &str,
    budget: Duration,
) -> Result<GenerateResponse, PipelineError> {
    let run = orchestrator.start(background)?;
    let run_id = run.run_id();
    // Aborts the run if the caller gives up on this future.
    let mut worker = AbortOnDropHandle::new(tokio::spawn(run.finish()));

    match tokio::time::timeout(budget, &mut worker).await {
        Ok(Ok(result)) => result.map(GenerateResponse::from),
        Ok(Err(join_err)) => {
            let err = PipelineError::Unexpected(join_failure(join_err));
            error!(run_id = %run_id, error = %err, "pipeline task aborted");
            Err(err)
        }
        Err(_) => {
            worker.abort();
            warn!(run_id = %run_id, budget_secs = budget.as_secs(), "request budget exceeded");
            Err(PipelineError::Timeout {
                secs: budget.as_secs(),
            })
        }
    }
}

/// Describe why a pipeline task ended without returning.
fn join_failure(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                msg.to_string()
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                msg.clone()
            } else {
                "pipeline task panicked".to_string()
            }
        }
        Err(_) => "pipeline task was cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCapabilities, Reply};
    use std::sync::Arc;

    const BUDGET: Duration = Duration::from_secs(30);

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn event_type(event: &StreamEvent) -> String {
        serde_json::to_value(event).unwrap()["type"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn streams_every_stage_in_order() {
        let fake = Arc::new(FakeCapabilities::happy());
        let orch = Orchestrator::new(fake.capabilities());
        let events = collect(stream_pipeline(&orch, "Graph learning for drugs", BUDGET).unwrap()).await;

        let types: Vec<String> = events.iter().map(event_type).collect();
        let mut expected = vec!["query_received".to_string()];
        for _ in 0..5 {
            expected.push("step_start".into());
            expected.push("step_complete".into());
        }
        expected.push("step_start".into());
        expected.push("final_result".into());
        assert_eq!(types, expected);

        let starts: Vec<StageName> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::StepStart { step, .. } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(starts, StageName::ALL);
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn stage_payloads_land_in_step_complete() {
        let fake = Arc::new(FakeCapabilities::happy());
        let orch = Orchestrator::new(fake.capabilities());
        let events = collect(stream_pipeline(&orch, "bg", BUDGET).unwrap()).await;

        let completes: Vec<&StepComplete> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::StepComplete(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(completes.len(), 5);
        assert_eq!(completes[0].message, "Successfully extracted 2 entities");
        assert_eq!(completes[0].entities.as_ref().unwrap().len(), 2);
        assert!(completes[1].expanded_background.is_some());
        assert_eq!(completes[2].brainstorms.as_ref().unwrap().len(), 2);
        assert_eq!(completes[3].entities.as_ref().unwrap().len(), 3);
        assert_eq!(completes[4].related_works_count, Some(2));
        assert_eq!(
            completes[4].message,
            "Successfully retrieved 2 related papers"
        );
    }

    #[tokio::test]
    async fn buffered_and_streaming_agree() {
        let fake = Arc::new(FakeCapabilities::happy());
        let orch = Orchestrator::new(fake.capabilities());

        let buffered = generate_buffered(&orch, "bg", BUDGET).await.unwrap();
        let events = collect(stream_pipeline(&orch, "bg", BUDGET).unwrap()).await;

        let Some(StreamEvent::FinalResult {
            initial_ideas_count,
            final_ideas_count,
            ideas,
            message,
        }) = events.last()
        else {
            panic!("stream did not end with final_result");
        };
        assert_eq!(*ideas, buffered.ideas);
        assert_eq!(*initial_ideas_count, buffered.initial_ideas_count);
        assert_eq!(*final_ideas_count, buffered.final_ideas_count);
        assert_eq!(message, "Successfully generated 3 ideas");
        assert_eq!(buffered.initial_ideas_count, 3);
        assert_eq!(buffered.final_ideas_count, 2);
        assert_eq!(buffered.ideas[2].idea_in_detail, None);
    }

    #[tokio::test]
    async fn null_expansion_ends_stream_with_error() {
        let fake = Arc::new(FakeCapabilities {
            expansion: Reply::Nothing,
            ..FakeCapabilities::happy()
        });
        let orch = Orchestrator::new(fake.capabilities());
        let events = collect(stream_pipeline(&orch, "bg", BUDGET).unwrap()).await;

        assert_eq!(events.len(), 5);
        assert_eq!(
            events.last().unwrap(),
            &StreamEvent::Error {
                step: Some(StageName::ExpandBackground),
                message: "Failed to expand background (API timeout or error)".into(),
            }
        );
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_background_is_rejected_up_front() {
        let fake = Arc::new(FakeCapabilities::happy());
        let orch = Orchestrator::new(fake.capabilities());

        assert!(matches!(
            stream_pipeline(&orch, "  ", BUDGET),
            Err(PipelineError::EmptyBackground)
        ));
        assert!(matches!(
            generate_buffered(&orch, "", BUDGET).await,
            Err(PipelineError::EmptyBackground)
        ));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn panicking_capability_becomes_unexpected_error() {
        let fake = Arc::new(FakeCapabilities {
            brainstorm: Reply::Panic,
            ..FakeCapabilities::happy()
        });
        let orch = Orchestrator::new(fake.capabilities());

        let events = collect(stream_pipeline(&orch, "bg", BUDGET).unwrap()).await;
        match events.last().unwrap() {
            StreamEvent::Error { step, message } => {
                assert_eq!(*step, None);
                assert_eq!(message, "Unexpected error: brainstorm capability panicked");
            }
            other => panic!("expected error event, got {other:?}"),
        }

        let err = generate_buffered(&orch, "bg", BUDGET).await.unwrap_err();
        assert!(matches!(err, PipelineError::Unexpected(ref m) if m.contains("panicked")));
    }

    #[tokio::test]
    async fn budget_bounds_both_modes() {
        let fake = Arc::new(FakeCapabilities {
            delay: Duration::from_millis(300),
            ..FakeCapabilities::happy()
        });
        let orch = Orchestrator::new(fake.capabilities());
        let budget = Duration::from_millis(50);

        let events = collect(stream_pipeline(&orch, "bg", budget).unwrap()).await;
        match events.last().unwrap() {
            StreamEvent::Error { step: None, message } => {
                assert!(message.starts_with("Request timed out"), "{message}");
            }
            other => panic!("expected timeout error, got {other:?}"),
        }

        let err = generate_buffered(&orch, "bg", budget).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_run() {
        let fake = Arc::new(FakeCapabilities {
            delay: Duration::from_millis(50),
            ..FakeCapabilities::happy()
        });
        let orch = Orchestrator::new(fake.capabilities());
        let mut rx = stream_pipeline(&orch, "bg", BUDGET).unwrap();

        assert!(matches!(rx.recv().await, Some(StreamEvent::QueryReceived { .. })));
        assert!(matches!(rx.recv().await, Some(StreamEvent::StepStart { .. })));
        drop(rx);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn dropped_buffered_caller_stops_the_run() {
        let fake = Arc::new(FakeCapabilities {
            delay: Duration::from_millis(50),
            ..FakeCapabilities::happy()
        });
        let orch = Orchestrator::new(fake.capabilities());

        let gave_up =
            tokio::time::timeout(Duration::from_millis(20), generate_buffered(&orch, "bg", BUDGET))
                .await;
        assert!(gave_up.is_err());
        let at_drop = fake.call_count();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(at_drop, 1);
        assert_eq!(fake.call_count(), at_drop);
    }

    #[tokio::test]
    async fn budget_near_run_length_yields_one_terminal_event() {
        let fake = Arc::new(FakeCapabilities {
            delay: Duration::from_millis(10),
            ..FakeCapabilities::happy()
        });
        let orch = Orchestrator::new(fake.capabilities());

        for budget_ms in (40..=90).step_by(5) {
            let budget = Duration::from_millis(budget_ms);
            let events = collect(stream_pipeline(&orch, "bg", budget).unwrap()).await;
            let terminals = events.iter().filter(|e| e.is_terminal()).count();
            assert_eq!(terminals, 1, "budget {budget_ms}ms: {events:?}");
            assert!(events.last().unwrap().is_terminal());
        }
    }

    #[test]
    fn frames_match_the_wire_format() {
        let frame = StreamEvent::step_start(StageName::Brainstorm)
            .to_frame()
            .unwrap();
        assert_eq!(
            frame,
            "data: {\"type\":\"step_start\",\"data\":{\"step\":\"brainstorm\",\"message\":\"Brainstorming...\"}}\n\n"
        );

        let error = StreamEvent::Error {
            step: None,
            message: "Unexpected error: x".into(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "error", "data": {"message": "Unexpected error: x"}})
        );
    }

    #[test]
    fn query_received_truncates_background() {
        let long = "a".repeat(250);
        let StreamEvent::QueryReceived { background } = StreamEvent::query_received(&long) else {
            unreachable!();
        };
        assert_eq!(background.len(), 103);
        assert!(background.ends_with("..."));
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = StreamEvent::from_outcome(
            StageName::RetrieveLiterature,
            StageOutcome::Success(StagePayload::Literature {
                related_works: vec!["T. ACL 2020.".into()],
                count: 1,
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"related_works_count\":1"));
        assert!(!json.contains("entities"));
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn request_stream_defaults_to_false() {
        let req: PipelineRequest = serde_json::from_str(r#"{"background": "bg"}"#).unwrap();
        assert!(!req.stream);
    }

    #[test]
    fn buffered_response_field_names() {
        let mut state = PipelineState::new("bg");
        state.expanded_background = Some("ex".into());
        state.initial_ideas = vec!["i".into()];
        let json = serde_json::to_value(GenerateResponse::from(state)).unwrap();
        for key in [
            "status",
            "entities_bg",
            "expanded_background",
            "brainstorms",
            "entities_all",
            "related_works",
            "related_works_count",
            "initial_ideas_count",
            "final_ideas_count",
            "ideas",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["status"], "success");
        assert_eq!(json["ideas"][0]["idea_in_detail"], serde_json::Value::Null);
    }
}
