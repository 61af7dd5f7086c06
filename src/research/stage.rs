//! Stage state machine and stage execution
//!
//! A [`PipelineRun`] only moves forward through [`Stage`]s. Each top-level
//! stage is wrapped by [`execute_stage`], which opens a [`ToolInvocation`],
//! runs the stage body and closes the invocation with either a `stage_end`
//! or the run's single terminal `error` event.

use crate::research::events::{EventPayload, EventSink, StreamClosed, ToolStatus};
use crate::types::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Searching,
    Fetching,
    Synthesizing,
    Completed,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Searching => "searching",
            Stage::Fetching => "fetching",
            Stage::Synthesizing => "synthesizing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    fn successor(&self) -> Option<Stage> {
        match self {
            Stage::Planning => Some(Stage::Searching),
            Stage::Searching => Some(Stage::Fetching),
            Stage::Fetching => Some(Stage::Synthesizing),
            Stage::Synthesizing => Some(Stage::Completed),
            Stage::Completed | Stage::Failed => None,
        }
    }

    /// Forward by exactly one step, or to `Failed` from any non-terminal stage.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Stage::Failed || self.successor() == Some(next)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One execution of the research pipeline. Not persisted.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    run_id: Uuid,
    session_id: String,
    query: String,
    stage: Stage,
    started_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id: session_id.into(),
            query: query.into(),
            stage: Stage::Planning,
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Move to `next`. Entering the current stage again is a no-op.
    pub fn advance(&mut self, next: Stage) -> Result<(), AppError> {
        if self.stage == next {
            return Ok(());
        }
        if !self.stage.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "Invalid stage transition {} -> {}",
                self.stage, next
            )));
        }
        info!(run_id = %self.run_id, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        Ok(())
    }

    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            info!(run_id = %self.run_id, from = %self.stage, "Run failed");
            self.stage = Stage::Failed;
        }
    }
}

/// An open `stage_start` awaiting its single closing event.
///
/// Closing consumes the invocation, so it cannot be finalized twice.
#[derive(Debug)]
#[must_use = "an opened invocation must be closed with finish() or fail_run()"]
pub struct ToolInvocation {
    id: String,
    name: String,
}

/// How a stage body ended, and what its `stage_end` reports.
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub value: T,
    pub status: ToolStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<Value>,
}

impl<T> StageOutcome<T> {
    pub fn success(value: T) -> Self {
        Self {
            value,
            status: ToolStatus::Success,
            result: None,
            error: None,
            metadata: None,
        }
    }

    /// The stage produced a usable value but reports an error status.
    pub fn degraded(value: T, error: impl Into<String>) -> Self {
        Self {
            value,
            status: ToolStatus::Error,
            result: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl ToolInvocation {
    /// Emit `stage_start` and return the open invocation.
    pub async fn open(
        sink: &EventSink,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, StreamClosed> {
        let invocation = Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
        };
        sink.emit(EventPayload::StageStart {
            invocation_id: invocation.id.clone(),
            name: invocation.name.clone(),
            message: message.into(),
        })
        .await?;
        Ok(invocation)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit the `stage_end` for this invocation.
    pub async fn finish<T>(self, sink: &EventSink, outcome: &StageOutcome<T>) -> Result<(), StreamClosed> {
        sink.emit(EventPayload::StageEnd {
            invocation_id: self.id,
            status: outcome.status,
            result: outcome.result.clone(),
            error: outcome.error.clone(),
            metadata: outcome.metadata.clone(),
        })
        .await
    }

    /// Close this invocation with the run's terminal `error` event.
    pub async fn fail_run(self, sink: &EventSink, err: &AppError) -> Result<(), StreamClosed> {
        sink.error(
            err.code(),
            err.message(),
            json!({ "invocation_id": self.id, "stage": self.name }),
        )
        .await
    }
}

/// Why a run stopped before reaching `Completed`.
#[derive(Debug, thiserror::Error)]
pub enum RunAbort {
    /// The consumer went away; nothing more is emitted.
    #[error(transparent)]
    Closed(#[from] StreamClosed),
    /// A fatal stage failure; the terminal `error` event has been emitted.
    #[error("{0}")]
    Failed(AppError),
}

/// Run one top-level stage with its start/end events and error translation.
///
/// A body error is fatal: the run moves to [`Stage::Failed`] and the open
/// invocation is closed by a single `error` event instead of a `stage_end`.
pub async fn execute_stage<T, Fut>(
    sink: &EventSink,
    run: &mut PipelineRun,
    stage: Stage,
    message: &str,
    body: Fut,
) -> Result<T, RunAbort>
where
    Fut: Future<Output = crate::types::Result<StageOutcome<T>>>,
{
    run.advance(stage).map_err(RunAbort::Failed)?;
    let invocation = ToolInvocation::open(sink, stage.name(), message).await?;

    match body.await {
        Ok(outcome) => {
            invocation.finish(sink, &outcome).await?;
            Ok(outcome.value)
        }
        Err(err) => {
            error!(run_id = %run.run_id(), stage = %stage, error = %err, "Stage failed");
            run.fail();
            invocation.fail_run(sink, &err).await?;
            Err(RunAbort::Failed(err))
        }
    }
}
