use crate::{
    agents::{GenerationPipeline, PipelineKind, PipelineSelector},
    llm::LLMClient,
    research::{EventPayload, EventStream, ResearchPipeline, ToolStatus},
    tools::{PageFetcher, SearchProvider},
    types::{AppError, ChatRequest, ChatResponse, Result, ToolCallSummary},
    utils::toml_config::ConfigManager,
};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

/// Entry point for chat requests: selects a pipeline and runs it.
///
/// Collaborators are injected once; each run takes a fresh snapshot of the
/// configuration, so a hot reload applies to the next run and never to one
/// already in flight.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ConfigManager>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    llm: Arc<dyn LLMClient>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<ConfigManager>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Arc<dyn LLMClient>,
    ) -> Self {
        Self {
            config,
            search,
            fetcher,
            llm,
        }
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    /// Select the pipeline for a query.
    pub fn select(&self, query: &str, override_name: Option<&str>) -> PipelineKind {
        let config = self.config.config();
        PipelineSelector::from_config(&config.pipelines).select(query, override_name)
    }

    /// Start a run and return its event stream.
    pub fn stream(
        &self,
        query: &str,
        session_id: &str,
        override_name: Option<&str>,
    ) -> (PipelineKind, EventStream) {
        let config = self.config.config();
        let kind = PipelineSelector::from_config(&config.pipelines).select(query, override_name);
        tracing::info!(pipeline = %kind, session_id, "Dispatching run");

        let stream = match kind {
            PipelineKind::Research => Arc::new(ResearchPipeline::new(
                Arc::clone(&self.search),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.llm),
                Arc::clone(&config),
            ))
            .start(query, session_id),
            PipelineKind::Generation => Arc::new(GenerationPipeline::new(
                Arc::clone(&self.llm),
                config.research.event_buffer,
            ))
            .start(query, session_id),
        };

        (kind, stream)
    }

    /// Run to completion and assemble a single reply.
    ///
    /// A run ending in an `error` event is returned as that error.
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if request.message.trim().is_empty() {
            return Err(AppError::InvalidInput("message must not be empty".to_string()));
        }

        let (_, mut events) = self.stream(
            &request.message,
            &request.session_id,
            request.agent_type.as_deref(),
        );

        let mut messages: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCallSummary> = Vec::new();
        let mut finished = false;

        while let Some(event) = events.next().await {
            match event.payload {
                EventPayload::StageStart {
                    invocation_id,
                    name,
                    ..
                } => tool_calls.push(ToolCallSummary {
                    invocation_id,
                    name,
                    status: ToolStatus::Running.as_str().to_string(),
                    result: None,
                }),
                EventPayload::StageEnd {
                    invocation_id,
                    status,
                    result,
                    error,
                    ..
                } => {
                    if let Some(call) = tool_calls
                        .iter_mut()
                        .find(|c| c.invocation_id == invocation_id)
                    {
                        call.status = status.as_str().to_string();
                        call.result = result.or(error);
                    }
                }
                EventPayload::TextChunk { .. } => {}
                EventPayload::MessageComplete { content, .. } => messages.push(content),
                EventPayload::PipelineEnd { .. } => {
                    finished = true;
                    break;
                }
                EventPayload::Error { code, message, .. } => {
                    return Err(error_from_code(&code, message));
                }
            }
        }

        if !finished {
            return Err(AppError::Internal("run ended without completing".to_string()));
        }

        Ok(ChatResponse {
            message_id: Uuid::new_v4().to_string(),
            session_id: request.session_id.clone(),
            content: messages.join("\n\n"),
            tool_calls,
            timestamp: Utc::now(),
        })
    }
}

fn error_from_code(code: &str, message: String) -> AppError {
    match code {
        "SEARCH_FAILED" => AppError::Search(message),
        "FETCH_FAILED" => AppError::Fetch(message),
        "GENERATION_FAILED" => AppError::Generation(message),
        "LLM_ERROR" => AppError::LLM(message),
        "CONFIGURATION_ERROR" => AppError::Config(message),
        "VALIDATION_ERROR" => AppError::InvalidInput(message),
        "NOT_FOUND" => AppError::NotFound(message),
        _ => AppError::Internal(message),
    }
}
