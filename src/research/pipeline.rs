use crate::{
    llm::LLMClient,
    research::{
        coordinator::{FetchCoordinator, FetchTask},
        events::{EventSink, EventStream, spawn_stream},
        stage::{PipelineRun, RunAbort, Stage, StageOutcome, execute_stage},
        synthesis::{PromptLimits, SYSTEM_PROMPT, TokenStreamConsumer, build_context},
    },
    tools::{ExtractOptions, HttpTransport, PageFetcher, SearchProvider},
    types::{AppError, PageContent, SearchHit},
    utils::toml_config::ScoutConfig,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Pages with more text than this are preferred as the main source.
const MAIN_SOURCE_MIN_CHARS: usize = 1000;
/// Content length reported for the main source in the Fetching metadata.
const MAIN_SOURCE_PREVIEW_CHARS: usize = 2000;

/// Plan, search, fetch and synthesize, streaming progress as events.
pub struct ResearchPipeline {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    llm: Arc<dyn LLMClient>,
    config: Arc<ScoutConfig>,
}

impl ResearchPipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Arc<dyn LLMClient>,
        config: Arc<ScoutConfig>,
    ) -> Self {
        Self {
            search,
            fetcher,
            llm,
            config,
        }
    }

    /// Start a run on its own task and return its event stream.
    ///
    /// Must be called within a tokio runtime. Dropping the stream cancels the run.
    pub fn start(self: Arc<Self>, query: impl Into<String>, session_id: impl Into<String>) -> EventStream {
        let mut run = PipelineRun::new(session_id, query);
        let span = info_span!(
            "research_run",
            run_id = %run.run_id(),
            session_id = %run.session_id(),
            pipeline = "research"
        );

        spawn_stream(self.config.research.event_buffer, move |sink| {
            async move {
                match self.drive(&sink, &mut run).await {
                    Ok(()) => info!("Run completed"),
                    Err(RunAbort::Closed(_)) => info!("Run cancelled by consumer"),
                    Err(RunAbort::Failed(err)) => info!(code = err.code(), "Run failed"),
                }
            }
            .instrument(span)
        })
    }

    /// Drive `run` through every stage, emitting into `sink`.
    pub async fn drive(&self, sink: &EventSink, run: &mut PipelineRun) -> Result<(), RunAbort> {
        let research = &self.config.research;
        let query = run.query().to_string();
        info!(query = %query, "Research run started");

        execute_stage(
            sink,
            run,
            Stage::Planning,
            "Analyzing the query and planning the research",
            async {
                tokio::time::sleep(research.planning_delay()).await;
                Ok(StageOutcome::success(()).with_result("Research plan ready"))
            },
        )
        .await?;

        let hits = execute_stage(
            sink,
            run,
            Stage::Searching,
            &format!("Searching the web for: {}", query),
            self.search_stage(&query),
        )
        .await?;

        let tasks = execute_stage(
            sink,
            run,
            Stage::Fetching,
            "Reading the top sources",
            self.fetch_stage(&hits, sink),
        )
        .await?;

        let message_id = format!("msg_{}", Uuid::new_v4().simple());
        let consumed = execute_stage(
            sink,
            run,
            Stage::Synthesizing,
            "Writing the research report",
            self.synthesis_stage(&query, &hits, &tasks, sink, &message_id),
        )
        .await?;
        consumed?;

        run.advance(Stage::Completed).map_err(RunAbort::Failed)?;
        sink.pipeline_end(run.session_id()).await?;
        Ok(())
    }

    async fn search_stage(&self, query: &str) -> crate::types::Result<StageOutcome<Vec<SearchHit>>> {
        let max_results = self.config.search.max_results;
        let started = Instant::now();

        let timeout = self.config.search.timeout();
        let hits = tokio::time::timeout(timeout, self.search.search(query, max_results))
            .await
            .map_err(|_| {
                AppError::Search(format!(
                    "{} search timed out after {}s",
                    self.search.name(),
                    timeout.as_secs()
                ))
            })??;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            provider = self.search.name(),
            results = hits.len(),
            elapsed_ms,
            "Search finished"
        );

        let total = hits.len();
        let metadata = json!({
            "searchData": {
                "query": query,
                "results": hits,
                "searchTime": elapsed_ms,
                "totalResults": total,
            }
        });

        Ok(StageOutcome::success(hits)
            .with_result(format!("Found {} results", total))
            .with_metadata(metadata))
    }

    async fn fetch_stage(
        &self,
        hits: &[SearchHit],
        sink: &EventSink,
    ) -> crate::types::Result<StageOutcome<Vec<FetchTask>>> {
        let research = &self.config.research;
        let targets: Vec<String> = hits
            .iter()
            .take(research.top_k)
            .map(|hit| hit.url.clone())
            .collect();

        let transport = match HttpTransport::new(&research.user_agent, research.max_page_bytes) {
            Ok(transport) => Arc::new(transport),
            Err(err) => {
                return Ok(StageOutcome::degraded(Vec::new(), err.to_string())
                    .with_metadata(json!({ "succeeded": 0, "failed": targets.len() })));
            }
        };

        let coordinator = FetchCoordinator::new(
            Arc::clone(&self.fetcher),
            research.fetch_timeout(),
            ExtractOptions {
                min_line_chars: research.min_line_chars,
                max_content_chars: research.max_content_chars,
            },
        );

        let tasks = coordinator.fetch_all(&targets, transport, Some(sink)).await;
        let succeeded = tasks.iter().filter(|t| t.is_success()).count();
        let failed = tasks.len() - succeeded;
        info!(succeeded, failed, "Fetching finished");

        let pages: Vec<&PageContent> = tasks.iter().filter_map(FetchTask::content).collect();
        let timings: Vec<u64> = tasks.iter().map(|t| t.elapsed().as_millis() as u64).collect();
        let mut metadata = json!({ "succeeded": succeeded, "failed": failed, "fetchTimesMs": timings });
        if let Some(main) = main_source(&pages) {
            metadata["contentData"] = main;
        }

        Ok(StageOutcome::success(tasks)
            .with_result(format!("Read {} of {} pages", succeeded, targets.len()))
            .with_metadata(metadata))
    }

    async fn synthesis_stage(
        &self,
        query: &str,
        hits: &[SearchHit],
        tasks: &[FetchTask],
        sink: &EventSink,
        message_id: &str,
    ) -> crate::types::Result<StageOutcome<Result<(), crate::research::events::StreamClosed>>> {
        let research = &self.config.research;
        let sources: Vec<&PageContent> = tasks.iter().filter_map(FetchTask::content).collect();
        let limits = PromptLimits {
            max_results: research.prompt_results,
            max_sources: research.prompt_sources,
            excerpt_chars: research.excerpt_chars,
        };
        let context = build_context(query, hits, &sources, tasks.len(), limits);

        let consumer = TokenStreamConsumer::new(research.token_idle_timeout());
        let upstream = self.llm.stream_with_system(SYSTEM_PROMPT, &context);

        let message = match consumer.consume(upstream, sink, message_id).await {
            Ok(message) => message,
            Err(closed) => return Ok(StageOutcome::success(Err(closed))),
        };

        let metadata = json!({
            "messageId": message_id,
            "chars": message.content.chars().count(),
            "model": self.llm.model_name(),
        });
        let outcome = match message.failure {
            None => StageOutcome::success(Ok(())).with_result("Research report generated"),
            Some(cause) => StageOutcome::degraded(Ok(()), cause).with_result("Research report incomplete"),
        };
        Ok(outcome.with_metadata(metadata))
    }
}

/// The first page with substantial text, else the first page, as preview JSON.
fn main_source(pages: &[&PageContent]) -> Option<Value> {
    let page = pages
        .iter()
        .find(|p| p.content.chars().count() > MAIN_SOURCE_MIN_CHARS)
        .or_else(|| pages.first())?;

    let mut preview = serde_json::to_value(page).ok()?;
    preview["content"] = Value::String(page.content.chars().take(MAIN_SOURCE_PREVIEW_CHARS).collect());
    Some(preview)
}
