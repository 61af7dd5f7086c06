use crate::{
    research::events::EventSink,
    research::stage::{StageOutcome, ToolInvocation},
    tools::{ExtractOptions, HttpTransport, PageFetcher, extract},
    types::{AppError, PageContent},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Failed,
}

/// The finalized outcome of retrieving one target.
#[derive(Debug, Clone)]
pub struct FetchTask {
    index: usize,
    url: String,
    status: FetchStatus,
    content: Option<PageContent>,
    error: Option<String>,
    elapsed: Duration,
}

impl FetchTask {
    fn succeeded(index: usize, url: String, content: PageContent, elapsed: Duration) -> Self {
        Self {
            index,
            url,
            status: FetchStatus::Success,
            content: Some(content),
            error: None,
            elapsed,
        }
    }

    fn failed(index: usize, url: String, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            index,
            url,
            status: FetchStatus::Failed,
            content: None,
            error: Some(error.into()),
            elapsed,
        }
    }

    /// Position of this target in the dispatch order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn content(&self) -> Option<&PageContent> {
        self.content.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn outcome(&self) -> StageOutcome<()> {
        match &self.content {
            Some(page) => StageOutcome::success(())
                .with_result(format!("Read {}", display_title(page)))
                .with_metadata(json!({
                    "url": self.url,
                    "title": page.title,
                    "chars": page.content.chars().count(),
                    "elapsedMs": self.elapsed().as_millis() as u64,
                })),
            None => StageOutcome::degraded((), self.error.clone().unwrap_or_default()).with_metadata(json!({
                "url": self.url,
                "elapsedMs": self.elapsed().as_millis() as u64,
            })),
        }
    }
}

fn display_title(page: &PageContent) -> &str {
    if page.title.is_empty() {
        &page.url
    } else {
        &page.title
    }
}

/// Retrieves all targets of a run concurrently and isolates their failures.
#[derive(Clone)]
pub struct FetchCoordinator {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
    extract: ExtractOptions,
}

impl FetchCoordinator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, timeout: Duration, extract: ExtractOptions) -> Self {
        Self {
            fetcher,
            timeout,
            extract,
        }
    }

    /// Fetch every target at once over `transport`.
    ///
    /// Returns one task per target in dispatch order. A failing target never
    /// affects its siblings. With a sink, each target is reported as its own
    /// `fetch_page` stage pair. Emission failures are left for the caller to
    /// observe on its next emit.
    pub async fn fetch_all(
        &self,
        targets: &[String],
        transport: Arc<HttpTransport>,
        sink: Option<&EventSink>,
    ) -> Vec<FetchTask> {
        let mut set = JoinSet::new();

        for (index, url) in targets.iter().enumerate() {
            let url = url.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let transport = Arc::clone(&transport);
            let sink = sink.cloned();
            let timeout = self.timeout;
            let options = self.extract;

            set.spawn(async move {
                let invocation = match &sink {
                    Some(sink) => ToolInvocation::open(sink, "fetch_page", format!("Reading {}", url))
                        .await
                        .ok(),
                    None => None,
                };

                let started = Instant::now();
                let task = match fetch_one(fetcher.as_ref(), &transport, &url, timeout, options).await {
                    Ok(content) => {
                        debug!(index, url = %url, chars = content.content.len(), "Fetched page");
                        FetchTask::succeeded(index, url, content, started.elapsed())
                    }
                    Err(err) => {
                        warn!(index, url = %url, error = %err, "Fetch failed");
                        FetchTask::failed(index, url, err.to_string(), started.elapsed())
                    }
                };

                if let (Some(sink), Some(invocation)) = (&sink, invocation) {
                    let _ = invocation.finish(sink, &task.outcome()).await;
                }

                task
            });
        }

        let mut slots: Vec<Option<FetchTask>> = vec![None; targets.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(task) => {
                    let index = task.index;
                    slots[index] = Some(task);
                }
                Err(e) => warn!("Fetch task did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(targets)
            .enumerate()
            .map(|(index, (slot, url))| {
                slot.unwrap_or_else(|| {
                    FetchTask::failed(index, url.clone(), "fetch task did not complete", Duration::ZERO)
                })
            })
            .collect()
    }
}

async fn fetch_one(
    fetcher: &dyn PageFetcher,
    transport: &HttpTransport,
    url: &str,
    timeout: Duration,
    options: ExtractOptions,
) -> crate::types::Result<PageContent> {
    let page = tokio::time::timeout(timeout, fetcher.fetch(transport, url))
        .await
        .map_err(|_| AppError::Fetch(format!("Timed out after {}s", timeout.as_secs_f32())))??;

    if !(200..300).contains(&page.status) {
        return Err(AppError::Fetch(format!("HTTP error: {}", page.status)));
    }
    // HttpFetcher enforces the ceiling while streaming; this catches other
    // fetchers that return an oversized body.
    if page.bytes > transport.max_body_bytes() {
        return Err(AppError::Fetch(format!(
            "Response exceeds the {} byte limit",
            transport.max_body_bytes()
        )));
    }

    Ok(extract(&page.url, &page.body, options))
}
